use thiserror::Error;

/// Top-level error type for the Cradle engine.
///
/// Each variant wraps a subsystem-specific failure. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for CradleError`
/// so that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CradleError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for CradleError {
    fn from(err: toml::de::Error) -> Self {
        CradleError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for CradleError {
    fn from(err: toml::ser::Error) -> Self {
        CradleError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for CradleError {
    fn from(err: serde_json::Error) -> Self {
        CradleError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Cradle operations.
pub type Result<T> = std::result::Result<T, CradleError>;
