//! Error types for the conversation engine.

/// Errors surfaced by the chat engine to the presentation layer.
///
/// Recoverable failures (a strategy erroring, persistence hiccups, stale
/// results) are handled inside the engine; only total failure of the
/// fallback chain reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("all response strategies failed: {0}")]
    Exhausted(String),
}

/// Tagged outcome of a remote-agent call.
///
/// The router treats every variant as "advance the fallback chain"; the
/// distinction exists for logging and tests.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent request timed out after {0} ms")]
    Timeout(u64),
    #[error("agent returned status {0}")]
    Status(u16),
    #[error("agent transport error: {0}")]
    Transport(String),
}
