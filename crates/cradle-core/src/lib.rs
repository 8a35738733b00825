//! Core vocabulary for the Cradle conversation engine.
//!
//! Shared message and strategy-result types, the top-level error, and the
//! TOML configuration layer used by the storage and chat crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AgentConfig, ChatConfig, CradleConfig, GeneralConfig};
pub use error::{CradleError, Result};
pub use types::{Message, PendingFollowUp, Role, StrategyResult, UserContext};
