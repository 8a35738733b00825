//! Strategy seams consumed by the response router.
//!
//! Implementations are injected into the engine at construction; the engine
//! never reaches for module-level singletons. Model inference, retrieval
//! internals, and the backend agent all live behind these traits.

use async_trait::async_trait;

use cradle_core::error::CradleError;
use cradle_core::types::{Message, PendingFollowUp, StrategyResult, UserContext};

use crate::error::AgentError;

/// On-device response generation.
#[async_trait]
pub trait LocalModel: Send + Sync {
    /// Generate a reply from the full history: all prior turns plus the new
    /// user message, as an immutable snapshot taken at call time.
    async fn generate(&self, history: &[Message]) -> Result<String, CradleError>;
}

/// Retrieval-augmented strategies backed by the dialogue-state manager.
#[async_trait]
pub trait RetrievalService: Send + Sync {
    /// Answer a fresh query using retrieval plus the caller-supplied context.
    async fn process_query(
        &self,
        query: &str,
        ctx: &UserContext,
    ) -> Result<StrategyResult, CradleError>;

    /// Interpret `answer` as the user's response to the outstanding
    /// follow-up's missing field(s).
    async fn process_follow_up(
        &self,
        answer: &str,
        pending: &PendingFollowUp,
    ) -> Result<StrategyResult, CradleError>;
}

/// Remote backend agent reached over the network.
#[async_trait]
pub trait RemoteAgent: Send + Sync {
    /// Ask the agent for a reply to the raw query.
    async fn ask(&self, query: &str, user_id: &str) -> Result<String, AgentError>;
}

/// Caller-provided user profile feeding retrieval context.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Whether the profile has been initialized this session.
    fn is_initialized(&self) -> bool;

    /// Initialize the profile. Idempotent; the engine treats failures as
    /// best-effort and proceeds with whatever `current` returns.
    async fn initialize(&self) -> Result<(), CradleError>;

    /// Snapshot of the current profile payload.
    fn current(&self) -> UserContext;
}
