//! Context bridge: adapter to the multi-turn dialogue-state manager.
//!
//! Owns the pending follow-up slot, the caller-supplied user context, and a
//! rolling window of recent dialogue turns. The retrieval backend's own
//! slot-filling logic sits behind [`RetrievalService`]; this adapter keeps
//! only the state that routing decisions read.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use cradle_core::error::CradleError;
use cradle_core::types::{PendingFollowUp, Role, StrategyResult, UserContext};

use crate::strategy::RetrievalService;

/// One recorded dialogue turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Adapter holding multi-turn dialogue state for the router.
pub struct ContextBridge {
    turns: Mutex<Vec<Turn>>,
    pending: Mutex<Option<PendingFollowUp>>,
    user_context: Mutex<UserContext>,
    /// Maximum number of recent turns retained.
    context_turns: usize,
}

impl ContextBridge {
    /// Create a bridge keeping at most `context_turns` recent turns.
    pub fn new(context_turns: usize) -> Self {
        Self {
            turns: Mutex::new(Vec::new()),
            pending: Mutex::new(None),
            user_context: Mutex::new(UserContext::default()),
            context_turns,
        }
    }

    /// Record a turn into dialogue state, trimming the window.
    pub fn add_message(&self, role: Role, content: &str) {
        if let Ok(mut turns) = self.turns.lock() {
            turns.push(Turn {
                role,
                content: content.to_string(),
            });
            while turns.len() > self.context_turns {
                turns.remove(0);
            }
        }
    }

    /// The recorded dialogue turns, most recent last.
    pub fn recent_turns(&self) -> Vec<Turn> {
        self.turns.lock().map(|t| t.clone()).unwrap_or_default()
    }

    /// Store the caller-supplied profile payload for retrieval strategies.
    pub fn set_user_context(&self, ctx: UserContext) {
        if let Ok(mut current) = self.user_context.lock() {
            *current = ctx;
        }
    }

    /// The most recently supplied profile payload.
    pub fn user_context(&self) -> UserContext {
        self.user_context
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Whether a follow-up slot is currently open.
    pub fn has_pending_follow_up(&self) -> bool {
        self.pending.lock().map(|p| p.is_some()).unwrap_or(false)
    }

    /// The open follow-up slot, if any.
    pub fn pending_follow_up(&self) -> Option<PendingFollowUp> {
        self.pending.lock().map(|p| p.clone()).unwrap_or(None)
    }

    /// Open (or overwrite) the follow-up slot. At most one is active.
    pub fn set_pending_follow_up(
        &self,
        intent: String,
        partial_data: HashMap<String, Value>,
        missing_fields: Vec<String>,
    ) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(PendingFollowUp {
                intent,
                partial_data,
                missing_fields,
            });
        }
    }

    /// Close the follow-up slot.
    pub fn clear_pending_follow_up(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = None;
        }
    }

    /// Drop all dialogue turns and the follow-up slot together.
    ///
    /// The user context survives: it is profile data, not conversation
    /// state.
    pub fn clear_conversation_history(&self) {
        if let Ok(mut turns) = self.turns.lock() {
            turns.clear();
        }
        self.clear_pending_follow_up();
    }

    /// Hand the raw text plus the open follow-up slot to the retrieval
    /// backend, which interprets it as the answer to the missing field(s).
    pub async fn process_follow_up_response(
        &self,
        text: &str,
        retrieval: &dyn RetrievalService,
    ) -> Result<StrategyResult, CradleError> {
        let pending = self
            .pending_follow_up()
            .ok_or_else(|| CradleError::Retrieval("no follow-up is pending".to_string()))?;
        retrieval.process_follow_up(text, &pending).await
    }
}

// =============================================================================
// Tests
// =============================================================================
