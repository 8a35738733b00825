//! Message and strategy-result types shared across the engine.

use std::collections::HashMap;

use chrono::{Local, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Intent assigned to plain local-model replies.
pub const INTENT_GENERAL_CHAT: &str = "general_chat";

/// Intent assigned to replies produced by the remote backend agent.
pub const INTENT_REMOTE_AGENT: &str = "remote_agent";

// =============================================================================
// Messages
// =============================================================================

/// Who authored a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A single transcript entry. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within a conversation: epoch millis plus a random suffix so two
    /// messages created in the same millisecond stay distinct.
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Display timestamp (local `HH:MM`), frozen at creation.
    pub timestamp: String,
}

impl Message {
    /// Create a message authored by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a message authored by the assistant.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role,
            content: content.into(),
            timestamp: Local::now().format("%H:%M").to_string(),
        }
    }
}

/// Generate a message id of the form `<epoch_millis>-<9 alphanumeric chars>`.
fn generate_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        suffix.to_lowercase()
    )
}

// =============================================================================
// Strategy results and follow-up state
// =============================================================================

/// Outstanding slot-filling state for a multi-turn action.
///
/// At most one is active at a time; its presence redirects the next
/// retrieval-mode turn to the follow-up strategy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingFollowUp {
    pub intent: String,
    pub partial_data: HashMap<String, Value>,
    pub missing_fields: Vec<String>,
}

/// Opaque caller-supplied profile payload handed to the retrieval backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext(pub Value);

/// Outcome of one response strategy.
///
/// Retrieval strategies populate the follow-up fields when an action needs
/// more slots filled; local and remote replies never do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub message: String,
    pub intent: String,
    #[serde(default)]
    pub action: Option<Value>,
    #[serde(default)]
    pub requires_follow_up: bool,
    #[serde(default)]
    pub partial_data: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub missing_fields: Option<Vec<String>>,
}

impl StrategyResult {
    /// Wrap a plain local-model reply.
    pub fn chat(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            intent: INTENT_GENERAL_CHAT.to_string(),
            action: None,
            requires_follow_up: false,
            partial_data: None,
            missing_fields: None,
        }
    }

    /// Wrap a remote-agent reply. Carries no follow-up semantics.
    pub fn remote(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            intent: INTENT_REMOTE_AGENT.to_string(),
            action: None,
            requires_follow_up: false,
            partial_data: None,
            missing_fields: None,
        }
    }

    /// A result is usable only if it carries a non-blank message.
    pub fn is_well_formed(&self) -> bool {
        !self.message.trim().is_empty()
    }

    /// The follow-up slot this result asks to open, if fully specified.
    ///
    /// Requires the flag plus all of intent, partial data, and missing
    /// fields. Anything less yields `None` and the caller clears the slot.
    pub fn follow_up(&self) -> Option<PendingFollowUp> {
        if !self.requires_follow_up || self.intent.is_empty() {
            return None;
        }
        match (&self.partial_data, &self.missing_fields) {
            (Some(partial), Some(missing)) => Some(PendingFollowUp {
                intent: self.intent.clone(),
                partial_data: partial.clone(),
                missing_fields: missing.clone(),
            }),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
