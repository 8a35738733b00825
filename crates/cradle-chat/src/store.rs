//! Conversation store: owns the ordered transcript.
//!
//! The transcript is held as an immutable `Arc<Vec<Message>>` and every
//! mutation swaps in a rebuilt value, so snapshots handed to strategies are
//! never affected by later appends or clears. Each accepted mutation
//! persists the full transcript; persistence failures are logged and the
//! in-memory state stays authoritative for the session.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use cradle_core::types::Message;
use cradle_storage::TranscriptRepository;

use crate::context::ContextBridge;

/// Owner of the ordered, append-only transcript.
pub struct ConversationStore {
    transcript: Mutex<Arc<Vec<Message>>>,
    repo: Arc<TranscriptRepository>,
}

impl ConversationStore {
    pub fn new(repo: Arc<TranscriptRepository>) -> Self {
        Self {
            transcript: Mutex::new(Arc::new(Vec::new())),
            repo,
        }
    }

    /// Hydrate the transcript from storage and replay it into dialogue
    /// state so multi-turn context survives a restart.
    ///
    /// Read or parse failures start the session with an empty transcript.
    pub fn load(&self, bridge: &ContextBridge) {
        let messages = match self.repo.load() {
            Ok(Some(messages)) => messages,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load transcript; starting empty");
                Vec::new()
            }
        };

        for msg in &messages {
            // Blank entries stay in the transcript but are not replayed.
            if msg.content.is_empty() {
                continue;
            }
            bridge.add_message(msg.role, &msg.content);
        }

        debug!(messages = messages.len(), "Transcript hydrated");
        if let Ok(mut transcript) = self.transcript.lock() {
            *transcript = Arc::new(messages);
        }
    }

    /// Append one message and persist the updated transcript.
    pub fn append(&self, message: Message) {
        let next = {
            let mut transcript = match self.transcript.lock() {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "Transcript lock poisoned; append dropped");
                    return;
                }
            };
            let mut messages: Vec<Message> = transcript.as_ref().clone();
            messages.push(message);
            let next = Arc::new(messages);
            *transcript = Arc::clone(&next);
            next
        };
        self.persist(&next);
    }

    /// Empty the transcript and persist the empty state.
    pub fn clear(&self) {
        let next: Arc<Vec<Message>> = Arc::new(Vec::new());
        if let Ok(mut transcript) = self.transcript.lock() {
            *transcript = Arc::clone(&next);
        }
        self.persist(&next);
    }

    /// Read-only snapshot of the current transcript.
    pub fn snapshot(&self) -> Arc<Vec<Message>> {
        self.transcript
            .lock()
            .map(|t| Arc::clone(&t))
            .unwrap_or_default()
    }

    fn persist(&self, messages: &[Message]) {
        if let Err(e) = self.repo.save(messages) {
            warn!(error = %e, "Failed to persist transcript; in-memory state remains authoritative");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
