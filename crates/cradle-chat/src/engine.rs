//! Chat engine: composition root for the conversation pipeline.
//!
//! Wires the store, guard, bridge, and router together behind the surface
//! the presentation layer consumes: `send_message`, `clear_conversation`,
//! `conversation`, and `is_generating`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use cradle_core::config::CradleConfig;
use cradle_core::types::{Message, Role, StrategyResult};
use cradle_storage::TranscriptRepository;

use crate::context::ContextBridge;
use crate::error::ChatError;
use crate::guard::GenerationGuard;
use crate::router::ResponseRouter;
use crate::store::ConversationStore;
use crate::strategy::{LocalModel, ProfileSource, RemoteAgent, RetrievalService};

/// Orchestrates one user utterance into at most one displayed reply.
pub struct ChatEngine {
    store: ConversationStore,
    guard: GenerationGuard,
    bridge: ContextBridge,
    router: ResponseRouter,
    profile: Arc<dyn ProfileSource>,
    is_generating: AtomicBool,
}

impl ChatEngine {
    /// Wire the engine from its injected collaborators.
    pub fn new(
        config: &CradleConfig,
        repo: Arc<TranscriptRepository>,
        local: Arc<dyn LocalModel>,
        retrieval: Arc<dyn RetrievalService>,
        agent: Arc<dyn RemoteAgent>,
        profile: Arc<dyn ProfileSource>,
    ) -> Self {
        Self {
            store: ConversationStore::new(repo),
            guard: GenerationGuard::new(),
            bridge: ContextBridge::new(config.chat.context_turns),
            router: ResponseRouter::new(local, retrieval, agent, config.agent.user_id.clone()),
            profile,
            is_generating: AtomicBool::new(false),
        }
    }

    /// Hydrate the transcript from storage, replaying it into dialogue
    /// state. Call once at startup.
    pub fn load(&self) {
        self.store.load(&self.bridge);
    }

    /// Read-only snapshot of the conversation.
    pub fn conversation(&self) -> Arc<Vec<Message>> {
        self.store.snapshot()
    }

    /// Whether a send is currently in flight.
    pub fn is_generating(&self) -> bool {
        self.is_generating.load(Ordering::SeqCst)
    }

    /// Process one user utterance.
    ///
    /// Returns `Ok(None)` for trivial input (no state change) and for
    /// results discarded because the conversation was cleared mid-flight.
    /// The busy flag is reset on every exit path.
    pub async fn send_message(
        &self,
        text: &str,
        use_rag: bool,
    ) -> Result<Option<StrategyResult>, ChatError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        self.is_generating.store(true, Ordering::SeqCst);
        let outcome = self.run_send(trimmed, use_rag).await;
        self.is_generating.store(false, Ordering::SeqCst);
        outcome
    }

    /// Drop the transcript, dialogue state, and any pending follow-up, and
    /// invalidate every in-flight send. The empty transcript is persisted.
    pub fn clear_conversation(&self) {
        self.guard.invalidate();
        self.store.clear();
        self.bridge.clear_conversation_history();
    }

    async fn run_send(
        &self,
        text: &str,
        use_rag: bool,
    ) -> Result<Option<StrategyResult>, ChatError> {
        // Best-effort profile initialization; the send proceeds regardless.
        if !self.profile.is_initialized() {
            if let Err(e) = self.profile.initialize().await {
                warn!(error = %e, "Profile initialization failed; continuing without it");
            }
        }
        self.bridge.set_user_context(self.profile.current());

        let token = self.guard.begin();

        self.bridge.add_message(Role::User, text);
        self.store.append(Message::user(text));

        // Snapshot after the append so strategies see the new user message.
        let history = self.store.snapshot();

        let result = self
            .router
            .respond(text, use_rag, history.as_slice(), &self.bridge)
            .await?;

        if !self.guard.is_valid(token) {
            debug!("Reply discarded: conversation was cleared mid-flight");
            return Ok(None);
        }

        self.bridge.add_message(Role::Assistant, &result.message);
        self.store.append(Message::assistant(result.message.clone()));

        Ok(Some(result))
    }
}
