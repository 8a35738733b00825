//! Response router: strategy selection and the fallback chain.
//!
//! Picks the primary strategy for each turn (follow-up, fresh retrieval, or
//! the on-device model), falls back to the remote backend agent when the
//! primary yields no usable result, and to the on-device model once more as
//! the last resort. Every turn therefore ends in either a reply or an
//! explicit error, never a silent stall.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use cradle_core::error::CradleError;
use cradle_core::types::{Message, StrategyResult};

use crate::context::ContextBridge;
use crate::error::ChatError;
use crate::strategy::{LocalModel, RemoteAgent, RetrievalService};

/// Decision logic selecting and sequencing response strategies per send.
pub struct ResponseRouter {
    local: Arc<dyn LocalModel>,
    retrieval: Arc<dyn RetrievalService>,
    agent: Arc<dyn RemoteAgent>,
    agent_user_id: String,
}

impl ResponseRouter {
    pub fn new(
        local: Arc<dyn LocalModel>,
        retrieval: Arc<dyn RetrievalService>,
        agent: Arc<dyn RemoteAgent>,
        agent_user_id: impl Into<String>,
    ) -> Self {
        Self {
            local,
            retrieval,
            agent,
            agent_user_id: agent_user_id.into(),
        }
    }

    /// Produce the reply for one turn.
    ///
    /// `history` is the immutable transcript snapshot taken after the user
    /// message was appended; strategies never read shared mutable state.
    /// A usable result requires a non-blank message; anything else (an
    /// error or a blank reply) advances the fallback chain.
    pub async fn respond(
        &self,
        text: &str,
        use_rag: bool,
        history: &[Message],
        bridge: &ContextBridge,
    ) -> Result<StrategyResult, ChatError> {
        let result = match self.primary(text, use_rag, history, bridge).await {
            Ok(result) if result.is_well_formed() => result,
            Ok(_) => {
                warn!("Primary strategy returned no usable message; trying backend agent");
                self.fall_back(text, history).await?
            }
            Err(e) => {
                warn!(error = %e, "Primary strategy failed; trying backend agent");
                self.fall_back(text, history).await?
            }
        };

        // Follow-up bookkeeping applies only to retrieval-backed turns:
        // local and remote replies never open a slot, and a retrieval turn
        // that resolves without one closes whatever was open.
        if use_rag {
            match result.follow_up() {
                Some(pending) => bridge.set_pending_follow_up(
                    pending.intent,
                    pending.partial_data,
                    pending.missing_fields,
                ),
                None => bridge.clear_pending_follow_up(),
            }
        }

        Ok(result)
    }

    /// The strategy chosen by the routing decision, in priority order.
    async fn primary(
        &self,
        text: &str,
        use_rag: bool,
        history: &[Message],
        bridge: &ContextBridge,
    ) -> Result<StrategyResult, CradleError> {
        if use_rag {
            if bridge.has_pending_follow_up() {
                debug!("Routing to follow-up strategy");
                bridge
                    .process_follow_up_response(text, self.retrieval.as_ref())
                    .await
            } else {
                debug!("Routing to fresh retrieval query");
                self.retrieval
                    .process_query(text, &bridge.user_context())
                    .await
            }
        } else {
            debug!("Routing to local model");
            self.generate_local(history).await.map(StrategyResult::chat)
        }
    }

    /// Remote agent first, then the on-device model as last resort.
    async fn fall_back(
        &self,
        text: &str,
        history: &[Message],
    ) -> Result<StrategyResult, ChatError> {
        match self.agent.ask(text, &self.agent_user_id).await {
            Ok(reply) if !reply.trim().is_empty() => return Ok(StrategyResult::remote(reply)),
            Ok(_) => warn!("Agent returned an empty reply; trying local model"),
            Err(e) => warn!(error = %e, "Agent call failed; trying local model"),
        }

        match self.generate_local(history).await {
            Ok(reply) if !reply.trim().is_empty() => Ok(StrategyResult::chat(reply)),
            Ok(_) => Err(ChatError::Exhausted(
                "local model returned an empty reply".to_string(),
            )),
            Err(e) => Err(ChatError::Exhausted(e.to_string())),
        }
    }

    /// Run the on-device model over the snapshot, logging latency.
    async fn generate_local(&self, history: &[Message]) -> Result<String, CradleError> {
        let started = Instant::now();
        let reply = self.local.generate(history).await?;
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Local model reply generated"
        );
        Ok(reply)
    }
}

// =============================================================================
// Tests
// =============================================================================
