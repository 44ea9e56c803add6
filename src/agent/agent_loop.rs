//! Per-request orchestration: history, prompt, model call, persistence.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use crate::agent::prompt::build_prompt;
use crate::config::AgentConfig;
use crate::db::ConversationStore;
use crate::error::AgentError;
use crate::llm::{CompletionRequest, FinishReason, ModelClient};
use crate::tenant::TenantId;

/// Shown to the caller when a reply could not be durably recorded.
const DURABILITY_WARNING: &str =
    "reply was generated but could not be saved; it will be missing from future context";

/// How a request ended, when it did not end in an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The model produced an answer.
    Answered,
    /// The model declined; the text is a policy message.
    Refused,
}

/// Result of one agent request.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub outcome: ReplyOutcome,
    /// Whether the exchange was durably recorded.
    pub persisted: bool,
    /// Present when the model answered but persistence failed afterwards.
    pub warning: Option<String>,
    pub model_latency: Duration,
}

/// The conversation loop.
///
/// Holds no per-tenant state between requests; per-tenant turn ordering is
/// the store's job, so any number of agent instances can run against the
/// same store without coordination.
pub struct Agent {
    store: Arc<dyn ConversationStore>,
    model: ModelClient,
    config: AgentConfig,
}

impl Agent {
    pub fn new(store: Arc<dyn ConversationStore>, model: ModelClient, config: AgentConfig) -> Self {
        Self { store, model, config }
    }

    /// Handle one user message for one tenant.
    ///
    /// Stages: fetch history, build the bounded prompt, call the model,
    /// persist the exchange, respond. A failure before the model call fails
    /// the whole request; a persistence failure after a successful model
    /// call still returns the reply, flagged with a durability warning.
    pub async fn handle_message(
        &self,
        tenant: &TenantId,
        user_text: &str,
    ) -> Result<Reply, AgentError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("agent_request", %request_id, tenant = %tenant);
        self.handle_message_impl(tenant, user_text).instrument(span).await
    }

    async fn handle_message_impl(
        &self,
        tenant: &TenantId,
        user_text: &str,
    ) -> Result<Reply, AgentError> {
        let window = self
            .store
            .fetch_recent_turns(tenant, self.config.window_turns)
            .await
            .map_err(AgentError::HistoryUnavailable)?;
        tracing::debug!(turns = window.len(), "fetched conversation window");

        let messages = build_prompt(
            self.config.system_prompt.as_deref(),
            &window,
            user_text,
            self.config.prompt_char_budget,
        );

        let reply = self
            .model
            .complete(CompletionRequest {
                messages,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            })
            .await
            .map_err(AgentError::ModelUnavailable)?;
        tracing::debug!(
            latency_ms = reply.latency.as_millis() as u64,
            attempts = reply.attempts,
            finish_reason = ?reply.finish_reason,
            "model call complete"
        );

        if reply.finish_reason == FinishReason::Refused {
            return Ok(self.finish_refused(tenant, user_text, reply.text, reply.latency).await);
        }

        let (persisted, warning) =
            match self.store.append_exchange(tenant, user_text, &reply.text).await {
                Ok(()) => (true, None),
                Err(e) => {
                    tracing::warn!(error = %e, "exchange not durably recorded; history has a gap");
                    (false, Some(DURABILITY_WARNING.to_string()))
                }
            };

        Ok(Reply {
            text: reply.text,
            outcome: ReplyOutcome::Answered,
            persisted,
            warning,
            model_latency: reply.latency,
        })
    }

    /// A refusal is a valid terminal outcome, not an error. It is only
    /// recorded as an assistant turn when configured to be.
    async fn finish_refused(
        &self,
        tenant: &TenantId,
        user_text: &str,
        text: String,
        model_latency: Duration,
    ) -> Reply {
        let (persisted, warning) = if self.config.persist_refusals {
            match self.store.append_exchange(tenant, user_text, &text).await {
                Ok(()) => (true, None),
                Err(e) => {
                    tracing::warn!(error = %e, "refusal not durably recorded");
                    (false, Some(DURABILITY_WARNING.to_string()))
                }
            }
        } else {
            (false, None)
        };

        Reply { text, outcome: ReplyOutcome::Refused, persisted, warning, model_latency }
    }
}
