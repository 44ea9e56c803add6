//! Resilient wrapper around a model provider.
//!
//! Enforces a per-attempt timeout and retries transient failures with
//! backoff; non-transient failures surface immediately. This is the only
//! layer in the process that retries anything.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ModelError;
use crate::llm::provider::{CompletionRequest, FinishReason, ModelProvider};
use crate::llm::retry::RetryPolicy;

/// A completed model call, with the latency of the successful attempt.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub text: String,
    pub finish_reason: FinishReason,
    pub latency: Duration,
    pub attempts: u32,
}

/// Retry/timeout wrapper over any [`ModelProvider`].
pub struct ModelClient {
    provider: Arc<dyn ModelProvider>,
    policy: RetryPolicy,
    timeout: Duration,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn ModelProvider>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self { provider, policy, timeout }
    }

    /// Run one completion, retrying transient failures up to the policy's
    /// attempt ceiling. On exhaustion fails with [`ModelError::Exhausted`]
    /// carrying the last underlying cause.
    pub async fn complete(&self, req: CompletionRequest) -> Result<ModelReply, ModelError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let started = Instant::now();

            let err = match tokio::time::timeout(self.timeout, self.provider.complete(req.clone()))
                .await
            {
                Ok(Ok(response)) => {
                    return Ok(ModelReply {
                        text: response.content,
                        finish_reason: response.finish_reason,
                        latency: started.elapsed(),
                        attempts: attempt,
                    });
                }
                Ok(Err(e)) => e,
                Err(_) => ModelError::Timeout { secs: self.timeout.as_secs() },
            };

            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= self.policy.max_attempts {
                return Err(ModelError::Exhausted { attempts: attempt, last: Box::new(err) });
            }

            // A throttled endpoint may tell us exactly how long to wait.
            let delay = match &err {
                ModelError::RateLimited { retry_after: Some(wait) } => {
                    (*wait).min(self.policy.max_delay)
                }
                _ => self.policy.backoff(attempt),
            };
            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient model failure, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Single-attempt liveness probe, no retries.
    pub async fn health_check(&self) -> Result<(), ModelError> {
        tokio::time::timeout(self.timeout, self.provider.health_check())
            .await
            .map_err(|_| ModelError::Timeout { secs: self.timeout.as_secs() })?
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tokio_test::assert_ok;

    use super::*;
    use crate::llm::provider::CompletionResponse;

    enum Script {
        Reply(&'static str),
        Throttle,
        AuthFail,
        /// Fail transiently this many times, then succeed.
        FlakyUntil(u32),
    }

    struct ScriptedProvider {
        script: Script,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn new(script: Script) -> Self {
            Self { script, calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn complete(
            &self,
            _req: CompletionRequest,
        ) -> Result<CompletionResponse, ModelError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.script {
                Script::Reply(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                    finish_reason: FinishReason::Complete,
                }),
                Script::Throttle => Err(ModelError::RateLimited { retry_after: None }),
                Script::AuthFail => Err(ModelError::AuthFailed),
                Script::FlakyUntil(n) if call <= n => {
                    Err(ModelError::RequestFailed { reason: "connection reset".into() })
                }
                Script::FlakyUntil(_) => Ok(CompletionResponse {
                    content: "recovered".to_string(),
                    finish_reason: FinishReason::Complete,
                }),
            }
        }

        async fn health_check(&self) -> Result<(), ModelError> {
            Ok(())
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(4),
            jitter: 0.0,
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![crate::llm::ChatMessage::user("hello")],
            max_tokens: Some(64),
            temperature: Some(0.0),
        }
    }

    #[tokio::test]
    async fn test_throttling_retries_up_to_ceiling() {
        let provider = Arc::new(ScriptedProvider::new(Script::Throttle));
        let client =
            ModelClient::new(provider.clone(), fast_policy(3), Duration::from_secs(5));

        let err = client.complete(request()).await.unwrap_err();
        assert!(matches!(err, ModelError::Exhausted { attempts: 3, .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(Script::AuthFail));
        let client =
            ModelClient::new(provider.clone(), fast_policy(5), Duration::from_secs(5));

        let err = client.complete(request()).await.unwrap_err();
        assert!(matches!(err, ModelError::AuthFailed));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let provider = Arc::new(ScriptedProvider::new(Script::FlakyUntil(2)));
        let client =
            ModelClient::new(provider.clone(), fast_policy(5), Duration::from_secs(5));

        let reply = client.complete(request()).await.unwrap();
        assert_eq!(reply.text, "recovered");
        assert_eq!(reply.attempts, 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let provider = Arc::new(ScriptedProvider::new(Script::Reply("hi there")));
        let client = ModelClient::new(provider, fast_policy(3), Duration::from_secs(5));

        let reply = assert_ok!(client.complete(request()).await);
        assert_eq!(reply.text, "hi there");
        assert_eq!(reply.finish_reason, FinishReason::Complete);
        assert_eq!(reply.attempts, 1);
    }
}
