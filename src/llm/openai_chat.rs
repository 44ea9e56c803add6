//! OpenAI-compatible chat completions provider.
//!
//! Talks to any hosted endpoint that speaks the standard chat completions
//! API with bearer-token auth. HTTP status and finish-reason classification
//! happens here; retries happen in the client wrapper.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::llm::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, ModelProvider,
};

const BLOCKED_CONTENT_PLACEHOLDER: &str = "The model declined to answer this request.";

pub struct OpenAiChatProvider {
    client: Client,
    config: ModelConfig,
}

impl OpenAiChatProvider {
    /// Create a provider with API key auth.
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        if config.api_key.is_none() {
            return Err(ModelError::AuthFailed);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::RequestFailed { reason: e.to_string() })?;

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn api_key(&self) -> String {
        self.config
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().to_string())
            .unwrap_or_default()
    }

    async fn send_request(&self, body: &ChatCompletionRequest<'_>) -> Result<ChatCompletionResponse, ModelError> {
        let url = self.api_url("chat/completions");

        tracing::debug!(%url, model = %self.config.model, "sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key()))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout { secs: self.config.timeout.as_secs() }
                } else {
                    ModelError::RequestFailed { reason: e.to_string() }
                }
            })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let response_text = response.text().await.unwrap_or_default();

        tracing::debug!(%status, "completion response");

        if !status.is_success() {
            return Err(classify_status(status, retry_after, &response_text));
        }

        serde_json::from_str(&response_text).map_err(|e| ModelError::InvalidResponse {
            reason: format!("JSON parse error: {e}"),
        })
    }
}

fn classify_status(
    status: reqwest::StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ModelError {
    match status.as_u16() {
        401 | 403 => ModelError::AuthFailed,
        429 => ModelError::RateLimited { retry_after },
        400..=499 => ModelError::BadRequest { reason: format!("HTTP {status}: {body}") },
        _ => ModelError::RequestFailed { reason: format!("HTTP {status}: {body}") },
    }
}

fn map_finish_reason(raw: Option<&str>, blocked: bool) -> FinishReason {
    let raw = raw.unwrap_or("");
    if blocked || raw.contains("content_filter") {
        FinishReason::Refused
    } else if raw.contains("length") {
        FinishReason::Truncated
    } else {
        if !raw.is_empty() && !raw.contains("stop") {
            tracing::debug!(finish_reason = raw, "unrecognized finish reason, treating as complete");
        }
        FinishReason::Complete
    }
}

#[async_trait]
impl ModelProvider for OpenAiChatProvider {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, ModelError> {
        let messages: Vec<WireMessage> = req.messages.iter().map(WireMessage::from).collect();

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };

        let response = self.send_request(&request).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse {
                reason: "no choices in response".to_string(),
            })?;

        // A message withheld by the provider's safety layer arrives with no
        // content; surface it as a refusal, not an empty answer.
        let (content, blocked) = match choice.message.and_then(|m| m.content) {
            Some(text) if !text.is_empty() => (text, false),
            _ => (BLOCKED_CONTENT_PLACEHOLDER.to_string(), true),
        };

        Ok(CompletionResponse {
            finish_reason: map_finish_reason(choice.finish_reason.as_deref(), blocked),
            content,
        })
    }

    async fn health_check(&self) -> Result<(), ModelError> {
        let url = self.api_url("models");

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key()))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout { secs: self.config.timeout.as_secs() }
                } else {
                    ModelError::RequestFailed { reason: e.to_string() }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, None, &body));
        }
        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// Chat completions wire types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self { role: msg.role.as_str(), content: msg.content.clone() }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: Option<ChatCompletionMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_conversion() {
        let msg = ChatMessage::user("Hello");
        let wire = WireMessage::from(&msg);
        assert_eq!(wire.role, "user");
        assert_eq!(wire.content, "Hello");
    }

    #[test]
    fn test_status_classification() {
        use reqwest::StatusCode;

        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, None, ""),
            ModelError::AuthFailed
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(2)), ""),
            ModelError::RateLimited { retry_after: Some(_) }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, None, "bad payload"),
            ModelError::BadRequest { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, None, ""),
            ModelError::RequestFailed { .. }
        ));
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(map_finish_reason(Some("stop"), false), FinishReason::Complete);
        assert_eq!(map_finish_reason(Some("length"), false), FinishReason::Truncated);
        assert_eq!(
            map_finish_reason(Some("content_filter"), false),
            FinishReason::Refused
        );
        assert_eq!(map_finish_reason(None, true), FinishReason::Refused);
        assert_eq!(map_finish_reason(None, false), FinishReason::Complete);
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "id": "cmpl-1",
            "choices": [
                {"message": {"role": "assistant", "content": "hi there"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices.len(), 1);
        assert_eq!(
            parsed.choices[0].message.as_ref().unwrap().content.as_deref(),
            Some("hi there")
        );
    }
}
