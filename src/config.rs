//! Environment-driven configuration.
//!
//! All settings come from named environment variables (a `.env` file is
//! loaded first via dotenvy in `main`). Invalid numeric values are startup
//! errors, not silent defaults.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::RetryPolicy;

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    url: String,
    pub pool_size: usize,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>, pool_size: usize) -> Self {
        Self { url: url.into(), pool_size }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Model endpoint settings, including retry and timeout tunables.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL of the OpenAI-compatible endpoint, without the `/v1` suffix.
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
}

impl ModelConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.retry_base,
            max_delay: self.retry_max,
            ..RetryPolicy::default()
        }
    }
}

/// Agent loop settings: history window, prompt budget, refusal policy.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Most recent turns fetched per request.
    pub window_turns: usize,
    /// Character budget for the assembled prompt; oldest turns drop first.
    pub prompt_char_budget: usize,
    /// Whether a model refusal is recorded as an assistant turn.
    pub persist_refusals: bool,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    pub agent: AgentConfig,
    /// Default tenant for the CLI; subcommands may override it.
    pub tenant: Option<String>,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database = DatabaseConfig {
            url: require("DATABASE_URL")?,
            pool_size: parse_or("DATABASE_POOL_SIZE", 8)?,
        };

        let model = ModelConfig {
            base_url: optional("MODEL_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            api_key: optional("MODEL_API_KEY").map(SecretString::from),
            model: optional("MODEL_NAME").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            timeout: Duration::from_secs(parse_or("MODEL_TIMEOUT_SECS", 60u64)?),
            max_attempts: parse_or("MODEL_MAX_ATTEMPTS", 4u32)?,
            retry_base: Duration::from_millis(parse_or("MODEL_RETRY_BASE_MS", 500u64)?),
            retry_max: Duration::from_millis(parse_or("MODEL_RETRY_MAX_MS", 8_000u64)?),
        };

        let agent = AgentConfig {
            window_turns: parse_or("HISTORY_WINDOW_TURNS", 20usize)?,
            prompt_char_budget: parse_or("PROMPT_CHAR_BUDGET", 12_000usize)?,
            persist_refusals: flag_or("PERSIST_REFUSALS", false)?,
            system_prompt: optional("SYSTEM_PROMPT"),
            max_tokens: Some(parse_or("MODEL_MAX_TOKENS", 1_024u32)?),
            temperature: Some(parse_or("MODEL_TEMPERATURE", 0.7f32)?),
        };

        Ok(Self {
            database,
            model,
            agent,
            tenant: optional("TENANT_ID"),
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing { name })
}

/// Read a variable, treating unset and empty the same.
fn optional(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn parse_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn flag_or(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match optional(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::Invalid {
                name,
                reason: format!("expected a boolean, got {other:?}"),
            }),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_uses_default_when_unset() {
        assert_eq!(parse_or("PARLEY_TEST_UNSET_VAR", 7usize).unwrap(), 7);
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        // Env mutation is process-global; use a name no other test touches.
        unsafe { std::env::set_var("PARLEY_TEST_BAD_NUMBER", "not-a-number") };
        let result = parse_or("PARLEY_TEST_BAD_NUMBER", 1u32);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
        unsafe { std::env::remove_var("PARLEY_TEST_BAD_NUMBER") };
    }

    #[test]
    fn test_flag_parsing() {
        unsafe { std::env::set_var("PARLEY_TEST_FLAG", "true") };
        assert!(flag_or("PARLEY_TEST_FLAG", false).unwrap());
        unsafe { std::env::set_var("PARLEY_TEST_FLAG", "off") };
        assert!(!flag_or("PARLEY_TEST_FLAG", true).unwrap());
        unsafe { std::env::set_var("PARLEY_TEST_FLAG", "maybe") };
        assert!(flag_or("PARLEY_TEST_FLAG", false).is_err());
        unsafe { std::env::remove_var("PARLEY_TEST_FLAG") };
    }

    #[test]
    fn test_empty_value_counts_as_unset() {
        unsafe { std::env::set_var("PARLEY_TEST_EMPTY", "  ") };
        assert_eq!(optional("PARLEY_TEST_EMPTY"), None);
        unsafe { std::env::remove_var("PARLEY_TEST_EMPTY") };
    }
}
