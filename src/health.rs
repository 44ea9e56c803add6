//! Liveness checks against the store and the model endpoint.

use std::time::Duration;

use tokio::time::timeout;

use crate::db::ConversationStore;
use crate::llm::ModelClient;

/// Upper bound for a single probe, so one hung dependency cannot stall the
/// whole check.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentHealth {
    Ok,
    Failed(String),
}

impl ComponentHealth {
    pub fn is_ok(&self) -> bool {
        matches!(self, ComponentHealth::Ok)
    }
}

impl std::fmt::Display for ComponentHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentHealth::Ok => f.write_str("ok"),
            ComponentHealth::Failed(reason) => write!(f, "fail ({reason})"),
        }
    }
}

/// Per-component probe results plus the aggregate.
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub store: ComponentHealth,
    pub model: ComponentHealth,
}

impl HealthReport {
    pub fn healthy(&self) -> bool {
        self.store.is_ok() && self.model.is_ok()
    }
}

/// Probe both dependencies concurrently; one failure never masks the other.
pub async fn check_health(store: &dyn ConversationStore, model: &ModelClient) -> HealthReport {
    let (store_result, model_result) = tokio::join!(
        timeout(PROBE_TIMEOUT, store.health_check()),
        timeout(PROBE_TIMEOUT, model.health_check()),
    );

    HealthReport {
        store: to_component_health(store_result),
        model: to_component_health(model_result),
    }
}

fn to_component_health<E: std::fmt::Display>(
    result: Result<Result<(), E>, tokio::time::error::Elapsed>,
) -> ComponentHealth {
    match result {
        Ok(Ok(())) => ComponentHealth::Ok,
        Ok(Err(e)) => ComponentHealth::Failed(e.to_string()),
        Err(_) => ComponentHealth::Failed("probe timed out".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_requires_both_components() {
        let healthy = HealthReport { store: ComponentHealth::Ok, model: ComponentHealth::Ok };
        assert!(healthy.healthy());

        let degraded = HealthReport {
            store: ComponentHealth::Ok,
            model: ComponentHealth::Failed("connection refused".to_string()),
        };
        assert!(!degraded.healthy());
        assert!(degraded.store.is_ok());
    }
}
