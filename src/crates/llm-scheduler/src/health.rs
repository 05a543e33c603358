//! Background health-check task (§4.5): periodically re-probes `half_open`
//! targets with a minimal request so they return to `closed` before real traffic
//! hits them. Runs with its own cancel scope tied to the Scheduler's lifetime — a
//! `JoinHandle` aborted on `Scheduler::drop`, so it never outlives or delays
//! process shutdown.

use std::sync::Weak;
use std::time::Duration;

use serde_json::json;

use crate::circuit::CircuitState;
use crate::scheduler::Scheduler;

const PROBE_INTERVAL: Duration = Duration::from_secs(10);

pub fn spawn(scheduler: Weak<Scheduler>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(PROBE_INTERVAL).await;
            let Some(scheduler) = scheduler.upgrade() else { return };
            scheduler.probe_half_open_targets(json!({"probe": true})).await;
        }
    })
}

impl Scheduler {
    /// Sends a minimal request to every currently `half_open` target, updating
    /// each circuit breaker with the outcome.
    pub(crate) async fn probe_half_open_targets(&self, probe_request: serde_json::Value) {
        let half_open: Vec<_> = {
            let targets = self.targets_snapshot();
            targets.into_iter().filter(|(_, t)| t.circuit_state() == CircuitState::HalfOpen).collect()
        };

        for (model_id, target) in half_open {
            let Ok(backend) = self.backends().resolve(&model_id) else { continue };
            match backend.chat(probe_request.clone()).await {
                Ok(_) => target.record_success(),
                Err(_) => target.record_failure(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockChatModel, StaticBackendFactory};
    use crate::config::{CircuitBreakerConfig, SchedulerConfig, TaskGroup, TierConfig};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn scheduler_with_one_tier() -> Arc<Scheduler> {
        let tier = TierConfig { models: vec!["gpt-4".to_string()], concurrency_limit: 1, rpm_limit: 60, priority: 1, timeout: 5, max_retries: 0 };
        let mut tiers = vec![("echelon1".to_string(), tier)];
        let group = TaskGroup {
            name: "plan".to_string(),
            tiers: std::mem::take(&mut tiers),
            fallback_strategy: crate::config::FallbackStrategy::EchelonDown,
            fallback_group_selectors: Vec::new(),
        };
        let mut task_groups = HashMap::new();
        task_groups.insert("plan".to_string(), group);
        let config = SchedulerConfig {
            task_groups,
            polling_pools: HashMap::new(),
            circuit_breaker: CircuitBreakerConfig { failure_threshold: 1, recovery_time_sec: 0, failure_rate_threshold: 1.1 },
            max_fallback_attempts: 8,
        };
        let backends = Arc::new(StaticBackendFactory::new().with("gpt-4", Arc::new(MockChatModel::always_succeeds(json!({"content": "ok"})))));
        Scheduler::new(config, backends)
    }

    #[tokio::test]
    async fn probing_a_half_open_target_closes_it_on_success() {
        let scheduler = scheduler_with_one_tier();
        scheduler
            .invoke("plan.echelon1", json!({}), &graph_core::CancelToken::new())
            .await
            .unwrap();

        let targets = scheduler.targets_snapshot();
        let (_, target) = targets.into_iter().next().unwrap();
        target.record_failure();
        assert_eq!(target.circuit_state(), crate::circuit::CircuitState::HalfOpen);

        scheduler.probe_half_open_targets(json!({"probe": true})).await;
        assert_eq!(target.circuit_state(), crate::circuit::CircuitState::Closed);
    }
}
