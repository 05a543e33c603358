//! Per-target (tier, model) runtime state: the concurrency permit, rate limiter,
//! and circuit breaker that gate every admission attempt (§4.5).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tooling::rate_limit::RateLimiter;

use crate::circuit::{CircuitBreaker, CircuitState};
use crate::config::TierConfig;

/// State for one (group, tier, model_id) candidate. Concurrency and rate limits
/// are scoped to the tier that declared them — two tiers sharing a model_id get
/// independent limiters, since the spec attaches `concurrency_limit`/`rpm_limit`
/// to the Tier, not the model. The circuit breaker, by contrast, is shared by
/// `model_id` via `CircuitRegistry` (or freshly private, per
/// `SchedulerConfig::honor_circuit_across_fallback`) and injected here rather
/// than owned — see `Scheduler::target`.
pub struct TargetState {
    pub model_id: String,
    concurrency: Arc<Semaphore>,
    concurrency_limit: usize,
    rate_limiter: RateLimiter,
    pub circuit: Arc<CircuitBreaker>,
    consecutive_failures: AtomicU32,
}

impl TargetState {
    pub fn new(model_id: String, tier: &TierConfig, circuit: Arc<CircuitBreaker>) -> Self {
        Self {
            model_id,
            concurrency: Arc::new(Semaphore::new(tier.concurrency_limit.max(1))),
            concurrency_limit: tier.concurrency_limit.max(1),
            rate_limiter: RateLimiter::new(tier.rpm_limit.max(1) as usize, std::time::Duration::from_secs(60)),
            circuit,
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    pub async fn try_rate_limit_token(&self) -> bool {
        self.rate_limiter.check().await
    }

    pub async fn try_acquire_concurrency(&self) -> Option<tokio::sync::OwnedSemaphorePermit> {
        Arc::clone(&self.concurrency).try_acquire_owned().ok()
    }

    /// Waits for a permit (bounded by the caller via `tokio::time::timeout`), per
    /// the admission protocol's "block up to bounded wait" step (§4.5).
    pub async fn acquire_concurrency(&self) -> tokio::sync::OwnedSemaphorePermit {
        Arc::clone(&self.concurrency).acquire_owned().await.expect("semaphore is never closed")
    }

    pub fn inflight(&self) -> usize {
        self.concurrency_limit.saturating_sub(self.concurrency.available_permits())
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.circuit.record_success();
    }

    pub fn record_failure(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
        self.circuit.record_failure();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, TierConfig};

    fn tier() -> TierConfig {
        TierConfig { models: vec!["gpt-4".to_string()], concurrency_limit: 2, rpm_limit: 60, priority: 1, timeout: 30, max_retries: 3 }
    }

    fn circuit() -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default()))
    }

    #[tokio::test]
    async fn concurrency_permits_are_bounded() {
        let target = TargetState::new("gpt-4".to_string(), &tier(), circuit());
        let p1 = target.try_acquire_concurrency().await;
        let p2 = target.try_acquire_concurrency().await;
        let p3 = target.try_acquire_concurrency().await;
        assert!(p1.is_some());
        assert!(p2.is_some());
        assert!(p3.is_none());
        assert_eq!(target.inflight(), 2);
    }

    #[tokio::test]
    async fn rate_limiter_exhausts_after_rpm_tokens() {
        let mut t = tier();
        t.rpm_limit = 1;
        let target = TargetState::new("gpt-4".to_string(), &t, circuit());
        assert!(target.try_rate_limit_token().await);
        assert!(!target.try_rate_limit_token().await);
    }
}
