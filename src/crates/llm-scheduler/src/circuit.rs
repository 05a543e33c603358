//! Per-target circuit breaker (§4.5): closed → open on sustained failure, open →
//! half_open after a recovery window, half_open → closed/open on the next outcome.
//!
//! Circuit state is shared by `model_id` across task groups, tiers, and polling
//! pools via [`CircuitRegistry`] (§9 "honor circuit state across fallback
//! boundaries" decision): a model circuit-broken while serving one selector stays
//! broken when reached through a different fallback chain, unless
//! `SchedulerConfig::honor_circuit_across_fallback` is turned off.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    /// Recent outcomes, most recent last, capped at `WINDOW` entries — backs the
    /// `window_failure_rate` threshold from §4.5.
    recent_outcomes: Vec<bool>,
    opened_at: Option<Instant>,
}

const WINDOW: usize = 20;

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                recent_outcomes: Vec::new(),
                opened_at: None,
            }),
            config,
        }
    }

    fn recovery_elapsed(&self, inner: &Inner) -> bool {
        inner.opened_at.map(|at| at.elapsed() >= Duration::from_secs(self.config.recovery_time_sec)).unwrap_or(false)
    }

    /// Current state, applying the open→half_open time-based transition as a
    /// side effect of observing it (no background task needed for this half).
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock().expect("circuit breaker lock");
        if inner.state == CircuitState::Open && self.recovery_elapsed(&inner) {
            inner.state = CircuitState::HalfOpen;
        }
        inner.state
    }

    fn window_failure_rate(inner: &Inner) -> f64 {
        if inner.recent_outcomes.is_empty() {
            return 0.0;
        }
        let failures = inner.recent_outcomes.iter().filter(|ok| !**ok).count();
        failures as f64 / inner.recent_outcomes.len() as f64
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock");
        inner.consecutive_failures = 0;
        inner.recent_outcomes.push(true);
        if inner.recent_outcomes.len() > WINDOW {
            inner.recent_outcomes.remove(0);
        }
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock");
        inner.consecutive_failures += 1;
        inner.recent_outcomes.push(false);
        if inner.recent_outcomes.len() > WINDOW {
            inner.recent_outcomes.remove(0);
        }

        let should_open = inner.consecutive_failures >= self.config.failure_threshold
            || Self::window_failure_rate(&inner) >= self.config.failure_rate_threshold;

        if inner.state == CircuitState::HalfOpen || should_open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }
}

/// Shared `model_id` → `CircuitBreaker` lookup, so that every `TargetState`
/// candidate for the same backend model — regardless of which group/tier/pool
/// selector reached it — trips and recovers the same breaker.
pub struct CircuitRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    config: CircuitBreakerConfig,
}

impl CircuitRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { breakers: RwLock::new(HashMap::new()), config }
    }

    /// Returns the shared breaker for `model_id`, creating one on first use.
    pub fn breaker_for(&self, model_id: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().expect("circuit registry lock").get(model_id) {
            return Arc::clone(existing);
        }
        let mut breakers = self.breakers.write().expect("circuit registry lock");
        breakers
            .entry(model_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config)))
            .clone()
    }
}
