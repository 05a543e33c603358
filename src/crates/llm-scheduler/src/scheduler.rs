//! The Scheduler (§4.5): resolves a selector to an ordered candidate list, admits
//! each candidate through circuit/rate-limit/concurrency gates, invokes the backend,
//! and drives fallback across models, tiers, and polling pools.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde_json::Value;

use graph_core::CancelToken;

use crate::backend::BackendFactory;
use crate::circuit::{CircuitBreaker, CircuitRegistry, CircuitState};
use crate::config::{PollStrategy, SchedulerConfig};
use crate::error::{BackendError, Result, SchedulerError};
use crate::session::{AttemptRecord, FallbackSession, SchedulerStats, SessionRing};
use crate::target::TargetState;

/// One candidate to attempt: a fully-qualified tier selector plus the model_id
/// within it.
#[derive(Debug, Clone)]
struct Candidate {
    group: String,
    tier: String,
    model_id: String,
}

impl Candidate {
    fn key(&self) -> String {
        format!("{}.{}::{}", self.group, self.tier, self.model_id)
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    backends: Arc<dyn BackendFactory>,
    targets: RwLock<HashMap<String, Arc<TargetState>>>,
    /// Shared-by-`model_id` circuit breakers, consulted when
    /// `SchedulerConfig::honor_circuit_across_fallback` is set (§9).
    circuits: CircuitRegistry,
    pool_counters: RwLock<HashMap<String, AtomicUsize>>,
    sessions: SessionRing,
    health_task: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, backends: Arc<dyn BackendFactory>) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let circuits = CircuitRegistry::new(config.circuit_breaker);
            let scheduler = Self {
                config,
                backends,
                targets: RwLock::new(HashMap::new()),
                circuits,
                pool_counters: RwLock::new(HashMap::new()),
                sessions: SessionRing::new(256),
                health_task: std::sync::Mutex::new(None),
            };
            let handle = crate::health::spawn(weak.clone());
            *scheduler.health_task.lock().expect("health task lock") = Some(handle);
            scheduler
        })
    }

    pub fn stats(&self) -> SchedulerStats {
        self.sessions.stats()
    }

    pub(crate) fn targets_snapshot(&self) -> Vec<(String, Arc<TargetState>)> {
        self.targets.read().expect("targets lock").iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
    }

    pub(crate) fn backends(&self) -> &Arc<dyn BackendFactory> {
        &self.backends
    }

    fn target(&self, candidate: &Candidate, tier_config: &crate::config::TierConfig) -> Arc<TargetState> {
        let key = candidate.key();
        if let Some(existing) = self.targets.read().expect("targets lock").get(&key) {
            return Arc::clone(existing);
        }
        let mut targets = self.targets.write().expect("targets lock");
        targets
            .entry(key)
            .or_insert_with(|| {
                let circuit = if self.config.honor_circuit_across_fallback {
                    self.circuits.breaker_for(&candidate.model_id)
                } else {
                    Arc::new(CircuitBreaker::new(self.config.circuit_breaker))
                };
                Arc::new(TargetState::new(candidate.model_id.clone(), tier_config, circuit))
            })
            .clone()
    }

    fn candidates_for_tier(&self, group: &str, tier_name: &str) -> Vec<Candidate> {
        let Some(task_group) = self.config.task_groups.get(group) else { return Vec::new() };
        let Some(tier) = task_group.tier(tier_name) else { return Vec::new() };
        tier.models
            .iter()
            .map(|m| Candidate { group: group.to_string(), tier: tier_name.to_string(), model_id: m.clone() })
            .collect()
    }

    /// Attempts every model within `tier_name`, then (per `echelon_down`) every
    /// subsequent tier in the same group, recording each attempt into `session`.
    async fn run_group_chain(
        &self,
        group: &str,
        start_tier: &str,
        request: &Value,
        cancel: &CancelToken,
        session: &mut FallbackSession,
    ) -> Result<Value> {
        let Some(task_group) = self.config.task_groups.get(group) else {
            return Err(SchedulerError::UnknownSelector(format!("{group}.{start_tier}")));
        };
        let tiers = task_group.tiers_from(start_tier).to_vec();
        if tiers.is_empty() {
            return Err(SchedulerError::UnknownSelector(format!("{group}.{start_tier}")));
        }

        for (tier_name, tier_config) in &tiers {
            let candidates = self.candidates_for_tier(group, tier_name);
            for candidate in candidates {
                if session.attempts.len() >= self.config.max_fallback_attempts {
                    return self.exhausted(session);
                }
                match self.attempt(&candidate, tier_config, request, cancel, session).await {
                    Ok(response) => return Ok(response),
                    Err(_) => continue,
                }
            }
        }

        // Group exhausted: fall through to configured fallback_groups, if any.
        // Boxed and type-erased since this is a (conditionally) recursive async call.
        for fallback_selector in &task_group.fallback_groups() {
            if let Some((fg, ft)) = fallback_selector.split_once('.') {
                let fut: std::pin::Pin<Box<dyn std::future::Future<Output = Result<Value>> + Send + '_>> =
                    Box::pin(self.run_group_chain(fg, ft, request, cancel, session));
                if let Ok(response) = fut.await {
                    return Ok(response);
                }
            }
        }

        self.exhausted(session)
    }

    fn exhausted(&self, session: &FallbackSession) -> Result<Value> {
        let history = session
            .attempts
            .iter()
            .map(|a| format!("{}={}", a.target, a.error_class.as_deref().unwrap_or("rejected")))
            .collect::<Vec<_>>()
            .join(", ");
        Err(SchedulerError::AllTargetsExhausted {
            selector: session.selector.clone(),
            attempts: session.attempts.len(),
            history,
        })
    }

    /// Runs the admission protocol (§4.5 steps 1-6) for a single candidate.
    async fn attempt(
        &self,
        candidate: &Candidate,
        tier_config: &crate::config::TierConfig,
        request: &Value,
        cancel: &CancelToken,
        session: &mut FallbackSession,
    ) -> Result<Value> {
        let target = self.target(candidate, tier_config);
        let start = Instant::now();

        if target.circuit_state() == CircuitState::Open {
            session.attempts.push(AttemptRecord {
                target: candidate.key(),
                error_class: Some("circuit_open".to_string()),
                latency_ms: start.elapsed().as_millis() as u64,
            });
            return Err(BackendError::CircuitOpen.into());
        }

        if !target.try_rate_limit_token().await {
            session.attempts.push(AttemptRecord {
                target: candidate.key(),
                error_class: Some("rate_limited".to_string()),
                latency_ms: start.elapsed().as_millis() as u64,
            });
            return Err(BackendError::RateLimited.into());
        }

        let permit = match tokio::time::timeout(Duration::from_millis(200), target.acquire_concurrency()).await {
            Ok(permit) => permit,
            Err(_elapsed) => {
                session.attempts.push(AttemptRecord {
                    target: candidate.key(),
                    error_class: Some("concurrency_wait_timeout".to_string()),
                    latency_ms: start.elapsed().as_millis() as u64,
                });
                return Err(BackendError::ServiceUnavailable("concurrency wait timed out".to_string()).into());
            }
        };

        let backend = self.backends.resolve(&candidate.model_id)?;
        let effective_timeout = tier_config.timeout_duration();

        let call = backend.chat(request.clone());
        let outcome = tokio::select! {
            result = tokio::time::timeout(effective_timeout, call) => result,
            _ = cancel.cancelled() => {
                drop(permit);
                return Err(SchedulerError::Cancelled);
            }
        };
        drop(permit);

        match outcome {
            Ok(Ok(response)) => {
                target.record_success();
                session.attempts.push(AttemptRecord {
                    target: candidate.key(),
                    error_class: None,
                    latency_ms: start.elapsed().as_millis() as u64,
                });
                Ok(response)
            }
            Ok(Err(backend_err)) => {
                target.record_failure();
                session.attempts.push(AttemptRecord {
                    target: candidate.key(),
                    error_class: Some(backend_err.to_string()),
                    latency_ms: start.elapsed().as_millis() as u64,
                });
                Err(backend_err.into())
            }
            Err(_elapsed) => {
                target.record_failure();
                session.attempts.push(AttemptRecord {
                    target: candidate.key(),
                    error_class: Some("timeout".to_string()),
                    latency_ms: start.elapsed().as_millis() as u64,
                });
                Err(BackendError::Timeout.into())
            }
        }
    }

    /// The pool's targets reordered per its strategy: the order in which
    /// `run_pool` should try them. Always a permutation of `pool.targets`, so
    /// exhausting it is guaranteed to terminate.
    fn pool_target_order(&self, pool_name: &str) -> Result<Vec<String>> {
        let pool = self
            .config
            .polling_pools
            .get(pool_name)
            .ok_or_else(|| SchedulerError::UnknownSelector(pool_name.to_string()))?;

        match pool.strategy {
            PollStrategy::RoundRobin => {
                let mut counters = self.pool_counters.write().expect("pool counters lock");
                let counter = counters.entry(pool_name.to_string()).or_insert_with(|| AtomicUsize::new(0));
                let start = counter.fetch_add(1, Ordering::SeqCst) % pool.targets.len();
                let mut ordered: Vec<String> =
                    (0..pool.targets.len()).map(|i| pool.targets[(start + i) % pool.targets.len()].clone()).collect();
                // Open-circuit targets are deprioritized, not dropped — they stay as a
                // last resort if every other target in the pool also fails.
                ordered.sort_by_key(|selector| self.is_target_selector_open(selector));
                Ok(ordered)
            }
            PollStrategy::LeastUsed => {
                let mut ordered = pool.targets.clone();
                ordered.sort_by_key(|selector| (self.is_target_selector_open(selector), self.representative_inflight(selector)));
                Ok(ordered)
            }
            PollStrategy::Weighted => {
                use rand::Rng;
                let mut remaining = pool.targets.clone();
                let mut ordered = Vec::with_capacity(remaining.len());
                let mut rng = rand::thread_rng();
                while !remaining.is_empty() {
                    let weights: Vec<f64> = remaining.iter().map(|s| self.representative_weight(s)).collect();
                    let total: f64 = weights.iter().sum();
                    let pick = if total <= 0.0 {
                        0
                    } else {
                        let mut roll = rng.gen_range(0.0..total);
                        let mut idx = weights.len() - 1;
                        for (i, w) in weights.iter().enumerate() {
                            if roll < *w {
                                idx = i;
                                break;
                            }
                            roll -= w;
                        }
                        idx
                    };
                    ordered.push(remaining.remove(pick));
                }
                Ok(ordered)
            }
        }
    }

    fn is_target_selector_open(&self, selector: &str) -> bool {
        let Some((group, tier)) = selector.split_once('.') else { return false };
        self.candidates_for_tier(group, tier)
            .first()
            .map(|c| {
                let target_key = c.key();
                self.targets.read().expect("targets lock").get(&target_key).map(|t| t.circuit_state() == CircuitState::Open).unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn representative_inflight(&self, selector: &str) -> usize {
        let Some((group, tier)) = selector.split_once('.') else { return usize::MAX };
        self.candidates_for_tier(group, tier)
            .first()
            .map(|c| self.targets.read().expect("targets lock").get(&c.key()).map(|t| t.inflight()).unwrap_or(0))
            .unwrap_or(0)
    }

    fn representative_weight(&self, selector: &str) -> f64 {
        if self.is_target_selector_open(selector) {
            return 0.0
        }
        1.0
    }

    /// Resolves `selector` and runs the full admission/fallback protocol.
    pub async fn invoke(&self, selector: &str, request: Value, cancel: &CancelToken) -> Result<Value> {
        let started = Instant::now();
        let mut session = FallbackSession {
            selector: selector.to_string(),
            primary_target: selector.to_string(),
            attempts: Vec::new(),
            success: false,
            total_duration: Duration::ZERO,
        };

        let result = if selector.contains('.') {
            let (group, tier) = selector.split_once('.').expect("selector contains a dot");
            self.run_group_chain(group, tier, &request, cancel, &mut session).await
        } else if self.config.polling_pools.contains_key(selector) {
            self.run_pool(selector, &request, cancel, &mut session).await
        } else {
            Err(SchedulerError::UnknownSelector(selector.to_string()))
        };

        session.success = result.is_ok();
        session.total_duration = started.elapsed();
        if let Some(first) = session.attempts.first() {
            session.primary_target = first.target.clone();
        }
        self.sessions.record(session);
        result
    }

    async fn run_pool(&self, pool_name: &str, request: &Value, cancel: &CancelToken, session: &mut FallbackSession) -> Result<Value> {
        let ordered_targets = self.pool_target_order(pool_name)?;

        for target_selector in ordered_targets {
            if session.attempts.len() >= self.config.max_fallback_attempts {
                return self.exhausted(session);
            }
            let Some((group, tier)) = target_selector.split_once('.') else { continue };
            for candidate in self.candidates_for_tier(group, tier) {
                if session.attempts.len() >= self.config.max_fallback_attempts {
                    return self.exhausted(session);
                }
                let Some(task_group) = self.config.task_groups.get(group) else { continue };
                let Some(tier_config) = task_group.tier(tier) else { continue };
                if let Ok(response) = self.attempt(&candidate, tier_config, request, cancel, session).await {
                    return Ok(response);
                }
            }
        }
        self.exhausted(session)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.health_task.lock().expect("health task lock").take() {
            handle.abort();
        }
    }
}

#[async_trait::async_trait]
impl graph_core::LlmCaller for Scheduler {
    async fn invoke(&self, selector: &str, request: Value, cancel: &CancelToken) -> graph_core::Result<Value> {
        Scheduler::invoke(self, selector, request, cancel).await.map_err(Into::into)
    }
}
