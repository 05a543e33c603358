//! Declarative task-group / polling-pool / circuit-breaker configuration (§6),
//! loaded through `serde_yaml` per the ambient-stack configuration convention.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SchedulerError};

#[derive(Debug, Clone, Deserialize)]
pub struct TierConfig {
    pub models: Vec<String>,
    pub concurrency_limit: usize,
    pub rpm_limit: u32,
    #[serde(default)]
    pub priority: i32,
    pub timeout: u64,
    #[serde(default)]
    pub max_retries: usize,
}

impl TierConfig {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    EchelonDown,
}

impl Default for FallbackStrategy {
    fn default() -> Self {
        FallbackStrategy::EchelonDown
    }
}

/// Raw shape of one `task_groups.<name>` entry: tier definitions keyed by tier
/// name, plus the reserved `fallback_strategy` sibling key.
#[derive(Debug, Clone, Deserialize)]
struct TaskGroupRaw {
    #[serde(default)]
    fallback_strategy: FallbackStrategy,
    #[serde(default)]
    fallback_groups: Vec<String>,
    #[serde(flatten)]
    tiers: HashMap<String, TierConfig>,
}

/// A resolved task group: tiers in ascending-priority order (lower `priority`
/// value tried first), per the spec's "ordered list of Tier" data model (§3).
/// Tier order is derived from each tier's own `priority` field rather than YAML
/// map insertion order, since `serde_yaml` maps do not preserve declaration order.
#[derive(Debug, Clone)]
pub struct TaskGroup {
    pub name: String,
    pub tiers: Vec<(String, TierConfig)>,
    pub fallback_strategy: FallbackStrategy,
    pub fallback_group_selectors: Vec<String>,
}

impl TaskGroup {
    fn from_raw(name: String, raw: TaskGroupRaw) -> Result<Self> {
        if raw.tiers.is_empty() {
            return Err(SchedulerError::Configuration(format!("task group '{name}' has no tiers")));
        }
        let mut tier_names = std::collections::HashSet::new();
        for tier_name in raw.tiers.keys() {
            if !tier_names.insert(tier_name.clone()) {
                return Err(SchedulerError::Configuration(format!(
                    "task group '{name}' declares tier '{tier_name}' more than once"
                )));
            }
        }
        let mut tiers: Vec<(String, TierConfig)> = raw.tiers.into_iter().collect();
        tiers.sort_by(|a, b| a.1.priority.cmp(&b.1.priority).then_with(|| a.0.cmp(&b.0)));
        Ok(Self {
            name,
            tiers,
            fallback_strategy: raw.fallback_strategy,
            fallback_group_selectors: raw.fallback_groups,
        })
    }

    /// Selectors (`group.tier`) to try once this entire group is exhausted (§4.5).
    pub fn fallback_groups(&self) -> Vec<String> {
        self.fallback_group_selectors.clone()
    }

    pub fn tier(&self, tier_name: &str) -> Option<&TierConfig> {
        self.tiers.iter().find(|(name, _)| name == tier_name).map(|(_, t)| t)
    }

    /// Tiers after (and including) the given one, in descent order — used for
    /// `echelon_down` once every model in the current tier is exhausted.
    pub fn tiers_from(&self, tier_name: &str) -> &[(String, TierConfig)] {
        match self.tiers.iter().position(|(name, _)| name == tier_name) {
            Some(idx) => &self.tiers[idx..],
            None => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStrategy {
    RoundRobin,
    LeastUsed,
    Weighted,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum RateLimitingConfig {
    TokenBucket {
        #[serde(default = "default_burst")]
        burst: usize,
    },
    SlidingWindow {
        #[serde(default = "default_burst")]
        max_operations: usize,
    },
}

fn default_burst() -> usize {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingPoolConfig {
    pub targets: Vec<String>,
    pub strategy: PollStrategy,
    #[serde(default = "default_health_check_interval_sec")]
    pub health_check_interval: u64,
    pub rate_limiting: RateLimitingConfig,
}

fn default_health_check_interval_sec() -> u64 {
    30
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_time_sec: u64,
    pub failure_rate_threshold: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_time_sec: 60, failure_rate_threshold: 0.5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfigFile {
    #[serde(default)]
    task_groups: HashMap<String, TaskGroupRaw>,
    #[serde(default)]
    polling_pools: HashMap<String, PollingPoolConfig>,
    #[serde(default)]
    circuit_breaker: CircuitBreakerConfig,
    #[serde(default = "default_max_fallback_attempts")]
    max_fallback_attempts: usize,
    #[serde(default = "default_honor_circuit_across_fallback")]
    honor_circuit_across_fallback: bool,
}

fn default_max_fallback_attempts() -> usize {
    8
}

fn default_honor_circuit_across_fallback() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub task_groups: HashMap<String, TaskGroup>,
    pub polling_pools: HashMap<String, PollingPoolConfig>,
    pub circuit_breaker: CircuitBreakerConfig,
    pub max_fallback_attempts: usize,
    /// Whether a model's circuit breaker is shared by `model_id` across every
    /// group/tier/pool selector that can reach it (§9 "honor circuit state
    /// across fallback boundaries"), rather than scoped per-candidate. Defaults
    /// to true; the `CircuitRegistry` is consulted only when this is set.
    pub honor_circuit_across_fallback: bool,
}

impl SchedulerConfig {
    pub fn from_str(yaml: &str) -> Result<Self> {
        let file: SchedulerConfigFile = serde_yaml::from_str(yaml)?;
        Self::from_file(file)
    }

    fn from_file(file: SchedulerConfigFile) -> Result<Self> {
        let mut task_groups = HashMap::new();
        for (name, raw) in file.task_groups {
            task_groups.insert(name.clone(), TaskGroup::from_raw(name, raw)?);
        }
        Ok(Self {
            task_groups,
            polling_pools: file.polling_pools,
            circuit_breaker: file.circuit_breaker,
            max_fallback_attempts: file.max_fallback_attempts,
            honor_circuit_across_fallback: file.honor_circuit_across_fallback,
        })
    }
}
