//! LLM Scheduler (C5) — "the core of the core": resolves a selector
//! (`group.tier` or polling-pool name) to a concrete backend, enforcing
//! concurrency/rate limits, circuit breaking, and fallback across tiers, groups,
//! and polling pools (§4.5).

pub mod backend;
pub mod circuit;
pub mod config;
pub mod error;
mod health;
pub mod scheduler;
pub mod session;
pub mod target;

pub use backend::{BackendFactory, ChatModel, MockChatModel, StaticBackendFactory};
pub use circuit::{CircuitBreaker, CircuitRegistry, CircuitState};
pub use config::{
    CircuitBreakerConfig, FallbackStrategy, PollStrategy, PollingPoolConfig, RateLimitingConfig, SchedulerConfig, TaskGroup,
    TierConfig,
};
pub use error::{BackendError, Result, SchedulerError};
pub use scheduler::Scheduler;
pub use session::{AttemptRecord, FallbackSession, SchedulerStats};
pub use target::TargetState;
