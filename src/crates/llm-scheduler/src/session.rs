//! Fallback-session observability (§4.5): one record per `invoke` call, retained
//! in a bounded ring buffer for aggregate statistics.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub target: String,
    pub error_class: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, Clone)]
pub struct FallbackSession {
    pub selector: String,
    pub primary_target: String,
    pub attempts: Vec<AttemptRecord>,
    pub success: bool,
    pub total_duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    pub sessions: usize,
    pub successes: usize,
    pub fallbacks: usize,
    pub average_attempts: f64,
}

pub struct SessionRing {
    capacity: usize,
    sessions: Mutex<VecDeque<FallbackSession>>,
}

impl SessionRing {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, sessions: Mutex::new(VecDeque::with_capacity(capacity)) }
    }

    pub fn record(&self, session: FallbackSession) {
        let mut sessions = self.sessions.lock().expect("session ring lock");
        if sessions.len() >= self.capacity {
            sessions.pop_front();
        }
        sessions.push_back(session);
    }

    pub fn stats(&self) -> SchedulerStats {
        let sessions = self.sessions.lock().expect("session ring lock");
        if sessions.is_empty() {
            return SchedulerStats::default();
        }
        let successes = sessions.iter().filter(|s| s.success).count();
        let fallbacks = sessions.iter().filter(|s| s.attempts.len() > 1).count();
        let total_attempts: usize = sessions.iter().map(|s| s.attempts.len()).sum();
        SchedulerStats {
            sessions: sessions.len(),
            successes,
            fallbacks,
            average_attempts: total_attempts as f64 / sessions.len() as f64,
        }
    }

    pub fn slowest(&self, n: usize) -> Vec<FallbackSession> {
        let sessions = self.sessions.lock().expect("session ring lock");
        let mut sorted: Vec<FallbackSession> = sessions.iter().cloned().collect();
        sorted.sort_by(|a, b| b.total_duration.cmp(&a.total_duration));
        sorted.truncate(n);
        sorted
    }
}
