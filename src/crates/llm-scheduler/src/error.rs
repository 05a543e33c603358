//! Error taxonomy for the scheduler (§4.5, §7): one variant per failure class, each
//! carrying its own retryability so admission/fallback logic never has to guess.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// A single candidate's outcome classified into the spec's §4.5 error taxonomy.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("request timed out")]
    Timeout,
    #[error("rate limited")]
    RateLimited,
    #[error("circuit open for this target")]
    CircuitOpen,
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("authentication failed: {0}")]
    AuthError(String),
    #[error("model not found: {0}")]
    ModelNotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("content filtered: {0}")]
    ContentFiltered(String),
    #[error("unknown backend error: {0}")]
    Unknown(String),
}

impl BackendError {
    /// Whether this class of failure should move on to the next candidate target.
    /// `Unknown` is retried once (the caller decides — this only reports the class'
    /// default policy) and treated as non-retryable on a second occurrence, per §4.5.
    pub fn retryable(&self) -> bool {
        !matches!(
            self,
            BackendError::AuthError(_)
                | BackendError::ModelNotFound(_)
                | BackendError::InvalidRequest(_)
                | BackendError::ContentFiltered(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("unknown selector: {0}")]
    UnknownSelector(String),

    #[error("backend call failed: {0}")]
    Backend(#[from] BackendError),

    #[error("all candidate targets for selector '{selector}' were exhausted after {attempts} attempt(s): {history}")]
    AllTargetsExhausted { selector: String, attempts: usize, history: String },

    #[error("scheduler configuration error: {0}")]
    Configuration(String),

    #[error("cancelled")]
    Cancelled,

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<SchedulerError> for graph_core::GraphError {
    fn from(err: SchedulerError) -> Self {
        graph_core::GraphError::NodeExecution { node: "llm".to_string(), error: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_are_not_retryable() {
        assert!(!BackendError::AuthError("bad key".to_string()).retryable());
    }

    #[test]
    fn timeouts_are_retryable() {
        assert!(BackendError::Timeout.retryable());
    }
}
