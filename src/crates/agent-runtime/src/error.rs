//! Top-level error type and the exit-code mapping an external binary would match
//! on (§6, §7), grounded on `graph-core::error::GraphError`'s own `ErrorKind`
//! classifier and narrowed to this crate's own setup-time failures (spec loading,
//! scheduler/tool registry construction) plus whatever a run itself returns.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("workflow configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    SchedulerConfig(#[from] llm_scheduler::SchedulerError),

    #[error(transparent)]
    Graph(#[from] graph_core::GraphError),

    #[error("run '{0}' is not known to this runtime")]
    UnknownRun(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Exit codes a CLI wrapper built on top of this crate would return (§6). No CLI
/// binary ships as part of this core; this enum is the contract such a binary
/// would match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    ValidationError = 2,
    RuntimeError = 3,
    Cancelled = 4,
    LimitExceeded = 5,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl RuntimeError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            RuntimeError::Configuration(_) | RuntimeError::SchedulerConfig(_) | RuntimeError::UnknownRun(_) => {
                ExitCode::ValidationError
            }
            RuntimeError::Graph(err) => match err {
                graph_core::GraphError::Validation(_)
                | graph_core::GraphError::InheritanceCycle(_)
                | graph_core::GraphError::Configuration(_) => ExitCode::ValidationError,
                graph_core::GraphError::Cancelled => ExitCode::Cancelled,
                graph_core::GraphError::IterationLimitExceeded(_) => ExitCode::LimitExceeded,
                _ => ExitCode::RuntimeError,
            },
        }
    }
}

/// Maps a completed run's result to the exit code a wrapper binary would return.
pub fn exit_code_for<T>(result: &Result<T>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::Success,
        Err(err) => err.exit_code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_graph_error_maps_to_cancelled_exit_code() {
        let err: RuntimeError = graph_core::GraphError::Cancelled.into();
        assert_eq!(err.exit_code(), ExitCode::Cancelled);
    }

    #[test]
    fn iteration_limit_maps_to_limit_exceeded_exit_code() {
        let err: RuntimeError = graph_core::GraphError::IterationLimitExceeded(100).into();
        assert_eq!(err.exit_code(), ExitCode::LimitExceeded);
    }

    #[test]
    fn validation_error_maps_to_validation_exit_code() {
        let err: RuntimeError = graph_core::GraphError::Validation("bad graph".to_string()).into();
        assert_eq!(err.exit_code(), ExitCode::ValidationError);
    }

    #[test]
    fn node_execution_failure_maps_to_runtime_error_exit_code() {
        let err: RuntimeError =
            graph_core::GraphError::NodeExecution { node: "think".to_string(), error: "boom".to_string() }.into();
        assert_eq!(err.exit_code(), ExitCode::RuntimeError);
    }

    #[test]
    fn success_maps_to_success_exit_code() {
        let result: Result<()> = Ok(());
        assert_eq!(exit_code_for(&result), ExitCode::Success);
    }
}
