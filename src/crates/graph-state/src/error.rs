//! Error types for state reduction and diffing.

use thiserror::Error;

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors that can occur while applying reducers or diffing state.
#[derive(Error, Debug, Clone)]
pub enum StateError {
    /// A reducer received values it cannot combine (e.g. append against a scalar).
    #[error("reducer '{reducer}' cannot combine values for key '{key}': {reason}")]
    ReducerMismatch {
        key: String,
        reducer: String,
        reason: String,
    },

    /// A patch referenced a key with a type incompatible with the schema's declared
    /// reducer.
    #[error("invalid patch for key '{key}': {reason}")]
    InvalidPatch { key: String, reason: String },

    /// Diff application could not reconstruct the target state.
    #[error("diff replay failed at key '{key}': {reason}")]
    DiffReplay { key: String, reason: String },

    /// Serialization round-trip failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
