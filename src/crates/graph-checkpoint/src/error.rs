//! Error types for state store operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("state handle not found: {0}")]
    NotFound(String),

    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("history entry {entry_id} is corrupt and cannot be replayed")]
    HistoryError { entry_id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("binary serialization error: {0}")]
    BinarySerialization(#[from] bincode::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state error: {0}")]
    State(#[from] graph_state::StateError),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
}
