//! State Store (§4.1): owns persisted snapshots and per-agent history on top of the
//! live, in-memory state types from `graph-state`.
//!
//! Two backends are provided: [`InMemoryStateStore`] for development and tests, and
//! [`SqliteStateStore`] for durable, embedded-relational persistence.

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use error::{Result, StoreError};
pub use memory::InMemoryStateStore;
pub use sqlite::SqliteStateStore;
pub use traits::StateStore;
pub use types::{compress_state, decompress_state, HistoryEntry, Snapshot, SnapshotId, StateHandle};
