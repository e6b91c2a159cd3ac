//! Procession Store
//!
//! This crate persists per-process workflow state in an external cache so a
//! caller can resume a multi-step policy with nothing but a process ID.
//!
//! The [`CacheBackend`] trait is the raw key/value protocol. Backends report
//! misses and failures as sentinel payload strings (see [`sentinel`]), and
//! [`WorkflowStateStore`] classifies those replies into typed results:
//! - a known miss cause becomes [`StoreError::NotFound`]
//! - a known failure cause, or anything unrecognised, becomes
//!   [`StoreError::Unavailable`]
//!
//! A stored entry exists only while its workflow is neither complete nor
//! expired. There is no locking: concurrent writes for one process ID are
//! last-writer-wins.

mod backend;
mod memory;
pub mod sentinel;
mod state;
mod store;

pub use backend::CacheBackend;
pub use memory::InMemoryCache;
pub use sentinel::{FailureCause, MissCause, Reply};
pub use state::WorkflowState;
pub use store::WorkflowStateStore;

/// Error type for workflow state operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// No state is stored for the process, or it has expired.
  #[error("workflow state not found for process '{process_id}': {cause}")]
  NotFound {
    process_id: String,
    cause: MissCause,
  },

  /// The cache could not be reached or returned something unusable.
  #[error("cache unavailable for process '{process_id}': {cause}")]
  Unavailable {
    process_id: String,
    cause: FailureCause,
  },

  /// A TTL of zero or less was requested.
  #[error("ttl must be positive, got {ttl_secs}s")]
  InvalidTtl { ttl_secs: i64 },

  /// Stored state could not be encoded or decoded.
  #[error("corrupt workflow state for process '{process_id}': {source}")]
  Serialization {
    process_id: String,
    #[source]
    source: serde_json::Error,
  },
}

impl StoreError {
  /// Whether this is a miss rather than an internal failure.
  pub fn is_miss(&self) -> bool {
    matches!(self, StoreError::NotFound { .. })
  }
}
