use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use crate::StoreError;
use crate::backend::CacheBackend;
use crate::sentinel::{FailureCause, Reply, classify};
use crate::state::WorkflowState;

/// Workflow state store over a [`CacheBackend`].
#[derive(Clone)]
pub struct WorkflowStateStore {
  backend: Arc<dyn CacheBackend>,
  default_ttl: TimeDelta,
}

impl WorkflowStateStore {
  /// Create a store. `default_ttl` applies to writes that do not specify one.
  pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: TimeDelta) -> Self {
    Self {
      backend,
      default_ttl,
    }
  }

  pub fn default_ttl(&self) -> TimeDelta {
    self.default_ttl
  }

  /// Read the state of a process.
  ///
  /// Misses (absent or expired keys) are [`StoreError::NotFound`]; every other
  /// non-value reply is [`StoreError::Unavailable`].
  pub async fn get(&self, process_id: &str) -> Result<WorkflowState, StoreError> {
    let payload = self.backend.get(process_id).await;
    match classify(&payload) {
      Reply::Value(raw) => {
        serde_json::from_str(raw).map_err(|source| StoreError::Serialization {
          process_id: process_id.to_string(),
          source,
        })
      }
      Reply::Miss(cause) => {
        debug!(process_id = %process_id, cause = %cause, "workflow state miss");
        Err(StoreError::NotFound {
          process_id: process_id.to_string(),
          cause,
        })
      }
      Reply::Failure(cause) => Err(self.unavailable(process_id, "get", cause)),
      Reply::Ack | Reply::NoTtl => {
        Err(self.unavailable(process_id, "get", FailureCause::Unrecognized))
      }
    }
  }

  /// Write the state of a process, replacing any existing entry.
  ///
  /// `ttl = None` uses the default TTL. A TTL of zero or less is rejected
  /// without touching the backend.
  pub async fn put(
    &self,
    process_id: &str,
    state: &WorkflowState,
    ttl: Option<TimeDelta>,
  ) -> Result<(), StoreError> {
    let ttl = ttl.unwrap_or(self.default_ttl);
    let ttl_std = match ttl.to_std() {
      Ok(d) if !d.is_zero() => d,
      _ => {
        return Err(StoreError::InvalidTtl {
          ttl_secs: ttl.num_seconds(),
        });
      }
    };

    let value = serde_json::to_string(state).map_err(|source| StoreError::Serialization {
      process_id: process_id.to_string(),
      source,
    })?;

    let payload = self.backend.set(process_id, value, Some(ttl_std)).await;
    match classify(&payload) {
      Reply::Ack => {
        debug!(
          process_id = %process_id,
          ttl_secs = ttl.num_seconds(),
          next_steps = ?state.available_next_steps,
          "workflow state written"
        );
        Ok(())
      }
      Reply::Failure(cause) => Err(self.unavailable(process_id, "put", cause)),
      _ => Err(self.unavailable(process_id, "put", FailureCause::Unrecognized)),
    }
  }

  /// Remove the state of a process.
  ///
  /// Best effort: failures are logged and never returned, since expiry
  /// reclaims the entry eventually.
  pub async fn delete(&self, process_id: &str) {
    let payload = self.backend.delete(process_id).await;
    match classify(&payload) {
      Reply::Ack => debug!(process_id = %process_id, "workflow state deleted"),
      Reply::Miss(cause) => {
        debug!(process_id = %process_id, cause = %cause, "workflow state already gone")
      }
      Reply::Failure(cause) => {
        info!(process_id = %process_id, cause = %cause, "best-effort workflow state delete failed")
      }
      _ => info!(
        process_id = %process_id,
        reply = %payload,
        "unexpected reply to workflow state delete"
      ),
    }
  }

  /// When the state of a process expires.
  ///
  /// `Ok(None)` means the key has no TTL. An absent or expired key is
  /// [`StoreError::NotFound`], never an instant.
  pub async fn expiration_of(&self, process_id: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
    let payload = self.backend.expiry(process_id).await;
    match classify(&payload) {
      Reply::NoTtl => Ok(None),
      Reply::Value(raw) => raw
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(Some)
        .ok_or_else(|| self.unavailable(process_id, "expiration_of", FailureCause::Unrecognized)),
      Reply::Miss(cause) => Err(StoreError::NotFound {
        process_id: process_id.to_string(),
        cause,
      }),
      Reply::Failure(cause) => Err(self.unavailable(process_id, "expiration_of", cause)),
      Reply::Ack => Err(self.unavailable(
        process_id,
        "expiration_of",
        FailureCause::Unrecognized,
      )),
    }
  }

  fn unavailable(&self, process_id: &str, operation: &str, cause: FailureCause) -> StoreError {
    warn!(
      process_id = %process_id,
      operation = %operation,
      cause = %cause,
      "workflow state cache failure"
    );
    StoreError::Unavailable {
      process_id: process_id.to_string(),
      cause,
    }
  }
}
