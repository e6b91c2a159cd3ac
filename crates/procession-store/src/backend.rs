use std::time::Duration;

use async_trait::async_trait;

/// Raw key/value protocol of the external cache.
///
/// Every call answers with a payload string; misses and failures are reported
/// as sentinels from [`crate::sentinel`] rather than as Rust errors. Retries,
/// if any, are the backend's business and invisible to callers.
#[async_trait]
pub trait CacheBackend: Send + Sync {
  /// Read a value, or a miss/failure sentinel.
  async fn get(&self, key: &str) -> String;

  /// Write a value. `None` stores the key without expiry.
  /// Answers `OK` or a failure sentinel.
  async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> String;

  /// Remove a key. Answers `OK`, a miss sentinel, or a failure sentinel.
  async fn delete(&self, key: &str) -> String;

  /// Expiry of a key as epoch milliseconds, `__NO_TTL__`, or a miss/failure
  /// sentinel.
  async fn expiry(&self, key: &str) -> String;
}
