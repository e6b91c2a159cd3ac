use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::backend::CacheBackend;
use crate::sentinel::{self, FailureCause, MissCause};

#[derive(Debug)]
struct Entry {
  value: String,
  expires_at: Option<Instant>,
}

impl Entry {
  fn is_expired(&self, now: Instant) -> bool {
    self.expires_at.is_some_and(|at| at <= now)
  }
}

/// In-memory cache backend.
///
/// Expired entries are dropped when their key is read and swept from the
/// whole map on every write, so abandoned processes do not accumulate.
/// Suitable for single-node deployments and testing. Expiry uses the tokio
/// clock, so tests can pause and advance time.
#[derive(Debug, Default)]
pub struct InMemoryCache {
  entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of live (unexpired) entries.
  pub async fn len(&self) -> usize {
    let now = Instant::now();
    let entries = self.entries.lock().await;
    entries.values().filter(|e| !e.is_expired(now)).count()
  }

  pub async fn is_empty(&self) -> bool {
    self.len().await == 0
  }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
  async fn get(&self, key: &str) -> String {
    let now = Instant::now();
    let mut entries = self.entries.lock().await;
    match entries.get(key) {
      Some(entry) if entry.is_expired(now) => {
        entries.remove(key);
        MissCause::Expired.sentinel()
      }
      Some(entry) => entry.value.clone(),
      None => MissCause::KeyNotFound.sentinel(),
    }
  }

  async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> String {
    let now = Instant::now();
    let expires_at = match ttl {
      Some(ttl) => match now.checked_add(ttl) {
        Some(at) => Some(at),
        None => return FailureCause::WriteRejected.sentinel(),
      },
      None => None,
    };
    let mut entries = self.entries.lock().await;
    entries.retain(|_, entry| !entry.is_expired(now));
    entries.insert(key.to_string(), Entry { value, expires_at });
    sentinel::ACK.to_string()
  }

  async fn delete(&self, key: &str) -> String {
    let now = Instant::now();
    let mut entries = self.entries.lock().await;
    match entries.remove(key) {
      Some(entry) if !entry.is_expired(now) => sentinel::ACK.to_string(),
      Some(_) => MissCause::Expired.sentinel(),
      None => MissCause::KeyNotFound.sentinel(),
    }
  }

  async fn expiry(&self, key: &str) -> String {
    let now = Instant::now();
    let mut entries = self.entries.lock().await;
    let expires_at = match entries.get(key) {
      Some(entry) if entry.is_expired(now) => {
        entries.remove(key);
        return MissCause::Expired.sentinel();
      }
      Some(entry) => entry.expires_at,
      None => return MissCause::KeyNotFound.sentinel(),
    };

    match expires_at {
      Some(at) => {
        let remaining = chrono::Duration::from_std(at - now).unwrap_or(chrono::Duration::MAX);
        match Utc::now().checked_add_signed(remaining) {
          Some(wall) => wall.timestamp_millis().to_string(),
          None => FailureCause::Unrecognized.sentinel(),
        }
      }
      None => sentinel::NO_TTL.to_string(),
    }
  }
}
