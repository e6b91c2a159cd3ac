use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::authorization::AuthorizationConfig;
use crate::error::ConfigError;

/// Largest default TTL, in seconds, that a millisecond-precision duration
/// can hold.
pub const MAX_TTL_SECS: u64 = (i64::MAX / 1000) as u64;

/// Top-level orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
  /// TTL applied to every workflow state write, in seconds.
  #[serde(default = "default_ttl_secs")]
  pub default_ttl_secs: u64,

  /// Strip `developer_text` from every outgoing error.
  #[serde(default)]
  pub suppress_developer_text: bool,

  #[serde(default)]
  pub authorization: AuthorizationConfig,

  #[serde(default)]
  pub cache: CacheConfig,
}

fn default_ttl_secs() -> u64 {
  1800
}

impl Default for OrchestratorConfig {
  fn default() -> Self {
    Self {
      default_ttl_secs: default_ttl_secs(),
      suppress_developer_text: false,
      authorization: AuthorizationConfig::default(),
      cache: CacheConfig::default(),
    }
  }
}

/// Workflow state cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
  /// Without a cache only single-step policies can run.
  #[serde(default = "default_cache_enabled")]
  pub enabled: bool,
}

fn default_cache_enabled() -> bool {
  true
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: default_cache_enabled(),
    }
  }
}

impl OrchestratorConfig {
  /// Load the configuration from a JSON file and validate it.
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    config.validate()?;
    Ok(config)
  }

  /// Check the settings serde cannot: the default TTL must be positive and
  /// representable.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.default_ttl_secs == 0 || self.default_ttl_secs > MAX_TTL_SECS {
      return Err(ConfigError::InvalidTtl {
        ttl_secs: self.default_ttl_secs,
      });
    }
    Ok(())
  }
}
