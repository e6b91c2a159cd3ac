use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The file could not be read.
  #[error("failed to read '{path}': {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The file content is not valid for the expected type.
  #[error("failed to parse '{path}': {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// A policy version string is not `major.minor.patch`.
  #[error("invalid version '{version}' for policy '{name}'")]
  InvalidVersion { name: String, version: String },

  /// The default TTL is zero or too large to represent.
  #[error("invalid default ttl: {ttl_secs}s")]
  InvalidTtl { ttl_secs: u64 },
}
