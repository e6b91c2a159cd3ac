use procession_config::ConfigError;
use thiserror::Error;

/// Errors raised by a policy registry backend.
#[derive(Debug, Error)]
pub enum RegistryError {
  /// The policy version is not installed.
  #[error("policy not found: {name}@{version}")]
  NotFound { name: String, version: String },

  /// The policy version is already installed.
  #[error("policy already exists: {name}@{version}")]
  AlreadyExists { name: String, version: String },

  /// Failed to read or write a definition file.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// A definition file is not valid JSON.
  #[error("invalid definition: {0}")]
  Json(#[from] serde_json::Error),

  /// A definition could not be loaded.
  #[error("config error: {0}")]
  Config(#[from] ConfigError),
}

/// Errors that can occur during version resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// No version of the policy is installed and active.
  #[error("policy not found: {name}")]
  PolicyNotFound { name: String },

  /// The policy exists but no active version matches the request.
  #[error("policy version not found: {name}@{version}")]
  VersionNotFound { name: String, version: String },

  /// The requested version is not a `major[.minor[.patch]]` string.
  #[error("invalid version specifier: '{version}'")]
  InvalidVersionSpec { version: String },

  /// Registry error while looking up the policy.
  #[error("registry error: {0}")]
  Registry(#[from] RegistryError),
}

impl ResolveError {
  /// Whether the error means the caller asked for something that does not exist,
  /// as opposed to the registry itself failing.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      ResolveError::PolicyNotFound { .. }
        | ResolveError::VersionNotFound { .. }
        | ResolveError::InvalidVersionSpec { .. }
        | ResolveError::Registry(RegistryError::NotFound { .. })
    )
  }
}
