use procession_policy::RegistryError;
use thiserror::Error;

/// Errors raised while looking up a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
  /// The program's policy version is not installed.
  #[error("no policy definition for program '{program_id}'")]
  ProgramNotFound { program_id: String },

  /// The declared schema is not a JSON object.
  #[error("schema for program '{program_id}' is not an object")]
  MalformedSchema { program_id: String },

  /// Registry error while looking up the policy.
  #[error("registry error: {0}")]
  Registry(#[from] RegistryError),
}
