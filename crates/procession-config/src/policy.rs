use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the implicit first step of every policy.
pub const START_STEP: &str = "start";

/// A single deployed version of a policy.
///
/// ```json
/// {
///   "name": "kyc",
///   "version": "1.0.3",
///   "steps": {
///     "start": { "next_steps": ["verify-address"] },
///     "verify-address": { "schema": { "required": ["street"] } }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDef {
  /// Short name of the policy, e.g. "kyc".
  pub name: String,

  /// Full `major.minor.patch` version string.
  pub version: String,

  /// Inactive versions are never resolved.
  #[serde(default = "default_active")]
  pub active: bool,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  /// Steps keyed by name. The `start` step is entered on process creation.
  #[serde(default)]
  pub steps: HashMap<String, StepDef>,
}

fn default_active() -> bool {
  true
}

/// One step within a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
  /// JSON schema the step's parameters must satisfy.
  #[serde(default = "empty_schema")]
  pub schema: serde_json::Value,

  /// Steps the caller may resume with once this step completes.
  #[serde(default)]
  pub next_steps: Vec<String>,

  /// Suggested next step reported back to the caller.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub effective_next_step: Option<String>,
}

fn empty_schema() -> serde_json::Value {
  serde_json::Value::Object(serde_json::Map::new())
}

impl Default for StepDef {
  /// A step that accepts any parameters and ends the workflow.
  fn default() -> Self {
    Self {
      schema: empty_schema(),
      next_steps: Vec::new(),
      effective_next_step: None,
    }
  }
}

impl PolicyDef {
  /// Load a policy definition from a JSON file.
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Get a step definition, treating `None` as the start step.
  pub fn step(&self, step: Option<&str>) -> Option<&StepDef> {
    self.steps.get(step.unwrap_or(START_STEP))
  }

  /// Split the version string into its numeric parts.
  pub fn version_parts(&self) -> Result<(u32, u32, u32), ConfigError> {
    let invalid = || ConfigError::InvalidVersion {
      name: self.name.clone(),
      version: self.version.clone(),
    };
    let mut parts = self.version.split('.');
    let mut next = || -> Result<u32, ConfigError> {
      parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .ok_or_else(invalid)
    };
    let parsed = (next()?, next()?, next()?);
    if parts.next().is_some() {
      return Err(invalid());
    }
    Ok(parsed)
  }

  /// File name used when storing this definition in a policy directory.
  /// Example: name "kyc", version "1.0.3" -> "kyc--1.0.3.json"
  pub fn file_name(&self) -> String {
    format!("{}--{}.json", self.name, self.version)
  }
}
