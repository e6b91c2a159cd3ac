use std::fmt;
use std::str::FromStr;

use procession_config::{ConfigError, PolicyDef};
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// A concrete, resolved policy version.
///
/// Resolved once per request and pinned into stored workflow state so that
/// resumed processes keep running against the version they started on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyVersion {
  pub short_name: String,
  pub major_version: u32,
  pub minor_version: u32,
  pub patch_version: u32,
  pub full_name: String,
}

impl PolicyVersion {
  pub fn new(short_name: impl Into<String>, major: u32, minor: u32, patch: u32) -> Self {
    let short_name = short_name.into();
    let full_name = format!("{}_{}.{}.{}", short_name, major, minor, patch);
    Self {
      short_name,
      major_version: major,
      minor_version: minor,
      patch_version: patch,
      full_name,
    }
  }

  /// Build the version identity of a policy definition.
  pub fn from_def(def: &PolicyDef) -> Result<Self, ConfigError> {
    let (major, minor, patch) = def.version_parts()?;
    Ok(Self::new(&def.name, major, minor, patch))
  }

  /// The `major.minor.patch` string.
  pub fn patch_version_string(&self) -> String {
    format!(
      "{}.{}.{}",
      self.major_version, self.minor_version, self.patch_version
    )
  }

  /// Identifier of the program that implements `step` of this version.
  pub fn program_id(&self, step: Option<&str>) -> ProgramId {
    ProgramId {
      policy: self.clone(),
      step: step.map(str::to_string),
    }
  }

  fn ordinal(&self) -> (u32, u32, u32) {
    (self.major_version, self.minor_version, self.patch_version)
  }
}

impl PartialOrd for PolicyVersion {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for PolicyVersion {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    self
      .short_name
      .cmp(&other.short_name)
      .then_with(|| self.ordinal().cmp(&other.ordinal()))
  }
}

impl fmt::Display for PolicyVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.full_name)
  }
}

/// Identifier of an executable program.
///
/// Rendered as `{short_name}_{major.minor.patch}` with an optional `-{step}`
/// suffix, e.g. `kyc_1.0.3-verify-address`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramId {
  pub policy: PolicyVersion,
  pub step: Option<String>,
}

impl fmt::Display for ProgramId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}_{}",
      self.policy.short_name,
      self.policy.patch_version_string()
    )?;
    if let Some(step) = &self.step {
      write!(f, "-{}", step)?;
    }
    Ok(())
  }
}

/// A requested version: `1`, `1.0` or `1.0.3`, optionally prefixed with `v`.
///
/// Partial specifiers forward to the newest matching patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionSpec {
  pub major: u32,
  pub minor: Option<u32>,
  pub patch: Option<u32>,
}

impl VersionSpec {
  pub fn matches(&self, version: &PolicyVersion) -> bool {
    self.major == version.major_version
      && self.minor.is_none_or(|m| m == version.minor_version)
      && self.patch.is_none_or(|p| p == version.patch_version)
  }
}

impl FromStr for VersionSpec {
  type Err = ResolveError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || ResolveError::InvalidVersionSpec {
      version: s.to_string(),
    };
    let trimmed = s.trim();
    let trimmed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);

    let parts = trimmed
      .split('.')
      .map(|p| p.parse::<u32>().map_err(|_| invalid()))
      .collect::<Result<Vec<_>, _>>()?;

    match parts.as_slice() {
      [major] => Ok(Self {
        major: *major,
        minor: None,
        patch: None,
      }),
      [major, minor] => Ok(Self {
        major: *major,
        minor: Some(*minor),
        patch: None,
      }),
      [major, minor, patch] => Ok(Self {
        major: *major,
        minor: Some(*minor),
        patch: Some(*patch),
      }),
      _ => Err(invalid()),
    }
  }
}
