use std::path::{Path, PathBuf};

use async_trait::async_trait;
use procession_config::PolicyDef;
use tokio::fs;
use tracing::warn;

use crate::error::RegistryError;
use crate::registry::PolicyRegistry;

/// Filesystem-based policy registry.
///
/// Each policy version is one JSON file:
/// ```text
/// {root}/
/// ├── kyc--1.0.0.json
/// ├── kyc--1.0.1.json
/// └── aml--2.3.0.json
/// ```
///
/// The directory is read on every call, so edits on disk are visible
/// immediately.
pub struct FsPolicyRegistry {
  root: PathBuf,
}

impl FsPolicyRegistry {
  /// Create a new filesystem registry at the given root path.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Get the root directory of the registry.
  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Parse a file name into (name, version).
  /// Example: "kyc--1.0.3.json" -> ("kyc", "1.0.3")
  fn parse_file_name(file_name: &str) -> Option<(String, String)> {
    let stem = file_name.strip_suffix(".json")?;
    let sep = stem.rfind("--")?;
    Some((stem[..sep].to_string(), stem[sep + 2..].to_string()))
  }

  fn path_for(&self, name: &str, version: &str) -> PathBuf {
    self.root.join(format!("{}--{}.json", name, version))
  }

  async fn read_def(&self, path: &Path) -> Result<PolicyDef, RegistryError> {
    let content = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
  }

  /// Read a definition, skipping it when its name or version disagrees with
  /// the file it was read from.
  async fn read_matching(&self, path: &Path, name: &str, version: &str) -> Option<PolicyDef> {
    let def = match self.read_def(path).await {
      Ok(def) => def,
      Err(e) => {
        warn!(path = %path.display(), error = %e, "skipping unreadable policy definition");
        return None;
      }
    };

    if def.name != name || def.version != version {
      warn!(
        path = %path.display(),
        name = %def.name,
        version = %def.version,
        "skipping policy definition that does not match its file name"
      );
      return None;
    }
    Some(def)
  }

  async fn write_def(&self, def: &PolicyDef) -> Result<(), RegistryError> {
    fs::create_dir_all(&self.root).await?;
    let content = serde_json::to_string_pretty(def)?;
    fs::write(self.root.join(def.file_name()), content).await?;
    Ok(())
  }
}

#[async_trait]
impl PolicyRegistry for FsPolicyRegistry {
  async fn versions(&self, name: &str) -> Result<Vec<PolicyDef>, RegistryError> {
    if !fs::try_exists(&self.root).await? {
      return Ok(Vec::new());
    }

    let mut entries = fs::read_dir(&self.root).await?;
    let mut defs = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => continue,
      };

      if let Some((parsed_name, parsed_version)) = Self::parse_file_name(file_name)
        && parsed_name == name
        && let Some(def) = self.read_matching(&path, name, &parsed_version).await
      {
        defs.push(def);
      }
    }

    Ok(defs)
  }

  async fn get(&self, name: &str, version: &str) -> Result<Option<PolicyDef>, RegistryError> {
    let path = self.path_for(name, version);
    if !fs::try_exists(&path).await? {
      return Ok(None);
    }
    let def = self.read_def(&path).await?;
    if def.name != name || def.version != version {
      warn!(
        path = %path.display(),
        name = %def.name,
        version = %def.version,
        "ignoring policy definition that does not match its file name"
      );
      return Ok(None);
    }
    Ok(Some(def))
  }

  async fn install(&self, def: PolicyDef) -> Result<(), RegistryError> {
    let path = self.path_for(&def.name, &def.version);
    if fs::try_exists(&path).await? {
      return Err(RegistryError::AlreadyExists {
        name: def.name,
        version: def.version,
      });
    }
    // Reject malformed versions before they land on disk.
    def.version_parts()?;
    self.write_def(&def).await
  }

  async fn set_active(&self, name: &str, version: &str, active: bool) -> Result<(), RegistryError> {
    let mut def = self
      .get(name, version)
      .await?
      .ok_or_else(|| RegistryError::NotFound {
        name: name.to_string(),
        version: version.to_string(),
      })?;
    def.active = active;
    self.write_def(&def).await
  }
}
