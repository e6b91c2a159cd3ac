use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use procession_config::PolicyDef;

use crate::error::RegistryError;

/// Trait for policy definition storage.
///
/// The registry is the source of truth for which policy versions exist and
/// whether they are active.
#[async_trait]
pub trait PolicyRegistry: Send + Sync {
  /// All installed versions of a policy, active or not.
  async fn versions(&self, name: &str) -> Result<Vec<PolicyDef>, RegistryError>;

  /// Get a specific installed version.
  async fn get(&self, name: &str, version: &str) -> Result<Option<PolicyDef>, RegistryError>;

  /// Install a new policy version.
  async fn install(&self, def: PolicyDef) -> Result<(), RegistryError>;

  /// Activate or deactivate an installed version.
  async fn set_active(&self, name: &str, version: &str, active: bool) -> Result<(), RegistryError>;
}

#[async_trait]
impl<R: PolicyRegistry + ?Sized> PolicyRegistry for Arc<R> {
  async fn versions(&self, name: &str) -> Result<Vec<PolicyDef>, RegistryError> {
    (**self).versions(name).await
  }

  async fn get(&self, name: &str, version: &str) -> Result<Option<PolicyDef>, RegistryError> {
    (**self).get(name, version).await
  }

  async fn install(&self, def: PolicyDef) -> Result<(), RegistryError> {
    (**self).install(def).await
  }

  async fn set_active(&self, name: &str, version: &str, active: bool) -> Result<(), RegistryError> {
    (**self).set_active(name, version, active).await
  }
}

/// In-memory policy registry.
///
/// Suitable for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryPolicyRegistry {
  policies: RwLock<HashMap<(String, String), PolicyDef>>,
}

impl InMemoryPolicyRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a registry pre-populated with the given definitions.
  pub fn with_policies(defs: impl IntoIterator<Item = PolicyDef>) -> Self {
    let policies = defs
      .into_iter()
      .map(|def| ((def.name.clone(), def.version.clone()), def))
      .collect();
    Self {
      policies: RwLock::new(policies),
    }
  }
}

#[async_trait]
impl PolicyRegistry for InMemoryPolicyRegistry {
  async fn versions(&self, name: &str) -> Result<Vec<PolicyDef>, RegistryError> {
    let policies = self.policies.read().unwrap_or_else(|e| e.into_inner());
    Ok(
      policies
        .values()
        .filter(|def| def.name == name)
        .cloned()
        .collect(),
    )
  }

  async fn get(&self, name: &str, version: &str) -> Result<Option<PolicyDef>, RegistryError> {
    let policies = self.policies.read().unwrap_or_else(|e| e.into_inner());
    Ok(
      policies
        .get(&(name.to_string(), version.to_string()))
        .cloned(),
    )
  }

  async fn install(&self, def: PolicyDef) -> Result<(), RegistryError> {
    let mut policies = self.policies.write().unwrap_or_else(|e| e.into_inner());
    let key = (def.name.clone(), def.version.clone());
    if policies.contains_key(&key) {
      return Err(RegistryError::AlreadyExists {
        name: def.name,
        version: def.version,
      });
    }
    policies.insert(key, def);
    Ok(())
  }

  async fn set_active(&self, name: &str, version: &str, active: bool) -> Result<(), RegistryError> {
    let mut policies = self.policies.write().unwrap_or_else(|e| e.into_inner());
    match policies.get_mut(&(name.to_string(), version.to_string())) {
      Some(def) => {
        def.active = active;
        Ok(())
      }
      None => Err(RegistryError::NotFound {
        name: name.to_string(),
        version: version.to_string(),
      }),
    }
  }
}
