use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::ResolveError;
use crate::registry::PolicyRegistry;
use crate::version::{PolicyVersion, VersionSpec};

/// Resolver maps a requested policy version to a concrete active version.
#[async_trait]
pub trait VersionResolver: Send + Sync {
  /// Resolve `(policy_name, version_requested)` to the newest active version
  /// matching the request.
  async fn resolve(
    &self,
    policy_name: &str,
    version_requested: &str,
  ) -> Result<PolicyVersion, ResolveError>;

  /// Deactivate a version. It stops resolving immediately.
  async fn deactivate(&self, version: &PolicyVersion) -> Result<(), ResolveError>;
}

/// Standard resolver implementation that reads a policy registry on every call.
pub struct StandardResolver<R: PolicyRegistry> {
  registry: R,
}

impl<R: PolicyRegistry> StandardResolver<R> {
  /// Create a new resolver with the given policy registry.
  pub fn new(registry: R) -> Self {
    Self { registry }
  }

  /// Get a reference to the underlying registry.
  pub fn registry(&self) -> &R {
    &self.registry
  }

  /// Load the active versions of a policy, along with whether any version
  /// (active or not) is installed.
  async fn active_versions(
    &self,
    policy_name: &str,
  ) -> Result<(Vec<PolicyVersion>, bool), ResolveError> {
    let defs = self.registry.versions(policy_name).await?;
    let installed = !defs.is_empty();

    let mut active = Vec::with_capacity(defs.len());
    for def in defs.iter().filter(|d| d.active) {
      match PolicyVersion::from_def(def) {
        Ok(version) => active.push(version),
        Err(e) => {
          warn!(policy = %policy_name, error = %e, "ignoring policy with malformed version");
        }
      }
    }

    Ok((active, installed))
  }
}

#[async_trait]
impl<R: PolicyRegistry> VersionResolver for StandardResolver<R> {
  async fn resolve(
    &self,
    policy_name: &str,
    version_requested: &str,
  ) -> Result<PolicyVersion, ResolveError> {
    let spec: VersionSpec = version_requested.parse()?;
    let (active, installed) = self.active_versions(policy_name).await?;

    if !installed {
      return Err(ResolveError::PolicyNotFound {
        name: policy_name.to_string(),
      });
    }

    let resolved = active
      .into_iter()
      .filter(|v| spec.matches(v))
      .max()
      .ok_or_else(|| ResolveError::VersionNotFound {
        name: policy_name.to_string(),
        version: version_requested.to_string(),
      })?;

    debug!(
      policy = %policy_name,
      requested = %version_requested,
      resolved = %resolved,
      "policy version resolved"
    );

    Ok(resolved)
  }

  async fn deactivate(&self, version: &PolicyVersion) -> Result<(), ResolveError> {
    self
      .registry
      .set_active(&version.short_name, &version.patch_version_string(), false)
      .await?;
    info!(policy = %version, "policy version deactivated");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::InMemoryPolicyRegistry;
  use procession_config::PolicyDef;
  use std::collections::HashMap;

  fn def(name: &str, version: &str, active: bool) -> PolicyDef {
    PolicyDef {
      name: name.to_string(),
      version: version.to_string(),
      active,
      description: None,
      steps: HashMap::new(),
    }
  }

  fn resolver(defs: Vec<PolicyDef>) -> StandardResolver<InMemoryPolicyRegistry> {
    StandardResolver::new(InMemoryPolicyRegistry::with_policies(defs))
  }

  #[tokio::test]
  async fn test_forwards_to_newest_active_patch() {
    let resolver = resolver(vec![
      def("kyc", "1.0.0", true),
      def("kyc", "1.0.2", true),
      def("kyc", "1.0.10", true),
      def("kyc", "1.1.0", true),
      def("kyc", "1.0.11", false),
    ]);

    let version = resolver.resolve("kyc", "1.0").await.unwrap();
    assert_eq!(version, PolicyVersion::new("kyc", 1, 0, 10));

    let version = resolver.resolve("kyc", "1").await.unwrap();
    assert_eq!(version, PolicyVersion::new("kyc", 1, 1, 0));

    let version = resolver.resolve("kyc", "1.0.2").await.unwrap();
    assert_eq!(version.patch_version, 2);
  }

  #[tokio::test]
  async fn test_unknown_policy_and_version() {
    let resolver = resolver(vec![def("kyc", "1.0.0", true)]);

    let result = resolver.resolve("aml", "1.0").await;
    assert!(matches!(result, Err(ResolveError::PolicyNotFound { .. })));

    let result = resolver.resolve("kyc", "2.0").await;
    assert!(matches!(result, Err(ResolveError::VersionNotFound { .. })));

    let result = resolver.resolve("kyc", "one").await;
    assert!(matches!(result, Err(ResolveError::InvalidVersionSpec { .. })));
    assert!(result.unwrap_err().is_not_found());
  }

  #[tokio::test]
  async fn test_deactivated_version_stops_resolving_immediately() {
    let resolver = resolver(vec![def("kyc", "1.0.0", true), def("kyc", "1.0.1", true)]);

    let newest = resolver.resolve("kyc", "1.0").await.unwrap();
    assert_eq!(newest.patch_version, 1);

    resolver.deactivate(&newest).await.unwrap();

    let fallback = resolver.resolve("kyc", "1.0").await.unwrap();
    assert_eq!(fallback.patch_version, 0);

    let pinned = resolver.resolve("kyc", "1.0.1").await;
    assert!(matches!(pinned, Err(ResolveError::VersionNotFound { .. })));
  }

  #[tokio::test]
  async fn test_only_inactive_versions_is_version_not_found() {
    let resolver = resolver(vec![def("kyc", "1.0.0", false)]);
    let result = resolver.resolve("kyc", "1").await;
    assert!(matches!(result, Err(ResolveError::VersionNotFound { .. })));
  }
}
