use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use procession_policy::PolicyVersion;
use procession_store::{StoreError, WorkflowState, WorkflowStateStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Caller-facing view of an in-flight process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetadata {
  pub process_id: String,
  pub policy_name: String,
  pub policy_version: PolicyVersion,
  pub available_next_steps: BTreeSet<String>,
  pub steps_completed: Vec<String>,
  pub effective_next_step: Option<String>,
  /// `None` when the stored state has no TTL.
  pub expires_at: Option<DateTime<Utc>>,
}

impl ProcessMetadata {
  pub(crate) fn from_state(
    process_id: &str,
    state: &WorkflowState,
    expires_at: Option<DateTime<Utc>>,
  ) -> Self {
    Self {
      process_id: process_id.to_string(),
      policy_name: state.policy_name.clone(),
      policy_version: state.policy_version.clone(),
      available_next_steps: state.available_next_steps.clone(),
      steps_completed: state.steps_completed.clone(),
      effective_next_step: state.effective_next_step.clone(),
      expires_at,
    }
  }
}

/// Builds [`ProcessMetadata`] from the workflow state store.
#[derive(Clone)]
pub struct ProcessMetadataProvider {
  store: WorkflowStateStore,
}

impl ProcessMetadataProvider {
  pub fn new(store: WorkflowStateStore) -> Self {
    Self { store }
  }

  /// Metadata for a process.
  ///
  /// A miss on either the state or its expiration is
  /// [`StoreError::NotFound`]: an expired process has no metadata.
  pub async fn get_metadata(&self, process_id: &str) -> Result<ProcessMetadata, StoreError> {
    let state = self.store.get(process_id).await?;
    let expires_at = self.store.expiration_of(process_id).await?;

    debug!(
      process_id = %process_id,
      expires_at = ?expires_at,
      "process metadata read"
    );

    Ok(ProcessMetadata::from_state(process_id, &state, expires_at))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeDelta;
  use procession_store::InMemoryCache;
  use serde_json::json;
  use std::sync::Arc;
  use std::time::Duration;

  fn state() -> WorkflowState {
    WorkflowState {
      policy_name: "kyc".to_string(),
      policy_version: PolicyVersion::new("kyc", 1, 0, 0),
      state_blob: json!({ "start": {} }),
      available_next_steps: BTreeSet::from(["verify-address".to_string()]),
      steps_completed: vec!["collect".to_string()],
      effective_next_step: Some("verify-address".to_string()),
    }
  }

  #[tokio::test]
  async fn test_metadata_from_stored_state() {
    let store = WorkflowStateStore::new(Arc::new(InMemoryCache::new()), TimeDelta::minutes(30));
    store.put("proc-1", &state(), None).await.unwrap();

    let provider = ProcessMetadataProvider::new(store);
    let metadata = provider.get_metadata("proc-1").await.unwrap();

    assert_eq!(metadata.process_id, "proc-1");
    assert_eq!(metadata.policy_version.full_name, "kyc_1.0.0");
    assert_eq!(metadata.steps_completed, vec!["collect".to_string()]);
    assert_eq!(metadata.effective_next_step.as_deref(), Some("verify-address"));
    assert!(metadata.expires_at.unwrap() > Utc::now());
  }

  #[tokio::test(start_paused = true)]
  async fn test_expired_process_has_no_metadata() {
    let store = WorkflowStateStore::new(Arc::new(InMemoryCache::new()), TimeDelta::minutes(30));
    store
      .put("proc-1", &state(), Some(TimeDelta::seconds(10)))
      .await
      .unwrap();

    tokio::time::advance(Duration::from_secs(11)).await;

    let provider = ProcessMetadataProvider::new(store);
    let result = provider.get_metadata("proc-1").await;
    assert!(result.unwrap_err().is_miss());
  }

  #[tokio::test]
  async fn test_unknown_process() {
    let store = WorkflowStateStore::new(Arc::new(InMemoryCache::new()), TimeDelta::minutes(30));
    let provider = ProcessMetadataProvider::new(store);
    assert!(provider.get_metadata("nope").await.unwrap_err().is_miss());
  }
}
