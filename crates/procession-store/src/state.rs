use std::collections::BTreeSet;

use procession_policy::PolicyVersion;
use serde::{Deserialize, Serialize};

/// Persisted state of one in-flight process, keyed by process ID.
///
/// Stored only while `available_next_steps` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
  pub policy_name: String,
  /// Version resolved on creation; resumes keep using it.
  pub policy_version: PolicyVersion,
  /// Program-internal state, opaque to the orchestrator.
  pub state_blob: serde_json::Value,
  pub available_next_steps: BTreeSet<String>,
  pub steps_completed: Vec<String>,
  pub effective_next_step: Option<String>,
}

impl WorkflowState {
  /// A workflow with no next steps is complete and must not be stored.
  pub fn is_complete(&self) -> bool {
    self.available_next_steps.is_empty()
  }
}
