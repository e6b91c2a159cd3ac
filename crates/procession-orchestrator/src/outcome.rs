use procession_policy::PolicyVersion;
use serde::{Deserialize, Serialize};

use crate::error::ErrorInfo;
use crate::metadata::ProcessMetadata;

/// Whether the program ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyStatus {
  Success,
  /// Parameters failed schema validation; nothing was dispatched.
  Invalid,
}

/// Body of a success-shaped response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResults {
  pub process_id: String,
  pub policy_version: PolicyVersion,
  pub policy_status: PolicyStatus,
  /// Program output; `null` when the parameters were invalid.
  pub output: serde_json::Value,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error_info: Option<ErrorInfo>,
}

/// Result of a create or resume call.
///
/// Exactly one of results or error is ever present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
  Success {
    results: PolicyResults,
    metadata: Option<ProcessMetadata>,
  },
  Fault {
    error: ErrorInfo,
    metadata: Option<ProcessMetadata>,
  },
}

impl ExecutionOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, ExecutionOutcome::Success { .. })
  }

  pub fn results(&self) -> Option<&PolicyResults> {
    match self {
      ExecutionOutcome::Success { results, .. } => Some(results),
      ExecutionOutcome::Fault { .. } => None,
    }
  }

  pub fn error(&self) -> Option<&ErrorInfo> {
    match self {
      ExecutionOutcome::Success { .. } => None,
      ExecutionOutcome::Fault { error, .. } => Some(error),
    }
  }

  pub fn metadata(&self) -> Option<&ProcessMetadata> {
    match self {
      ExecutionOutcome::Success { metadata, .. } | ExecutionOutcome::Fault { metadata, .. } => {
        metadata.as_ref()
      }
    }
  }

  /// The error id, when this is a fault.
  pub fn error_id(&self) -> Option<&str> {
    self.error().map(|error| error.id.as_str())
  }
}
