//! Program input and output.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Input for one program dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramInput {
  pub process_id: String,
  /// `None` for the start step.
  pub step: Option<String>,
  pub parameters: serde_json::Map<String, serde_json::Value>,
  /// State blob from the previous step; `None` on creation.
  pub state: Option<serde_json::Value>,
  /// Steps completed before this dispatch.
  pub steps_completed: Vec<String>,
}

/// Output of a successful program dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramOutput {
  /// Body returned to the caller.
  pub output: serde_json::Value,
  /// New state blob to carry into the next step.
  pub state: serde_json::Value,
  /// Steps the caller may resume with. Empty when the workflow is complete.
  pub available_next_steps: BTreeSet<String>,
  /// Steps completed by this dispatch.
  pub steps_completed: Vec<String>,
  pub effective_next_step: Option<String>,
}

impl ProgramOutput {
  pub fn is_terminal(&self) -> bool {
    self.available_next_steps.is_empty()
  }
}
