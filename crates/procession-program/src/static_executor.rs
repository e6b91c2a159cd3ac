//! Executor for the step graph declared in policy definitions.

use async_trait::async_trait;
use procession_config::START_STEP;
use procession_context::RequestContext;
use procession_policy::{PolicyRegistry, ProgramId, RegistryError};
use serde_json::{Value, json};
use tracing::{error, info, instrument};

use crate::error::ProgramFault;
use crate::executor::ProgramExecutor;
use crate::program::{ProgramInput, ProgramOutput};

/// Errors raised by the static executor before a step can run.
#[derive(Debug, thiserror::Error)]
pub enum StaticProgramError {
  /// The pinned policy version is not installed.
  #[error("no policy definition for program '{program_id}'")]
  PolicyNotInstalled { program_id: String },

  /// The policy does not declare the requested step.
  #[error("policy '{policy}' has no step '{step}'")]
  StepNotDeclared { policy: String, step: String },

  /// The registry could not be read.
  #[error("registry error: {0}")]
  Registry(#[from] RegistryError),
}

/// Runs the step graph declared in a policy definition.
///
/// Each step records its parameters in the state blob under the step's name,
/// reports the declared `next_steps`, and counts itself as completed (the
/// start step excepted).
pub struct StaticProgramExecutor<R: PolicyRegistry> {
  registry: R,
}

impl<R: PolicyRegistry> StaticProgramExecutor<R> {
  pub fn new(registry: R) -> Self {
    Self { registry }
  }

  async fn execute_inner(
    &self,
    program_id: &ProgramId,
    input: ProgramInput,
  ) -> Result<ProgramOutput, StaticProgramError> {
    let policy = &program_id.policy;
    let def = self
      .registry
      .get(&policy.short_name, &policy.patch_version_string())
      .await?
      .ok_or_else(|| StaticProgramError::PolicyNotInstalled {
        program_id: program_id.to_string(),
      })?;

    let step_name = input.step.as_deref().unwrap_or(START_STEP);
    let step = def
      .step(input.step.as_deref())
      .ok_or_else(|| StaticProgramError::StepNotDeclared {
        policy: policy.full_name.clone(),
        step: step_name.to_string(),
      })?;

    let mut state = match input.state {
      Some(Value::Object(map)) => map,
      _ => serde_json::Map::new(),
    };
    state.insert(
      step_name.to_string(),
      Value::Object(input.parameters.clone()),
    );
    let state = Value::Object(state);

    let steps_completed = match &input.step {
      Some(step) if step != START_STEP => vec![step.clone()],
      _ => Vec::new(),
    };

    Ok(ProgramOutput {
      output: json!({
        "step": step_name,
        "parameters": input.parameters,
        "state": state,
      }),
      state,
      available_next_steps: step.next_steps.iter().cloned().collect(),
      steps_completed,
      effective_next_step: step.effective_next_step.clone(),
    })
  }
}

#[async_trait]
impl<R: PolicyRegistry> ProgramExecutor for StaticProgramExecutor<R> {
  #[instrument(
    name = "program_execute",
    skip(self, program_id, input, ctx),
    fields(
      program_id = %program_id,
      process_id = %input.process_id,
      request_id = %ctx.request_id,
    )
  )]
  async fn execute(
    &self,
    program_id: &ProgramId,
    input: ProgramInput,
    ctx: &RequestContext,
  ) -> Result<ProgramOutput, ProgramFault> {
    info!(mock_mode = ctx.mock_mode, "program started");

    match self.execute_inner(program_id, input).await {
      Ok(output) => {
        info!(next_steps = ?output.available_next_steps, "program completed");
        Ok(output)
      }
      Err(e) => {
        error!(error = %e, "program failed");
        Err(ProgramFault::other(&e))
      }
    }
  }
}
