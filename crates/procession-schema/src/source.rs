use async_trait::async_trait;
use procession_policy::{PolicyRegistry, ProgramId};

use crate::error::SchemaError;

/// Trait for looking up a program's declared parameter schema.
#[async_trait]
pub trait SchemaSource: Send + Sync {
  /// Get the schema for a program. `None` means the program declares no
  /// schema and accepts any parameters.
  async fn get_schema(
    &self,
    program_id: &ProgramId,
  ) -> Result<Option<serde_json::Value>, SchemaError>;
}

/// Schema source backed by the policy registry.
pub struct RegistrySchemaSource<R: PolicyRegistry> {
  registry: R,
}

impl<R: PolicyRegistry> RegistrySchemaSource<R> {
  pub fn new(registry: R) -> Self {
    Self { registry }
  }
}

#[async_trait]
impl<R: PolicyRegistry> SchemaSource for RegistrySchemaSource<R> {
  async fn get_schema(
    &self,
    program_id: &ProgramId,
  ) -> Result<Option<serde_json::Value>, SchemaError> {
    let policy = &program_id.policy;
    let def = self
      .registry
      .get(&policy.short_name, &policy.patch_version_string())
      .await?
      .ok_or_else(|| SchemaError::ProgramNotFound {
        program_id: program_id.to_string(),
      })?;

    match def.step(program_id.step.as_deref()) {
      Some(step) if step.schema.is_object() => Ok(Some(step.schema.clone())),
      Some(_) => Err(SchemaError::MalformedSchema {
        program_id: program_id.to_string(),
      }),
      None => Ok(None),
    }
  }
}
