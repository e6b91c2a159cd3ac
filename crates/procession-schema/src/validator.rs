use std::collections::BTreeSet;

use async_trait::async_trait;
use procession_context::RequestContext;
use procession_policy::PolicyVersion;
use tracing::debug;

use crate::error::SchemaError;
use crate::source::SchemaSource;
use crate::validate::{ValidationError, validate_document};

/// Trait for validating request parameters against a step's declared schema.
#[async_trait]
pub trait SchemaValidator: Send + Sync {
  /// Validate `parameters` for `step` of `version`. An empty set means the
  /// parameters are acceptable.
  async fn validate(
    &self,
    version: &PolicyVersion,
    step: Option<&str>,
    parameters: &serde_json::Map<String, serde_json::Value>,
    ctx: &RequestContext,
  ) -> Result<BTreeSet<ValidationError>, SchemaError>;
}

/// Validator checking parameters against schemas from a [`SchemaSource`].
pub struct JsonSchemaValidator<S: SchemaSource> {
  source: S,
}

impl<S: SchemaSource> JsonSchemaValidator<S> {
  pub fn new(source: S) -> Self {
    Self { source }
  }

  pub fn source(&self) -> &S {
    &self.source
  }
}

#[async_trait]
impl<S: SchemaSource> SchemaValidator for JsonSchemaValidator<S> {
  async fn validate(
    &self,
    version: &PolicyVersion,
    step: Option<&str>,
    parameters: &serde_json::Map<String, serde_json::Value>,
    ctx: &RequestContext,
  ) -> Result<BTreeSet<ValidationError>, SchemaError> {
    let program_id = version.program_id(step);
    let Some(schema) = self.source.get_schema(&program_id).await? else {
      return Ok(BTreeSet::new());
    };

    let instance = serde_json::Value::Object(parameters.clone());
    let errors = validate_document(&schema, &instance);

    debug!(
      request_id = %ctx.request_id,
      program_id = %program_id,
      error_count = errors.len(),
      "parameters validated"
    );

    Ok(errors)
  }
}
