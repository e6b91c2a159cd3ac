//! Caller-facing error taxonomy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Broad class of an error, used to decide how loudly it is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
  NotFound,
  Validation,
  Authorization,
  Downstream,
  System,
}

impl ErrorClass {
  /// Downstream and system errors are server-side problems.
  pub fn is_server_fault(self) -> bool {
    matches!(self, ErrorClass::Downstream | ErrorClass::System)
  }
}

/// Stable, machine-readable error identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
  ResourceNotFound,
  StepNotAvailable,
  NoStepsAvailable,
  StepRequired,
  MissingBusinessEvent,
  InvalidBusinessEvent,
  SchemaValidation,
  Unauthorized,
  DownstreamFailure,
  WorkflowComposition,
  SystemUnavailable,
  MultiStepUnsupported,
  SystemError,
}

impl ErrorCode {
  const ALL: [ErrorCode; 13] = [
    ErrorCode::ResourceNotFound,
    ErrorCode::StepNotAvailable,
    ErrorCode::NoStepsAvailable,
    ErrorCode::StepRequired,
    ErrorCode::MissingBusinessEvent,
    ErrorCode::InvalidBusinessEvent,
    ErrorCode::SchemaValidation,
    ErrorCode::Unauthorized,
    ErrorCode::DownstreamFailure,
    ErrorCode::WorkflowComposition,
    ErrorCode::SystemUnavailable,
    ErrorCode::MultiStepUnsupported,
    ErrorCode::SystemError,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
      ErrorCode::StepNotAvailable => "STEP_NOT_AVAILABLE",
      ErrorCode::NoStepsAvailable => "NO_STEPS_AVAILABLE",
      ErrorCode::StepRequired => "STEP_PARAMETER_REQUIRED",
      ErrorCode::MissingBusinessEvent => "MISSING_BUSINESS_EVENT",
      ErrorCode::InvalidBusinessEvent => "INVALID_BUSINESS_EVENT",
      ErrorCode::SchemaValidation => "SCHEMA_VALIDATION_FAILED",
      ErrorCode::Unauthorized => "UNAUTHORIZED",
      ErrorCode::DownstreamFailure => "DOWNSTREAM_FAILURE",
      ErrorCode::WorkflowComposition => "WORKFLOW_COMPOSITION",
      ErrorCode::SystemUnavailable => "SYSTEM_UNAVAILABLE",
      ErrorCode::MultiStepUnsupported => "MULTI_STEP_UNSUPPORTED",
      ErrorCode::SystemError => "SYSTEM_ERROR",
    }
  }

  /// Look a code up by its id string.
  pub fn from_id(id: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|code| code.as_str() == id)
  }

  pub fn class(self) -> ErrorClass {
    match self {
      ErrorCode::ResourceNotFound | ErrorCode::StepNotAvailable | ErrorCode::NoStepsAvailable => {
        ErrorClass::NotFound
      }
      ErrorCode::StepRequired
      | ErrorCode::MissingBusinessEvent
      | ErrorCode::InvalidBusinessEvent
      | ErrorCode::SchemaValidation => ErrorClass::Validation,
      ErrorCode::Unauthorized => ErrorClass::Authorization,
      ErrorCode::DownstreamFailure => ErrorClass::Downstream,
      ErrorCode::WorkflowComposition
      | ErrorCode::SystemUnavailable
      | ErrorCode::MultiStepUnsupported
      | ErrorCode::SystemError => ErrorClass::System,
    }
  }
}

impl PartialEq<ErrorCode> for String {
  fn eq(&self, other: &ErrorCode) -> bool {
    self == other.as_str()
  }
}

/// Error details returned to callers.
///
/// Only built by the [`ResultClassifier`](crate::ResultClassifier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ErrorInfo {
  /// Taxonomy code, usually an [`ErrorCode`] id. Cache faults carry their own.
  pub id: String,
  /// User-facing message.
  pub text: String,
  /// Diagnostic message; removed when developer text is suppressed.
  pub developer_text: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub additional_details: Option<BTreeMap<String, String>>,
}

impl ErrorInfo {
  pub(crate) fn new(code: ErrorCode, text: impl Into<String>) -> Self {
    Self::with_id(code.as_str(), text)
  }

  pub(crate) fn with_id(id: impl Into<String>, text: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      text: text.into(),
      developer_text: None,
      additional_details: None,
    }
  }

  pub(crate) fn developer_text(mut self, text: impl Into<String>) -> Self {
    self.developer_text = Some(text.into());
    self
  }

  pub(crate) fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self
      .additional_details
      .get_or_insert_with(BTreeMap::new)
      .insert(key.into(), value.into());
    self
  }

  /// Class of this error. Ids outside the known taxonomy count as system errors.
  pub fn class(&self) -> ErrorClass {
    ErrorCode::from_id(&self.id)
      .map(ErrorCode::class)
      .unwrap_or(ErrorClass::System)
  }
}
