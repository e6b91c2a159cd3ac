//! Maps collaborator errors and program faults onto [`ErrorInfo`].

use std::collections::BTreeSet;

use procession_authz::AuthorizationError;
use procession_policy::ResolveError;
use procession_program::{BusinessEventReason, ProgramFault};
use procession_schema::{SchemaError, ValidationError};
use procession_store::StoreError;
use tracing::{error, info};

use crate::error::{ErrorCode, ErrorInfo};

/// Builds caller-facing errors and applies developer-text suppression.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultClassifier {
  suppress_developer_text: bool,
}

impl ResultClassifier {
  pub fn new(suppress_developer_text: bool) -> Self {
    Self {
      suppress_developer_text,
    }
  }

  /// Classify a fault raised by a program.
  pub fn classify_fault(&self, fault: &ProgramFault) -> ErrorInfo {
    match fault {
      ProgramFault::Downstream {
        service,
        status,
        body,
      } => ErrorInfo::new(
        ErrorCode::DownstreamFailure,
        "A downstream service failed to process the request",
      )
      .developer_text(format!("{service} responded with status {status}: {body}"))
      .detail("service", service.clone())
      .detail("status", status.to_string()),
      ProgramFault::InvalidBusinessEvent { reason, event } => {
        self.business_event(*reason, event.as_deref())
      }
      ProgramFault::Composition { child } => ErrorInfo::new(
        ErrorCode::WorkflowComposition,
        "The policy could not be executed",
      )
      .developer_text(fault.to_string())
      .detail("childProgram", child.clone()),
      ProgramFault::Cache {
        code,
        text,
        developer_text,
      } => {
        let info = ErrorInfo::with_id(code.clone(), text.clone());
        match developer_text {
          Some(dev) => info.developer_text(dev.clone()),
          None => info,
        }
      }
      ProgramFault::Other { type_name, message } => {
        ErrorInfo::new(ErrorCode::SystemError, "An unexpected error occurred")
          .developer_text(format!("{type_name}: {message}"))
      }
    }
  }

  pub fn business_event(&self, reason: BusinessEventReason, event: Option<&str>) -> ErrorInfo {
    let (code, text) = match reason {
      BusinessEventReason::Missing => (ErrorCode::MissingBusinessEvent, "Business event is required"),
      BusinessEventReason::Malformed => (ErrorCode::InvalidBusinessEvent, "Business event is invalid"),
    };
    ErrorInfo::new(code, text).developer_text(format!("{reason}: {:?}", event.unwrap_or_default()))
  }

  pub fn resolve_failure(&self, err: &ResolveError) -> ErrorInfo {
    if err.is_not_found() {
      ErrorInfo::new(ErrorCode::ResourceNotFound, "Policy not found").developer_text(err.to_string())
    } else {
      ErrorInfo::new(ErrorCode::SystemError, "An unexpected error occurred")
        .developer_text(err.to_string())
    }
  }

  /// Classify a workflow state error. Misses are not-found; everything else
  /// means the state could not be read or written.
  pub fn store_failure(&self, err: &StoreError) -> ErrorInfo {
    match err {
      StoreError::NotFound { .. } => {
        ErrorInfo::new(ErrorCode::ResourceNotFound, "Process not found")
          .developer_text(err.to_string())
      }
      StoreError::Unavailable { cause, .. } => ErrorInfo::new(
        ErrorCode::SystemUnavailable,
        "The system is temporarily unavailable",
      )
      .developer_text(err.to_string())
      .detail("cause", cause.code()),
      StoreError::InvalidTtl { .. } | StoreError::Serialization { .. } => {
        ErrorInfo::new(ErrorCode::SystemError, "An unexpected error occurred")
          .developer_text(err.to_string())
      }
    }
  }

  pub fn process_not_found(&self, process_id: &str, reason: &str) -> ErrorInfo {
    ErrorInfo::new(ErrorCode::ResourceNotFound, "Process not found")
      .developer_text(format!("process '{process_id}': {reason}"))
  }

  pub fn program_not_found(&self, program_id: &str) -> ErrorInfo {
    ErrorInfo::new(ErrorCode::ResourceNotFound, "Policy step not found")
      .developer_text(format!("program '{program_id}' is not declared"))
  }

  pub fn unauthorized(&self, reason: &str) -> ErrorInfo {
    ErrorInfo::new(
      ErrorCode::Unauthorized,
      "The client is not authorized for this request",
    )
    .developer_text(reason)
  }

  pub fn authorization_failure(&self, err: &AuthorizationError) -> ErrorInfo {
    ErrorInfo::new(
      ErrorCode::SystemUnavailable,
      "The system is temporarily unavailable",
    )
    .developer_text(err.to_string())
  }

  pub fn schema_failure(&self, err: &SchemaError) -> ErrorInfo {
    match err {
      SchemaError::ProgramNotFound { .. } => {
        ErrorInfo::new(ErrorCode::ResourceNotFound, "Policy not found")
          .developer_text(err.to_string())
      }
      _ => ErrorInfo::new(ErrorCode::SystemError, "An unexpected error occurred")
        .developer_text(err.to_string()),
    }
  }

  /// Error attached to an INVALID result when parameters fail validation.
  pub fn schema_invalid(&self, errors: &BTreeSet<ValidationError>) -> ErrorInfo {
    let developer_text = errors
      .iter()
      .map(|e| {
        if e.path.is_empty() {
          e.message.clone()
        } else {
          format!("{}: {}", e.path, e.message)
        }
      })
      .collect::<Vec<_>>()
      .join("; ");

    ErrorInfo::new(
      ErrorCode::SchemaValidation,
      "Request parameters failed validation",
    )
    .developer_text(developer_text)
    .detail("errorCount", errors.len().to_string())
  }

  pub fn no_steps_available(&self, process_id: &str) -> ErrorInfo {
    ErrorInfo::new(
      ErrorCode::NoStepsAvailable,
      "The process has no steps left to run",
    )
    .developer_text(format!("process '{process_id}' has no available next steps"))
  }

  pub fn step_not_available(&self, step: &str, available: &BTreeSet<String>) -> ErrorInfo {
    ErrorInfo::new(
      ErrorCode::StepNotAvailable,
      "The requested step is not available",
    )
    .developer_text(format!("step '{step}' is not one of {available:?}"))
    .detail("requestedStep", step)
    .detail("availableNextSteps", join(available))
  }

  pub fn step_required(&self, available: &BTreeSet<String>) -> ErrorInfo {
    ErrorInfo::new(ErrorCode::StepRequired, "A step must be specified")
      .developer_text(format!("choose one of {available:?}"))
      .detail("availableNextSteps", join(available))
  }

  pub fn multi_step_unsupported(&self) -> ErrorInfo {
    ErrorInfo::new(
      ErrorCode::MultiStepUnsupported,
      "Multi-step policies are not supported",
    )
    .developer_text("no workflow state store is configured")
  }

  /// Log an error and strip its developer text when suppression applies.
  ///
  /// Suppression applies when enabled globally or requested by the caller.
  /// The log line always keeps the full developer text.
  pub fn finalize(&self, mut info: ErrorInfo, redact_requested: bool) -> ErrorInfo {
    if info.class().is_server_fault() {
      error!(
        error_id = %info.id,
        text = %info.text,
        developer_text = ?info.developer_text,
        "request faulted"
      );
    } else {
      info!(
        error_id = %info.id,
        developer_text = ?info.developer_text,
        "request rejected"
      );
    }

    if self.suppress_developer_text || redact_requested {
      info.developer_text = None;
    }
    info
  }
}

fn join(steps: &BTreeSet<String>) -> String {
  steps.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
  use super::*;
  use procession_store::{FailureCause, MissCause};

  #[test]
  fn test_downstream_fault() {
    let classifier = ResultClassifier::default();
    let info = classifier.classify_fault(&ProgramFault::Downstream {
      service: "address-service".to_string(),
      status: 503,
      body: "upstream timeout".to_string(),
    });

    assert_eq!(info.id, ErrorCode::DownstreamFailure);
    let dev = info.developer_text.as_deref().unwrap();
    assert!(dev.contains("503"));
    assert!(dev.contains("upstream timeout"));
    let details = info.additional_details.unwrap();
    assert_eq!(details["status"], "503");
  }

  #[test]
  fn test_business_event_faults() {
    let classifier = ResultClassifier::default();
    let missing = classifier.classify_fault(&ProgramFault::InvalidBusinessEvent {
      reason: BusinessEventReason::Missing,
      event: Some(String::new()),
    });
    assert_eq!(missing.id, ErrorCode::MissingBusinessEvent);

    let malformed = classifier.classify_fault(&ProgramFault::InvalidBusinessEvent {
      reason: BusinessEventReason::Malformed,
      event: Some("bad event!".to_string()),
    });
    assert_eq!(malformed.id, ErrorCode::InvalidBusinessEvent);
  }

  #[test]
  fn test_cache_fault_passes_through() {
    let classifier = ResultClassifier::default();
    let info = classifier.classify_fault(&ProgramFault::Cache {
      code: "CACHE_WRITE_REJECTED".to_string(),
      text: "Cache rejected the write".to_string(),
      developer_text: Some("slot 7 read-only".to_string()),
    });

    assert_eq!(info.id, "CACHE_WRITE_REJECTED");
    assert_eq!(info.text, "Cache rejected the write");
    assert_eq!(info.developer_text.as_deref(), Some("slot 7 read-only"));
  }

  #[test]
  fn test_other_fault_keeps_type_and_message() {
    let classifier = ResultClassifier::default();
    let info = classifier.classify_fault(&ProgramFault::Other {
      type_name: "my::Error".to_string(),
      message: "boom".to_string(),
    });

    assert_eq!(info.id, ErrorCode::SystemError);
    assert_eq!(info.developer_text.as_deref(), Some("my::Error: boom"));
  }

  #[test]
  fn test_composition_fault() {
    let classifier = ResultClassifier::default();
    let info = classifier.classify_fault(&ProgramFault::Composition {
      child: "address_1.0.0".to_string(),
    });
    assert_eq!(info.id, ErrorCode::WorkflowComposition);
  }

  #[test]
  fn test_store_failures() {
    let classifier = ResultClassifier::default();
    let miss = classifier.store_failure(&StoreError::NotFound {
      process_id: "proc-1".to_string(),
      cause: MissCause::Expired,
    });
    assert_eq!(miss.id, ErrorCode::ResourceNotFound);

    let failure = classifier.store_failure(&StoreError::Unavailable {
      process_id: "proc-1".to_string(),
      cause: FailureCause::Timeout,
    });
    assert_eq!(failure.id, ErrorCode::SystemUnavailable);
  }

  #[test]
  fn test_suppression() {
    let info = || {
      ResultClassifier::default().classify_fault(&ProgramFault::Other {
        type_name: "my::Error".to_string(),
        message: "boom".to_string(),
      })
    };

    let kept = ResultClassifier::new(false).finalize(info(), false);
    assert!(kept.developer_text.is_some());

    let global = ResultClassifier::new(true).finalize(info(), false);
    assert!(global.developer_text.is_none());
    assert_eq!(global.id, ErrorCode::SystemError);

    let per_call = ResultClassifier::new(false).finalize(info(), true);
    assert!(per_call.developer_text.is_none());
  }
}
