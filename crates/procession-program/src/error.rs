//! Program faults.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a business event was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessEventReason {
  /// Present but empty.
  Missing,
  /// Contains characters outside the identifier grammar.
  Malformed,
}

impl fmt::Display for BusinessEventReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BusinessEventReason::Missing => f.write_str("business event is missing"),
      BusinessEventReason::Malformed => f.write_str("business event is malformed"),
    }
  }
}

/// Faults a program can raise instead of producing output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgramFault {
  /// A downstream service called by the program failed.
  #[error("downstream service '{service}' responded with status {status}")]
  Downstream {
    service: String,
    status: u16,
    body: String,
  },

  /// The request's business event was rejected.
  #[error("{reason}: {event:?}")]
  InvalidBusinessEvent {
    reason: BusinessEventReason,
    event: Option<String>,
  },

  /// A child workflow invoked by this program tried to be multi-step.
  #[error("child program '{child}' is multi-step; nested workflows must be single-step")]
  Composition { child: String },

  /// A cache error surfaced while the program ran. Passed through verbatim.
  #[error("cache error {code}: {text}")]
  Cache {
    code: String,
    text: String,
    developer_text: Option<String>,
  },

  /// Any other failure.
  #[error("{type_name}: {message}")]
  Other { type_name: String, message: String },
}

impl ProgramFault {
  /// Wrap an arbitrary error, keeping its type name for diagnostics.
  pub fn other<E: std::error::Error>(err: &E) -> Self {
    ProgramFault::Other {
      type_name: std::any::type_name::<E>().to_string(),
      message: err.to_string(),
    }
  }
}
