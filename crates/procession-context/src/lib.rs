//! Request context for procession.
//!
//! A [`RequestContext`] is built once per inbound call and passed by reference
//! to every collaborator the orchestrator invokes (authorization, schema
//! validation, program execution, audit). Nothing is carried in thread-local
//! or task-local state, so collaborators that fan work out to other tasks
//! simply clone the context.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
  Create,
  Resume,
}

impl RequestType {
  /// The authorization action this request type is checked against.
  pub fn action(self) -> Action {
    match self {
      RequestType::Create => Action::Initiate,
      RequestType::Resume => Action::Resume,
    }
  }
}

/// Authorization action, derived 1:1 from [`RequestType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
  Initiate,
  Resume,
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Action::Initiate => f.write_str("INITIATE"),
      Action::Resume => f.write_str("RESUME"),
    }
  }
}

/// Immutable context for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
  /// Unique ID for this call, used to correlate logs and audit events.
  pub request_id: String,
  pub process_id: String,
  pub request_type: RequestType,
  pub client_id: String,
  pub business_event: Option<String>,
  /// Downstream calls should be substituted with mocks.
  pub mock_mode: bool,
  /// Per-call request to strip developer text from errors.
  pub redact_developer_text: bool,
  pub received_at: DateTime<Utc>,
}

impl RequestContext {
  pub fn new(
    process_id: impl Into<String>,
    request_type: RequestType,
    client_id: impl Into<String>,
  ) -> Self {
    Self {
      request_id: uuid::Uuid::new_v4().to_string(),
      process_id: process_id.into(),
      request_type,
      client_id: client_id.into(),
      business_event: None,
      mock_mode: false,
      redact_developer_text: false,
      received_at: Utc::now(),
    }
  }

  pub fn with_business_event(mut self, business_event: Option<String>) -> Self {
    self.business_event = business_event;
    self
  }

  pub fn with_mock_mode(mut self, mock_mode: bool) -> Self {
    self.mock_mode = mock_mode;
    self
  }

  pub fn with_redact_developer_text(mut self, redact: bool) -> Self {
    self.redact_developer_text = redact;
    self
  }

  pub fn action(&self) -> Action {
    self.request_type.action()
  }
}
