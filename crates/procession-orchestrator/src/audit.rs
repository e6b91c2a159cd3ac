//! Audit events and sinks.
//!
//! One [`AuditEvent`] is recorded after every create or resume call,
//! whatever its outcome. Sinks are fire-and-forget: they cannot fail the
//! request and must not block it.

use chrono::{DateTime, Utc};
use procession_context::RequestType;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::outcome::ExecutionOutcome;
use crate::request::ExecutionRequest;

/// Record of one completed call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
  pub request_id: String,
  pub process_id: String,
  pub request_type: RequestType,
  pub client_id: String,
  pub request: ExecutionRequest,
  pub outcome: ExecutionOutcome,
  pub received_at: DateTime<Utc>,
  pub elapsed_ms: u64,
}

/// Trait for receiving audit events.
pub trait AuditSink: Send + Sync {
  fn record(&self, event: AuditEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
  fn record(&self, _event: AuditEvent) {}
}

/// Sends events to an unbounded channel for asynchronous consumption.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
  sender: mpsc::UnboundedSender<AuditEvent>,
}

impl ChannelAuditSink {
  pub fn new(sender: mpsc::UnboundedSender<AuditEvent>) -> Self {
    Self { sender }
  }
}

impl AuditSink for ChannelAuditSink {
  fn record(&self, event: AuditEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

/// Writes a structured log line per event.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
  fn record(&self, event: AuditEvent) {
    info!(
      target: "procession::audit",
      request_id = %event.request_id,
      process_id = %event.process_id,
      request_type = ?event.request_type,
      client_id = %event.client_id,
      policy = %event.request.policy_name,
      success = event.outcome.is_success(),
      error_id = event.outcome.error_id(),
      elapsed_ms = event.elapsed_ms,
      "request audited"
    );
  }
}
