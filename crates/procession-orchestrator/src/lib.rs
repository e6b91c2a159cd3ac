//! Procession Orchestrator
//!
//! Runs versioned, possibly multi-step policies on behalf of callers.
//!
//! A caller creates a process by naming a policy and a version. The
//! orchestrator resolves the version to the newest active patch, checks
//! authorization, parameters and business event, and dispatches the start
//! step to a [`ProgramExecutor`](procession_program::ProgramExecutor). When
//! the program reports further steps, the workflow state is stored under the
//! process ID and the caller resumes it later with one of those steps. Each
//! resume runs against the version pinned at creation.
//!
//! Every call returns an [`ExecutionOutcome`]: either results or an
//! [`ErrorInfo`] with a stable id, never both.

mod audit;
mod business_event;
mod classifier;
mod error;
mod metadata;
mod orchestrator;
mod outcome;
mod request;

pub use audit::{AuditEvent, AuditSink, ChannelAuditSink, NoopAuditSink, TracingAuditSink};
pub use business_event::validate_business_event;
pub use classifier::ResultClassifier;
pub use error::{ErrorClass, ErrorCode, ErrorInfo};
pub use metadata::{ProcessMetadata, ProcessMetadataProvider};
pub use orchestrator::{Collaborators, PolicyExecutionOrchestrator};
pub use outcome::{ExecutionOutcome, PolicyResults, PolicyStatus};
pub use request::ExecutionRequest;
