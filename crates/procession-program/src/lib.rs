//! Program execution for procession.
//!
//! A program is the executable form of one policy step. The orchestrator
//! dispatches to a [`ProgramExecutor`] with the pinned policy version, the
//! step, the caller's parameters and the prior state blob; the program answers
//! with its output, its new state and the steps the caller may take next.
//!
//! [`StaticProgramExecutor`] runs the step graph declared in a policy
//! definition and is used by the CLI and tests.

mod error;
mod executor;
mod program;
mod static_executor;

pub use error::{BusinessEventReason, ProgramFault};
pub use executor::ProgramExecutor;
pub use program::{ProgramInput, ProgramOutput};
pub use static_executor::{StaticProgramError, StaticProgramExecutor};
