use async_trait::async_trait;
use procession_context::RequestContext;
use procession_policy::ProgramId;

use crate::error::ProgramFault;
use crate::program::{ProgramInput, ProgramOutput};

/// Executes a named program.
///
/// Implementations may block on I/O. The orchestrator never retries a
/// dispatch; retries belong inside the implementation.
#[async_trait]
pub trait ProgramExecutor: Send + Sync {
  async fn execute(
    &self,
    program_id: &ProgramId,
    input: ProgramInput,
    ctx: &RequestContext,
  ) -> Result<ProgramOutput, ProgramFault>;
}
