//! The create/resume lifecycle.
//!
//! CREATE resolves a version, runs the pre-dispatch checks, dispatches the
//! start step and stores the resulting state when the workflow has more
//! steps. RESUME reads the stored state, picks the step to run, runs the same
//! checks against the pinned version, dispatches, and then overwrites or
//! deletes the stored state depending on whether the workflow finished.
//!
//! Authorization, schema validation and business-event validation all happen
//! before the program is dispatched, and the single state mutation of a call
//! happens after it. A rejected request therefore never touches the store.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::TimeDelta;
use procession_authz::{AuthorizationDecision, AuthorizationGate, FeatureFlagged, RuleAuthorizer};
use procession_config::{ConfigError, OrchestratorConfig, START_STEP};
use procession_context::{RequestContext, RequestType};
use procession_policy::{PolicyRegistry, PolicyVersion, StandardResolver, VersionResolver};
use procession_program::{ProgramExecutor, ProgramInput, ProgramOutput};
use procession_schema::{JsonSchemaValidator, RegistrySchemaSource, SchemaSource, SchemaValidator};
use procession_store::{CacheBackend, WorkflowState, WorkflowStateStore};
use tracing::{debug, info, instrument, warn};

use crate::audit::{AuditEvent, AuditSink, NoopAuditSink};
use crate::business_event::validate_business_event;
use crate::classifier::ResultClassifier;
use crate::error::ErrorInfo;
use crate::metadata::{ProcessMetadata, ProcessMetadataProvider};
use crate::outcome::{ExecutionOutcome, PolicyResults, PolicyStatus};
use crate::request::ExecutionRequest;

/// The services the orchestrator delegates to.
pub struct Collaborators {
  pub resolver: Arc<dyn VersionResolver>,
  pub authorizer: Arc<dyn AuthorizationGate>,
  pub validator: Arc<dyn SchemaValidator>,
  pub executor: Arc<dyn ProgramExecutor>,
  pub schema_source: Arc<dyn SchemaSource>,
}

/// Why a request was stopped before dispatch.
enum Rejection {
  /// Returned as a fault.
  Fault(ErrorInfo),
  /// Parameters failed schema validation; returned success-shaped.
  Invalid(ErrorInfo),
}

/// Runs policies on behalf of callers and tracks multi-step processes.
pub struct PolicyExecutionOrchestrator {
  resolver: Arc<dyn VersionResolver>,
  authorizer: Arc<dyn AuthorizationGate>,
  validator: Arc<dyn SchemaValidator>,
  executor: Arc<dyn ProgramExecutor>,
  schema_source: Arc<dyn SchemaSource>,
  store: Option<WorkflowStateStore>,
  metadata: Option<ProcessMetadataProvider>,
  classifier: ResultClassifier,
  audit: Arc<dyn AuditSink>,
}

impl PolicyExecutionOrchestrator {
  /// Create an orchestrator.
  ///
  /// Without a `store` only single-step policies can run: resumes and
  /// metadata queries fault with `MULTI_STEP_UNSUPPORTED`.
  pub fn new(
    collaborators: Collaborators,
    store: Option<WorkflowStateStore>,
    classifier: ResultClassifier,
  ) -> Self {
    let metadata = store.clone().map(ProcessMetadataProvider::new);
    Self {
      resolver: collaborators.resolver,
      authorizer: collaborators.authorizer,
      validator: collaborators.validator,
      executor: collaborators.executor,
      schema_source: collaborators.schema_source,
      store,
      metadata,
      classifier,
      audit: Arc::new(NoopAuditSink),
    }
  }

  /// Wire the standard collaborators around a policy registry.
  ///
  /// The workflow state store is built from `backend` unless the cache is
  /// disabled in `config`. Fails when the configured default TTL is not
  /// positive or does not fit a [`TimeDelta`].
  pub fn from_registry<R>(
    config: &OrchestratorConfig,
    registry: Arc<R>,
    executor: Arc<dyn ProgramExecutor>,
    backend: Option<Arc<dyn CacheBackend>>,
  ) -> Result<Self, ConfigError>
  where
    R: PolicyRegistry + 'static,
  {
    config.validate()?;
    let default_ttl = i64::try_from(config.default_ttl_secs)
      .ok()
      .and_then(TimeDelta::try_seconds)
      .ok_or(ConfigError::InvalidTtl {
        ttl_secs: config.default_ttl_secs,
      })?;

    let collaborators = Collaborators {
      resolver: Arc::new(StandardResolver::new(registry.clone())),
      authorizer: Arc::new(FeatureFlagged::<RuleAuthorizer>::from_config(
        &config.authorization,
      )),
      validator: Arc::new(JsonSchemaValidator::new(RegistrySchemaSource::new(
        registry.clone(),
      ))),
      executor,
      schema_source: Arc::new(RegistrySchemaSource::new(registry)),
    };

    let store = backend
      .filter(|_| config.cache.enabled)
      .map(|backend| WorkflowStateStore::new(backend, default_ttl));

    Ok(Self::new(
      collaborators,
      store,
      ResultClassifier::new(config.suppress_developer_text),
    ))
  }

  /// Record an audit event for every create and resume call.
  pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
    self.audit = audit;
    self
  }

  /// Whether multi-step policies are supported.
  pub fn supports_multi_step(&self) -> bool {
    self.store.is_some()
  }

  /// Dispatch on the request type.
  pub async fn execute(&self, request: ExecutionRequest) -> ExecutionOutcome {
    match request.request_type {
      RequestType::Create => self.create_process(request).await,
      RequestType::Resume => self.resume_process(request).await,
    }
  }

  /// Start a new process.
  #[instrument(
    name = "create_process",
    skip(self, request),
    fields(
      policy = %request.policy_name,
      version = %request.version_requested,
      client_id = %request.client_id,
    )
  )]
  pub async fn create_process(&self, request: ExecutionRequest) -> ExecutionOutcome {
    let started = Instant::now();
    let process_id = request
      .process_id
      .clone()
      .filter(|id| !id.is_empty())
      .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let ctx = request.context(&process_id, RequestType::Create);
    info!(request_id = %ctx.request_id, process_id = %process_id, "creating process");

    let outcome = self.create_inner(&request, &ctx).await;
    self.record(request, &ctx, &outcome, started);
    outcome
  }

  /// Continue an existing process.
  #[instrument(
    name = "resume_process",
    skip(self, request),
    fields(
      process_id = ?request.process_id,
      step = ?request.step,
      client_id = %request.client_id,
    )
  )]
  pub async fn resume_process(&self, request: ExecutionRequest) -> ExecutionOutcome {
    let started = Instant::now();
    let process_id = request.process_id.clone().unwrap_or_default();
    let ctx = request.context(&process_id, RequestType::Resume);
    info!(request_id = %ctx.request_id, "resuming process");

    let outcome = self.resume_inner(&request, &ctx).await;
    self.record(request, &ctx, &outcome, started);
    outcome
  }

  /// Current metadata of an in-flight process.
  #[instrument(name = "get_process_metadata", skip(self))]
  pub async fn get_process_metadata(&self, process_id: &str) -> Result<ProcessMetadata, ErrorInfo> {
    let Some(provider) = &self.metadata else {
      return Err(self.classifier.finalize(self.classifier.multi_step_unsupported(), false));
    };

    provider
      .get_metadata(process_id)
      .await
      .map_err(|e| self.classifier.finalize(self.classifier.store_failure(&e), false))
  }

  /// Parameter schema of a policy step.
  ///
  /// `version` is resolved like a create request's. An omitted step, or the
  /// literal start step, means the start step. A step the policy does not
  /// declare is `RESOURCE_NOT_FOUND`.
  #[instrument(name = "get_policy_metadata", skip(self))]
  pub async fn get_policy_metadata(
    &self,
    policy_name: &str,
    version: &str,
    step: Option<&str>,
  ) -> Result<serde_json::Value, ErrorInfo> {
    let resolved = self
      .resolver
      .resolve(policy_name, version)
      .await
      .map_err(|e| self.classifier.finalize(self.classifier.resolve_failure(&e), false))?;

    let program_id = resolved.program_id(normalize_step(step));
    match self.schema_source.get_schema(&program_id).await {
      Ok(Some(schema)) => Ok(schema),
      Ok(None) => {
        let info = self.classifier.program_not_found(&program_id.to_string());
        Err(self.classifier.finalize(info, false))
      }
      Err(e) => Err(self.classifier.finalize(self.classifier.schema_failure(&e), false)),
    }
  }

  async fn create_inner(&self, request: &ExecutionRequest, ctx: &RequestContext) -> ExecutionOutcome {
    let process_id = ctx.process_id.as_str();

    let version = match self
      .resolver
      .resolve(&request.policy_name, &request.version_requested)
      .await
    {
      Ok(version) => version,
      Err(e) => return self.fault(ctx, self.classifier.resolve_failure(&e), None),
    };
    debug!(policy_version = %version, "version resolved");

    if let Err(rejection) = self.preflight(request, ctx, &version, None).await {
      return self.reject(ctx, rejection, &version, None);
    }

    let input = ProgramInput {
      process_id: process_id.to_string(),
      step: None,
      parameters: request.parameters.clone(),
      state: None,
      steps_completed: Vec::new(),
    };
    let output = match self
      .executor
      .execute(&version.program_id(None), input, ctx)
      .await
    {
      Ok(output) => output,
      Err(fault) => return self.fault(ctx, self.classifier.classify_fault(&fault), None),
    };

    let state = WorkflowState {
      policy_name: request.policy_name.clone(),
      policy_version: version.clone(),
      state_blob: output.state.clone(),
      available_next_steps: output.available_next_steps.clone(),
      steps_completed: output.steps_completed.clone(),
      effective_next_step: output.effective_next_step.clone(),
    };

    if output.is_terminal() {
      info!(process_id = %process_id, "process completed in a single step");
      return success(process_id, version, output, None);
    }

    let Some(store) = &self.store else {
      warn!(
        process_id = %process_id,
        next_steps = ?output.available_next_steps,
        "policy has further steps but no workflow state store is configured"
      );
      return success(process_id, version, output, None);
    };

    if let Err(e) = store.put(process_id, &state, None).await {
      return self.fault(ctx, self.classifier.store_failure(&e), None);
    }

    info!(
      process_id = %process_id,
      next_steps = ?state.available_next_steps,
      "process created"
    );
    let metadata = self.written_metadata(process_id, &state).await;
    success(process_id, version, output, Some(metadata))
  }

  async fn resume_inner(&self, request: &ExecutionRequest, ctx: &RequestContext) -> ExecutionOutcome {
    let Some(store) = &self.store else {
      return self.fault(ctx, self.classifier.multi_step_unsupported(), None);
    };

    let process_id = ctx.process_id.as_str();
    if process_id.is_empty() {
      let info = self.classifier.process_not_found(process_id, "no process id supplied");
      return self.fault(ctx, info, None);
    }

    let stored = match store.get(process_id).await {
      Ok(stored) => stored,
      Err(e) => return self.fault(ctx, self.classifier.store_failure(&e), None),
    };

    if !request.policy_name.is_empty() && request.policy_name != stored.policy_name {
      let reason = format!(
        "process belongs to policy '{}', not '{}'",
        stored.policy_name, request.policy_name
      );
      let info = self.classifier.process_not_found(process_id, &reason);
      return self.fault(ctx, info, None);
    }

    if stored.is_complete() {
      return self
        .resume_fault(ctx, self.classifier.no_steps_available(process_id))
        .await;
    }

    let step = match self.select_step(request.requested_step(), &stored.available_next_steps) {
      Ok(step) => step,
      Err(info) => return self.resume_fault(ctx, info).await,
    };
    let dispatch_step = normalize_step(Some(step.as_str()));
    let version = stored.policy_version.clone();
    debug!(step = %step, policy_version = %version, "step resolved");

    if let Err(rejection) = self.preflight(request, ctx, &version, dispatch_step).await {
      let metadata = self.fault_metadata(process_id).await;
      return self.reject(ctx, rejection, &version, metadata);
    }

    let input = ProgramInput {
      process_id: process_id.to_string(),
      step: dispatch_step.map(str::to_string),
      parameters: request.parameters.clone(),
      state: Some(stored.state_blob.clone()),
      steps_completed: stored.steps_completed.clone(),
    };
    let output = match self
      .executor
      .execute(&version.program_id(dispatch_step), input, ctx)
      .await
    {
      Ok(output) => output,
      Err(fault) => {
        return self
          .resume_fault(ctx, self.classifier.classify_fault(&fault))
          .await;
      }
    };

    let mut steps_completed = stored.steps_completed.clone();
    steps_completed.extend(output.steps_completed.iter().cloned());
    let next = WorkflowState {
      policy_name: stored.policy_name.clone(),
      policy_version: version.clone(),
      state_blob: output.state.clone(),
      available_next_steps: output.available_next_steps.clone(),
      steps_completed,
      effective_next_step: output.effective_next_step.clone(),
    };

    if next.is_complete() {
      store.delete(process_id).await;
      info!(process_id = %process_id, steps_completed = ?next.steps_completed, "process completed");
      let metadata = ProcessMetadata::from_state(process_id, &next, None);
      return success(process_id, version, output, Some(metadata));
    }

    if let Err(e) = store.put(process_id, &next, None).await {
      return self
        .resume_fault(ctx, self.classifier.store_failure(&e))
        .await;
    }

    info!(
      process_id = %process_id,
      next_steps = ?next.available_next_steps,
      "process advanced"
    );
    let metadata = self.written_metadata(process_id, &next).await;
    success(process_id, version, output, Some(metadata))
  }

  /// Authorization, schema validation and business-event validation, in
  /// that order. Side-effect free.
  async fn preflight(
    &self,
    request: &ExecutionRequest,
    ctx: &RequestContext,
    version: &PolicyVersion,
    step: Option<&str>,
  ) -> Result<(), Rejection> {
    match self
      .authorizer
      .authorize(&ctx.client_id, &version.short_name, ctx.action(), ctx)
      .await
    {
      Ok(AuthorizationDecision::Allow) => {}
      Ok(AuthorizationDecision::Deny { reason }) => {
        return Err(Rejection::Fault(self.classifier.unauthorized(&reason)));
      }
      Err(e) => return Err(Rejection::Fault(self.classifier.authorization_failure(&e))),
    }

    let errors = self
      .validator
      .validate(version, step, &request.parameters, ctx)
      .await
      .map_err(|e| Rejection::Fault(self.classifier.schema_failure(&e)))?;
    if !errors.is_empty() {
      return Err(Rejection::Invalid(self.classifier.schema_invalid(&errors)));
    }

    validate_business_event(ctx.business_event.as_deref()).map_err(|reason| {
      Rejection::Fault(
        self
          .classifier
          .business_event(reason, ctx.business_event.as_deref()),
      )
    })
  }

  /// Pick the step to resume with.
  fn select_step(
    &self,
    requested: Option<&str>,
    available: &BTreeSet<String>,
  ) -> Result<String, ErrorInfo> {
    match requested {
      Some(step) if available.contains(step) => Ok(step.to_string()),
      Some(step) => Err(self.classifier.step_not_available(step, available)),
      None => match available.iter().next() {
        Some(only) if available.len() == 1 => Ok(only.clone()),
        _ => Err(self.classifier.step_required(available)),
      },
    }
  }

  fn reject(
    &self,
    ctx: &RequestContext,
    rejection: Rejection,
    version: &PolicyVersion,
    metadata: Option<ProcessMetadata>,
  ) -> ExecutionOutcome {
    match rejection {
      Rejection::Fault(info) => self.fault(ctx, info, metadata),
      Rejection::Invalid(info) => {
        let info = self.classifier.finalize(info, ctx.redact_developer_text);
        ExecutionOutcome::Success {
          results: PolicyResults {
            process_id: ctx.process_id.clone(),
            policy_version: version.clone(),
            policy_status: PolicyStatus::Invalid,
            output: serde_json::Value::Null,
            error_info: Some(info),
          },
          metadata,
        }
      }
    }
  }

  fn fault(
    &self,
    ctx: &RequestContext,
    info: ErrorInfo,
    metadata: Option<ProcessMetadata>,
  ) -> ExecutionOutcome {
    ExecutionOutcome::Fault {
      error: self.classifier.finalize(info, ctx.redact_developer_text),
      metadata,
    }
  }

  /// A resume fault, with best-effort metadata from the stored state.
  async fn resume_fault(&self, ctx: &RequestContext, info: ErrorInfo) -> ExecutionOutcome {
    let metadata = self.fault_metadata(&ctx.process_id).await;
    self.fault(ctx, info, metadata)
  }

  /// Metadata for a faulted resume. Never fails: errors are logged and the
  /// metadata omitted. A faulted resume suggests no next step.
  async fn fault_metadata(&self, process_id: &str) -> Option<ProcessMetadata> {
    let provider = self.metadata.as_ref()?;
    match provider.get_metadata(process_id).await {
      Ok(mut metadata) => {
        metadata.effective_next_step = None;
        Some(metadata)
      }
      Err(e) => {
        debug!(process_id = %process_id, error = %e, "metadata unavailable for fault");
        None
      }
    }
  }

  /// Metadata for state that was just written, falling back to the state
  /// itself when the store cannot be read back.
  async fn written_metadata(&self, process_id: &str, state: &WorkflowState) -> ProcessMetadata {
    let read = match &self.metadata {
      Some(provider) => provider.get_metadata(process_id).await,
      None => return ProcessMetadata::from_state(process_id, state, None),
    };
    read.unwrap_or_else(|e| {
      info!(process_id = %process_id, error = %e, "written state could not be read back");
      ProcessMetadata::from_state(process_id, state, None)
    })
  }

  fn record(
    &self,
    request: ExecutionRequest,
    ctx: &RequestContext,
    outcome: &ExecutionOutcome,
    started: Instant,
  ) {
    self.audit.record(AuditEvent {
      request_id: ctx.request_id.clone(),
      process_id: ctx.process_id.clone(),
      request_type: ctx.request_type,
      client_id: ctx.client_id.clone(),
      request,
      outcome: outcome.clone(),
      received_at: ctx.received_at,
      elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    });
  }
}

/// The start step is dispatched as "no step".
fn normalize_step(step: Option<&str>) -> Option<&str> {
  step.filter(|step| *step != START_STEP && !step.is_empty())
}

fn success(
  process_id: &str,
  version: PolicyVersion,
  output: ProgramOutput,
  metadata: Option<ProcessMetadata>,
) -> ExecutionOutcome {
  ExecutionOutcome::Success {
    results: PolicyResults {
      process_id: process_id.to_string(),
      policy_version: version,
      policy_status: PolicyStatus::Success,
      output: output.output,
      error_info: None,
    },
    metadata,
  }
}
