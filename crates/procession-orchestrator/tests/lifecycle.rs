//! End-to-end create/resume lifecycle tests against in-memory collaborators.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use procession_config::{
  AccessRule, AuthorizationConfig, ConfigError, OrchestratorConfig, PolicyDef, RuleAction,
  StepDef,
};
use procession_context::RequestContext;
use procession_orchestrator::{
  AuditEvent, ChannelAuditSink, ErrorCode, ExecutionOutcome, ExecutionRequest,
  PolicyExecutionOrchestrator, PolicyStatus,
};
use procession_policy::{InMemoryPolicyRegistry, PolicyRegistry, PolicyVersion, ProgramId};
use procession_program::{ProgramExecutor, ProgramFault, ProgramInput, ProgramOutput};
use procession_store::{
  CacheBackend, FailureCause, InMemoryCache, WorkflowState, WorkflowStateStore,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;

/// Executor driven by a step graph, with optional per-step faults.
#[derive(Default)]
struct ScriptedExecutor {
  next_steps: HashMap<String, Vec<String>>,
  faults: Mutex<HashMap<String, ProgramFault>>,
  suggestions: Mutex<HashMap<String, String>>,
  calls: Mutex<Vec<(String, ProgramInput)>>,
}

impl ScriptedExecutor {
  fn new(graph: &[(&str, &[&str])]) -> Self {
    Self {
      next_steps: graph
        .iter()
        .map(|(step, next)| {
          (
            step.to_string(),
            next.iter().map(|s| s.to_string()).collect(),
          )
        })
        .collect(),
      ..Default::default()
    }
  }

  fn fail_on(&self, step: &str, fault: ProgramFault) {
    self.faults.lock().unwrap().insert(step.to_string(), fault);
  }

  /// Report `next` as the effective next step whenever `step` runs.
  fn suggest(&self, step: &str, next: &str) {
    self
      .suggestions
      .lock()
      .unwrap()
      .insert(step.to_string(), next.to_string());
  }

  fn calls(&self) -> Vec<(String, ProgramInput)> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl ProgramExecutor for ScriptedExecutor {
  async fn execute(
    &self,
    program_id: &ProgramId,
    input: ProgramInput,
    _ctx: &RequestContext,
  ) -> Result<ProgramOutput, ProgramFault> {
    self
      .calls
      .lock()
      .unwrap()
      .push((program_id.to_string(), input.clone()));

    let step = input.step.clone().unwrap_or_else(|| "start".to_string());
    if let Some(fault) = self.faults.lock().unwrap().get(&step) {
      return Err(fault.clone());
    }

    let mut state = match input.state {
      Some(Value::Object(map)) => map,
      _ => serde_json::Map::new(),
    };
    state.insert(step.clone(), Value::Object(input.parameters.clone()));

    Ok(ProgramOutput {
      output: json!({ "ran": step }),
      state: Value::Object(state),
      available_next_steps: self
        .next_steps
        .get(&step)
        .map(|next| next.iter().cloned().collect())
        .unwrap_or_default(),
      effective_next_step: self.suggestions.lock().unwrap().get(&step).cloned(),
      steps_completed: if input.step.is_some() {
        vec![step]
      } else {
        vec![]
      },
    })
  }
}

/// Backend whose every call fails with the same cause.
struct FailingBackend(FailureCause);

#[async_trait]
impl CacheBackend for FailingBackend {
  async fn get(&self, _key: &str) -> String {
    self.0.sentinel()
  }

  async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> String {
    self.0.sentinel()
  }

  async fn delete(&self, _key: &str) -> String {
    self.0.sentinel()
  }

  async fn expiry(&self, _key: &str) -> String {
    self.0.sentinel()
  }
}

/// In-memory backend whose writes and deletes can be made to fail.
#[derive(Default)]
struct FlakyBackend {
  inner: InMemoryCache,
  fail_set: AtomicBool,
  fail_delete: AtomicBool,
}

#[async_trait]
impl CacheBackend for FlakyBackend {
  async fn get(&self, key: &str) -> String {
    self.inner.get(key).await
  }

  async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> String {
    if self.fail_set.load(Ordering::SeqCst) {
      return FailureCause::WriteRejected.sentinel();
    }
    self.inner.set(key, value, ttl).await
  }

  async fn delete(&self, key: &str) -> String {
    if self.fail_delete.load(Ordering::SeqCst) {
      return FailureCause::Unavailable.sentinel();
    }
    self.inner.delete(key).await
  }

  async fn expiry(&self, key: &str) -> String {
    self.inner.expiry(key).await
  }
}

fn policy(name: &str, version: &str, graph: &[(&str, &[&str], Value)]) -> PolicyDef {
  PolicyDef {
    name: name.to_string(),
    version: version.to_string(),
    active: true,
    description: None,
    steps: graph
      .iter()
      .map(|(step, next, schema)| {
        (
          step.to_string(),
          StepDef {
            schema: schema.clone(),
            next_steps: next.iter().map(|s| s.to_string()).collect(),
            effective_next_step: None,
          },
        )
      })
      .collect(),
  }
}

fn kyc(version: &str) -> PolicyDef {
  policy(
    "kyc",
    version,
    &[
      (
        "start",
        &["verify-address"],
        json!({
          "type": "object",
          "properties": { "name": { "type": "string" } },
          "required": ["name"],
        }),
      ),
      ("verify-address", &[], json!({})),
    ],
  )
}

fn survey() -> PolicyDef {
  policy(
    "survey",
    "2.1.0",
    &[
      ("start", &["a", "b"], json!({})),
      ("a", &[], json!({})),
      ("b", &[], json!({})),
    ],
  )
}

fn retry() -> PolicyDef {
  policy("retry", "1.0.0", &[("start", &["start"], json!({}))])
}

struct Harness {
  registry: Arc<InMemoryPolicyRegistry>,
  executor: Arc<ScriptedExecutor>,
  store: WorkflowStateStore,
  orchestrator: PolicyExecutionOrchestrator,
  audit: mpsc::UnboundedReceiver<AuditEvent>,
}

fn harness(config: OrchestratorConfig) -> Harness {
  let registry = Arc::new(InMemoryPolicyRegistry::with_policies([
    kyc("1.0.0"),
    survey(),
    retry(),
  ]));
  let executor = Arc::new(ScriptedExecutor::new(&[
    ("start", &["verify-address"]),
    ("verify-address", &[]),
  ]));
  harness_with(config, registry, executor)
}

fn harness_with(
  config: OrchestratorConfig,
  registry: Arc<InMemoryPolicyRegistry>,
  executor: Arc<ScriptedExecutor>,
) -> Harness {
  harness_on(config, registry, executor, Arc::new(InMemoryCache::new()))
}

fn harness_on(
  config: OrchestratorConfig,
  registry: Arc<InMemoryPolicyRegistry>,
  executor: Arc<ScriptedExecutor>,
  cache: Arc<dyn CacheBackend>,
) -> Harness {
  let store = WorkflowStateStore::new(cache.clone(), TimeDelta::minutes(30));
  let (tx, rx) = mpsc::unbounded_channel();
  let orchestrator =
    PolicyExecutionOrchestrator::from_registry(&config, registry.clone(), executor.clone(), Some(cache))
      .unwrap()
      .with_audit_sink(Arc::new(ChannelAuditSink::new(tx)));

  Harness {
    registry,
    executor,
    store,
    orchestrator,
    audit: rx,
  }
}

fn create_kyc(process_id: &str) -> ExecutionRequest {
  ExecutionRequest::create("kyc", "1.0", "client-a")
    .with_process_id(process_id)
    .with_parameters(json!({ "name": "Ada" }))
}

fn assert_fault(outcome: &ExecutionOutcome, code: ErrorCode) {
  assert_eq!(
    outcome.error_id(),
    Some(code.as_str()),
    "unexpected outcome: {:?}",
    outcome
  );
}

#[tokio::test]
async fn test_kyc_create_then_resume_to_completion() {
  let h = harness(OrchestratorConfig::default());

  let created = h.orchestrator.create_process(create_kyc("proc-1")).await;
  let results = created.results().unwrap();
  assert_eq!(results.policy_status, PolicyStatus::Success);
  assert_eq!(results.policy_version.full_name, "kyc_1.0.0");
  let metadata = created.metadata().unwrap();
  assert_eq!(
    metadata.available_next_steps,
    BTreeSet::from(["verify-address".to_string()])
  );
  assert!(metadata.steps_completed.is_empty());
  assert_eq!(metadata.effective_next_step, None);
  assert!(metadata.expires_at.is_some());

  let stored = h.store.get("proc-1").await.unwrap();
  assert_eq!(stored.state_blob["start"]["name"], "Ada");

  let resumed = h
    .orchestrator
    .resume_process(
      ExecutionRequest::resume("proc-1", "kyc", "client-a")
        .with_step("verify-address")
        .with_parameters(json!({ "street": "Main St" })),
    )
    .await;
  assert!(resumed.is_success(), "unexpected outcome: {:?}", resumed);
  let metadata = resumed.metadata().unwrap();
  assert_eq!(metadata.steps_completed, vec!["verify-address".to_string()]);
  assert!(metadata.available_next_steps.is_empty());

  assert!(h.store.get("proc-1").await.unwrap_err().is_miss());

  // Resume after terminal is not-found.
  let again = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "kyc", "client-a"))
    .await;
  assert_fault(&again, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_resume_passes_prior_state_to_program() {
  let h = harness(OrchestratorConfig::default());
  h.orchestrator.create_process(create_kyc("proc-1")).await;

  h.orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "kyc", "client-a").with_step("verify-address"))
    .await;

  let calls = h.executor.calls();
  assert_eq!(calls.len(), 2);
  assert_eq!(calls[0].0, "kyc_1.0.0");
  assert_eq!(calls[0].1.step, None);
  assert_eq!(calls[1].0, "kyc_1.0.0-verify-address");
  assert_eq!(calls[1].1.state.as_ref().unwrap()["start"]["name"], "Ada");
}

#[tokio::test]
async fn test_resume_unknown_process() {
  let h = harness(OrchestratorConfig::default());

  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("nope", "kyc", "client-a"))
    .await;

  assert_fault(&outcome, ErrorCode::ResourceNotFound);
  assert!(outcome.metadata().is_none());
  assert!(h.executor.calls().is_empty());
}

#[tokio::test]
async fn test_resume_with_other_policy_name() {
  let h = harness(OrchestratorConfig::default());
  h.orchestrator.create_process(create_kyc("proc-1")).await;

  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "survey", "client-a"))
    .await;

  assert_fault(&outcome, ErrorCode::ResourceNotFound);
  assert_eq!(h.executor.calls().len(), 1);
}

#[tokio::test]
async fn test_unknown_policy_or_version() {
  let h = harness(OrchestratorConfig::default());

  let outcome = h
    .orchestrator
    .create_process(ExecutionRequest::create("missing", "1", "client-a"))
    .await;
  assert_fault(&outcome, ErrorCode::ResourceNotFound);

  let outcome = h
    .orchestrator
    .create_process(ExecutionRequest::create("kyc", "2.0", "client-a"))
    .await;
  assert_fault(&outcome, ErrorCode::ResourceNotFound);

  let outcome = h
    .orchestrator
    .create_process(ExecutionRequest::create("kyc", "one", "client-a"))
    .await;
  assert_fault(&outcome, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_business_event_missing_and_malformed_are_distinct() {
  let h = harness(OrchestratorConfig::default());

  let empty = h
    .orchestrator
    .create_process(create_kyc("proc-1").with_business_event(""))
    .await;
  assert_fault(&empty, ErrorCode::MissingBusinessEvent);

  let malformed = h
    .orchestrator
    .create_process(create_kyc("proc-2").with_business_event("bad event!"))
    .await;
  assert_fault(&malformed, ErrorCode::InvalidBusinessEvent);

  let fine = h
    .orchestrator
    .create_process(create_kyc("proc-3").with_business_event("onboarding.retail_v2"))
    .await;
  assert!(fine.is_success());

  assert_eq!(h.executor.calls().len(), 1);
  assert!(h.store.get("proc-1").await.unwrap_err().is_miss());
  assert!(h.store.get("proc-2").await.unwrap_err().is_miss());
}

fn authorization(rules: Vec<AccessRule>) -> OrchestratorConfig {
  OrchestratorConfig {
    authorization: AuthorizationConfig {
      enabled: true,
      rules,
    },
    ..Default::default()
  }
}

#[tokio::test]
async fn test_denied_create_is_side_effect_free() {
  let h = harness(authorization(vec![AccessRule {
    subject: "client-a".to_string(),
    resource: "kyc".to_string(),
    actions: vec![RuleAction::Initiate, RuleAction::Resume],
  }]));

  let outcome = h
    .orchestrator
    .create_process(
      ExecutionRequest::create("kyc", "1", "client-b")
        .with_process_id("proc-1")
        .with_parameters(json!({ "name": "Ada" })),
    )
    .await;

  assert_fault(&outcome, ErrorCode::Unauthorized);
  assert!(h.executor.calls().is_empty());
  assert!(h.store.get("proc-1").await.unwrap_err().is_miss());
}

#[tokio::test]
async fn test_denied_resume_leaves_state_untouched() {
  let h = harness(authorization(vec![AccessRule {
    subject: "client-a".to_string(),
    resource: "*".to_string(),
    actions: vec![RuleAction::Initiate],
  }]));

  assert!(
    h.orchestrator
      .create_process(create_kyc("proc-1"))
      .await
      .is_success()
  );
  let before = h.store.get("proc-1").await.unwrap();

  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "kyc", "client-a"))
    .await;

  assert_fault(&outcome, ErrorCode::Unauthorized);
  assert_eq!(h.store.get("proc-1").await.unwrap(), before);
  assert_eq!(h.executor.calls().len(), 1);

  let metadata = outcome.metadata().unwrap();
  assert_eq!(metadata.effective_next_step, None);
  assert_eq!(
    metadata.available_next_steps,
    BTreeSet::from(["verify-address".to_string()])
  );
}

#[tokio::test]
async fn test_schema_failure_is_success_shaped_and_side_effect_free() {
  let h = harness(OrchestratorConfig::default());

  let outcome = h
    .orchestrator
    .create_process(
      ExecutionRequest::create("kyc", "1.0", "client-a")
        .with_process_id("proc-1")
        .with_parameters(json!({ "name": 42 })),
    )
    .await;

  let results = outcome.results().unwrap();
  assert_eq!(results.policy_status, PolicyStatus::Invalid);
  assert_eq!(results.output, Value::Null);
  let error = results.error_info.as_ref().unwrap();
  assert_eq!(error.id, ErrorCode::SchemaValidation);
  assert!(error.developer_text.as_deref().unwrap().contains("/name"));

  assert!(h.executor.calls().is_empty());
  assert!(h.store.get("proc-1").await.unwrap_err().is_miss());
}

#[tokio::test]
async fn test_version_pinned_across_resume() {
  let h = harness(OrchestratorConfig::default());
  h.orchestrator.create_process(create_kyc("proc-1")).await;

  h.registry.install(kyc("1.0.1")).await.unwrap();
  h.registry.set_active("kyc", "1.0.0", false).await.unwrap();

  let resumed = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "kyc", "client-a"))
    .await;
  assert_eq!(resumed.results().unwrap().policy_version.full_name, "kyc_1.0.0");

  let created = h.orchestrator.create_process(create_kyc("proc-2")).await;
  assert_eq!(created.results().unwrap().policy_version.full_name, "kyc_1.0.1");

  let programs: Vec<String> = h.executor.calls().into_iter().map(|(id, _)| id).collect();
  assert_eq!(
    programs,
    vec![
      "kyc_1.0.0".to_string(),
      "kyc_1.0.0-verify-address".to_string(),
      "kyc_1.0.1".to_string(),
    ]
  );
}

#[tokio::test]
async fn test_step_containment_and_auto_resolution() {
  let registry = Arc::new(InMemoryPolicyRegistry::with_policies([survey()]));
  let executor = Arc::new(ScriptedExecutor::new(&[("start", &["a", "b"])]));
  let h = harness_with(OrchestratorConfig::default(), registry, executor);

  let created = h
    .orchestrator
    .create_process(ExecutionRequest::create("survey", "2", "client-a").with_process_id("proc-1"))
    .await;
  assert!(created.is_success());

  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "survey", "client-a").with_step("c"))
    .await;
  assert_fault(&outcome, ErrorCode::StepNotAvailable);
  assert_eq!(outcome.metadata().unwrap().available_next_steps.len(), 2);

  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "survey", "client-a"))
    .await;
  assert_fault(&outcome, ErrorCode::StepRequired);
  assert_eq!(h.executor.calls().len(), 1);

  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "survey", "client-a").with_step("b"))
    .await;
  assert!(outcome.is_success());
  assert_eq!(h.executor.calls()[1].0, "survey_2.1.0-b");
}

#[tokio::test]
async fn test_single_next_step_is_selected_automatically() {
  let h = harness(OrchestratorConfig::default());
  h.orchestrator.create_process(create_kyc("proc-1")).await;

  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "kyc", "client-a"))
    .await;

  assert!(outcome.is_success());
  assert_eq!(
    h.executor.calls()[1].1.step.as_deref(),
    Some("verify-address")
  );
}

#[tokio::test]
async fn test_start_step_is_dispatched_as_no_step() {
  let registry = Arc::new(InMemoryPolicyRegistry::with_policies([retry()]));
  let executor = Arc::new(ScriptedExecutor::new(&[("start", &["start"])]));
  let h = harness_with(OrchestratorConfig::default(), registry, executor);

  h.orchestrator
    .create_process(ExecutionRequest::create("retry", "1", "client-a").with_process_id("proc-1"))
    .await;
  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "retry", "client-a").with_step("start"))
    .await;

  assert!(outcome.is_success());
  let calls = h.executor.calls();
  assert_eq!(calls[1].0, "retry_1.0.0");
  assert_eq!(calls[1].1.step, None);
}

#[tokio::test]
async fn test_no_store_means_single_step_only() {
  let registry = Arc::new(InMemoryPolicyRegistry::with_policies([kyc("1.0.0")]));
  let executor = Arc::new(ScriptedExecutor::new(&[("start", &["verify-address"])]));
  let orchestrator = PolicyExecutionOrchestrator::from_registry(
    &OrchestratorConfig::default(),
    registry,
    executor,
    None,
  )
  .unwrap();
  assert!(!orchestrator.supports_multi_step());

  let created = orchestrator.create_process(create_kyc("proc-1")).await;
  assert!(created.is_success());
  assert!(created.metadata().is_none());

  let resumed = orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "kyc", "client-a"))
    .await;
  assert_fault(&resumed, ErrorCode::MultiStepUnsupported);

  let metadata = orchestrator.get_process_metadata("proc-1").await;
  assert_eq!(metadata.unwrap_err().id, ErrorCode::MultiStepUnsupported);
}

#[tokio::test]
async fn test_disabled_cache_config_drops_store() {
  let registry = Arc::new(InMemoryPolicyRegistry::with_policies([kyc("1.0.0")]));
  let executor = Arc::new(ScriptedExecutor::default());
  let mut config = OrchestratorConfig::default();
  config.cache.enabled = false;

  let orchestrator = PolicyExecutionOrchestrator::from_registry(
    &config,
    registry,
    executor,
    Some(Arc::new(InMemoryCache::new())),
  )
  .unwrap();
  assert!(!orchestrator.supports_multi_step());
}

#[tokio::test]
async fn test_cache_failure_is_system_unavailable() {
  let registry = Arc::new(InMemoryPolicyRegistry::with_policies([kyc("1.0.0")]));
  let executor = Arc::new(ScriptedExecutor::new(&[("start", &["verify-address"])]));
  let orchestrator = PolicyExecutionOrchestrator::from_registry(
    &OrchestratorConfig::default(),
    registry,
    executor,
    Some(Arc::new(FailingBackend(FailureCause::Timeout))),
  )
  .unwrap();

  let created = orchestrator.create_process(create_kyc("proc-1")).await;
  assert_fault(&created, ErrorCode::SystemUnavailable);

  let resumed = orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "kyc", "client-a"))
    .await;
  assert_fault(&resumed, ErrorCode::SystemUnavailable);
  assert!(resumed.metadata().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_expired_process_is_not_found() {
  let config = OrchestratorConfig {
    default_ttl_secs: 60,
    ..Default::default()
  };
  let h = harness(config);
  h.orchestrator.create_process(create_kyc("proc-1")).await;

  tokio::time::advance(Duration::from_secs(61)).await;

  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "kyc", "client-a"))
    .await;
  assert_fault(&outcome, ErrorCode::ResourceNotFound);

  let metadata = h.orchestrator.get_process_metadata("proc-1").await;
  assert_eq!(metadata.unwrap_err().id, ErrorCode::ResourceNotFound);
}

fn downstream_fault() -> ProgramFault {
  ProgramFault::Downstream {
    service: "address-service".to_string(),
    status: 503,
    body: "upstream timeout".to_string(),
  }
}

#[tokio::test]
async fn test_program_fault_keeps_state_and_reports_metadata() {
  let h = harness(OrchestratorConfig::default());
  h.executor.suggest("start", "verify-address");
  let created = h.orchestrator.create_process(create_kyc("proc-1")).await;
  assert_eq!(
    created.metadata().unwrap().effective_next_step.as_deref(),
    Some("verify-address")
  );
  h.executor.fail_on("verify-address", downstream_fault());

  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "kyc", "client-a"))
    .await;

  assert_fault(&outcome, ErrorCode::DownstreamFailure);
  let error = outcome.error().unwrap();
  assert!(error.developer_text.as_deref().unwrap().contains("503"));

  let metadata = outcome.metadata().unwrap();
  assert_eq!(metadata.effective_next_step, None);
  assert!(metadata.available_next_steps.contains("verify-address"));

  let stored = h.store.get("proc-1").await.unwrap();
  assert_eq!(stored.effective_next_step.as_deref(), Some("verify-address"));
}

#[tokio::test]
async fn test_resume_of_state_without_next_steps() {
  let h = harness(OrchestratorConfig::default());
  let state = WorkflowState {
    policy_name: "kyc".to_string(),
    policy_version: PolicyVersion::new("kyc", 1, 0, 0),
    state_blob: json!({}),
    available_next_steps: BTreeSet::new(),
    steps_completed: vec!["verify-address".to_string()],
    effective_next_step: Some("verify-address".to_string()),
  };
  h.store.put("proc-1", &state, None).await.unwrap();

  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "kyc", "client-a"))
    .await;

  assert_fault(&outcome, ErrorCode::NoStepsAvailable);
  let metadata = outcome.metadata().unwrap();
  assert!(metadata.available_next_steps.is_empty());
  assert_eq!(metadata.effective_next_step, None);
  assert!(h.executor.calls().is_empty());
}

#[tokio::test]
async fn test_terminal_resume_succeeds_when_delete_fails() {
  let backend = Arc::new(FlakyBackend::default());
  let registry = Arc::new(InMemoryPolicyRegistry::with_policies([kyc("1.0.0")]));
  let executor = Arc::new(ScriptedExecutor::new(&[
    ("start", &["verify-address"]),
    ("verify-address", &[]),
  ]));
  let h = harness_on(
    OrchestratorConfig::default(),
    registry,
    executor,
    backend.clone(),
  );
  h.orchestrator.create_process(create_kyc("proc-1")).await;
  backend.fail_delete.store(true, Ordering::SeqCst);

  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "kyc", "client-a"))
    .await;

  assert!(outcome.is_success(), "unexpected outcome: {:?}", outcome);
  let metadata = outcome.metadata().unwrap();
  assert!(metadata.available_next_steps.is_empty());
  assert_eq!(metadata.steps_completed, vec!["verify-address".to_string()]);
}

#[tokio::test]
async fn test_resume_write_failure_after_dispatch() {
  let backend = Arc::new(FlakyBackend::default());
  let registry = Arc::new(InMemoryPolicyRegistry::with_policies([survey()]));
  let executor = Arc::new(ScriptedExecutor::new(&[("start", &["a"]), ("a", &["b"])]));
  let h = harness_on(
    OrchestratorConfig::default(),
    registry,
    executor,
    backend.clone(),
  );
  h.orchestrator
    .create_process(ExecutionRequest::create("survey", "2", "client-a").with_process_id("proc-1"))
    .await;
  let before = h.store.get("proc-1").await.unwrap();
  backend.fail_set.store(true, Ordering::SeqCst);

  let outcome = h
    .orchestrator
    .resume_process(ExecutionRequest::resume("proc-1", "survey", "client-a").with_step("a"))
    .await;

  assert_fault(&outcome, ErrorCode::SystemUnavailable);
  assert_eq!(h.executor.calls().len(), 2);
  let metadata = outcome.metadata().unwrap();
  assert_eq!(
    metadata.available_next_steps,
    BTreeSet::from(["a".to_string()])
  );
  assert_eq!(metadata.effective_next_step, None);
  assert_eq!(h.store.get("proc-1").await.unwrap(), before);
}

#[tokio::test]
async fn test_invalid_default_ttl_is_rejected_at_construction() {
  for ttl_secs in [0, 10_000_000_000_000_000] {
    let registry = Arc::new(InMemoryPolicyRegistry::with_policies([kyc("1.0.0")]));
    let executor = Arc::new(ScriptedExecutor::default());
    let config = OrchestratorConfig {
      default_ttl_secs: ttl_secs,
      ..Default::default()
    };

    let result = PolicyExecutionOrchestrator::from_registry(
      &config,
      registry,
      executor.clone(),
      Some(Arc::new(InMemoryCache::new())),
    );
    assert!(matches!(result, Err(ConfigError::InvalidTtl { .. })));
    assert!(executor.calls().is_empty());
  }
}

#[tokio::test]
async fn test_default_step_runs_with_any_parameters() {
  let mut def = policy("ping", "1.0.0", &[]);
  def.steps.insert("start".to_string(), StepDef::default());
  let registry = Arc::new(InMemoryPolicyRegistry::with_policies([def]));
  let executor = Arc::new(ScriptedExecutor::default());
  let h = harness_with(OrchestratorConfig::default(), registry, executor);

  let outcome = h
    .orchestrator
    .create_process(
      ExecutionRequest::create("ping", "1", "client-a").with_parameters(json!({ "any": 1 })),
    )
    .await;

  assert!(outcome.is_success(), "unexpected outcome: {:?}", outcome);
  assert_eq!(h.executor.calls().len(), 1);
}

#[tokio::test]
async fn test_developer_text_redaction() {
  let h = harness(OrchestratorConfig::default());
  h.executor.fail_on("start", downstream_fault());

  let redacted = h
    .orchestrator
    .create_process(create_kyc("proc-1").with_redact_developer_text(true))
    .await;
  assert_fault(&redacted, ErrorCode::DownstreamFailure);
  assert!(redacted.error().unwrap().developer_text.is_none());

  let global = harness(OrchestratorConfig {
    suppress_developer_text: true,
    ..Default::default()
  });
  global.executor.fail_on("start", downstream_fault());
  let suppressed = global.orchestrator.create_process(create_kyc("proc-1")).await;
  assert_fault(&suppressed, ErrorCode::DownstreamFailure);
  assert!(suppressed.error().unwrap().developer_text.is_none());
}

#[tokio::test]
async fn test_cache_fault_passes_through() {
  let h = harness(OrchestratorConfig::default());
  h.executor.fail_on(
    "start",
    ProgramFault::Cache {
      code: "CACHE_EVICTED".to_string(),
      text: "Cached answers were evicted".to_string(),
      developer_text: None,
    },
  );

  let outcome = h.orchestrator.create_process(create_kyc("proc-1")).await;
  let error = outcome.error().unwrap();
  assert_eq!(error.id, "CACHE_EVICTED");
  assert_eq!(error.text, "Cached answers were evicted");
}

#[tokio::test]
async fn test_every_call_is_audited() {
  let mut h = harness(OrchestratorConfig::default());

  h.orchestrator.create_process(create_kyc("proc-1")).await;
  h.orchestrator
    .resume_process(ExecutionRequest::resume("nope", "kyc", "client-a"))
    .await;

  let first = h.audit.recv().await.unwrap();
  assert_eq!(first.process_id, "proc-1");
  assert!(first.outcome.is_success());

  let second = h.audit.recv().await.unwrap();
  assert_eq!(second.process_id, "nope");
  assert_eq!(second.outcome.error_id(), Some("RESOURCE_NOT_FOUND"));
  assert_ne!(first.request_id, second.request_id);
}

#[tokio::test]
async fn test_generated_process_id() {
  let h = harness(OrchestratorConfig::default());

  let outcome = h
    .orchestrator
    .create_process(ExecutionRequest::create("kyc", "1", "client-a").with_parameters(json!({ "name": "Ada" })))
    .await;

  let process_id = &outcome.results().unwrap().process_id;
  assert!(uuid::Uuid::parse_str(process_id).is_ok());
  assert!(h.store.get(process_id).await.is_ok());
}

#[tokio::test]
async fn test_process_metadata() {
  let h = harness(OrchestratorConfig::default());
  h.orchestrator.create_process(create_kyc("proc-1")).await;

  let metadata = h.orchestrator.get_process_metadata("proc-1").await.unwrap();
  assert_eq!(metadata.policy_name, "kyc");
  assert_eq!(metadata.policy_version.full_name, "kyc_1.0.0");
  assert!(metadata.expires_at.is_some());

  let missing = h.orchestrator.get_process_metadata("nope").await;
  assert_eq!(missing.unwrap_err().id, ErrorCode::ResourceNotFound);
}

#[tokio::test]
async fn test_policy_metadata() {
  let h = harness(OrchestratorConfig::default());

  let schema = h
    .orchestrator
    .get_policy_metadata("kyc", "1", None)
    .await
    .unwrap();
  assert_eq!(schema["required"], json!(["name"]));

  let start = h
    .orchestrator
    .get_policy_metadata("kyc", "1.0.0", Some("start"))
    .await
    .unwrap();
  assert_eq!(start, schema);

  let step = h
    .orchestrator
    .get_policy_metadata("kyc", "1", Some("verify-address"))
    .await
    .unwrap();
  assert_eq!(step, json!({}));

  let unknown_step = h
    .orchestrator
    .get_policy_metadata("kyc", "1", Some("nope"))
    .await;
  assert_eq!(unknown_step.unwrap_err().id, ErrorCode::ResourceNotFound);

  let unknown_policy = h.orchestrator.get_policy_metadata("nope", "1", None).await;
  assert_eq!(unknown_policy.unwrap_err().id, ErrorCode::ResourceNotFound);
}
