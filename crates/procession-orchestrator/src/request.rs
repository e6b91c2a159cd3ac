use procession_context::{RequestContext, RequestType};
use serde::{Deserialize, Serialize};

/// An inbound create or resume request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
  /// Caller-supplied process ID. Generated on creation when absent; required
  /// for resumption.
  #[serde(default)]
  pub process_id: Option<String>,
  pub policy_name: String,
  /// Requested version, `major[.minor[.patch]]`. Ignored on resumption.
  #[serde(default)]
  pub version_requested: String,
  /// Step to resume with. Ignored on creation.
  #[serde(default)]
  pub step: Option<String>,
  pub request_type: RequestType,
  #[serde(default)]
  pub parameters: serde_json::Map<String, serde_json::Value>,
  pub client_id: String,
  #[serde(default)]
  pub business_event: Option<String>,
  #[serde(default)]
  pub mock_mode: bool,
  /// Strip developer text from any error in the response.
  #[serde(default)]
  pub redact_developer_text: bool,
}

impl ExecutionRequest {
  /// A creation request for `policy_name` at `version_requested`.
  pub fn create(
    policy_name: impl Into<String>,
    version_requested: impl Into<String>,
    client_id: impl Into<String>,
  ) -> Self {
    Self {
      process_id: None,
      policy_name: policy_name.into(),
      version_requested: version_requested.into(),
      step: None,
      request_type: RequestType::Create,
      parameters: serde_json::Map::new(),
      client_id: client_id.into(),
      business_event: None,
      mock_mode: false,
      redact_developer_text: false,
    }
  }

  /// A resumption request for an existing process.
  pub fn resume(
    process_id: impl Into<String>,
    policy_name: impl Into<String>,
    client_id: impl Into<String>,
  ) -> Self {
    Self {
      process_id: Some(process_id.into()),
      request_type: RequestType::Resume,
      ..Self::create(policy_name, "", client_id)
    }
  }

  pub fn with_process_id(mut self, process_id: impl Into<String>) -> Self {
    self.process_id = Some(process_id.into());
    self
  }

  pub fn with_step(mut self, step: impl Into<String>) -> Self {
    self.step = Some(step.into());
    self
  }

  /// Replace the parameters. Anything but a JSON object yields no parameters.
  pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
    self.parameters = match parameters {
      serde_json::Value::Object(map) => map,
      _ => serde_json::Map::new(),
    };
    self
  }

  pub fn with_business_event(mut self, business_event: impl Into<String>) -> Self {
    self.business_event = Some(business_event.into());
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

  /// The requested step, with an empty string treated as no step.
  pub(crate) fn requested_step(&self) -> Option<&str> {
    self.step.as_deref().filter(|step| !step.is_empty())
  }

  /// Build the context passed to every collaborator for this call.
  pub(crate) fn context(&self, process_id: &str, request_type: RequestType) -> RequestContext {
    RequestContext::new(process_id, request_type, self.client_id.clone())
      .with_business_event(self.business_event.clone())
      .with_mock_mode(self.mock_mode)
      .with_redact_developer_text(self.redact_developer_text)
  }
}
