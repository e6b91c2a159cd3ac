use serde::{Deserialize, Serialize};

/// Settings for the attribute-based authorization gate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationConfig {
  /// Feature flag. When disabled every request is authorized.
  #[serde(default)]
  pub enabled: bool,

  /// Rules are evaluated in order; the first match allows the request.
  #[serde(default)]
  pub rules: Vec<AccessRule>,
}

/// Action a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
  Initiate,
  Resume,
}

/// A single allow rule.
///
/// `subject` and `resource` accept `*` as a wildcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRule {
  pub subject: String,
  pub resource: String,
  pub actions: Vec<RuleAction>,
}
