//! Authorization for procession.
//!
//! The orchestrator asks an [`AuthorizationGate`] whether a subject (the
//! calling client) may perform an [`Action`] on a resource (the policy).
//! Any decision other than [`AuthorizationDecision::Allow`] blocks the request
//! before anything is dispatched or written.

use async_trait::async_trait;
use procession_config::{AccessRule, AuthorizationConfig, RuleAction};
use procession_context::{Action, RequestContext};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The decision emitted by an authorization gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationDecision {
  /// The request is permitted.
  Allow,

  /// The request is denied.
  Deny {
    /// Human-readable explanation, logged and returned as developer text.
    reason: String,
  },
}

impl AuthorizationDecision {
  pub fn is_allowed(&self) -> bool {
    matches!(self, AuthorizationDecision::Allow)
  }
}

/// Errors raised when a decision could not be reached at all.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
  /// The policy decision point could not be reached.
  #[error("authorization service unavailable: {message}")]
  Unavailable { message: String },
}

/// Trait for attribute-based authorization checks.
#[async_trait]
pub trait AuthorizationGate: Send + Sync {
  async fn authorize(
    &self,
    subject: &str,
    resource: &str,
    action: Action,
    ctx: &RequestContext,
  ) -> Result<AuthorizationDecision, AuthorizationError>;
}

/// A gate that permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AuthorizationGate for AllowAll {
  async fn authorize(
    &self,
    _subject: &str,
    _resource: &str,
    _action: Action,
    _ctx: &RequestContext,
  ) -> Result<AuthorizationDecision, AuthorizationError> {
    Ok(AuthorizationDecision::Allow)
  }
}

/// Deny-by-default gate evaluating a list of allow rules.
#[derive(Debug, Clone, Default)]
pub struct RuleAuthorizer {
  rules: Vec<AccessRule>,
}

impl RuleAuthorizer {
  pub fn new(rules: Vec<AccessRule>) -> Self {
    Self { rules }
  }

  fn rule_matches(rule: &AccessRule, subject: &str, resource: &str, action: Action) -> bool {
    let wildcard_eq = |pattern: &str, value: &str| pattern == "*" || pattern == value;
    let action_matches = rule.actions.iter().any(|a| {
      matches!(
        (a, action),
        (RuleAction::Initiate, Action::Initiate) | (RuleAction::Resume, Action::Resume)
      )
    });
    action_matches && wildcard_eq(&rule.subject, subject) && wildcard_eq(&rule.resource, resource)
  }
}

#[async_trait]
impl AuthorizationGate for RuleAuthorizer {
  async fn authorize(
    &self,
    subject: &str,
    resource: &str,
    action: Action,
    ctx: &RequestContext,
  ) -> Result<AuthorizationDecision, AuthorizationError> {
    let allowed = self
      .rules
      .iter()
      .any(|rule| Self::rule_matches(rule, subject, resource, action));

    debug!(
      request_id = %ctx.request_id,
      subject = %subject,
      resource = %resource,
      action = %action,
      allowed,
      "authorization evaluated"
    );

    if allowed {
      Ok(AuthorizationDecision::Allow)
    } else {
      Ok(AuthorizationDecision::Deny {
        reason: format!(
          "subject '{}' is not permitted to {} '{}'",
          subject, action, resource
        ),
      })
    }
  }
}

/// Wraps a gate behind a feature flag. When disabled every request is allowed
/// and the inner gate is never consulted.
pub struct FeatureFlagged<G> {
  enabled: bool,
  inner: G,
}

impl<G: AuthorizationGate> FeatureFlagged<G> {
  pub fn new(enabled: bool, inner: G) -> Self {
    Self { enabled, inner }
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }
}

impl FeatureFlagged<RuleAuthorizer> {
  /// Build the rule-based gate described by the configuration.
  pub fn from_config(config: &AuthorizationConfig) -> Self {
    Self::new(config.enabled, RuleAuthorizer::new(config.rules.clone()))
  }
}

#[async_trait]
impl<G: AuthorizationGate> AuthorizationGate for FeatureFlagged<G> {
  async fn authorize(
    &self,
    subject: &str,
    resource: &str,
    action: Action,
    ctx: &RequestContext,
  ) -> Result<AuthorizationDecision, AuthorizationError> {
    if !self.enabled {
      return Ok(AuthorizationDecision::Allow);
    }
    self.inner.authorize(subject, resource, action, ctx).await
  }
}
