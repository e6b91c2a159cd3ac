//! Procession Config
//!
//! This crate contains the serializable configuration types for procession.
//! These types describe policies and orchestrator settings before they are
//! resolved and wired into a running orchestrator.
//!
//! Configuration can be loaded from:
//! - JSON files (one policy version per file in the policy directory)
//! - An orchestrator config file (via CLI with `--config=config.json`)

mod authorization;
mod error;
mod orchestrator;
mod policy;

pub use authorization::{AccessRule, AuthorizationConfig, RuleAction};
pub use error::ConfigError;
pub use orchestrator::{CacheConfig, MAX_TTL_SECS, OrchestratorConfig};
pub use policy::{PolicyDef, START_STEP, StepDef};
