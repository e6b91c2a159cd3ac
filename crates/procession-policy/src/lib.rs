//! Procession Policy
//!
//! Policies are versioned workflow definitions. This crate provides:
//! - [`PolicyVersion`] and [`ProgramId`], the identity of a resolved policy
//! - the [`PolicyRegistry`] trait with in-memory and filesystem backends
//! - the [`VersionResolver`] which maps a requested version to the
//!   currently active patch version
//!
//! Resolution always reads the registry. Nothing is cached, so a deactivated
//! or removed version stops resolving on the very next call.

mod error;
mod fs_registry;
mod registry;
mod resolver;
mod version;

pub use error::{RegistryError, ResolveError};
pub use fs_registry::FsPolicyRegistry;
pub use registry::{InMemoryPolicyRegistry, PolicyRegistry};
pub use resolver::{StandardResolver, VersionResolver};
pub use version::{PolicyVersion, ProgramId, VersionSpec};
