//! Schema lookup and parameter validation.
//!
//! Every policy step declares a JSON schema for the parameters it accepts.
//! [`SchemaSource`] looks schemas up by [`ProgramId`](procession_policy::ProgramId)
//! and [`SchemaValidator`] checks request parameters against them.
//!
//! A supported subset of JSON Schema is checked: `type`, `required`,
//! `properties`, `additionalProperties: false`, `enum`, `minLength`,
//! `maxLength`, `minimum`, `maximum` and `items`.

mod error;
mod source;
mod validate;
mod validator;

pub use error::SchemaError;
pub use source::{RegistrySchemaSource, SchemaSource};
pub use validate::{SchemaType, ValidationError, validate_document};
pub use validator::{JsonSchemaValidator, SchemaValidator};
