//! JSON schema subset validation.
//!
//! Errors carry a JSON pointer to the offending value so that callers can map
//! them back onto their form fields:
//! ```json
//! [{ "path": "/address/zip", "message": "expected string, got number" }]
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON schema type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
  String,
  Number,
  Integer,
  Boolean,
  Null,
  Array,
  Object,
}

impl SchemaType {
  /// Parse a schema `type` keyword. Unknown names yield `None` and are not checked.
  pub fn parse(type_str: &str) -> Option<Self> {
    match type_str {
      "string" => Some(SchemaType::String),
      "number" => Some(SchemaType::Number),
      "integer" => Some(SchemaType::Integer),
      "boolean" => Some(SchemaType::Boolean),
      "null" => Some(SchemaType::Null),
      "array" => Some(SchemaType::Array),
      "object" => Some(SchemaType::Object),
      _ => None,
    }
  }

  fn name(self) -> &'static str {
    match self {
      SchemaType::String => "string",
      SchemaType::Number => "number",
      SchemaType::Integer => "integer",
      SchemaType::Boolean => "boolean",
      SchemaType::Null => "null",
      SchemaType::Array => "array",
      SchemaType::Object => "object",
    }
  }

  fn accepts(self, value: &Value) -> bool {
    match self {
      SchemaType::String => value.is_string(),
      SchemaType::Number => value.is_number(),
      SchemaType::Integer => {
        value.is_i64()
          || value.is_u64()
          || value.as_f64().is_some_and(|f| f.fract() == 0.0)
      }
      SchemaType::Boolean => value.is_boolean(),
      SchemaType::Null => value.is_null(),
      SchemaType::Array => value.is_array(),
      SchemaType::Object => value.is_object(),
    }
  }

  fn of(value: &Value) -> &'static str {
    match value {
      Value::Null => "null",
      Value::Bool(_) => "boolean",
      Value::Number(_) => "number",
      Value::String(_) => "string",
      Value::Array(_) => "array",
      Value::Object(_) => "object",
    }
  }
}

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidationError {
  /// JSON pointer to the offending value; empty for the document root.
  pub path: String,
  pub message: String,
}

impl ValidationError {
  fn new(path: &str, message: impl Into<String>) -> Self {
    Self {
      path: path.to_string(),
      message: message.into(),
    }
  }
}

/// Validate a document against a schema, collecting every violation.
pub fn validate_document(schema: &Value, instance: &Value) -> BTreeSet<ValidationError> {
  let mut errors = BTreeSet::new();
  validate_at(schema, instance, "", &mut errors);
  errors
}

fn validate_at(schema: &Value, instance: &Value, path: &str, errors: &mut BTreeSet<ValidationError>) {
  let Some(schema) = schema.as_object() else {
    return;
  };

  if let Some(expected) = schema.get("type") {
    let types: Vec<SchemaType> = match expected {
      Value::String(s) => SchemaType::parse(s).into_iter().collect(),
      Value::Array(items) => items
        .iter()
        .filter_map(|t| t.as_str().and_then(SchemaType::parse))
        .collect(),
      _ => Vec::new(),
    };
    if !types.is_empty() && !types.iter().any(|t| t.accepts(instance)) {
      let names: Vec<&str> = types.iter().map(|t| t.name()).collect();
      errors.insert(ValidationError::new(
        path,
        format!(
          "expected {}, got {}",
          names.join(" or "),
          SchemaType::of(instance)
        ),
      ));
      // Further keywords would only restate the type mismatch.
      return;
    }
  }

  if let Some(allowed) = schema.get("enum").and_then(Value::as_array)
    && !allowed.contains(instance)
  {
    errors.insert(ValidationError::new(path, "value is not one of the allowed values"));
  }

  if let Some(s) = instance.as_str() {
    let len = s.chars().count() as u64;
    if let Some(min) = schema.get("minLength").and_then(Value::as_u64)
      && len < min
    {
      errors.insert(ValidationError::new(
        path,
        format!("length {} is shorter than {}", len, min),
      ));
    }
    if let Some(max) = schema.get("maxLength").and_then(Value::as_u64)
      && len > max
    {
      errors.insert(ValidationError::new(
        path,
        format!("length {} is longer than {}", len, max),
      ));
    }
  }

  if let Some(n) = instance.as_f64() {
    if let Some(min) = schema.get("minimum").and_then(Value::as_f64)
      && n < min
    {
      errors.insert(ValidationError::new(
        path,
        format!("{} is less than the minimum of {}", n, min),
      ));
    }
    if let Some(max) = schema.get("maximum").and_then(Value::as_f64)
      && n > max
    {
      errors.insert(ValidationError::new(
        path,
        format!("{} is greater than the maximum of {}", n, max),
      ));
    }
  }

  if let Some(object) = instance.as_object() {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
      for name in required.iter().filter_map(Value::as_str) {
        if !object.contains_key(name) {
          errors.insert(ValidationError::new(
            &child_path(path, name),
            "required property is missing",
          ));
        }
      }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (name, value) in object {
      match properties.and_then(|p| p.get(name)) {
        Some(property_schema) => {
          validate_at(property_schema, value, &child_path(path, name), errors);
        }
        None if closed => {
          errors.insert(ValidationError::new(
            &child_path(path, name),
            "additional property is not allowed",
          ));
        }
        None => {}
      }
    }
  }

  if let Some(items) = instance.as_array()
    && let Some(item_schema) = schema.get("items")
  {
    for (index, item) in items.iter().enumerate() {
      validate_at(item_schema, item, &child_path(path, &index.to_string()), errors);
    }
  }
}

/// Append a JSON pointer segment, escaping `~` and `/`.
fn child_path(parent: &str, segment: &str) -> String {
  format!("{}/{}", parent, segment.replace('~', "~0").replace('/', "~1"))
}
