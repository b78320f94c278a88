//! JSON Schema validation of brick inputs and outputs

use crate::core::registry_id::RegistryId;
use crate::errors::{InputValidationError, OutputValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::debug;

/// Base URL of schemas the wider application defines
pub const APP_SCHEMA_BASE: &str = "https://app.pixiebrix.com/schemas/";

/// One validation failure, in the "basic" output format shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputUnit {
    /// JSON pointer into the schema
    pub keyword_location: String,
    /// JSON pointer into the validated value
    pub instance_location: String,
    pub error: String,
}

impl fmt::Display for OutputUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_location.is_empty() {
            write!(f, "{}", self.error)
        } else {
            write!(f, "{}: {}", self.instance_location, self.error)
        }
    }
}

/// Result of validating a value against a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<OutputUnit>,
}

impl ValidationOutcome {
    fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }
}

/// Which of a brick's schemas a compiled validator belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaRole {
    Input,
    Output,
}

/// A schema compiled once and reused for every validation
///
/// A schema that fails to compile validates nothing; every check reports
/// the compile failure as its single error.
pub struct CompiledSchema {
    schema: Value,
    validator: Result<Option<jsonschema::Validator>, String>,
}

impl CompiledSchema {
    pub fn compile(schema: &Value) -> Self {
        if is_permissive(schema) {
            return Self {
                schema: schema.clone(),
                validator: Ok(None),
            };
        }

        let mut normalized = inline_app_refs(schema);
        // Dialect is detected from the keywords used; stale `$schema` URIs are ignored
        if let Value::Object(map) = &mut normalized {
            map.remove("$schema");
        }

        let validator = jsonschema::validator_for(&normalized).map(Some).map_err(|e| {
            debug!("Schema failed to compile: {}", e);
            e.to_string()
        });

        Self {
            schema: schema.clone(),
            validator,
        }
    }

    /// The schema as declared, before app references were inlined
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn validate(&self, value: &Value) -> ValidationOutcome {
        let validator = match &self.validator {
            Ok(Some(validator)) => validator,
            Ok(None) => return ValidationOutcome::ok(),
            Err(e) => {
                return ValidationOutcome {
                    valid: false,
                    errors: vec![OutputUnit {
                        keyword_location: "#".to_string(),
                        instance_location: String::new(),
                        error: format!("Invalid schema: {}", e),
                    }],
                }
            }
        };

        let errors: Vec<OutputUnit> = validator
            .iter_errors(value)
            .map(|e| OutputUnit {
                keyword_location: e.schema_path.to_string(),
                instance_location: e.instance_path.to_string(),
                error: e.to_string(),
            })
            .collect();

        ValidationOutcome {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Check rendered arguments of `brick_id`
    pub fn check_input(&self, brick_id: &RegistryId, input: &Value) -> Result<(), InputValidationError> {
        let outcome = self.validate(input);
        if outcome.valid {
            Ok(())
        } else {
            Err(InputValidationError {
                brick_id: Some(brick_id.clone()),
                schema: self.schema.clone(),
                input: input.clone(),
                errors: outcome.errors,
            })
        }
    }

    /// Check the result of `brick_id`
    pub fn check_output(&self, brick_id: &RegistryId, instance: &Value) -> Result<(), OutputValidationError> {
        let outcome = self.validate(instance);
        if outcome.valid {
            Ok(())
        } else {
            Err(OutputValidationError {
                brick_id: Some(brick_id.clone()),
                schema: self.schema.clone(),
                instance: instance.clone(),
                errors: outcome.errors,
            })
        }
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("schema", &self.schema)
            .field("compiled", &self.validator.is_ok())
            .finish()
    }
}

/// Validate `value` against `schema`, compiling it for this call only
pub fn validate(schema: &Value, value: &Value) -> ValidationOutcome {
    CompiledSchema::compile(schema).validate(value)
}

/// Validate rendered arguments against a brick's input schema
pub fn validate_input(
    brick_id: &RegistryId,
    schema: &Value,
    input: &Value,
) -> Result<(), InputValidationError> {
    CompiledSchema::compile(schema).check_input(brick_id, input)
}

/// Validate a brick's result against its output schema
pub fn validate_output(
    brick_id: &RegistryId,
    schema: &Value,
    instance: &Value,
) -> Result<(), OutputValidationError> {
    CompiledSchema::compile(schema).check_output(brick_id, instance)
}

/// Build a simple object schema from `(property, schema)` pairs
pub fn properties_schema(properties: &[(&str, Value)], required: &[&str]) -> Value {
    let props: Map<String, Value> = properties
        .iter()
        .map(|(name, schema)| (name.to_string(), schema.clone()))
        .collect();
    json!({
        "type": "object",
        "properties": props,
        "required": required,
    })
}

/// Reference to an application schema, e.g. `app_schema_ref("pipeline")`
pub fn app_schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("{}{}#", APP_SCHEMA_BASE, name) })
}

fn is_permissive(schema: &Value) -> bool {
    match schema {
        Value::Bool(true) => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Local stand-in for an application schema
fn app_schema(name: &str) -> Value {
    match name {
        "pipeline" => json!({
            "type": "object",
            "properties": {
                "__type__": { "const": "pipeline" },
                "__value__": { "type": "array" }
            },
            "required": ["__type__", "__value__"]
        }),
        "expression" => json!({
            "type": "object",
            "properties": {
                "__type__": { "enum": ["var", "mustache", "nunjucks", "pipeline"] }
            },
            "required": ["__type__", "__value__"]
        }),
        "element" => json!({ "type": ["string", "object"] }),
        "uuid" => json!({ "type": "string", "format": "uuid" }),
        _ => json!({}),
    }
}

/// Replace `$ref`s to application schemas with local definitions
fn inline_app_refs(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                if let Some(rest) = reference.strip_prefix(APP_SCHEMA_BASE) {
                    let name = rest.trim_end_matches('#').trim_end_matches('/');
                    let name = name.rsplit('/').next().unwrap_or(name);
                    return app_schema(name);
                }
            }
            Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), inline_app_refs(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(inline_app_refs).collect()),
        other => other.clone(),
    }
}
