//! Pipeline step model

use crate::core::expression::Expression;
use crate::core::registry_id::RegistryId;
use crate::errors::PipelineError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;
use uuid::Uuid;

/// Where a root-aware brick should be anchored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RootMode {
    /// The whole document
    Document,
    /// The element the pipeline was started against
    #[default]
    Element,
}

/// A single invocation of a brick within a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrickConfig {
    /// Brick to run
    pub id: RegistryId,

    /// Arguments: literals, tagged expressions, or nested objects of either
    #[serde(default)]
    pub config: Map<String, Value>,

    /// Name the result is bound to (as `@<outputKey>`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,

    /// Condition deciding whether the step runs
    #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,

    /// Stable id of this step, used for tracing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_mode: Option<RootMode>,

    /// Human-readable label shown in traces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

fn output_key_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("output key pattern is valid"))
}

/// Check that an output key can be used as a variable name
pub fn is_valid_output_key(key: &str) -> bool {
    output_key_regex().is_match(key)
}

impl BrickConfig {
    pub fn new(id: RegistryId) -> Self {
        Self {
            id,
            config: Map::new(),
            output_key: None,
            condition: None,
            instance_id: None,
            root_mode: None,
            label: None,
        }
    }

    /// Convenience constructor that parses the id
    pub fn for_brick(id: &str) -> Result<Self, PipelineError> {
        Ok(Self::new(RegistryId::parse(id)?))
    }

    /// Set the config from a JSON object; non-object values are ignored
    pub fn with_config(mut self, config: Value) -> Self {
        if let Value::Object(map) = config {
            self.config = map;
        }
        self
    }

    pub fn with_arg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.config.insert(name.to_string(), value.into());
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<Value>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_instance_id(mut self, instance_id: Uuid) -> Self {
        self.instance_id = Some(instance_id);
        self
    }

    pub fn with_root_mode(mut self, mode: RootMode) -> Self {
        self.root_mode = Some(mode);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn root_mode(&self) -> RootMode {
        self.root_mode.unwrap_or_default()
    }

    /// Name used in logs: the label when present, otherwise the brick id
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or_else(|| self.id.as_str())
    }

    /// Check whether any config string or the condition mentions a variable
    ///
    /// Used to decide whether a lazily-resolved variable such as `@mod` needs
    /// to be materialized before rendering this step.
    pub fn references_variable(&self, name: &str) -> bool {
        let in_config = self.config.values().any(|v| value_mentions(v, name));
        let in_condition = self
            .condition
            .as_ref()
            .is_some_and(|v| value_mentions(v, name));
        in_config || in_condition
    }

    /// Nested pipelines embedded directly in this step's config
    pub fn nested_pipelines(&self) -> Vec<(&str, Vec<BrickConfig>)> {
        self.config
            .iter()
            .filter_map(|(key, value)| match Expression::from_value(value) {
                Ok(Some(Expression::Pipeline(steps))) => Some((key.as_str(), steps)),
                _ => None,
            })
            .collect()
    }
}

fn value_mentions(value: &Value, name: &str) -> bool {
    match value {
        Value::String(s) => mentions(s, name),
        Value::Array(items) => items.iter().any(|v| value_mentions(v, name)),
        Value::Object(map) => map.values().any(|v| value_mentions(v, name)),
        _ => false,
    }
}

/// `name` followed by a non-identifier character (or end of string)
fn mentions(haystack: &str, name: &str) -> bool {
    haystack.match_indices(name).any(|(idx, _)| {
        haystack[idx + name.len()..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
    })
}
