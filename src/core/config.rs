//! Pipeline documents loaded from YAML

use crate::core::api_version::{api_version_options, ApiVersion, ApiVersionOptions};
use crate::core::pipeline::{validate_pipeline, PipelineInput};
use crate::core::registry_id::RegistryId;
use crate::core::step::BrickConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// A runnable pipeline plus the values it starts with
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDocument {
    /// Pipeline name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Semantics the pipeline was authored against
    #[serde(default)]
    pub api_version: ApiVersion,

    /// Mod the pipeline belongs to, used to scope `@mod` state
    #[serde(default)]
    pub mod_id: Option<RegistryId>,

    /// Mod options, bound as `@options`
    #[serde(default = "empty_object")]
    pub options: Value,

    /// Default `@input`; CLI overrides are merged on top
    #[serde(default = "empty_object")]
    pub input: Value,

    /// Integration variables, e.g. `@google`
    #[serde(default)]
    pub integrations: Map<String, Value>,

    /// One step or a list of steps
    pub pipeline: PipelineInput,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl PipelineDocument {
    /// Load a pipeline document from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid pipeline document {}", path.display()))
    }

    /// Parse a pipeline document from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let document: PipelineDocument = serde_yaml::from_str(yaml)?;
        document.validate()?;
        Ok(document)
    }

    /// Check the document is well-formed
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.is_empty() {
            anyhow::bail!("Pipeline '{}' has no steps", self.name);
        }

        for name in self.integrations.keys() {
            if !name.starts_with('@') {
                anyhow::bail!("Integration variable '{}' must start with '@'", name);
            }
        }

        validate_pipeline(&self.steps())?;
        Ok(())
    }

    pub fn steps(&self) -> Vec<BrickConfig> {
        self.pipeline.clone().into_steps()
    }

    pub fn api_version_options(&self) -> ApiVersionOptions {
        api_version_options(self.api_version)
    }

    /// `input` with `key=value` overrides applied
    pub fn input_with_overrides(&self, overrides: &[(String, Value)]) -> Value {
        let mut input = match &self.input {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        for (key, value) in overrides {
            input.insert(key.clone(), value.clone());
        }
        Value::Object(input)
    }
}

/// Parse a `key=value` override; values that parse as JSON keep their type
pub fn parse_input_override(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Empty key in '{}'", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
