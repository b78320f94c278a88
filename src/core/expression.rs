//! Typed expression nodes embedded in brick configs

use crate::core::step::BrickConfig;
use crate::errors::{PipelineConfigurationError, PipelineError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TYPE_KEY: &str = "__type__";
pub const VALUE_KEY: &str = "__value__";

/// A tagged expression, serialized as `{ "__type__": ..., "__value__": ... }`
///
/// The payload shape is fixed by the variant, so a template string can never
/// be read out of a pipeline expression (and vice versa).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "__type__", content = "__value__", rename_all = "lowercase")]
pub enum Expression {
    /// Dotted-path variable reference, e.g. `@input.user.name`
    Var(String),
    /// Mustache template
    Mustache(String),
    /// Nunjucks template
    Nunjucks(String),
    /// Nested pipeline, passed through to the brick that runs it
    Pipeline(Vec<BrickConfig>),
}

/// Template engines a string expression can be rendered with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateEngine {
    Var,
    Mustache,
    Nunjucks,
}

impl Expression {
    pub fn var(path: impl Into<String>) -> Self {
        Expression::Var(path.into())
    }

    pub fn mustache(template: impl Into<String>) -> Self {
        Expression::Mustache(template.into())
    }

    pub fn nunjucks(template: impl Into<String>) -> Self {
        Expression::Nunjucks(template.into())
    }

    pub fn pipeline(steps: Vec<BrickConfig>) -> Self {
        Expression::Pipeline(steps)
    }

    /// Tag name as it appears in `__type__`
    pub fn type_name(&self) -> &'static str {
        match self {
            Expression::Var(_) => "var",
            Expression::Mustache(_) => "mustache",
            Expression::Nunjucks(_) => "nunjucks",
            Expression::Pipeline(_) => "pipeline",
        }
    }

    /// Engine and source for the string-valued variants
    pub fn template(&self) -> Option<(TemplateEngine, &str)> {
        match self {
            Expression::Var(path) => Some((TemplateEngine::Var, path.as_str())),
            Expression::Mustache(source) => Some((TemplateEngine::Mustache, source.as_str())),
            Expression::Nunjucks(source) => Some((TemplateEngine::Nunjucks, source.as_str())),
            Expression::Pipeline(_) => None,
        }
    }

    pub fn as_pipeline(&self) -> Option<&[BrickConfig]> {
        match self {
            Expression::Pipeline(steps) => Some(steps),
            _ => None,
        }
    }

    /// Interpret a JSON value as an expression
    ///
    /// Returns `Ok(None)` for values that are not tagged expressions. A value
    /// carrying a known tag but a malformed payload is a configuration error.
    pub fn from_value(value: &Value) -> Result<Option<Self>, PipelineError> {
        if !is_expression(value) {
            return Ok(None);
        }

        serde_json::from_value(value.clone()).map(Some).map_err(|e| {
            PipelineConfigurationError::with_config(
                format!("Malformed expression: {}", e),
                value.clone(),
            )
            .into()
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Check whether a value is shaped like a tagged expression
pub fn is_expression(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };

    let known_tag = matches!(
        object.get(TYPE_KEY).and_then(Value::as_str),
        Some("var" | "mustache" | "nunjucks" | "pipeline")
    );

    known_tag && object.contains_key(VALUE_KEY)
}

/// Check whether a value is a tagged pipeline expression
pub fn is_pipeline_expression(value: &Value) -> bool {
    is_expression(value) && value.get(TYPE_KEY).and_then(Value::as_str) == Some("pipeline")
}
