//! Expression and template rendering
//!
//! Turns brick configurations into concrete argument values. Tagged
//! expressions are dispatched to their engine (`var`, `mustache`,
//! `nunjucks`); `pipeline` expressions pass through untouched so the brick
//! that owns them can run them later. Undefined results are modelled as
//! `None` and dropped from objects (or turned into `null` inside arrays).

pub mod mustache;
pub mod nunjucks;
pub mod path;

use crate::core::api_version::ApiVersionOptions;
use crate::core::expression::{Expression, TemplateEngine};
use crate::errors::RenderError;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

pub use path::get_path;

fn simple_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*\{\{\s*([@$A-Za-z_][@$A-Za-z0-9_.\[\]?]*)\s*\}\}\s*$")
            .expect("simple path pattern is valid")
    })
}

/// Path referenced by a template made of a single `{{ path }}` placeholder
fn simple_path(template: &str) -> Option<&str> {
    simple_path_regex()
        .captures(template)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

fn lookup_var(path: &str, ctxt: &Value, options: &ApiVersionOptions) -> Result<Option<Value>, RenderError> {
    match get_path(ctxt, path) {
        Some(value) => Ok(Some(value.clone())),
        None if options.strict_variables => Err(RenderError::new(
            "var",
            path,
            format!("{} is undefined", path.trim()),
        )),
        None => Ok(None),
    }
}

/// Render a template string with the given engine
pub fn render_template(
    engine: TemplateEngine,
    template: &str,
    ctxt: &Value,
    options: &ApiVersionOptions,
) -> Result<Option<Value>, RenderError> {
    if engine == TemplateEngine::Var {
        return lookup_var(template, ctxt, options);
    }

    if let Some(path) = simple_path(template) {
        return lookup_var(path, ctxt, options);
    }

    let rendered = match engine {
        TemplateEngine::Mustache => mustache::render(template, ctxt, options.autoescape)?,
        TemplateEngine::Nunjucks => {
            nunjucks::render(template, ctxt, options.autoescape, options.strict_variables)?
        }
        TemplateEngine::Var => unreachable!("var handled above"),
    };
    Ok(Some(Value::String(rendered)))
}

/// Render one expression; `None` means the value is undefined
pub fn render_expression(
    expression: &Expression,
    ctxt: &Value,
    options: &ApiVersionOptions,
) -> Result<Option<Value>, RenderError> {
    match expression.template() {
        Some((engine, template)) => render_template(engine, template, ctxt, options),
        None => Ok(Some(expression.to_value())),
    }
}

/// Render an arbitrary config value
pub fn render_value(
    value: &Value,
    ctxt: &Value,
    options: &ApiVersionOptions,
) -> Result<Option<Value>, RenderError> {
    match value {
        Value::Object(map) => {
            let expression = Expression::from_value(value)
                .map_err(|e| RenderError::new("expression", &value.to_string(), e.to_string()))?;
            if let Some(expression) = expression {
                return render_expression(&expression, ctxt, options);
            }
            render_object(map, ctxt, options).map(|rendered| Some(Value::Object(rendered)))
        }
        Value::Array(items) => {
            let rendered = items
                .iter()
                .map(|item| render_value(item, ctxt, options).map(|v| v.unwrap_or(Value::Null)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(Value::Array(rendered)))
        }
        Value::String(template) if options.implicit_mustache => {
            render_template(TemplateEngine::Mustache, template, ctxt, options)
        }
        other => Ok(Some(other.clone())),
    }
}

fn render_object(
    map: &Map<String, Value>,
    ctxt: &Value,
    options: &ApiVersionOptions,
) -> Result<Map<String, Value>, RenderError> {
    let mut rendered = Map::with_capacity(map.len());
    for (key, value) in map {
        if let Some(value) = render_value(value, ctxt, options)? {
            rendered.insert(key.clone(), value);
        }
    }
    Ok(rendered)
}

/// Render a brick's whole config into its arguments object
pub fn render_config(
    config: &Map<String, Value>,
    ctxt: &Value,
    options: &ApiVersionOptions,
) -> Result<Value, RenderError> {
    render_object(config, ctxt, options).map(Value::Object)
}

/// Render a step's `if` value before boolean coercion
///
/// Bare strings are always treated as mustache templates, in every
/// apiVersion.
pub fn render_condition(
    condition: &Value,
    ctxt: &Value,
    options: &ApiVersionOptions,
) -> Result<Option<Value>, RenderError> {
    match condition {
        Value::String(template) => render_template(TemplateEngine::Mustache, template, ctxt, options),
        other => render_value(other, ctxt, options),
    }
}
