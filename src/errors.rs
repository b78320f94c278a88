//! Error taxonomy for pipeline runs
//!
//! Every failure leaving the reducer is a [`PipelineError`]. Variants fall into
//! one of the [`ErrorClass`]es: business errors are safe to show to a user,
//! validation errors carry the schema and offending value, control-flow
//! signals are expected outcomes (panel submit/abort/close), the headless
//! signal asks the caller to re-route a renderer, and anything else is an
//! unknown programming error.
//!
//! Errors can cross a serialization boundary as [`SerializedError`]. The
//! `is_*` predicates recognise them by their own properties, since type
//! identity is lost on the way.

use crate::core::registry_id::RegistryId;
use crate::execution::logger::LogContext;
use crate::schema::OutputUnit;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

/// Coarse classification of a [`PipelineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorClass {
    /// User-actionable; message is safe to display verbatim
    Business,
    /// Shape mismatch against a declared schema
    Validation,
    /// Expected non-local exit, not an error
    ControlFlow,
    /// Renderer reached without a visual host
    HeadlessMode,
    /// Programming error; report to telemetry
    Unknown,
}

/// Rendered arguments did not match the brick's input schema
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("Invalid inputs for brick {}: {}", display_brick(.brick_id), summarize(.errors))]
pub struct InputValidationError {
    pub brick_id: Option<RegistryId>,
    pub schema: Value,
    pub input: Value,
    pub errors: Vec<OutputUnit>,
}

/// A brick's result did not match its output schema
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("Invalid output for brick {}: {}", display_brick(.brick_id), summarize(.errors))]
pub struct OutputValidationError {
    pub brick_id: Option<RegistryId>,
    pub schema: Value,
    pub instance: Value,
    pub errors: Vec<OutputUnit>,
}

/// The pipeline itself is malformed
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct PipelineConfigurationError {
    pub message: String,
    pub config: Value,
}

impl PipelineConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            config: Value::Null,
        }
    }

    pub fn with_config(message: impl Into<String>, config: Value) -> Self {
        Self {
            message: message.into(),
            config,
        }
    }
}

/// A template or variable reference could not be rendered
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("Error rendering {engine} template: {message}")]
pub struct RenderError {
    pub engine: String,
    pub template: String,
    pub message: String,
}

impl RenderError {
    pub fn new(engine: &str, template: &str, message: impl Into<String>) -> Self {
        Self {
            engine: engine.to_string(),
            template: template.to_string(),
            message: message.into(),
        }
    }
}

/// A renderer was reached in a run with no visual host
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("Renderer {brick_id} cannot run in headless mode")]
pub struct HeadlessModeError {
    pub brick_id: RegistryId,
    pub args: Value,
    pub ctxt: Value,
    pub logger_context: LogContext,
}

/// User-actionable failure raised by a brick
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct BusinessError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brick_id: Option<RegistryId>,
}

impl BusinessError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            brick_id: None,
        }
    }

    pub fn for_brick(brick_id: RegistryId, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            brick_id: Some(brick_id),
        }
    }
}

/// Outcome of a temporary panel, propagated as a non-local exit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "panelAction", rename_all = "lowercase")]
pub enum PanelAction {
    /// The user submitted the panel, optionally with data
    Submit {
        #[serde(default)]
        detail: Value,
    },
    /// The user cancelled the panel
    Abort,
    /// The panel was closed
    Close,
}

impl PanelAction {
    /// Name used when serialized across a boundary
    pub fn error_name(&self) -> &'static str {
        match self {
            PanelAction::Submit { .. } => "SubmitPanelAction",
            PanelAction::Abort => "AbortPanelAction",
            PanelAction::Close => "ClosePanelAction",
        }
    }
}

impl fmt::Display for PanelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelAction::Submit { .. } => f.write_str("Panel submitted"),
            PanelAction::Abort => f.write_str("Panel aborted"),
            PanelAction::Close => f.write_str("Panel closed"),
        }
    }
}

/// Any failure or non-local exit from a pipeline run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InputValidation(#[from] InputValidationError),

    #[error(transparent)]
    OutputValidation(#[from] OutputValidationError),

    #[error(transparent)]
    Configuration(#[from] PipelineConfigurationError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    HeadlessMode(#[from] HeadlessModeError),

    /// Not an error in the domain sense; must be passed through untouched
    #[error("{0}")]
    ControlFlow(PanelAction),

    #[error(transparent)]
    Business(#[from] BusinessError),

    #[error("Brick not found: {id}")]
    BrickNotFound { id: String },

    #[error("Platform capability not available: {capability}")]
    PlatformCapabilityNotAvailable { capability: String },

    #[error("Run aborted: {reason}")]
    Aborted { reason: String },

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl From<PanelAction> for PipelineError {
    fn from(action: PanelAction) -> Self {
        PipelineError::ControlFlow(action)
    }
}

impl PipelineError {
    pub fn business(message: impl Into<String>) -> Self {
        BusinessError::new(message).into()
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        PipelineError::Unknown(message.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::InputValidation(_) | PipelineError::OutputValidation(_) => {
                ErrorClass::Validation
            }
            PipelineError::ControlFlow(_) => ErrorClass::ControlFlow,
            PipelineError::HeadlessMode(_) => ErrorClass::HeadlessMode,
            PipelineError::Unknown(_) => ErrorClass::Unknown,
            PipelineError::Configuration(_)
            | PipelineError::Render(_)
            | PipelineError::Business(_)
            | PipelineError::BrickNotFound { .. }
            | PipelineError::PlatformCapabilityNotAvailable { .. }
            | PipelineError::Aborted { .. } => ErrorClass::Business,
        }
    }

    pub fn is_control_flow(&self) -> bool {
        matches!(self, PipelineError::ControlFlow(_))
    }

    pub fn panel_action(&self) -> Option<&PanelAction> {
        match self {
            PipelineError::ControlFlow(action) => Some(action),
            _ => None,
        }
    }

    /// Signals that callers are expected to intercept, never report as crashes
    pub fn is_expected_signal(&self) -> bool {
        matches!(
            self,
            PipelineError::ControlFlow(_) | PipelineError::HeadlessMode(_)
        )
    }

    /// Message fit for an end user
    pub fn user_message(&self) -> String {
        match self.class() {
            ErrorClass::Unknown => "An unexpected error occurred".to_string(),
            _ => self.to_string(),
        }
    }

    /// Name used when serialized across a boundary
    pub fn name(&self) -> &'static str {
        match self {
            PipelineError::InputValidation(_) => "InputValidationError",
            PipelineError::OutputValidation(_) => "OutputValidationError",
            PipelineError::Configuration(_) => "PipelineConfigurationError",
            PipelineError::Render(_) => "RenderError",
            PipelineError::HeadlessMode(_) => "HeadlessModeError",
            PipelineError::ControlFlow(action) => action.error_name(),
            PipelineError::Business(_) => "BusinessError",
            PipelineError::BrickNotFound { .. } => "BrickNotFoundError",
            PipelineError::PlatformCapabilityNotAvailable { .. } => {
                "PlatformCapabilityNotAvailableError"
            }
            PipelineError::Aborted { .. } => "AbortError",
            PipelineError::Unknown(_) => "Error",
        }
    }

    pub fn to_serialized(&self) -> SerializedError {
        let properties = match self {
            PipelineError::InputValidation(e) => object_of(e),
            PipelineError::OutputValidation(e) => object_of(e),
            PipelineError::Configuration(e) => object_of(e),
            PipelineError::Render(e) => object_of(e),
            PipelineError::HeadlessMode(e) => object_of(e),
            PipelineError::ControlFlow(action) => object_of(action),
            PipelineError::Business(e) => object_of(e),
            PipelineError::BrickNotFound { id } => object_of(&json!({ "id": id })),
            PipelineError::PlatformCapabilityNotAvailable { capability } => {
                object_of(&json!({ "capability": capability }))
            }
            PipelineError::Aborted { reason } => object_of(&json!({ "reason": reason })),
            PipelineError::Unknown(_) => Map::new(),
        };

        let mut properties = properties;
        properties.remove("message");

        SerializedError {
            name: self.name().to_string(),
            message: self.to_string(),
            properties,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self.to_serialized()).unwrap_or(Value::Null)
    }

    /// Rebuild a typed error from its serialized form
    ///
    /// Unrecognised shapes become [`PipelineError::Unknown`].
    pub fn from_serialized(value: &Value) -> Self {
        fn parse<T: serde::de::DeserializeOwned>(value: &Value) -> Option<T> {
            serde_json::from_value(value.clone()).ok()
        }

        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();

        if is_input_validation_error(value) {
            if let Some(e) = parse::<InputValidationError>(value) {
                return e.into();
            }
        }
        if is_output_validation_error(value) {
            if let Some(e) = parse::<OutputValidationError>(value) {
                return e.into();
            }
        }
        if is_headless_mode_error(value) {
            if let Some(e) = parse::<HeadlessModeError>(value) {
                return e.into();
            }
        }
        if is_control_flow(value) {
            if let Some(action) = parse::<PanelAction>(value) {
                return action.into();
            }
        }

        let str_prop = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        match value.get("name").and_then(Value::as_str) {
            Some("PipelineConfigurationError") => PipelineConfigurationError::with_config(
                message,
                value.get("config").cloned().unwrap_or(Value::Null),
            )
            .into(),
            Some("RenderError") => parse::<RenderError>(value)
                .map(PipelineError::from)
                .unwrap_or_else(|| PipelineError::business(message)),
            Some("BusinessError") => parse::<BusinessError>(value)
                .map(PipelineError::from)
                .unwrap_or_else(|| PipelineError::business(message)),
            Some("BrickNotFoundError") => PipelineError::BrickNotFound { id: str_prop("id") },
            Some("PlatformCapabilityNotAvailableError") => {
                PipelineError::PlatformCapabilityNotAvailable {
                    capability: str_prop("capability"),
                }
            }
            Some("AbortError") => PipelineError::Aborted {
                reason: str_prop("reason"),
            },
            _ => PipelineError::Unknown(message),
        }
    }
}

/// Boundary-crossing form of an error: `{ name, message, ...own properties }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedError {
    pub name: String,
    pub message: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

fn object_of<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn has_name(value: &Value, names: &[&str]) -> bool {
    value
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| names.contains(&name))
}

fn has_props(value: &Value, props: &[&str]) -> bool {
    value
        .as_object()
        .is_some_and(|object| props.iter().all(|p| object.contains_key(*p)))
}

pub fn is_input_validation_error(value: &Value) -> bool {
    has_name(value, &["InputValidationError"])
        && has_props(value, &["schema", "input", "errors"])
        && value.get("errors").is_some_and(Value::is_array)
}

pub fn is_output_validation_error(value: &Value) -> bool {
    has_name(value, &["OutputValidationError"])
        && has_props(value, &["schema", "instance", "errors"])
        && value.get("errors").is_some_and(Value::is_array)
}

pub fn is_headless_mode_error(value: &Value) -> bool {
    has_name(value, &["HeadlessModeError"]) && has_props(value, &["brickId", "args", "ctxt"])
}

pub fn is_control_flow(value: &Value) -> bool {
    has_name(
        value,
        &["SubmitPanelAction", "AbortPanelAction", "ClosePanelAction"],
    ) && value.get("panelAction").is_some_and(Value::is_string)
}

pub fn is_business_error(value: &Value) -> bool {
    has_name(
        value,
        &[
            "BusinessError",
            "PipelineConfigurationError",
            "RenderError",
            "BrickNotFoundError",
            "PlatformCapabilityNotAvailableError",
            "AbortError",
        ],
    ) && value.get("message").is_some_and(Value::is_string)
}

fn display_brick(brick_id: &Option<RegistryId>) -> String {
    brick_id
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "<anonymous>".to_string())
}

fn summarize(errors: &[OutputUnit]) -> String {
    match errors.first() {
        Some(first) if errors.len() > 1 => {
            format!("{} (and {} more)", first, errors.len() - 1)
        }
        Some(first) => first.to_string(),
        None => "schema did not match".to_string(),
    }
}
