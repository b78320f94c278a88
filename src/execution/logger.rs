//! Structured run logger

use crate::core::registry_id::RegistryId;
use crate::core::step::BrickConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where a log line came from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_id: Option<RegistryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_component_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brick_id: Option<RegistryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl LogContext {
    /// Fields set in `other` override fields set here
    pub fn merge(&self, other: &LogContext) -> LogContext {
        LogContext {
            run_id: other.run_id.or(self.run_id),
            mod_id: other.mod_id.clone().or_else(|| self.mod_id.clone()),
            mod_component_id: other.mod_component_id.or(self.mod_component_id),
            brick_id: other.brick_id.clone().or_else(|| self.brick_id.clone()),
            instance_id: other.instance_id.or(self.instance_id),
            label: other.label.clone().or_else(|| self.label.clone()),
        }
    }
}

/// Logger carrying a [`LogContext`]; emits `tracing` events
#[derive(Debug, Clone, Default)]
pub struct RunLogger {
    context: LogContext,
}

impl RunLogger {
    pub fn new(context: LogContext) -> Self {
        Self { context }
    }

    /// Logger for a fresh run id
    pub fn for_run(run_id: Uuid) -> Self {
        Self::new(LogContext {
            run_id: Some(run_id),
            ..LogContext::default()
        })
    }

    pub fn context(&self) -> &LogContext {
        &self.context
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.context.run_id
    }

    /// Child logger with a refined context
    pub fn child(&self, context: LogContext) -> Self {
        Self::new(self.context.merge(&context))
    }

    /// Child logger for one step
    pub fn for_step(&self, step: &BrickConfig) -> Self {
        self.child(LogContext {
            brick_id: Some(step.id.clone()),
            instance_id: step.instance_id,
            label: step.label.clone(),
            ..LogContext::default()
        })
    }

    fn brick(&self) -> &str {
        self.context.brick_id.as_ref().map(|id| id.as_str()).unwrap_or("-")
    }

    pub fn debug(&self, message: &str) {
        debug!(run_id = ?self.context.run_id, brick_id = self.brick(), "{}", message);
    }

    pub fn info(&self, message: &str) {
        info!(run_id = ?self.context.run_id, brick_id = self.brick(), "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(run_id = ?self.context.run_id, brick_id = self.brick(), "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(run_id = ?self.context.run_id, brick_id = self.brick(), "{}", message);
    }
}
