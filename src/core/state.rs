//! Execution state models

use crate::core::registry_id::RegistryId;
use crate::errors::SerializedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Run has not started
    Pending,
    /// Run is in progress
    Running,
    /// Every step ran or was skipped
    Completed,
    /// A step raised an error
    Failed,
    /// A control-flow signal ended the run early
    Interrupted,
    /// The abort signal was raised
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Pending | ExecutionStatus::Running)
    }
}

/// Trace record for one step of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub run_id: Uuid,
    pub instance_id: Uuid,
    pub brick_id: RegistryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Rendered arguments, when rendering succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,

    /// Set when the arguments could not be rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_error: Option<SerializedError>,

    pub skipped: bool,

    /// Brick result; `null` for skipped steps
    pub output: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SerializedError>,

    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl TraceEntry {
    pub fn start(run_id: Uuid, instance_id: Uuid, brick_id: RegistryId, label: Option<String>) -> Self {
        Self {
            run_id,
            instance_id,
            brick_id,
            label,
            args: None,
            render_error: None,
            skipped: false,
            output: Value::Null,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Summary of one top-level run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: Uuid,

    pub status: ExecutionStatus,

    pub started_at: Option<DateTime<Utc>>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Top-level steps in the pipeline
    pub total_steps: usize,

    /// Steps (at any depth) that ran to completion
    pub completed_steps: usize,

    /// Steps (at any depth) whose condition was false
    pub skipped_steps: usize,
}

impl RunState {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            total_steps: 0,
            completed_steps: 0,
            skipped_steps: 0,
        }
    }

    pub fn start(&mut self, total_steps: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_steps = total_steps;
    }

    pub fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Wall-clock duration, once finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.completed_at? - self.started_at?)
    }
}
