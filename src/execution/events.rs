//! Run events and trace recording

use crate::core::registry_id::RegistryId;
use crate::core::state::{ExecutionStatus, TraceEntry};
use crate::errors::SerializedError;
use chrono::Utc;
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        steps: usize,
    },
    StepStarted {
        run_id: Uuid,
        instance_id: Uuid,
        brick_id: RegistryId,
        label: Option<String>,
    },
    /// Arguments were rendered (successfully or not)
    StepRendered {
        run_id: Uuid,
        instance_id: Uuid,
        args: Option<Value>,
        render_error: Option<SerializedError>,
    },
    StepSkipped {
        run_id: Uuid,
        instance_id: Uuid,
    },
    StepCompleted {
        run_id: Uuid,
        instance_id: Uuid,
        output: Value,
    },
    StepFailed {
        run_id: Uuid,
        instance_id: Uuid,
        error: SerializedError,
    },
    RunCompleted {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Fan-out of run events to registered handlers
///
/// Clones share the same handler list.
#[derive(Clone, Default)]
pub struct EventSink {
    handlers: Arc<RwLock<Vec<EventHandler>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event handler
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        if let Ok(mut handlers) = self.handlers.write() {
            handlers.push(Arc::new(handler));
        }
    }

    /// Emit an event to all handlers
    pub fn emit(&self, event: ExecutionEvent) {
        let handlers = match self.handlers.read() {
            Ok(handlers) => handlers.clone(),
            Err(_) => return,
        };
        for handler in handlers.iter() {
            handler(&event);
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.handlers.read().map(|h| h.len()).unwrap_or(0);
        f.debug_struct("EventSink").field("handlers", &count).finish()
    }
}

/// Collects [`TraceEntry`]s from run events
#[derive(Clone, Default)]
pub struct TraceRecorder {
    entries: Arc<Mutex<Vec<TraceEntry>>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `sink`
    pub fn attach(&self, sink: &EventSink) {
        let recorder = self.clone();
        sink.subscribe(move |event| recorder.record(event));
    }

    pub fn record(&self, event: &ExecutionEvent) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        match event {
            ExecutionEvent::StepStarted {
                run_id,
                instance_id,
                brick_id,
                label,
            } => entries.push(TraceEntry::start(*run_id, *instance_id, brick_id.clone(), label.clone())),
            ExecutionEvent::StepRendered {
                instance_id,
                args,
                render_error,
                ..
            } => {
                if let Some(entry) = open_entry(&mut entries, instance_id) {
                    entry.args = args.clone();
                    entry.render_error = render_error.clone();
                }
            }
            ExecutionEvent::StepSkipped { instance_id, .. } => {
                if let Some(entry) = open_entry(&mut entries, instance_id) {
                    entry.skipped = true;
                    entry.output = Value::Null;
                    entry.finished_at = Some(Utc::now());
                }
            }
            ExecutionEvent::StepCompleted {
                instance_id, output, ..
            } => {
                if let Some(entry) = open_entry(&mut entries, instance_id) {
                    entry.output = output.clone();
                    entry.finished_at = Some(Utc::now());
                }
            }
            ExecutionEvent::StepFailed {
                instance_id, error, ..
            } => {
                if let Some(entry) = open_entry(&mut entries, instance_id) {
                    entry.error = Some(error.clone());
                    entry.finished_at = Some(Utc::now());
                }
            }
            ExecutionEvent::RunStarted { .. } | ExecutionEvent::RunCompleted { .. } => {}
        }
    }

    /// Entries in start order
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn entry(&self, instance_id: Uuid) -> Option<TraceEntry> {
        self.entries()
            .into_iter()
            .rev()
            .find(|entry| entry.instance_id == instance_id)
    }
}

/// Latest unfinished entry for an instance (loops re-run the same step)
fn open_entry<'a>(entries: &'a mut [TraceEntry], instance_id: &Uuid) -> Option<&'a mut TraceEntry> {
    entries
        .iter_mut()
        .rev()
        .find(|entry| entry.instance_id == *instance_id && !entry.is_finished())
}
