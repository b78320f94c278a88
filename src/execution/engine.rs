//! Execution engine - wires a registry, platform and state store into runs

use crate::core::config::PipelineDocument;
use crate::core::pipeline::PipelineInput;
use crate::core::state::{ExecutionStatus, RunState, TraceEntry};
use crate::core::step::BrickConfig;
use crate::errors::{ErrorClass, PipelineError};
use crate::execution::events::{EventSink, ExecutionEvent, TraceRecorder};
use crate::execution::logger::RunLogger;
use crate::execution::options::{InitialValues, RunOptions};
use crate::execution::reducer::reduce_pipeline;
use crate::persistence::{InMemoryStateStore, ModComponentRef, ModStateStore};
use crate::platform::{HeadlessPlatform, Platform, PlatformCapability};
use crate::registry::BrickRegistry;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of one top-level run
#[derive(Debug)]
pub struct RunReport {
    pub result: Result<Value, PipelineError>,
    pub state: RunState,
    /// One entry per step execution, nested steps included
    pub trace: Vec<TraceEntry>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<Value, PipelineError> {
        self.result
    }
}

/// Status a run ends in, given how the reducer returned
pub fn status_for(result: &Result<Value, PipelineError>) -> ExecutionStatus {
    match result {
        Ok(_) => ExecutionStatus::Completed,
        Err(PipelineError::Aborted { .. }) => ExecutionStatus::Cancelled,
        Err(error) => match error.class() {
            ErrorClass::ControlFlow | ErrorClass::HeadlessMode => ExecutionStatus::Interrupted,
            _ => ExecutionStatus::Failed,
        },
    }
}

/// Main pipeline execution engine
pub struct ExecutionEngine {
    registry: Arc<BrickRegistry>,
    platform: Arc<dyn Platform>,
    state_store: Arc<dyn ModStateStore>,
    events: EventSink,
}

impl ExecutionEngine {
    /// Engine on a headless platform with in-memory state
    pub fn new(registry: Arc<BrickRegistry>) -> Self {
        Self {
            registry,
            platform: Arc::new(HeadlessPlatform::new()),
            state_store: Arc::new(InMemoryStateStore::new()),
            events: EventSink::new(),
        }
    }

    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_state_store(mut self, store: Arc<dyn ModStateStore>) -> Self {
        self.state_store = store;
        self
    }

    pub fn registry(&self) -> &Arc<BrickRegistry> {
        &self.registry
    }

    pub fn state_store(&self) -> &Arc<dyn ModStateStore> {
        &self.state_store
    }

    /// Add an event handler; it sees the events of every later run
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler);
    }

    /// Fresh run options bound to this engine's registry, platform and store
    pub fn run_options(&self) -> RunOptions {
        RunOptions::new(self.registry.clone())
            .with_platform(self.platform.clone())
            .with_state_store(self.state_store.clone())
    }

    /// Capabilities needed by the steps and everything nested inside them
    pub async fn required_capabilities(
        &self,
        steps: &[BrickConfig],
    ) -> Result<HashSet<PlatformCapability>, PipelineError> {
        let mut required = HashSet::new();
        let mut pending: Vec<BrickConfig> = steps.to_vec();

        while let Some(step) = pending.pop() {
            let brick = self.registry.lookup(&step.id).await?;
            required.extend(brick.required_capabilities());
            for (_, nested) in step.nested_pipelines() {
                pending.extend(nested);
            }
        }

        Ok(required)
    }

    /// Fail fast if the platform lacks a capability some step needs
    pub async fn check_capabilities(&self, steps: &[BrickConfig]) -> Result<(), PipelineError> {
        let mut missing: Vec<PlatformCapability> = self
            .required_capabilities(steps)
            .await?
            .into_iter()
            .filter(|capability| !self.platform.has_capability(*capability))
            .collect();
        missing.sort_by_key(|c| c.to_string());

        match missing.first() {
            Some(capability) => Err(PipelineError::PlatformCapabilityNotAvailable {
                capability: capability.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Execute a pipeline and report its result, final state and trace
    pub async fn run(
        &self,
        pipeline: impl Into<PipelineInput>,
        initial: InitialValues,
        options: RunOptions,
    ) -> RunReport {
        let steps = pipeline.into().into_steps();
        let (run_id, mut options) = match options.logger.run_id() {
            Some(run_id) => (run_id, options),
            None => {
                let run_id = Uuid::new_v4();
                let logger = RunLogger::for_run(run_id).child(options.logger.context().clone());
                (run_id, options.with_logger(logger))
            }
        };

        // Per-run sink: forwards to the engine's handlers and feeds this run's trace
        let sink = EventSink::new();
        let forward = self.events.clone();
        sink.subscribe(move |event| forward.emit(event.clone()));
        let recorder = TraceRecorder::new();
        recorder.attach(&sink);
        options.events = sink;

        let mut state = RunState::new(run_id);
        state.start(steps.len());
        info!("Starting run {} ({} step(s))", run_id, steps.len());
        options.events.emit(ExecutionEvent::RunStarted {
            run_id,
            steps: steps.len(),
        });

        let result = match self.check_capabilities(&steps).await {
            Ok(()) => reduce_pipeline(steps, initial, &options).await,
            Err(error) => Err(error),
        };

        let status = status_for(&result);
        state.finish(status);

        let trace = recorder.entries();
        state.completed_steps = trace
            .iter()
            .filter(|entry| entry.is_finished() && !entry.skipped && entry.error.is_none())
            .count();
        state.skipped_steps = trace.iter().filter(|entry| entry.skipped).count();

        match &result {
            Ok(_) => info!("Run {} completed", run_id),
            Err(error) if status == ExecutionStatus::Failed => warn!("Run {} failed: {}", run_id, error),
            Err(error) => info!("Run {} ended early: {}", run_id, error),
        }
        options.events.emit(ExecutionEvent::RunCompleted { run_id, status });

        RunReport { result, state, trace }
    }

    /// Execute a pipeline document, applying `key=value` input overrides
    pub async fn run_document(
        &self,
        document: &PipelineDocument,
        overrides: &[(String, Value)],
        options: RunOptions,
    ) -> RunReport {
        let mut initial = InitialValues::new(document.input_with_overrides(overrides))
            .with_options(document.options.clone());
        for (name, value) in &document.integrations {
            initial = initial.with_integration(name.clone(), value.clone());
        }

        let options = options
            .with_api_version_options(document.api_version_options())
            .with_mod_component(ModComponentRef::new(document.mod_id.clone()));

        self.run(document.steps(), initial, options).await
    }
}
