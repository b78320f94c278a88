//! Options threaded through a run

use crate::core::api_version::{api_version_options, ApiVersion, ApiVersionOptions};
use crate::core::context::ModVariable;
use crate::errors::PipelineError;
use crate::execution::events::EventSink;
use crate::execution::logger::RunLogger;
use crate::persistence::{InMemoryStateStore, ModComponentRef, ModStateStore};
use crate::platform::{ElementRef, HeadlessPlatform, Platform};
use crate::registry::BrickRegistry;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

/// Cooperative cancellation shared by everything in a run
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    aborted: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
    notify: Arc<Notify>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal; later calls keep the first reason
    pub fn abort(&self, reason: impl Into<String>) {
        if let Ok(mut current) = self.reason.lock() {
            if current.is_none() {
                *current = Some(reason.into());
            }
        }
        self.aborted.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().ok().and_then(|r| r.clone())
    }

    /// Resolves once the signal is raised
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    /// `Err(Aborted)` if the signal was raised
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_aborted() {
            Err(PipelineError::Aborted {
                reason: self.reason().unwrap_or_else(|| "Run aborted".to_string()),
            })
        } else {
            Ok(())
        }
    }
}

/// Values a top-level run starts with
#[derive(Debug, Clone)]
pub struct InitialValues {
    /// Bound as `@input`
    pub input: Value,
    /// Bound as `@options`
    pub options_args: Value,
    /// Integration variables, each bound under its own `@name`
    pub integration_context: Map<String, Value>,
    /// Overrides the run's root element
    pub root: Option<ElementRef>,
}

impl InitialValues {
    pub fn new(input: Value) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options_args: Value) -> Self {
        self.options_args = options_args;
        self
    }

    pub fn with_integration(mut self, name: impl Into<String>, value: Value) -> Self {
        self.integration_context.insert(name.into(), value);
        self
    }

    pub fn with_root(mut self, root: ElementRef) -> Self {
        self.root = Some(root);
        self
    }
}

impl Default for InitialValues {
    fn default() -> Self {
        Self {
            input: Value::Object(Map::new()),
            options_args: Value::Object(Map::new()),
            integration_context: Map::new(),
            root: None,
        }
    }
}

/// Options for one top-level run, shared unchanged by nested runs
#[derive(Clone)]
pub struct RunOptions {
    /// Behavior toggles, resolved once
    pub api_version: ApiVersionOptions,
    pub logger: RunLogger,
    pub abort_signal: AbortSignal,
    /// Element the run started against
    pub root: ElementRef,
    /// No visual host; renderers raise a headless signal
    pub headless: bool,
    pub validate_input: bool,
    /// Output mismatches are logged, never raised
    pub validate_output: bool,
    pub registry: Arc<BrickRegistry>,
    pub platform: Arc<dyn Platform>,
    pub state_store: Arc<dyn ModStateStore>,
    pub mod_component: ModComponentRef,
    pub mod_variable: ModVariable,
    pub events: EventSink,
}

impl RunOptions {
    /// v3 options with an in-memory state store and a headless platform
    pub fn new(registry: Arc<BrickRegistry>) -> Self {
        Self {
            api_version: api_version_options(ApiVersion::default()),
            logger: RunLogger::for_run(Uuid::new_v4()),
            abort_signal: AbortSignal::new(),
            root: ElementRef::Document,
            headless: false,
            validate_input: true,
            validate_output: true,
            registry,
            platform: Arc::new(HeadlessPlatform::new()),
            state_store: Arc::new(InMemoryStateStore::new()),
            mod_component: ModComponentRef::default(),
            mod_variable: ModVariable::new(),
            events: EventSink::new(),
        }
    }

    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = api_version_options(version);
        self
    }

    pub fn with_api_version_options(mut self, options: ApiVersionOptions) -> Self {
        self.api_version = options;
        self
    }

    pub fn with_logger(mut self, logger: RunLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort_signal = signal;
        self
    }

    pub fn with_root(mut self, root: ElementRef) -> Self {
        self.root = root;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_validation(mut self, validate_input: bool, validate_output: bool) -> Self {
        self.validate_input = validate_input;
        self.validate_output = validate_output;
        self
    }

    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_state_store(mut self, store: Arc<dyn ModStateStore>) -> Self {
        self.state_store = store;
        self
    }

    pub fn with_mod_component(mut self, mod_component: ModComponentRef) -> Self {
        self.mod_component = mod_component;
        self
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Run id carried by the logger
    pub fn run_id(&self) -> Uuid {
        self.logger.run_id().unwrap_or_else(Uuid::nil)
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("api_version", &self.api_version)
            .field("logger", &self.logger)
            .field("root", &self.root)
            .field("headless", &self.headless)
            .field("validate_input", &self.validate_input)
            .field("validate_output", &self.validate_output)
            .field("platform", &self.platform.name())
            .field("mod_component", &self.mod_component)
            .finish()
    }
}
