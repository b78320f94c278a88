//! Test utility functions for brick-runtime

#![allow(dead_code)]

use async_trait::async_trait;
use brick_runtime::bricks::builtin::{builtin_bricks, IdentityBrick};
use brick_runtime::bricks::{Brick, BrickArgs, BrickKind, BrickOptions};
use brick_runtime::core::{BrickConfig, Expression, RegistryId};
use brick_runtime::errors::PipelineError;
use brick_runtime::execution::{ExecutionEngine, InitialValues, RunOptions, RunReport};
use brick_runtime::persistence::{MergeStrategy, StateNamespace};
use brick_runtime::registry::{BrickRegistry, BrickSource};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Echo brick whose input schema requires `message`
pub struct EchoBrick {
    id: RegistryId,
    schema: Value,
    calls: Arc<AtomicUsize>,
}

impl EchoBrick {
    pub const ID: &'static str = "@test/echo";

    pub fn new() -> Self {
        Self {
            id: RegistryId::parse(Self::ID).unwrap(),
            schema: json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            }),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Brick for EchoBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "Echo"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: BrickArgs, _options: BrickOptions) -> Result<Value, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(args.into_value())
    }
}

/// Returns its args after a delay, recording the order it finished in
pub struct DelayBrick {
    id: RegistryId,
    schema: Value,
    finished: Arc<Mutex<Vec<Value>>>,
}

impl DelayBrick {
    pub const ID: &'static str = "@test/delay";

    pub fn new() -> Self {
        Self {
            id: RegistryId::parse(Self::ID).unwrap(),
            schema: json!({"type": "object"}),
            finished: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn finished(&self) -> Arc<Mutex<Vec<Value>>> {
        self.finished.clone()
    }
}

#[async_trait]
impl Brick for DelayBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "Delay"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: BrickArgs, _options: BrickOptions) -> Result<Value, PipelineError> {
        let millis = args.get("delayMs").and_then(Value::as_u64).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        self.finished.lock().unwrap().push(args.as_value().clone());
        Ok(args.into_value())
    }
}

/// Writes mod state straight to the store, bypassing the run's snapshot
pub struct ExternalWriterBrick {
    id: RegistryId,
    schema: Value,
}

impl ExternalWriterBrick {
    pub const ID: &'static str = "@test/external-writer";

    pub fn new() -> Self {
        Self {
            id: RegistryId::parse(Self::ID).unwrap(),
            schema: json!({"type": "object"}),
        }
    }
}

#[async_trait]
impl Brick for ExternalWriterBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "External Writer"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Effect
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: BrickArgs, options: BrickOptions) -> Result<Value, PipelineError> {
        let run = options.run_options();
        run.state_store
            .set_state(
                StateNamespace::Mod,
                args.into_value(),
                MergeStrategy::Shallow,
                &run.mod_component,
            )
            .await
            .map_err(|e| PipelineError::unknown(e.to_string()))?;
        Ok(Value::Null)
    }
}

/// Always fails with an unknown error
pub struct PanicBrick {
    id: RegistryId,
    schema: Value,
}

impl PanicBrick {
    pub const ID: &'static str = "@test/fail";

    pub fn new() -> Self {
        Self {
            id: RegistryId::parse(Self::ID).unwrap(),
            schema: json!({"type": "object"}),
        }
    }
}

#[async_trait]
impl Brick for PanicBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "Fail"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Effect
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, _args: BrickArgs, _options: BrickOptions) -> Result<Value, PipelineError> {
        Err(PipelineError::unknown("boom"))
    }
}

/// Remote source that serves identity bricks under any id, slowly
pub struct SlowSource {
    fetches: Arc<AtomicUsize>,
    delay: Duration,
}

impl SlowSource {
    pub fn new(delay: Duration) -> Self {
        Self {
            fetches: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }

    pub fn fetches(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }
}

#[async_trait]
impl BrickSource for SlowSource {
    async fn fetch(&self, id: &RegistryId) -> Result<Option<Arc<dyn Brick>>, PipelineError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if id.as_str().starts_with("@remote/") {
            Ok(Some(Arc::new(RemoteBrick {
                id: id.clone(),
                schema: json!({"type": "object"}),
            })))
        } else {
            Ok(None)
        }
    }
}

struct RemoteBrick {
    id: RegistryId,
    schema: Value,
}

#[async_trait]
impl Brick for RemoteBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "Remote"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: BrickArgs, _options: BrickOptions) -> Result<Value, PipelineError> {
        Ok(json!({"remote": args.into_value()}))
    }
}

/// Built-in bricks plus the given test bricks
pub fn registry_with(extra: Vec<Arc<dyn Brick>>) -> Arc<BrickRegistry> {
    let registry = BrickRegistry::new();
    registry.register(builtin_bricks());
    registry.register(extra);
    Arc::new(registry)
}

/// Engine over the built-ins plus the given test bricks
pub fn engine_with(extra: Vec<Arc<dyn Brick>>) -> ExecutionEngine {
    ExecutionEngine::new(registry_with(extra))
}

pub fn step(id: &str) -> BrickConfig {
    BrickConfig::for_brick(id).unwrap()
}

pub fn identity(config: Value) -> BrickConfig {
    step(IdentityBrick::ID).with_config(config)
}

pub fn var(path: &str) -> Value {
    Expression::var(path).to_value()
}

pub fn mustache(template: &str) -> Value {
    Expression::mustache(template).to_value()
}

pub fn nunjucks(template: &str) -> Value {
    Expression::nunjucks(template).to_value()
}

pub fn pipeline(steps: Vec<BrickConfig>) -> Value {
    Expression::pipeline(steps).to_value()
}

/// Run a pipeline on `engine` with fresh options
pub async fn run(engine: &ExecutionEngine, steps: Vec<BrickConfig>, input: Value) -> RunReport {
    run_with(engine, steps, input, engine.run_options()).await
}

pub async fn run_with(
    engine: &ExecutionEngine,
    steps: Vec<BrickConfig>,
    input: Value,
    options: RunOptions,
) -> RunReport {
    engine.run(steps, InitialValues::new(input), options).await
}

/// Returns a value that does not match its own output schema
pub struct DriftingBrick {
    id: RegistryId,
    schema: Value,
    output_schema: Value,
}

impl DriftingBrick {
    pub const ID: &'static str = "@test/drifting";

    pub fn new() -> Self {
        Self {
            id: RegistryId::parse(Self::ID).unwrap(),
            schema: json!({"type": "object"}),
            output_schema: json!({
                "type": "object",
                "properties": {"count": {"type": "integer"}},
                "required": ["count"]
            }),
        }
    }
}

#[async_trait]
impl Brick for DriftingBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "Drifting"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Reader
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    fn output_schema(&self) -> Option<&Value> {
        Some(&self.output_schema)
    }

    async fn execute(&self, _args: BrickArgs, _options: BrickOptions) -> Result<Value, PipelineError> {
        Ok(json!({"count": "many"}))
    }
}
