//! Brick abstraction
//!
//! A brick is a registered unit of work. The reducer renders a step's config
//! into [`BrickArgs`], validates them against [`Brick::input_schema`] and
//! calls [`Brick::execute`]. Bricks that own nested pipelines run them back
//! through the reducer with [`BrickOptions::run_pipeline`].

pub mod builtin;

use crate::core::context::RunContext;
use crate::core::expression::Expression;
use crate::core::registry_id::RegistryId;
use crate::core::step::BrickConfig;
use crate::errors::{BusinessError, PipelineConfigurationError, PipelineError};
use crate::execution::logger::RunLogger;
use crate::execution::options::{AbortSignal, RunOptions};
use crate::execution::reducer::reduce_pipeline_expression;
use crate::platform::{ElementRef, PlatformCapability};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future used where runs recurse through bricks
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a brick does; the reducer dispatches on this only for the headless
/// check and effect data flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrickKind {
    /// Reads data from the page or host
    Reader,
    /// Acts on the world; its result does not replace the working output
    Effect,
    /// Computes a value from its arguments
    Transformer,
    /// Produces visual output; needs a host
    Renderer,
}

impl fmt::Display for BrickKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrickKind::Reader => "reader",
            BrickKind::Effect => "effect",
            BrickKind::Transformer => "transformer",
            BrickKind::Renderer => "renderer",
        };
        f.write_str(name)
    }
}

/// Rendered arguments handed to a brick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrickArgs(Value);

impl BrickArgs {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Required argument, or a configuration error naming it
    pub fn require(&self, name: &str) -> Result<&Value, PipelineError> {
        self.get(name).ok_or_else(|| {
            PipelineConfigurationError::with_config(format!("Missing argument '{}'", name), self.0.clone()).into()
        })
    }

    /// Nested pipeline passed as a `pipeline` expression
    ///
    /// A missing argument is an empty pipeline.
    pub fn pipeline(&self, name: &str) -> Result<Vec<BrickConfig>, PipelineError> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => match Expression::from_value(value)? {
                Some(Expression::Pipeline(steps)) => Ok(steps),
                _ => Err(PipelineConfigurationError::with_config(
                    format!("Argument '{}' must be a pipeline expression", name),
                    value.clone(),
                )
                .into()),
            },
        }
    }

    /// Deserialize the arguments into a typed struct
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, PipelineError> {
        serde_json::from_value(self.0.clone()).map_err(|e| {
            PipelineConfigurationError::with_config(format!("Invalid arguments: {}", e), self.0.clone()).into()
        })
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for BrickArgs {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// What a renderer would have drawn, captured from a headless run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererPayload {
    pub brick_id: RegistryId,
    pub args: Value,
    pub ctxt: Value,
}

/// Per-call options handed to [`Brick::execute`]
#[derive(Clone)]
pub struct BrickOptions {
    /// Context the step was rendered against
    pub ctxt: RunContext,
    /// Working output when the step started
    pub working: Value,
    /// Element a root-aware brick acts on
    pub root: ElementRef,
    /// Logger scoped to this step
    pub logger: RunLogger,
    run: RunOptions,
}

impl BrickOptions {
    pub(crate) fn new(
        ctxt: RunContext,
        working: Value,
        root: ElementRef,
        logger: RunLogger,
        run: RunOptions,
    ) -> Self {
        Self {
            ctxt,
            working,
            root,
            logger,
            run,
        }
    }

    /// Options of the enclosing run
    pub fn run_options(&self) -> &RunOptions {
        &self.run
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.run.abort_signal
    }

    /// Run a nested pipeline against this step's context
    ///
    /// `extra_vars` are bound for the nested run only; bindings it creates
    /// are discarded when it returns. Under v1 the nested run starts from
    /// this step's working output.
    pub async fn run_pipeline(
        &self,
        pipeline: &[BrickConfig],
        extra_vars: Vec<(String, Value)>,
    ) -> Result<Value, PipelineError> {
        let ctxt = self.ctxt.with_vars(extra_vars);
        reduce_pipeline_expression(pipeline, ctxt, self.working.clone(), self.root.clone(), &self.run).await
    }

    /// Run a pipeline whose last brick is a renderer, capturing its payload
    ///
    /// The pipeline runs headless; reaching the renderer yields the
    /// arguments it would have drawn instead of drawing them.
    pub async fn run_renderer_pipeline(
        &self,
        pipeline: &[BrickConfig],
        extra_vars: Vec<(String, Value)>,
    ) -> Result<RendererPayload, PipelineError> {
        let mut run = self.run.clone();
        run.headless = true;

        let ctxt = self.ctxt.with_vars(extra_vars);
        match reduce_pipeline_expression(pipeline, ctxt, self.working.clone(), self.root.clone(), &run).await {
            Err(PipelineError::HeadlessMode(signal)) => Ok(RendererPayload {
                brick_id: signal.brick_id,
                args: signal.args,
                ctxt: signal.ctxt,
            }),
            Err(other) => Err(other),
            Ok(_) => Err(BusinessError::new("Pipeline does not include a renderer").into()),
        }
    }

    /// `@input` of the current context
    pub fn input(&self) -> &Value {
        self.ctxt.input()
    }
}

impl fmt::Debug for BrickOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrickOptions")
            .field("ctxt", &self.ctxt)
            .field("working", &self.working)
            .field("root", &self.root)
            .field("logger", &self.logger)
            .finish()
    }
}

/// A registered unit of work
#[async_trait::async_trait]
pub trait Brick: Send + Sync {
    fn id(&self) -> &RegistryId;

    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn kind(&self) -> BrickKind;

    /// JSON Schema the rendered arguments must satisfy
    fn input_schema(&self) -> &Value;

    /// JSON Schema of the result; checked but never enforced
    fn output_schema(&self) -> Option<&Value> {
        None
    }

    /// Whether the brick acts on the step's root element
    fn is_root_aware(&self) -> bool {
        false
    }

    fn required_capabilities(&self) -> Vec<PlatformCapability> {
        Vec::new()
    }

    async fn execute(&self, args: BrickArgs, options: BrickOptions) -> Result<Value, PipelineError>;
}

/// Listing entry for a brick
pub fn describe(brick: &dyn Brick) -> Value {
    json!({
        "id": brick.id(),
        "name": brick.name(),
        "kind": brick.kind(),
        "description": brick.description(),
    })
}

/// Object schema with no declared properties
pub fn empty_schema() -> Value {
    json!({"type": "object", "properties": Map::new()})
}
