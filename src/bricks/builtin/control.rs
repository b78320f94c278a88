//! Control-flow bricks: branching, looping and error handling

use crate::bricks::{Brick, BrickArgs, BrickKind, BrickOptions};
use crate::core::condition::coerce_condition;
use crate::core::context::output_key_var;
use crate::core::registry_id::RegistryId;
use crate::errors::{PipelineConfigurationError, PipelineError};
use crate::schema::{app_schema_ref, properties_schema};
use serde_json::{json, Value};

/// Runs one of two pipelines depending on a condition
pub struct IfElseBrick {
    id: RegistryId,
    schema: Value,
}

impl IfElseBrick {
    pub const ID: &'static str = "@pixiebrix/if-else";

    pub fn new() -> Self {
        Self {
            id: RegistryId::builtin(Self::ID),
            schema: properties_schema(
                &[
                    ("condition", json!({})),
                    ("if", app_schema_ref("pipeline")),
                    ("else", app_schema_ref("pipeline")),
                ],
                &["condition", "if"],
            ),
        }
    }
}

impl Default for IfElseBrick {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Brick for IfElseBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "If-Else"
    }

    fn description(&self) -> &str {
        "Runs the if branch when the condition holds, otherwise the else branch"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: BrickArgs, options: BrickOptions) -> Result<Value, PipelineError> {
        let branch = if coerce_condition(args.get("condition")) { "if" } else { "else" };
        let pipeline = args.pipeline(branch)?;
        if pipeline.is_empty() {
            return Ok(Value::Null);
        }
        options.run_pipeline(&pipeline, Vec::new()).await
    }
}

/// Runs a body pipeline once per element
pub struct ForEachBrick {
    id: RegistryId,
    schema: Value,
}

impl ForEachBrick {
    pub const ID: &'static str = "@pixiebrix/for-each";

    pub fn new() -> Self {
        Self {
            id: RegistryId::builtin(Self::ID),
            schema: properties_schema(
                &[
                    ("elements", json!({"type": "array"})),
                    ("body", app_schema_ref("pipeline")),
                    ("elementKey", json!({"type": "string", "default": "element"})),
                ],
                &["elements", "body"],
            ),
        }
    }
}

impl Default for ForEachBrick {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Brick for ForEachBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "For-Each Loop"
    }

    fn description(&self) -> &str {
        "Loops over elements, binding each as @element; returns the last body output"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: BrickArgs, options: BrickOptions) -> Result<Value, PipelineError> {
        let elements = match args.require("elements")? {
            Value::Array(items) => items.clone(),
            other => {
                return Err(PipelineConfigurationError::with_config("elements must be an array", other.clone()).into())
            }
        };
        let element_key = args.get_str("elementKey").unwrap_or("element");
        let body = args.pipeline("body")?;

        let mut last = Value::Null;
        for (index, element) in elements.into_iter().enumerate() {
            options.abort_signal().check()?;
            options
                .logger
                .debug(&format!("Iteration {} of {}", index + 1, self.id));
            last = options
                .run_pipeline(&body, vec![(output_key_var(element_key), element)])
                .await?;
        }
        Ok(last)
    }
}

/// Runs a pipeline and handles its failure with another
///
/// Control-flow signals, headless signals and aborts pass straight through.
pub struct TryExceptBrick {
    id: RegistryId,
    schema: Value,
}

impl TryExceptBrick {
    pub const ID: &'static str = "@pixiebrix/try-except";

    pub fn new() -> Self {
        Self {
            id: RegistryId::builtin(Self::ID),
            schema: properties_schema(
                &[
                    ("try", app_schema_ref("pipeline")),
                    ("except", app_schema_ref("pipeline")),
                    ("errorKey", json!({"type": "string", "default": "error"})),
                ],
                &["try"],
            ),
        }
    }
}

impl Default for TryExceptBrick {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Brick for TryExceptBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "Try-Except"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: BrickArgs, options: BrickOptions) -> Result<Value, PipelineError> {
        let try_pipeline = args.pipeline("try")?;
        let except_pipeline = args.pipeline("except")?;
        let error_key = args.get_str("errorKey").unwrap_or("error");

        match options.run_pipeline(&try_pipeline, Vec::new()).await {
            Ok(output) => Ok(output),
            Err(error) if error.is_expected_signal() || matches!(error, PipelineError::Aborted { .. }) => Err(error),
            Err(error) => {
                options.logger.info(&format!("Handling error: {}", error));
                if except_pipeline.is_empty() {
                    return Ok(Value::Null);
                }
                options
                    .run_pipeline(&except_pipeline, vec![(output_key_var(error_key), error.to_value())])
                    .await
            }
        }
    }
}
