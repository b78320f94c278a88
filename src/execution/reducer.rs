//! Pipeline reducer
//!
//! Runs steps strictly in order. Each step is rendered against the context
//! produced by the previous step, its condition is evaluated, its brick is
//! executed and the result is merged back before the next step starts.
//!
//! The value carried between un-keyed steps is the *working output*; it is
//! what a pipeline returns. It starts as `@input` under v1 and as `{}` once
//! data flow is explicit.

use crate::bricks::{BoxFuture, Brick, BrickArgs, BrickKind, BrickOptions};
use crate::core::condition::coerce_condition;
use crate::core::context::{output_key_var, ModVariable, RunContext, MOD_VAR};
use crate::core::pipeline::{validate_pipeline, PipelineInput};
use crate::core::step::{BrickConfig, RootMode};
use crate::errors::{ErrorClass, HeadlessModeError, PipelineError};
use crate::execution::events::ExecutionEvent;
use crate::execution::logger::{LogContext, RunLogger};
use crate::execution::options::{InitialValues, RunOptions};
use crate::platform::ElementRef;
use crate::schema::SchemaRole;
use crate::template::{render_condition, render_config};
use serde_json::{Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Result of running one step
#[derive(Debug)]
enum StepOutcome {
    /// The condition was false
    Skipped,
    Ran { output: Value, kind: BrickKind },
}

fn initial_working_output(options: &RunOptions, input: &Value) -> Value {
    if options.api_version.explicit_data_flow {
        Value::Object(Map::new())
    } else {
        input.clone()
    }
}

/// Run a top-level pipeline
///
/// Every call takes a fresh `@mod` snapshot, even when `options` was used
/// for an earlier run.
pub async fn reduce_pipeline(
    pipeline: impl Into<PipelineInput>,
    initial: InitialValues,
    options: &RunOptions,
) -> Result<Value, PipelineError> {
    let steps = pipeline.into().into_steps();
    validate_pipeline(&steps)?;

    let ctxt = RunContext::new(initial.input.clone(), initial.options_args)
        .with_vars(initial.integration_context);
    let root = initial.root.unwrap_or_else(|| options.root.clone());
    let working = initial_working_output(options, &initial.input);

    let mut options = options.clone();
    options.mod_variable = ModVariable::new();

    options
        .logger
        .debug(&format!("Running pipeline with {} step(s)", steps.len()));
    run_steps(&steps, ctxt, working, root, &options).await
}

/// Run a nested pipeline against a context derived from its parent
///
/// `parent_working` is the invoking step's working output. Under v1 the
/// nested run continues from it, so fields flattened by earlier parent steps
/// stay in scope. Bindings the nested pipeline creates are dropped when it
/// returns.
pub fn reduce_pipeline_expression<'a>(
    pipeline: &'a [BrickConfig],
    ctxt: RunContext,
    parent_working: Value,
    root: ElementRef,
    options: &'a RunOptions,
) -> BoxFuture<'a, Result<Value, PipelineError>> {
    Box::pin(async move {
        let working = initial_working_output(options, &parent_working);
        run_steps(pipeline, ctxt, working, root, options).await
    })
}

async fn run_steps(
    steps: &[BrickConfig],
    mut ctxt: RunContext,
    mut working: Value,
    root: ElementRef,
    options: &RunOptions,
) -> Result<Value, PipelineError> {
    for step in steps {
        match run_step(step, &ctxt, &working, &root, options).await? {
            StepOutcome::Skipped => {}
            StepOutcome::Ran { output, kind } => {
                if let Some(key) = &step.output_key {
                    ctxt = ctxt.with_var(output_key_var(key), output);
                } else if kind != BrickKind::Effect
                    && (!options.api_version.explicit_data_flow || !output.is_null())
                {
                    working = output;
                }
            }
        }
    }

    Ok(working)
}

/// Run one step, reporting its outcome as events
async fn run_step(
    step: &BrickConfig,
    ctxt: &RunContext,
    working: &Value,
    root: &ElementRef,
    options: &RunOptions,
) -> Result<StepOutcome, PipelineError> {
    options.abort_signal.check()?;

    let run_id = options.run_id();
    let instance_id = step.instance_id.unwrap_or_else(Uuid::new_v4);
    let logger = options.logger.for_step(step).child(LogContext {
        instance_id: Some(instance_id),
        ..LogContext::default()
    });

    let brick = options.registry.lookup(&step.id).await?;

    options.events.emit(ExecutionEvent::StepStarted {
        run_id,
        instance_id,
        brick_id: step.id.clone(),
        label: step.label.clone(),
    });

    let result = execute_step(step, brick, ctxt, working, root, options, &logger, instance_id).await;

    match &result {
        Ok(StepOutcome::Skipped) => {
            logger.debug(&format!("Skipped {}", step.display_name()));
            options.events.emit(ExecutionEvent::StepSkipped { run_id, instance_id });
        }
        Ok(StepOutcome::Ran { output, .. }) => {
            options.events.emit(ExecutionEvent::StepCompleted {
                run_id,
                instance_id,
                output: output.clone(),
            });
        }
        Err(error) => {
            match error.class() {
                ErrorClass::ControlFlow | ErrorClass::HeadlessMode => {
                    logger.debug(&format!("{} raised {}", step.display_name(), error.name()))
                }
                ErrorClass::Unknown => logger.error(&error.to_string()),
                ErrorClass::Business | ErrorClass::Validation => logger.warn(&error.to_string()),
            }
            options.events.emit(ExecutionEvent::StepFailed {
                run_id,
                instance_id,
                error: error.to_serialized(),
            });
        }
    }

    result
}

#[allow(clippy::too_many_arguments)]
async fn execute_step(
    step: &BrickConfig,
    brick: Arc<dyn Brick>,
    ctxt: &RunContext,
    working: &Value,
    root: &ElementRef,
    options: &RunOptions,
    logger: &RunLogger,
    instance_id: Uuid,
) -> Result<StepOutcome, PipelineError> {
    let flags = &options.api_version;

    let mod_state = if flags.extend_mod_variable && step.references_variable(MOD_VAR) {
        Some(
            options
                .mod_variable
                .resolve(options.state_store.as_ref(), &options.mod_component)
                .await?,
        )
    } else {
        None
    };

    let flatten = if flags.explicit_data_flow { None } else { Some(working) };
    let scope = ctxt.render_scope(flatten, mod_state);

    // A render failure only matters if the step actually runs
    let rendered = render_config(&step.config, &scope, flags);
    options.events.emit(ExecutionEvent::StepRendered {
        run_id: options.run_id(),
        instance_id,
        args: rendered.as_ref().ok().cloned(),
        render_error: rendered
            .as_ref()
            .err()
            .map(|e| PipelineError::from(e.clone()).to_serialized()),
    });
    if let Err(e) = &rendered {
        logger.debug(&format!("Could not render arguments: {}", e));
    }

    if let Some(condition) = &step.condition {
        let value = render_condition(condition, &scope, flags)?;
        if !coerce_condition(value.as_ref()) {
            return Ok(StepOutcome::Skipped);
        }
    }

    let args = rendered?;
    let kind = brick.kind();

    if kind == BrickKind::Renderer && options.headless {
        return Err(HeadlessModeError {
            brick_id: step.id.clone(),
            args,
            ctxt: ctxt.to_value(),
            logger_context: logger.context().clone(),
        }
        .into());
    }

    if options.validate_input {
        if let Some(schema) = options.registry.compiled_schema(brick.as_ref(), SchemaRole::Input) {
            schema.check_input(&step.id, &args)?;
        }
    }

    let step_root = match step.root_mode() {
        RootMode::Document => ElementRef::Document,
        RootMode::Element => root.clone(),
    };
    let brick_options = BrickOptions::new(
        ctxt.clone(),
        working.clone(),
        step_root,
        logger.clone(),
        options.clone(),
    );

    logger.debug(&format!("Running {}", step.display_name()));
    let output = brick.execute(BrickArgs::new(args), brick_options).await?;

    if options.validate_output {
        if let Some(schema) = options.registry.compiled_schema(brick.as_ref(), SchemaRole::Output) {
            if let Err(e) = schema.check_output(&step.id, &output) {
                logger.warn(&e.to_string());
            }
        }
    }

    Ok(StepOutcome::Ran { output, kind })
}
