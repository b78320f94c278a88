//! Test: input validation aborts, output validation only logs

use crate::helpers::*;
use brick_runtime::core::ExecutionStatus;
use brick_runtime::errors::PipelineError;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_missing_required_property_aborts() {
    let echo = EchoBrick::new();
    let calls = echo.calls();
    let engine = engine_with(vec![Arc::new(echo)]);

    let steps = vec![
        identity(json!({"first": true})),
        step(EchoBrick::ID).with_arg("other", "value"),
        identity(json!({"never": true})),
    ];

    let report = run(&engine, steps, json!({})).await;

    match &report.result {
        Err(PipelineError::InputValidation(err)) => {
            assert_eq!(err.brick_id.as_ref().map(|id| id.as_str()), Some(EchoBrick::ID));
            assert_eq!(err.input, json!({"other": "value"}));
            assert!(!err.errors.is_empty());
        }
        other => panic!("expected input validation error, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.state.status, ExecutionStatus::Failed);
    assert_eq!(report.trace.len(), 2);
}

/// Wrong type for a declared property
#[tokio::test]
async fn test_type_mismatch_aborts() {
    let engine = engine_with(vec![Arc::new(EchoBrick::new())]);
    let steps = vec![step(EchoBrick::ID).with_arg("message", var("@input.count"))];

    let report = run(&engine, steps, json!({"count": 3})).await;

    assert!(matches!(report.result, Err(PipelineError::InputValidation(_))));
}

/// Validation can be switched off by the caller
#[tokio::test]
async fn test_input_validation_disabled() {
    let engine = engine_with(vec![Arc::new(EchoBrick::new())]);
    let options = engine.run_options().with_validation(false, false);

    let report = run_with(&engine, vec![step(EchoBrick::ID)], json!({}), options).await;

    assert_eq!(report.result, Ok(json!({})));
}

/// Output drift is logged, never raised
#[tokio::test]
async fn test_output_validation_is_log_only() {
    let engine = engine_with(vec![Arc::new(DriftingBrick::new())]);

    let report = run(&engine, vec![step(DriftingBrick::ID)], json!({})).await;

    assert_eq!(report.result, Ok(json!({"count": "many"})));
    assert_eq!(report.state.status, ExecutionStatus::Completed);
    assert!(report.trace[0].error.is_none());
}
