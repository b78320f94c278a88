//! Test: control-flow signals, try-except and cancellation

use crate::helpers::*;
use brick_runtime::bricks::builtin::{IfElseBrick, PanelActionBrick, RaiseErrorBrick, TryExceptBrick};
use brick_runtime::core::ExecutionStatus;
use brick_runtime::errors::{PanelAction, PipelineError};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn abort_inside_if() -> brick_runtime::BrickConfig {
    step(IfElseBrick::ID)
        .with_arg("condition", true)
        .with_arg("if", pipeline(vec![step(PanelActionBrick::ABORT_ID)]))
}

/// The exact panel action reaches the top-level caller
#[tokio::test]
async fn test_panel_action_surfaces_from_nested_branch() {
    let engine = engine_with(vec![]);
    let report = run(&engine, vec![abort_inside_if(), identity(json!({"after": true}))], json!({})).await;

    assert_eq!(report.result, Err(PipelineError::ControlFlow(PanelAction::Abort)));
    assert_eq!(report.state.status, ExecutionStatus::Interrupted);
    assert!(report.trace.iter().all(|e| e.brick_id.as_str() != "@pixiebrix/identity"));
}

/// try-except re-raises control flow instead of handling it
#[tokio::test]
async fn test_try_except_passes_control_flow_through() {
    let engine = engine_with(vec![]);
    let steps = vec![step(TryExceptBrick::ID)
        .with_arg("try", pipeline(vec![abort_inside_if()]))
        .with_arg("except", pipeline(vec![identity(json!({"handled": true}))]))];

    let report = run(&engine, steps, json!({})).await;

    assert_eq!(report.result, Err(PipelineError::ControlFlow(PanelAction::Abort)));
}

/// Submit carries its detail
#[tokio::test]
async fn test_submit_detail() {
    let engine = engine_with(vec![]);
    let steps = vec![step(PanelActionBrick::SUBMIT_ID).with_arg("detail", var("@input"))];

    let report = run(&engine, steps, json!({"answer": 42})).await;

    match report.result {
        Err(error) => {
            assert!(error.is_control_flow());
            assert_eq!(
                error.panel_action(),
                Some(&PanelAction::Submit {
                    detail: json!({"answer": 42})
                })
            );
        }
        Ok(value) => panic!("expected submit, got {}", value),
    }
}

/// Business errors are handled by the except branch with `@error` bound
#[tokio::test]
async fn test_try_except_handles_business_error() {
    let engine = engine_with(vec![]);
    let steps = vec![step(TryExceptBrick::ID)
        .with_arg("try", pipeline(vec![step(RaiseErrorBrick::ID).with_arg("message", "bad input")]))
        .with_arg(
            "except",
            pipeline(vec![identity(json!({
                "handled": var("@error.message"),
                "name": var("@error.name"),
            }))]),
        )];

    let report = run(&engine, steps, json!({})).await;

    assert_eq!(report.result, Ok(json!({"handled": "bad input", "name": "BusinessError"})));
    assert_eq!(report.state.status, ExecutionStatus::Completed);
}

/// Unknown errors are handled too, under a custom key
#[tokio::test]
async fn test_try_except_custom_error_key() {
    let engine = engine_with(vec![Arc::new(PanicBrick::new())]);
    let steps = vec![step(TryExceptBrick::ID)
        .with_arg("try", pipeline(vec![step(PanicBrick::ID)]))
        .with_arg("errorKey", "failure")
        .with_arg("except", pipeline(vec![identity(json!({"caught": var("@failure.name")}))]))];

    let report = run(&engine, steps, json!({})).await;

    assert_eq!(report.result, Ok(json!({"caught": "Error"})));
}

/// Unhandled unknown errors fail the run
#[tokio::test]
async fn test_unknown_error_fails_run() {
    let engine = engine_with(vec![Arc::new(PanicBrick::new())]);
    let report = run(&engine, vec![step(PanicBrick::ID)], json!({})).await;

    assert_eq!(report.result, Err(PipelineError::unknown("boom")));
    assert_eq!(report.state.status, ExecutionStatus::Failed);
    assert_eq!(report.trace[0].error.as_ref().map(|e| e.name.as_str()), Some("Error"));
}

/// Aborting mid-run stops before the next step
#[tokio::test]
async fn test_abort_between_steps() {
    let echo = EchoBrick::new();
    let calls = echo.calls();
    let engine = engine_with(vec![Arc::new(DelayBrick::new()), Arc::new(echo)]);
    let options = engine.run_options();
    let signal = options.abort_signal.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.abort("user closed the tab");
    });

    let steps = vec![
        step(DelayBrick::ID).with_arg("delayMs", 50),
        step(EchoBrick::ID).with_arg("message", "never"),
    ];
    let report = run_with(&engine, steps, json!({}), options).await;

    assert_eq!(
        report.result,
        Err(PipelineError::Aborted {
            reason: "user closed the tab".to_string()
        })
    );
    assert_eq!(report.state.status, ExecutionStatus::Cancelled);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// An abort raised before the run invokes no brick at all
#[tokio::test]
async fn test_abort_before_run() {
    let echo = EchoBrick::new();
    let calls = echo.calls();
    let engine = engine_with(vec![Arc::new(echo)]);
    let options = engine.run_options();
    options.abort_signal.abort("cancelled");

    let report = run_with(&engine, vec![step(EchoBrick::ID).with_arg("message", "hi")], json!({}), options).await;

    assert!(matches!(report.result, Err(PipelineError::Aborted { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
