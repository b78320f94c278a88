//! Test: steps whose condition is false are skipped

use crate::helpers::*;
use brick_runtime::core::ExecutionStatus;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_skipped_step_is_not_invoked() {
    let echo = EchoBrick::new();
    let calls = echo.calls();
    let engine = engine_with(vec![Arc::new(echo)]);

    let steps = vec![step(EchoBrick::ID)
        .with_arg("message", "hello")
        .with_condition(false)
        .with_output_key("echoed")];

    let report = run(&engine, steps, json!({"a": 1})).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.result, Ok(json!({})));
    assert_eq!(report.state.status, ExecutionStatus::Completed);
    assert_eq!(report.state.skipped_steps, 1);
    assert_eq!(report.state.completed_steps, 0);

    let entry = &report.trace[0];
    assert!(entry.skipped);
    assert_eq!(entry.output, Value::Null);
}

/// A skipped step binds nothing under its output key
#[tokio::test]
async fn test_skipped_step_leaves_context_alone() {
    let engine = engine_with(vec![]);
    let steps = vec![
        identity(json!({"v": 1})).with_output_key("value"),
        identity(json!({"v": 2})).with_output_key("value").with_condition(var("@input.overwrite")),
        identity(json!({"seen": var("@value.v")})),
    ];

    let report = run(&engine, steps, json!({"overwrite": false})).await;

    assert_eq!(report.result, Ok(json!({"seen": 1})));
}

/// Arguments that cannot render only matter when the step runs
#[tokio::test]
async fn test_render_error_on_skipped_step() {
    let engine = engine_with(vec![]);
    let steps = vec![
        identity(json!({"ok": true})),
        identity(json!({"broken": nunjucks("{% if %}")})).with_condition("{{ @input.enabled }}"),
    ];

    let report = run(&engine, steps, json!({"enabled": false})).await;

    assert_eq!(report.result, Ok(json!({"ok": true})));
    let skipped = &report.trace[1];
    assert!(skipped.skipped);
    let render_error = skipped.render_error.as_ref().expect("render error recorded");
    assert_eq!(render_error.name, "RenderError");
}

/// Truthy condition strings run the step
#[tokio::test]
async fn test_condition_string_coercion() {
    let engine = engine_with(vec![]);

    for (flag, expected) in [("yes", true), ("no", false), ("0", false), ("on", true), ("", false)] {
        let steps = vec![identity(json!({"ran": true})).with_condition(var("@input.flag"))];
        let report = run(&engine, steps, json!({"flag": flag})).await;

        let ran = report.result.unwrap() == json!({"ran": true});
        assert_eq!(ran, expected, "flag {:?}", flag);
    }
}
