//! Test: steps run strictly in order and see earlier bindings

use crate::helpers::*;
use serde_json::json;
use std::sync::Arc;

/// B sees A's output under its output key, even when A is slow
#[tokio::test]
async fn test_output_key_visible_to_next_step() {
    let delay = DelayBrick::new();
    let finished = delay.finished();
    let echo = EchoBrick::new();
    let engine = engine_with(vec![Arc::new(delay), Arc::new(echo)]);

    let steps = vec![
        step(DelayBrick::ID)
            .with_config(json!({"delayMs": 30, "value": "a"}))
            .with_output_key("k1"),
        step(EchoBrick::ID).with_arg("message", mustache("got {{ @k1.value }}")),
    ];

    let report = run(&engine, steps, json!({})).await;

    assert_eq!(report.result, Ok(json!({"message": "got a"})));
    assert_eq!(finished.lock().unwrap().len(), 1);
}

/// Completion order follows declaration order, not brick latency
#[tokio::test]
async fn test_slow_steps_do_not_overlap() {
    let delay = DelayBrick::new();
    let finished = delay.finished();
    let engine = engine_with(vec![Arc::new(delay)]);

    let steps = vec![
        step(DelayBrick::ID).with_config(json!({"delayMs": 40, "n": 1})),
        step(DelayBrick::ID).with_config(json!({"delayMs": 20, "n": 2})),
        step(DelayBrick::ID).with_config(json!({"delayMs": 0, "n": 3})),
    ];

    let report = run(&engine, steps, json!({})).await;

    assert!(report.is_success());
    let order: Vec<_> = finished.lock().unwrap().iter().map(|v| v["n"].clone()).collect();
    assert_eq!(order, vec![json!(1), json!(2), json!(3)]);
}

/// A step never sees bindings made by later steps
#[tokio::test]
async fn test_later_bindings_are_invisible() {
    let engine = engine_with(vec![]);
    let steps = vec![
        identity(json!({"early": var("@late")})),
        identity(json!({"x": 1})).with_output_key("late"),
    ];

    let report = run(&engine, steps, json!({})).await;

    // The undefined field is dropped, so the first step produced `{}`
    assert_eq!(report.result, Ok(json!({})));
    assert_eq!(report.trace[0].output, json!({}));
}

/// Round trip through render, validate and execute leaves the value unchanged
#[tokio::test]
async fn test_echo_round_trip() {
    let engine = engine_with(vec![Arc::new(EchoBrick::new())]);
    let steps = vec![step(EchoBrick::ID).with_arg("message", "hello")];

    let report = run(&engine, steps, json!({})).await;

    assert_eq!(report.result, Ok(json!({"message": "hello"})));
}
