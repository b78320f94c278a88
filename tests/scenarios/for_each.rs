//! Test: for-each loops run their body in order

use crate::helpers::*;
use brick_runtime::bricks::builtin::ForEachBrick;
use brick_runtime::errors::PipelineError;
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn test_body_runs_per_element_in_order() {
    let delay = DelayBrick::new();
    let finished = delay.finished();
    let engine = engine_with(vec![Arc::new(delay)]);

    let body = vec![step(DelayBrick::ID)
        .with_arg("value", var("@element"))
        .with_arg("delayMs", json!(5))];
    let steps = vec![step(ForEachBrick::ID)
        .with_arg("elements", var("@input.items"))
        .with_arg("body", pipeline(body))];

    let report = run(&engine, steps, json!({"items": [3, 1, 2]})).await;

    assert_eq!(report.result, Ok(json!({"value": 2, "delayMs": 5})));
    let values: Vec<Value> = finished.lock().unwrap().iter().map(|v| v["value"].clone()).collect();
    assert_eq!(values, vec![json!(3), json!(1), json!(2)]);
}

#[tokio::test]
async fn test_custom_element_key() {
    let engine = engine_with(vec![]);
    let body = vec![identity(json!({"name": var("@row.name"), "parent": var("@input.label")}))];
    let steps = vec![step(ForEachBrick::ID)
        .with_arg("elements", var("@input.rows"))
        .with_arg("elementKey", "row")
        .with_arg("body", pipeline(body))
        .with_output_key("last")];

    let steps = [steps, vec![identity(json!({"last": var("@last"), "leaked": var("@row")}))]].concat();

    let report = run(
        &engine,
        steps,
        json!({"label": "table", "rows": [{"name": "a"}, {"name": "b"}]}),
    )
    .await;

    assert_eq!(report.result, Ok(json!({"last": {"name": "b", "parent": "table"}})));
}

#[tokio::test]
async fn test_empty_elements_return_null() {
    let engine = engine_with(vec![]);
    let steps = vec![step(ForEachBrick::ID)
        .with_arg("elements", json!([]))
        .with_arg("body", pipeline(vec![identity(json!({"x": 1}))]))
        .with_output_key("loop")];
    let steps = [steps, vec![identity(json!({"isNull": var("@loop")}))]].concat();

    let report = run(&engine, steps, json!({})).await;

    assert_eq!(report.result, Ok(json!({"isNull": null})));
}

#[tokio::test]
async fn test_body_failure_stops_the_loop() {
    let delay = DelayBrick::new();
    let finished = delay.finished();
    let engine = engine_with(vec![Arc::new(delay), Arc::new(PanicBrick::new())]);

    let body = vec![
        step(DelayBrick::ID).with_arg("value", var("@element")),
        step("@pixiebrix/if-else")
            .with_arg("condition", var("@element.stop"))
            .with_arg("if", pipeline(vec![step(PanicBrick::ID)])),
    ];
    let steps = vec![step(ForEachBrick::ID)
        .with_arg("elements", json!([{"stop": false}, {"stop": true}, {"stop": false}]))
        .with_arg("body", pipeline(body))];

    let report = run(&engine, steps, json!({})).await;

    assert_eq!(report.result, Err(PipelineError::unknown("boom")));
    assert_eq!(finished.lock().unwrap().len(), 2);
}
