//! Test: renderer pipelines, headless mode and template engines

use crate::helpers::*;
use brick_runtime::bricks::builtin::{DisplayTemporaryInfoBrick, HtmlRendererBrick};
use brick_runtime::core::{ApiVersion, ExecutionStatus};
use brick_runtime::errors::PipelineError;
use brick_runtime::platform::{HeadlessPlatform, PlatformCapability};
use serde_json::json;
use std::sync::Arc;

fn panel_engine() -> brick_runtime::execution::ExecutionEngine {
    engine_with(vec![]).with_platform(Arc::new(HeadlessPlatform::with_capabilities(vec![
        PlatformCapability::State,
        PlatformCapability::PanelHost,
    ])))
}

#[tokio::test]
async fn test_temporary_display_captures_renderer() {
    let engine = panel_engine();
    let body = vec![step(HtmlRendererBrick::ID).with_arg("html", mustache("<p>{{ @input.name }}</p>"))];
    let steps = vec![step(DisplayTemporaryInfoBrick::ID)
        .with_arg("title", "Greeting")
        .with_arg("body", pipeline(body))];

    let report = run(&engine, steps, json!({"name": "Ada"})).await;

    let result = report.result.unwrap();
    assert_eq!(result["title"], json!("Greeting"));
    assert_eq!(result["payload"]["brickId"], json!(HtmlRendererBrick::ID));
    assert_eq!(result["payload"]["args"], json!({"html": "<p>Ada</p>"}));
    assert_eq!(report.state.status, ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_body_without_renderer_is_business_error() {
    let engine = panel_engine();
    let steps = vec![step(DisplayTemporaryInfoBrick::ID)
        .with_arg("body", pipeline(vec![identity(json!({"plain": true}))]))];

    let report = run(&engine, steps, json!({})).await;

    match report.result {
        Err(PipelineError::Business(err)) => {
            assert_eq!(err.message, "Pipeline does not include a renderer")
        }
        other => panic!("expected business error, got {:?}", other),
    }
    assert_eq!(report.state.status, ExecutionStatus::Failed);
}

#[tokio::test]
async fn test_display_needs_panel_host() {
    let engine = engine_with(vec![]);
    let steps = vec![step(DisplayTemporaryInfoBrick::ID)
        .with_arg("body", pipeline(vec![step(HtmlRendererBrick::ID).with_arg("html", "hi")]))];

    let report = run(&engine, steps, json!({})).await;

    assert!(matches!(
        report.result,
        Err(PipelineError::PlatformCapabilityNotAvailable { .. })
    ));
    assert!(report.trace.is_empty());
}

#[tokio::test]
async fn test_headless_run_interrupts_at_renderer() {
    let engine = engine_with(vec![]);
    let options = engine.run_options().with_headless(true);
    let steps = vec![
        identity(json!({"name": var("@input.name")})).with_output_key("data"),
        step(HtmlRendererBrick::ID).with_arg("html", mustache("<b>{{ @data.name }}</b>")),
        identity(json!({"never": true})),
    ];

    let report = run_with(&engine, steps, json!({"name": "Ada"}), options).await;

    match &report.result {
        Err(PipelineError::HeadlessMode(signal)) => {
            assert_eq!(signal.brick_id.as_str(), HtmlRendererBrick::ID);
            assert_eq!(signal.args, json!({"html": "<b>Ada</b>"}));
        }
        other => panic!("expected headless signal, got {:?}", other),
    }
    assert_eq!(report.state.status, ExecutionStatus::Interrupted);
    assert_eq!(report.trace.len(), 2);
}

#[tokio::test]
async fn test_renderer_runs_when_not_headless() {
    let engine = engine_with(vec![]);
    let steps = vec![step(HtmlRendererBrick::ID).with_arg("html", "<hr>")];

    let report = run(&engine, steps, json!({})).await;

    assert_eq!(report.result, Ok(json!({"html": "<hr>"})));
}

#[tokio::test]
async fn test_nunjucks_filters_and_control() {
    let engine = engine_with(vec![]);
    let template = "{% for item in @input.items %}{{ item | upper }}{% if not loop.last %}, {% endif %}{% endfor %}";
    let steps = vec![identity(json!({
        "list": nunjucks(template),
        "count": nunjucks("{{ @input.items | length }}"),
        "fallback": nunjucks("{{ @input.missing | default('none') }}"),
    }))];

    let report = run(&engine, steps, json!({"items": ["a", "b", "c"]})).await;

    assert_eq!(
        report.result,
        Ok(json!({"list": "A, B, C", "count": "3", "fallback": "none"}))
    );
}

/// v1 escapes HTML in interpolations, v3 does not
///
/// A lone `{{ path }}` returns the raw value under either version.
#[tokio::test]
async fn test_autoescape_depends_on_version() {
    let engine = engine_with(vec![]);
    let steps = vec![identity(json!({"out": mustache("Value: {{ @input.html }}")}))];
    let input = json!({"html": "<i>x</i>"});

    let v1 = run_with(
        &engine,
        steps.clone(),
        input.clone(),
        engine.run_options().with_api_version(ApiVersion::V1),
    )
    .await;
    assert_eq!(v1.result, Ok(json!({"out": "Value: &lt;i&gt;x&lt;/i&gt;"})));

    let v3 = run(&engine, steps, input.clone()).await;
    assert_eq!(v3.result, Ok(json!({"out": "Value: <i>x</i>"})));

    let raw = vec![identity(json!({"out": mustache("{{ @input.html }}")}))];
    let v1_raw = run_with(
        &engine,
        raw,
        input,
        engine.run_options().with_api_version(ApiVersion::V1),
    )
    .await;
    assert_eq!(v1_raw.result, Ok(json!({"out": "<i>x</i>"})));
}
