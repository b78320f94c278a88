//! Test: errors survive a serialization boundary

use crate::helpers::*;
use brick_runtime::errors::{
    is_business_error, is_control_flow, is_headless_mode_error, is_input_validation_error,
    BusinessError, PanelAction, PipelineError,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Serialize to a JSON string and back, as a message channel would
fn across_boundary(error: &PipelineError) -> Value {
    let wire = serde_json::to_string(&error.to_value()).unwrap();
    serde_json::from_str(&wire).unwrap()
}

#[tokio::test]
async fn test_input_validation_error_survives() {
    let engine = engine_with(vec![Arc::new(EchoBrick::new())]);
    let report = run(&engine, vec![step(EchoBrick::ID)], json!({})).await;
    let error = report.result.unwrap_err();

    let value = across_boundary(&error);

    assert!(is_input_validation_error(&value));
    assert!(!is_business_error(&value));
    assert_eq!(value["name"], json!("InputValidationError"));
    assert_eq!(PipelineError::from_serialized(&value), error);
}

#[tokio::test]
async fn test_headless_signal_survives() {
    let engine = engine_with(vec![]);
    let options = engine.run_options().with_headless(true);
    let steps = vec![step("@pixiebrix/html").with_arg("html", "<p/>")];
    let error = run_with(&engine, steps, json!({}), options).await.result.unwrap_err();

    let value = across_boundary(&error);

    assert!(is_headless_mode_error(&value));
    assert_eq!(value["brickId"], json!("@pixiebrix/html"));
    assert_eq!(PipelineError::from_serialized(&value), error);
}

#[test]
fn test_panel_actions_survive() {
    let actions = vec![
        PanelAction::Submit {
            detail: json!({"answer": 42}),
        },
        PanelAction::Abort,
        PanelAction::Close,
    ];

    for action in actions {
        let error = PipelineError::from(action);
        let value = across_boundary(&error);

        assert!(is_control_flow(&value), "not control flow: {}", value);
        let restored = PipelineError::from_serialized(&value);
        assert!(restored.is_control_flow());
        assert_eq!(restored, error);
    }
}

#[test]
fn test_business_errors_survive() {
    let errors = vec![
        BusinessError::new("Quota exceeded").into(),
        PipelineError::BrickNotFound {
            id: "@acme/missing".to_string(),
        },
        PipelineError::Aborted {
            reason: "user left".to_string(),
        },
    ];

    for error in errors {
        let value = across_boundary(&error);
        assert!(is_business_error(&value), "not a business error: {}", value);
        assert!(!is_control_flow(&value));
        assert_eq!(PipelineError::from_serialized(&value), error);
    }
}

#[test]
fn test_foreign_shapes_become_unknown() {
    let value = json!({"name": "TypeError", "message": "x is not a function"});
    assert_eq!(
        PipelineError::from_serialized(&value),
        PipelineError::unknown("x is not a function")
    );

    // Right name, missing properties
    let value = json!({"name": "InputValidationError", "message": "bad"});
    assert!(!is_input_validation_error(&value));
    assert!(matches!(PipelineError::from_serialized(&value), PipelineError::Unknown(_)));
}

/// Errors caught by try-except are bound in their serialized shape
#[tokio::test]
async fn test_caught_error_matches_boundary_shape() {
    let engine = engine_with(vec![Arc::new(PanicBrick::new())]);
    let steps = vec![step("@pixiebrix/try-except")
        .with_arg("try", pipeline(vec![step(PanicBrick::ID)]))
        .with_arg("except", pipeline(vec![identity(json!({"caught": var("@error")}))]))];

    let report = run(&engine, steps, json!({})).await;

    let caught = report.result.unwrap()["caught"].clone();
    assert_eq!(caught, across_boundary(&PipelineError::unknown("boom")));
}
