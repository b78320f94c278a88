//! Test: `@mod` snapshot semantics and the state bricks

use crate::helpers::*;
use brick_runtime::bricks::builtin::{GetStateBrick, SetStateBrick};
use brick_runtime::core::RegistryId;
use brick_runtime::execution::ExecutionEngine;
use brick_runtime::persistence::{MergeStrategy, ModComponentRef, StateNamespace};
use serde_json::{json, Value};
use std::sync::Arc;

fn component() -> ModComponentRef {
    ModComponentRef::new(Some(RegistryId::parse("@test/mod").unwrap()))
}

async fn seed(engine: &ExecutionEngine, component: &ModComponentRef, data: Value) {
    engine
        .state_store()
        .set_state(StateNamespace::Mod, data, MergeStrategy::Replace, component)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_mod_snapshot_is_stable_within_a_run() {
    let engine = engine_with(vec![Arc::new(ExternalWriterBrick::new())]);
    let component = component();
    seed(&engine, &component, json!({"name": "before"})).await;

    let steps = vec![
        identity(json!({"name": var("@mod.name")})).with_output_key("first"),
        step(ExternalWriterBrick::ID).with_arg("name", "after"),
        identity(json!({"first": var("@first.name"), "second": var("@mod.name")})),
    ];

    let options = engine.run_options().with_mod_component(component.clone());
    let report = run_with(&engine, steps, json!({}), options).await;

    assert_eq!(report.result, Ok(json!({"first": "before", "second": "before"})));

    // The write did land in the store
    let stored = engine.state_store().get_state(StateNamespace::Mod, &component).await.unwrap();
    assert_eq!(stored, json!({"name": "after"}));
}

#[tokio::test]
async fn test_next_run_sees_new_state() {
    let engine = engine_with(vec![Arc::new(ExternalWriterBrick::new())]);
    let component = component();
    seed(&engine, &component, json!({"name": "before"})).await;

    let writer = vec![step(ExternalWriterBrick::ID).with_arg("name", "after")];
    let options = engine.run_options().with_mod_component(component.clone());
    run_with(&engine, writer, json!({}), options).await.result.unwrap();

    let reader = vec![identity(json!({"name": var("@mod.name")}))];
    let options = engine.run_options().with_mod_component(component);
    let report = run_with(&engine, reader, json!({}), options).await;

    assert_eq!(report.result, Ok(json!({"name": "after"})));
}

/// Unlike `@mod`, the get brick always reads the store
#[tokio::test]
async fn test_state_bricks_read_and_write_through() {
    let engine = engine_with(vec![]);
    let component = component();
    seed(&engine, &component, json!({"count": 1, "label": "kept"})).await;

    let steps = vec![
        identity(json!({"snapshot": var("@mod.count")})).with_output_key("before"),
        step(SetStateBrick::ID)
            .with_arg("data", json!({"count": 2}))
            .with_output_key("written"),
        step(GetStateBrick::ID).with_output_key("current"),
        identity(json!({
            "snapshot": var("@before.snapshot"),
            "written": var("@written"),
            "current": var("@current.count"),
            "stale": var("@mod.count"),
        })),
    ];

    let options = engine.run_options().with_mod_component(component);
    let report = run_with(&engine, steps, json!({}), options).await;

    assert_eq!(
        report.result,
        Ok(json!({
            "snapshot": 1,
            "written": {"count": 2, "label": "kept"},
            "current": 2,
            "stale": 1,
        }))
    );
}

#[tokio::test]
async fn test_set_state_replace_and_namespaces() {
    let engine = engine_with(vec![]);
    let component = component();
    seed(&engine, &component, json!({"count": 1, "label": "dropped"})).await;

    let steps = vec![
        step(SetStateBrick::ID)
            .with_arg("data", json!({"count": 5}))
            .with_arg("mergeStrategy", "replace"),
        step(SetStateBrick::ID)
            .with_arg("data", json!({"theme": "dark"}))
            .with_arg("namespace", "private"),
    ];

    let options = engine.run_options().with_mod_component(component.clone());
    run_with(&engine, steps, json!({}), options).await.result.unwrap();

    let store = engine.state_store();
    assert_eq!(
        store.get_state(StateNamespace::Mod, &component).await.unwrap(),
        json!({"count": 5})
    );
    assert_eq!(
        store.get_state(StateNamespace::Private, &component).await.unwrap(),
        json!({"theme": "dark"})
    );
    assert_eq!(store.get_state(StateNamespace::Shared, &component).await.unwrap(), json!({}));
}

#[tokio::test]
async fn test_unknown_namespace_is_configuration_error() {
    let engine = engine_with(vec![]);
    let steps = vec![step(GetStateBrick::ID).with_arg("namespace", "global")];

    let report = run(&engine, steps, json!({})).await;

    let err = report.result.unwrap_err();
    assert!(matches!(
        err,
        brick_runtime::errors::PipelineError::InputValidation(_)
            | brick_runtime::errors::PipelineError::Configuration(_)
    ));
}

/// Reusing one set of options still gives every run its own snapshot
#[tokio::test]
async fn test_reused_options_see_new_state() {
    let engine = engine_with(vec![]);
    let component = component();
    let options = engine.run_options().with_mod_component(component.clone());
    let reader = vec![identity(json!({"name": var("@mod.name")}))];

    seed(&engine, &component, json!({"name": "before"})).await;
    let first = run_with(&engine, reader.clone(), json!({}), options.clone()).await;

    seed(&engine, &component, json!({"name": "after"})).await;
    let second = run_with(&engine, reader, json!({}), options).await;

    assert_eq!(first.result, Ok(json!({"name": "before"})));
    assert_eq!(second.result, Ok(json!({"name": "after"})));
}
