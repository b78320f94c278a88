//! Test: remote brick resolution is cached and shared

use crate::helpers::*;
use brick_runtime::bricks::builtin::builtin_bricks;
use brick_runtime::errors::PipelineError;
use brick_runtime::execution::ExecutionEngine;
use brick_runtime::registry::BrickRegistry;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn remote_engine(source: SlowSource) -> ExecutionEngine {
    let registry = BrickRegistry::with_source(Arc::new(source));
    registry.register(builtin_bricks());
    ExecutionEngine::new(Arc::new(registry))
}

#[tokio::test]
async fn test_remote_brick_fetched_once() {
    let source = SlowSource::new(Duration::from_millis(5));
    let fetches = source.fetches();
    let engine = remote_engine(source);

    for n in 0..3 {
        let steps = vec![step("@remote/thing").with_arg("n", n)];
        let report = run(&engine, steps, json!({})).await;
        assert_eq!(report.result, Ok(json!({"remote": {"n": n}})));
    }

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_runs_share_one_fetch() {
    let source = SlowSource::new(Duration::from_millis(30));
    let fetches = source.fetches();
    let engine = Arc::new(remote_engine(source));

    let mut handles = Vec::new();
    for n in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let steps = vec![step("@remote/thing").with_arg("n", n)];
            run(&engine, steps, json!({})).await.result
        }));
    }

    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap(), Ok(json!({"remote": {"n": n}})));
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_brick_not_found() {
    let engine = remote_engine(SlowSource::new(Duration::from_millis(1)));

    let report = run(&engine, vec![step("@other/missing")], json!({})).await;

    match report.result {
        Err(PipelineError::BrickNotFound { id }) => assert_eq!(id, "@other/missing"),
        other => panic!("expected brick not found, got {:?}", other),
    }
}

/// Local registrations win without touching the source
#[tokio::test]
async fn test_local_bricks_skip_the_source() {
    let source = SlowSource::new(Duration::from_millis(1));
    let fetches = source.fetches();
    let engine = remote_engine(source);

    let report = run(&engine, vec![identity(json!({"local": true}))], json!({})).await;

    assert_eq!(report.result, Ok(json!({"local": true})));
    assert_eq!(fetches.load(Ordering::SeqCst), 0);
}
