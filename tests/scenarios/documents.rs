//! Test: running YAML pipeline documents

use crate::helpers::*;
use brick_runtime::core::config::PipelineDocument;
use brick_runtime::core::{ApiVersion, ExecutionStatus};
use serde_json::json;
use std::io::Write;

const GREETING: &str = r#"
name: "Greeting"
apiVersion: v3
modId: "@test/greeting"
input:
  name: "World"
  punctuation: "."
options:
  tone: "friendly"
integrations:
  "@crm":
    apiKey: "secret"
pipeline:
  - id: "@pixiebrix/identity"
    outputKey: greeting
    config:
      message:
        __type__: nunjucks
        __value__: "Hello {{ @input.name }}{{ @input.punctuation }}"
  - id: "@pixiebrix/identity"
    config:
      message:
        __type__: var
        __value__: "@greeting.message"
      tone:
        __type__: var
        __value__: "@options.tone"
      key:
        __type__: var
        __value__: "@crm.apiKey"
"#;

#[tokio::test]
async fn test_run_document_with_defaults() {
    let engine = engine_with(vec![]);
    let document = PipelineDocument::from_yaml(GREETING).unwrap();

    let report = engine.run_document(&document, &[], engine.run_options()).await;

    assert_eq!(
        report.result,
        Ok(json!({"message": "Hello World.", "tone": "friendly", "key": "secret"}))
    );
    assert_eq!(report.state.status, ExecutionStatus::Completed);
    assert_eq!(report.state.completed_steps, 2);
}

#[tokio::test]
async fn test_overrides_replace_document_input() {
    let engine = engine_with(vec![]);
    let document = PipelineDocument::from_yaml(GREETING).unwrap();
    let overrides = vec![("name".to_string(), json!("Ada"))];

    let report = engine.run_document(&document, &overrides, engine.run_options()).await;

    assert_eq!(report.result.unwrap()["message"], json!("Hello Ada."));
}

#[tokio::test]
async fn test_v1_document_renders_bare_strings() {
    let yaml = r#"
name: "Legacy"
apiVersion: v1
input:
  name: "Ada"
pipeline:
  - id: "@pixiebrix/identity"
    config:
      greeting: "Hi {{ @input.name }}"
  - id: "@pixiebrix/identity"
    if: "{{ greeting }}"
    config:
      echoed: "{{ greeting }}!"
"#;
    let engine = engine_with(vec![]);
    let document = PipelineDocument::from_yaml(yaml).unwrap();
    assert_eq!(document.api_version, ApiVersion::V1);

    let report = engine.run_document(&document, &[], engine.run_options()).await;

    assert_eq!(report.result, Ok(json!({"echoed": "Hi Ada!"})));
}

#[tokio::test]
async fn test_document_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(GREETING.as_bytes()).unwrap();

    let document = PipelineDocument::from_file(file.path()).unwrap();

    assert_eq!(document.name, "Greeting");
    assert_eq!(document.steps().len(), 2);
    assert_eq!(document.mod_id.as_ref().map(|id| id.as_str()), Some("@test/greeting"));
}

#[tokio::test]
async fn test_nested_document_steps_parse() {
    let yaml = r#"
name: "Branching"
input:
  admin: true
pipeline:
  - id: "@pixiebrix/if-else"
    config:
      condition:
        __type__: var
        __value__: "@input.admin"
      if:
        __type__: pipeline
        __value__:
          - id: "@pixiebrix/identity"
            config:
              role: "admin"
      else:
        __type__: pipeline
        __value__:
          - id: "@pixiebrix/identity"
            config:
              role: "user"
"#;
    let engine = engine_with(vec![]);
    let document = PipelineDocument::from_yaml(yaml).unwrap();

    let report = engine.run_document(&document, &[], engine.run_options()).await;

    assert_eq!(report.result, Ok(json!({"role": "admin"})));
    assert_eq!(report.trace.len(), 2);
}
