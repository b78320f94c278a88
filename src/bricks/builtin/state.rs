//! Mod state bricks

use crate::bricks::{Brick, BrickArgs, BrickKind, BrickOptions};
use crate::core::registry_id::RegistryId;
use crate::errors::{PipelineConfigurationError, PipelineError};
use crate::persistence::{MergeStrategy, StateNamespace};
use crate::platform::PlatformCapability;
use serde::Deserialize;
use serde_json::{json, Value};

fn namespace_schema() -> Value {
    json!({"type": "string", "enum": ["mod", "private", "shared", "blueprint", "extension"], "default": "mod"})
}

fn parse_namespace(args: &BrickArgs) -> Result<StateNamespace, PipelineError> {
    match args.get_str("namespace") {
        None => Ok(StateNamespace::Mod),
        Some(raw) => raw
            .parse()
            .map_err(|e: String| PipelineConfigurationError::with_config(e, args.as_value().clone()).into()),
    }
}

fn store_error(e: anyhow::Error) -> PipelineError {
    PipelineError::unknown(format!("State store failed: {:#}", e))
}

/// Reads the current state of a namespace
///
/// Always reads the store, unlike `@mod` which is a per-run snapshot.
pub struct GetStateBrick {
    id: RegistryId,
    schema: Value,
}

impl GetStateBrick {
    pub const ID: &'static str = "@pixiebrix/state/get";

    pub fn new() -> Self {
        Self {
            id: RegistryId::builtin(Self::ID),
            schema: json!({
                "type": "object",
                "properties": {"namespace": namespace_schema()}
            }),
        }
    }
}

impl Default for GetStateBrick {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Brick for GetStateBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "Get Shared Data"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Reader
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    fn required_capabilities(&self) -> Vec<PlatformCapability> {
        vec![PlatformCapability::State]
    }

    async fn execute(&self, args: BrickArgs, options: BrickOptions) -> Result<Value, PipelineError> {
        let namespace = parse_namespace(&args)?;
        let run = options.run_options();
        run.state_store
            .get_state(namespace, &run.mod_component)
            .await
            .map_err(store_error)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetStateArgs {
    data: Value,
    #[serde(default)]
    merge_strategy: MergeStrategy,
}

/// Merges data into a namespace and returns the new state
pub struct SetStateBrick {
    id: RegistryId,
    schema: Value,
}

impl SetStateBrick {
    pub const ID: &'static str = "@pixiebrix/state/set";

    pub fn new() -> Self {
        Self {
            id: RegistryId::builtin(Self::ID),
            schema: json!({
                "type": "object",
                "properties": {
                    "data": {"type": "object"},
                    "namespace": namespace_schema(),
                    "mergeStrategy": {"type": "string", "enum": ["replace", "shallow", "deep"], "default": "shallow"}
                },
                "required": ["data"]
            }),
        }
    }
}

impl Default for SetStateBrick {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Brick for SetStateBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "Set Shared Data"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    fn required_capabilities(&self) -> Vec<PlatformCapability> {
        vec![PlatformCapability::State]
    }

    async fn execute(&self, args: BrickArgs, options: BrickOptions) -> Result<Value, PipelineError> {
        let namespace = parse_namespace(&args)?;
        let SetStateArgs { data, merge_strategy } = args.parse()?;
        let run = options.run_options();

        options
            .logger
            .debug(&format!("Setting {} state ({:?})", namespace, merge_strategy));
        run.state_store
            .set_state(namespace, data, merge_strategy, &run.mod_component)
            .await
            .map_err(store_error)
    }
}
