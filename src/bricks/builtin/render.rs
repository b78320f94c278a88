//! Renderer bricks and the temporary display that hosts them

use crate::bricks::{Brick, BrickArgs, BrickKind, BrickOptions};
use crate::core::registry_id::RegistryId;
use crate::errors::PipelineError;
use crate::platform::PlatformCapability;
use crate::schema::{app_schema_ref, properties_schema};
use serde_json::{json, Value};

/// Renders an HTML fragment
///
/// Renderers never run headless; the reducer intercepts them first.
pub struct HtmlRendererBrick {
    id: RegistryId,
    schema: Value,
}

impl HtmlRendererBrick {
    pub const ID: &'static str = "@pixiebrix/html";

    pub fn new() -> Self {
        Self {
            id: RegistryId::builtin(Self::ID),
            schema: properties_schema(&[("html", json!({"type": "string"}))], &["html"]),
        }
    }
}

impl Default for HtmlRendererBrick {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Brick for HtmlRendererBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "HTML Renderer"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Renderer
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: BrickArgs, _options: BrickOptions) -> Result<Value, PipelineError> {
        let html = args.require("html")?.clone();
        Ok(json!({ "html": html }))
    }
}

/// Shows the output of a renderer pipeline in a temporary panel
pub struct DisplayTemporaryInfoBrick {
    id: RegistryId,
    schema: Value,
}

impl DisplayTemporaryInfoBrick {
    pub const ID: &'static str = "@pixiebrix/display/temporary";

    pub fn new() -> Self {
        Self {
            id: RegistryId::builtin(Self::ID),
            schema: properties_schema(
                &[
                    ("title", json!({"type": "string"})),
                    ("body", app_schema_ref("pipeline")),
                ],
                &["body"],
            ),
        }
    }
}

impl Default for DisplayTemporaryInfoBrick {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Brick for DisplayTemporaryInfoBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "Display Temporary Information"
    }

    fn description(&self) -> &str {
        "Runs a renderer pipeline and shows the result in a temporary panel"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    fn required_capabilities(&self) -> Vec<PlatformCapability> {
        vec![PlatformCapability::PanelHost]
    }

    async fn execute(&self, args: BrickArgs, options: BrickOptions) -> Result<Value, PipelineError> {
        let title = args.get_str("title").unwrap_or("Temporary Information").to_string();
        let body = args.pipeline("body")?;

        let payload = options.run_renderer_pipeline(&body, Vec::new()).await?;
        options
            .logger
            .debug(&format!("Showing {} in temporary panel", payload.brick_id));

        Ok(json!({
            "title": title,
            "payload": payload,
        }))
    }
}
