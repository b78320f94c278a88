//! Pass-through and logging bricks

use crate::bricks::{Brick, BrickArgs, BrickKind, BrickOptions};
use crate::core::registry_id::RegistryId;
use crate::errors::PipelineError;
use serde_json::{json, Value};

/// Returns its arguments unchanged
pub struct IdentityBrick {
    id: RegistryId,
    schema: Value,
}

impl IdentityBrick {
    pub const ID: &'static str = "@pixiebrix/identity";

    pub fn new() -> Self {
        Self {
            id: RegistryId::builtin(Self::ID),
            schema: json!({"type": "object", "additionalProperties": true}),
        }
    }
}

impl Default for IdentityBrick {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Brick for IdentityBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "Identity Function"
    }

    fn description(&self) -> &str {
        "Returns its arguments unchanged"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: BrickArgs, _options: BrickOptions) -> Result<Value, PipelineError> {
        Ok(args.into_value())
    }
}

/// Writes a message to the run log
pub struct LogBrick {
    id: RegistryId,
    schema: Value,
}

impl LogBrick {
    pub const ID: &'static str = "@pixiebrix/browser/log";

    pub fn new() -> Self {
        Self {
            id: RegistryId::builtin(Self::ID),
            schema: json!({
                "type": "object",
                "properties": {
                    "message": {"type": ["string", "number", "boolean", "object", "array", "null"]},
                    "level": {"type": "string", "enum": ["debug", "info", "warn", "error"]}
                },
                "required": ["message"]
            }),
        }
    }
}

impl Default for LogBrick {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Brick for LogBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "Log To Console"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Effect
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: BrickArgs, options: BrickOptions) -> Result<Value, PipelineError> {
        let message = match args.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        match args.get_str("level").unwrap_or("info") {
            "debug" => options.logger.debug(&message),
            "warn" => options.logger.warn(&message),
            "error" => options.logger.error(&message),
            _ => options.logger.info(&message),
        }

        Ok(Value::Null)
    }
}
