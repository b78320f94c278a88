//! Bricks that end a run early

use crate::bricks::{Brick, BrickArgs, BrickKind, BrickOptions};
use crate::core::registry_id::RegistryId;
use crate::errors::{BusinessError, PanelAction, PipelineError};
use crate::schema::properties_schema;
use serde_json::{json, Value};

/// Fails the run with a user-facing message
pub struct RaiseErrorBrick {
    id: RegistryId,
    schema: Value,
}

impl RaiseErrorBrick {
    pub const ID: &'static str = "@pixiebrix/error";

    pub fn new() -> Self {
        Self {
            id: RegistryId::builtin(Self::ID),
            schema: properties_schema(&[("message", json!({"type": "string"}))], &["message"]),
        }
    }
}

impl Default for RaiseErrorBrick {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Brick for RaiseErrorBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        "Raise Business Error"
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Effect
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: BrickArgs, _options: BrickOptions) -> Result<Value, PipelineError> {
        let message = args.get_str("message").unwrap_or("Error raised by pipeline");
        Err(BusinessError::for_brick(self.id.clone(), message).into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelActionKind {
    Submit,
    Abort,
    Close,
}

/// Closes a temporary panel by raising a control-flow signal
///
/// One brick per action: submit (with optional `detail`), abort and close.
pub struct PanelActionBrick {
    id: RegistryId,
    action: PanelActionKind,
    schema: Value,
}

impl PanelActionBrick {
    pub const SUBMIT_ID: &'static str = "@pixiebrix/panel/submit";
    pub const ABORT_ID: &'static str = "@pixiebrix/panel/abort";
    pub const CLOSE_ID: &'static str = "@pixiebrix/panel/close";

    fn with_action(id: &'static str, action: PanelActionKind) -> Self {
        Self {
            id: RegistryId::builtin(id),
            action,
            schema: json!({"type": "object", "properties": {"detail": {}}}),
        }
    }

    pub fn submit() -> Self {
        Self::with_action(Self::SUBMIT_ID, PanelActionKind::Submit)
    }

    pub fn abort() -> Self {
        Self::with_action(Self::ABORT_ID, PanelActionKind::Abort)
    }

    pub fn close() -> Self {
        Self::with_action(Self::CLOSE_ID, PanelActionKind::Close)
    }
}

#[async_trait::async_trait]
impl Brick for PanelActionBrick {
    fn id(&self) -> &RegistryId {
        &self.id
    }

    fn name(&self) -> &str {
        match self.action {
            PanelActionKind::Submit => "Submit Panel",
            PanelActionKind::Abort => "Abort Panel",
            PanelActionKind::Close => "Close Panel",
        }
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Effect
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, args: BrickArgs, _options: BrickOptions) -> Result<Value, PipelineError> {
        let action = match self.action {
            PanelActionKind::Submit => PanelAction::Submit {
                detail: args.get("detail").cloned().unwrap_or(Value::Null),
            },
            PanelActionKind::Abort => PanelAction::Abort,
            PanelActionKind::Close => PanelAction::Close,
        };
        Err(action.into())
    }
}
