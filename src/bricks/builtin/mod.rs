//! Built-in bricks

pub mod control;
pub mod identity;
pub mod render;
pub mod signals;
pub mod state;

use crate::bricks::Brick;
use crate::registry::BrickRegistry;
use std::sync::Arc;

pub use control::{ForEachBrick, IfElseBrick, TryExceptBrick};
pub use identity::{IdentityBrick, LogBrick};
pub use render::{DisplayTemporaryInfoBrick, HtmlRendererBrick};
pub use signals::{PanelActionBrick, RaiseErrorBrick};
pub use state::{GetStateBrick, SetStateBrick};

/// Every built-in brick
pub fn builtin_bricks() -> Vec<Arc<dyn Brick>> {
    vec![
        Arc::new(IdentityBrick::new()),
        Arc::new(LogBrick::new()),
        Arc::new(IfElseBrick::new()),
        Arc::new(ForEachBrick::new()),
        Arc::new(TryExceptBrick::new()),
        Arc::new(GetStateBrick::new()),
        Arc::new(SetStateBrick::new()),
        Arc::new(RaiseErrorBrick::new()),
        Arc::new(PanelActionBrick::submit()),
        Arc::new(PanelActionBrick::abort()),
        Arc::new(PanelActionBrick::close()),
        Arc::new(HtmlRendererBrick::new()),
        Arc::new(DisplayTemporaryInfoBrick::new()),
    ]
}

/// Registry preloaded with the built-in bricks
pub fn builtin_registry() -> BrickRegistry {
    let registry = BrickRegistry::new();
    registry.register(builtin_bricks());
    registry
}
