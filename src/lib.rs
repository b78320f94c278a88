//! brick-runtime - an interpreter for declarative brick pipelines

pub mod bricks;
pub mod cli;
pub mod core;
pub mod errors;
pub mod execution;
pub mod persistence;
pub mod platform;
pub mod registry;
pub mod schema;
pub mod template;

// Re-export commonly used types
pub use bricks::{Brick, BrickArgs, BrickKind, BrickOptions, RendererPayload};
pub use core::{ApiVersion, BrickConfig, Expression, PipelineInput, RegistryId, RunContext};
pub use errors::{PipelineError, SerializedError};
pub use execution::{reduce_pipeline, ExecutionEngine, InitialValues, RunOptions, RunReport};
pub use registry::BrickRegistry;
