//! Core domain models
//!
//! This module defines the data structures that describe pipelines: brick
//! ids, steps, expressions, the run context and per-run state.

pub mod api_version;
pub mod condition;
pub mod config;
pub mod context;
pub mod expression;
pub mod pipeline;
pub mod registry_id;
pub mod state;
pub mod step;

pub use api_version::{api_version_options, ApiVersion, ApiVersionOptions};
pub use context::{ModVariable, RunContext};
pub use expression::{Expression, TemplateEngine};
pub use pipeline::{validate_pipeline, PipelineInput};
pub use registry_id::RegistryId;
pub use state::{ExecutionStatus, RunState, TraceEntry};
pub use step::{BrickConfig, RootMode};
