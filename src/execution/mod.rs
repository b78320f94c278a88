//! Pipeline execution: the reducer, run options, events and the engine facade

pub mod engine;
pub mod events;
pub mod logger;
pub mod options;
pub mod reducer;

pub use engine::{ExecutionEngine, RunReport};
pub use events::{EventHandler, EventSink, ExecutionEvent, TraceRecorder};
pub use logger::{LogContext, RunLogger};
pub use options::{AbortSignal, InitialValues, RunOptions};
pub use reducer::{reduce_pipeline, reduce_pipeline_expression};
