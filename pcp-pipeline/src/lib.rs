pub mod builder;
pub mod dtm;
pub mod pipeline;
pub mod stage;

mod executor;

pub use builder::PipelineBuilder;
pub use pipeline::{ExecutionStrategy, Pipeline, RunMode};
