//! The batch pipeline: load, profile, clean, derive, export.

mod builder;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder, PipelineResult};
pub use progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
