//! Render pipeline abstractions.

pub mod builder;
pub mod display;

pub use builder::{LayoutBuilder, QuadPipelineBuilder};
pub use display::{DisplayPipeline, ViewRect};
