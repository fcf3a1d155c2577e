//! GPU plumbing for the iv image viewer.
//!
//! Owns the wgpu device/surface ([`GpuContext`]), typed pixel textures and the
//! display pipeline that turns raw 8/16-bit integer or 32-bit float pixels into
//! exposure/gamma/channel graded screen colour.

pub mod bindings;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod texture;
pub mod uniform;
pub mod vertex;

pub use config::{ClearColor, GpuConfig, RenderConfig};
pub use context::GpuContext;
pub use error::{GpuError, Result};
pub use pipeline::{DisplayPipeline, ViewRect};
pub use texture::{PixelData, SampleKind, Texture};
pub use uniform::{CHANNEL_FULL_COLOR, CHANNEL_LUMINANCE, DisplayUniform, TransformUniform};
pub use vertex::Vertex;
