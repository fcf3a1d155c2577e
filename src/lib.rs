//! iv - GPU image inspection viewer
//!
//! Shows 8/16-bit integer and 32-bit float images through a GPU grading
//! shader (channel isolation, exposure, gamma) with a pixel-peek inset and a
//! status line reading out raw values under the pointer.

pub mod app;
pub mod collection;
pub mod config;
pub mod decoder;
pub mod display;
pub mod error;
pub mod image;
pub mod keybindings;
pub mod spec;
pub mod viewer;
pub mod viewport;
pub mod worker;

pub use app::{AppError, Settings, run};
pub use collection::ImageCollection;
pub use config::{AppConfig, LogLevel, Preferences};
pub use decoder::{ImageCrateDecoder, ImageDecoder};
pub use display::{ChannelView, DisplayTransform};
pub use error::{IvError, Result};
pub use image::{ImageAdjustment, ImageId, ImageState, IvImage};
pub use spec::{ImageSpec, SampleFormat};
pub use viewer::{Command, Viewer};
pub use viewport::Viewport;
