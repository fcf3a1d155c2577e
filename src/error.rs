//! Error types for image loading, decoding and display.

use std::path::PathBuf;
use thiserror::Error;

use iv_gpu::GpuError;

/// Errors raised by the viewer core.
#[derive(Error, Debug)]
pub enum IvError {
    /// The file does not exist or cannot be opened
    #[error("Cannot open file: {path:?}")]
    FileNotFound {
        /// Path that was requested
        path: PathBuf,
    },

    /// The file exists but no decoder understands it
    #[error("Unsupported format for {path:?}: {message}")]
    UnsupportedFormat {
        /// Path that was requested
        path: PathBuf,
        /// Decoder diagnostic
        message: String,
    },

    /// Partial or corrupt pixel data
    #[error("Decode error in {path:?}: {message}")]
    DecodeError {
        /// Path that was being decoded
        path: PathBuf,
        /// Decoder diagnostic
        message: String,
    },

    /// Shader, pipeline or texture creation failed
    #[error("GPU resource error: {0}")]
    GpuResource(#[from] GpuError),

    /// Operation requested in a state that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The progress callback asked to stop
    #[error("Decode cancelled")]
    Cancelled,

    /// The background decode thread is gone
    #[error("Decode worker unavailable: {0}")]
    WorkerUnavailable(String),
}

impl IvError {
    /// Create a file-not-found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create an unsupported format error.
    pub fn unsupported(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::DecodeError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Whether the error means the file itself could not be opened.
    pub fn is_unopenable(&self) -> bool {
        matches!(
            self,
            IvError::FileNotFound { .. } | IvError::UnsupportedFormat { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, IvError>;
