use thiserror::Error;

/// Failures of the GPU layer.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("No usable GPU adapter: {0}")]
    AdapterRequest(#[from] wgpu::RequestAdapterError),

    #[error("GPU device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("Cannot create window surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),

    /// The surface offers no format or alpha mode
    #[error("Window surface is incompatible with the adapter")]
    SurfaceConfigError,

    /// Upload rejected, e.g. larger than the device texture limit
    #[error("Texture error: {0}")]
    Texture(String),

    #[error("Shader compilation error: {0}")]
    ShaderCompilation(String),
}

impl GpuError {
    /// Whether the rendering context is unusable after this error.
    ///
    /// A texture error only affects the image being uploaded.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GpuError::Texture(_))
    }
}

pub type Result<T> = std::result::Result<T, GpuError>;
