//! Settings for the GPU context and the frame's render pass.

/// How the [`GpuContext`](crate::GpuContext) picks its adapter and surface.
#[derive(Debug, Clone)]
pub struct GpuConfig {
    pub power_preference: wgpu::PowerPreference,
    /// Falls back to Fifo when the surface does not offer it
    pub present_mode: wgpu::PresentMode,
    pub max_frame_latency: u32,
    /// Pick an sRGB surface format when available.
    ///
    /// Off by default: a linear (UNORM) surface writes shader output
    /// unchanged, so an identity display transform shows stored values.
    pub prefer_srgb_surface: bool,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::default(),
            present_mode: wgpu::PresentMode::Fifo,
            max_frame_latency: 2,
            prefer_srgb_surface: false,
        }
    }
}

impl GpuConfig {
    /// Fifo with VSync, `AutoNoVsync` without.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.present_mode = if vsync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        self
    }

    pub fn with_srgb_surface(mut self, prefer: bool) -> Self {
        self.prefer_srgb_surface = prefer;
        self
    }
}

/// Per-frame render pass settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    /// Backdrop around and behind the image
    pub clear_color: ClearColor,
}

impl RenderConfig {
    pub fn with_clear_color(mut self, color: ClearColor) -> Self {
        self.clear_color = color;
        self
    }
}

/// Opaque backdrop colour, in surface values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Default for ClearColor {
    fn default() -> Self {
        Self::rgb(0.1, 0.1, 0.1)
    }
}

impl ClearColor {
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r,
            g: self.g,
            b: self.b,
            a: 1.0,
        }
    }
}

impl From<ClearColor> for wgpu::Color {
    fn from(c: ClearColor) -> Self {
        c.to_wgpu()
    }
}
