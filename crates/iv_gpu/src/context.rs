use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use winit::window::Window;

use crate::config::GpuConfig;
use crate::error::{GpuError, Result};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// wgpu device, queue and window surface.
///
/// Every context gets a process-unique `id`. GPU objects created from one
/// context are only valid with that context, so views remember the id they
/// built their resources for and rebuild when it changes.
pub struct GpuContext {
    pub id: u64,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: wgpu::Surface<'static>,
    pub surface_config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Create a context for `window`.
    ///
    /// Async because adapter and device requests are; the app drives it with
    /// `pollster::block_on()`.
    pub async fn with_config(window: Arc<Window>, config: GpuConfig) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let info = adapter.get_info();
        log::info!("GPU adapter: {} ({:?})", info.name, info.backend);

        // Downlevel limits run on integrated GPUs; the texture size limit is
        // raised to the adapter's own so large images still fit.
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("iv Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let format = pick_surface_format(&caps.formats, config.prefer_srgb_surface)
            .ok_or(GpuError::SurfaceConfigError)?;
        let alpha_mode = *caps
            .alpha_modes
            .first()
            .ok_or(GpuError::SurfaceConfigError)?;
        let present_mode = pick_present_mode(&caps.present_modes, config.present_mode);

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: config.max_frame_latency,
        };
        surface.configure(&device, &surface_config);

        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "GPU context {}: {:?} surface {}x{}, {:?}",
            id,
            format,
            surface_config.width,
            surface_config.height,
            present_mode
        );

        Ok(Self {
            id,
            device,
            queue,
            surface,
            surface_config,
        })
    }

    /// Reconfigure the surface; zero sizes become 1.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface_config.width = width.max(1);
        self.surface_config.height = height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
    }

    pub fn width(&self) -> u32 {
        self.surface_config.width
    }

    pub fn height(&self) -> u32 {
        self.surface_config.height
    }

    /// Largest texture edge the device accepts.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

/// First format matching the sRGB preference, else the first one offered.
fn pick_surface_format(
    formats: &[wgpu::TextureFormat],
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .find(|f| f.is_srgb() == prefer_srgb)
        .or_else(|| formats.first())
        .copied()
}

/// `wanted` when the surface offers it, otherwise Fifo (always supported).
fn pick_present_mode(offered: &[wgpu::PresentMode], wanted: wgpu::PresentMode) -> wgpu::PresentMode {
    if offered.contains(&wanted) {
        wanted
    } else {
        log::debug!("{:?} not offered by the surface, using Fifo", wanted);
        wgpu::PresentMode::Fifo
    }
}
