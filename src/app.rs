//! Windowed runner: winit event loop, GPU context and frame rendering around
//! a [`Viewer`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use iv_gpu::{ClearColor, GpuConfig, GpuContext, RenderConfig};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, ModifiersState, NamedKey};
use winit::window::{Fullscreen, Icon, Window, WindowAttributes, WindowId};

use crate::config::Preferences;
use crate::decoder::ImageCrateDecoder;
use crate::error::IvError;
use crate::image::ImageId;
use crate::keybindings::KeyBindings;
use crate::viewer::{Command, Viewer};

/// How often the loop wakes up while decodes are running.
const DECODE_POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Settings for running the viewer.
pub struct Settings {
    /// Files and folders to open at startup
    pub files: Vec<PathBuf>,
    pub preferences: Preferences,
    pub window_size: (u32, u32),
    pub gpu: GpuConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            preferences: Preferences::default(),
            window_size: (1024, 768),
            gpu: GpuConfig::default(),
        }
    }
}

/// Errors that end the application.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("Window creation failed: {0}")]
    Window(#[from] winit::error::OsError),

    #[error(transparent)]
    Viewer(#[from] IvError),
}

/// Run the viewer until its window closes.
pub fn run(settings: Settings) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = IvApp::new(settings);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

struct IvApp {
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    gpu_config: GpuConfig,
    render_config: RenderConfig,
    window_size: (u32, u32),
    viewer: Viewer,
    bindings: KeyBindings,
    startup_files: Vec<PathBuf>,
    modifiers: ModifiersState,
    dragging: bool,
    cursor: Option<(f32, f32)>,
    icon_for: Option<ImageId>,
    fatal: Option<AppError>,
}

impl IvApp {
    fn new(settings: Settings) -> Self {
        let [r, g, b] = settings.preferences.clear_color;
        let render_config = RenderConfig::default()
            .with_clear_color(ClearColor::rgb(f64::from(r), f64::from(g), f64::from(b)));
        let viewer = Viewer::new(Arc::new(ImageCrateDecoder), settings.preferences);
        Self {
            window: None,
            gpu: None,
            gpu_config: settings.gpu,
            render_config,
            window_size: settings.window_size,
            viewer,
            bindings: KeyBindings::default(),
            startup_files: settings.files,
            modifiers: ModifiersState::empty(),
            dragging: false,
            cursor: None,
            icon_for: None,
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: AppError) {
        log::error!("{}", error);
        self.fatal = Some(error);
        event_loop.exit();
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::FitWindowToImage => self.fit_window_to_image(),
            Command::ToggleFullScreen => self.toggle_fullscreen(),
            Command::ShowHelp => {
                for line in self.bindings.describe() {
                    log::info!("{}", line);
                }
            }
            command => {
                if self.viewer.apply(command) {
                    self.refresh_window();
                }
            }
        }
    }

    /// Ask the window system for the image size at the current zoom.
    fn fit_window_to_image(&mut self) {
        let Some(window) = self.window.clone() else {
            return;
        };
        if window.fullscreen().is_some() {
            log::debug!("Fullscreen, not resizing the window");
            return;
        }
        let Some((width, height)) = self.viewer.window_size_for_image() else {
            return;
        };
        if self.viewer.apply(Command::FitWindowToImage) {
            self.refresh_window();
        }
        // `Some` means the size was applied at once and no Resized event follows
        if let Some(size) = window.request_inner_size(PhysicalSize::new(width, height)) {
            self.resize(size.width, size.height);
        }
    }

    fn toggle_fullscreen(&mut self) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.fullscreen().is_some() {
            window.set_fullscreen(None);
        } else {
            window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(ctx) = self.gpu.as_mut() {
            ctx.resize(width, height);
        }
        self.apply(Command::Resize { width, height });
    }

    /// Title, icon and a redraw after the viewer changed.
    fn refresh_window(&mut self) {
        let Some(window) = self.window.clone() else {
            return;
        };
        window.set_title(&self.viewer.title());

        let shown = self
            .viewer
            .current()
            .filter(|img| img.pixels_valid())
            .map(|img| img.id());
        if shown != self.icon_for {
            self.icon_for = shown;
            let icon = self.viewer.thumbnail().and_then(|thumb| {
                Icon::from_rgba(thumb.rgba, thumb.width, thumb.height)
                    .map_err(|e| log::debug!("Thumbnail rejected as icon: {}", e))
                    .ok()
            });
            window.set_window_icon(icon);
        }
        window.request_redraw();
    }

    fn render(&mut self) -> Result<(), IvError> {
        let Some(ctx) = self.gpu.as_mut() else {
            return Ok(());
        };
        self.viewer.prepare(ctx)?;

        let output = match ctx.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost, reconfiguring");
                ctx.resize(ctx.width(), ctx.height());
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(IvError::invalid_state("GPU out of memory"));
            }
            Err(e) => {
                log::warn!("Skipping frame: {}", e);
                return Ok(());
            }
        };
        let (target_w, target_h) = (ctx.width(), ctx.height());
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Viewer Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.render_config.clear_color.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            self.viewer.draw(&mut render_pass, target_w, target_h);
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }
        if event.logical_key == Key::Named(NamedKey::Escape) {
            // Escape leaves fullscreen before it quits
            match self.window.as_ref() {
                Some(window) if window.fullscreen().is_some() => window.set_fullscreen(None),
                _ => event_loop.exit(),
            }
            return;
        }
        match self.bindings.command_for_key(&event.logical_key, self.modifiers) {
            Some(command) => self.apply(command),
            None => log::trace!("Unbound key {:?}", event.logical_key),
        }
    }
}

impl ApplicationHandler for IvApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let (w, h) = self.window_size;
        let attrs = WindowAttributes::default()
            .with_title("iv")
            .with_inner_size(winit::dpi::LogicalSize::new(w, h));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        let started = Instant::now();
        let ctx = match pollster::block_on(GpuContext::with_config(
            window.clone(),
            self.gpu_config.clone(),
        )) {
            Ok(ctx) => ctx,
            Err(e) => return self.fail(event_loop, IvError::from(e).into()),
        };
        log::info!(
            "GPU context {} ready in {:.1?} ({}x{})",
            ctx.id,
            started.elapsed(),
            ctx.width(),
            ctx.height()
        );

        let size = window.inner_size();
        self.window = Some(window);
        self.gpu = Some(ctx);
        self.apply(Command::Resize {
            width: size.width,
            height: size.height,
        });

        let files = std::mem::take(&mut self.startup_files);
        if !files.is_empty() {
            self.apply(Command::Open(files));
        }
        self.refresh_window();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => self.resize(size.width, size.height),
            WindowEvent::ModifiersChanged(modifiers) => self.modifiers = modifiers.state(),
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = state == ElementState::Pressed;
            }
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = (position.x as f32, position.y as f32);
                if self.dragging {
                    if let Some((last_x, last_y)) = self.cursor {
                        self.viewer.apply(Command::Pan {
                            dx: x - last_x,
                            dy: y - last_y,
                        });
                    }
                }
                self.cursor = Some((x, y));
                self.apply(Command::MouseMove { x, y });
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
                if scroll != 0.0 {
                    let (x, y) = self.cursor.unwrap_or_else(|| {
                        let (w, h) = self.viewer.main_view().viewport().window_size();
                        (w as f32 / 2.0, h as f32 / 2.0)
                    });
                    self.apply(Command::WheelZoom {
                        x,
                        y,
                        zoom_in: scroll > 0.0,
                    });
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    let recoverable = matches!(&e, IvError::GpuResource(gpu) if !gpu.is_fatal());
                    if recoverable {
                        log::warn!("{}", e);
                    } else {
                        self.fail(event_loop, e.into());
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.poll_decodes() {
            self.refresh_window();
        }
        if self.viewer.pending_decodes() > 0 {
            event_loop.set_control_flow(ControlFlow::WaitUntil(
                Instant::now() + DECODE_POLL_INTERVAL,
            ));
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::debug!("Releasing GPU resources");
        self.viewer.release_gpu();
        self.gpu = None;
    }
}
