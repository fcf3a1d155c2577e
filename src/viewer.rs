//! Viewer controller: owns the image collection and both display views, and
//! turns user commands into state changes.
//!
//! The controller is the only place that knows which image is current. Views
//! are handed that image on every prepare, and image failures end up in the
//! status text instead of interrupting anything.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use iv_gpu::{GpuContext, ViewRect};

use crate::collection::{ImageCollection, collect_image_paths};
use crate::config::Preferences;
use crate::decoder::ImageDecoder;
use crate::display::{ChannelView, DisplayTransform, DisplayView, ViewMode};
use crate::error::{IvError, Result};
use crate::image::{ImageAdjustment, ImageId, IvImage, Thumbnail};
use crate::spec::SampleFormat;
use crate::worker::{DecodeOutcome, DecodeWorker};

/// Gap between the pixel-peek inset and the window edge.
const PEEK_MARGIN: u32 = 8;

const DEFAULT_WINDOW_SIZE: (u32, u32) = (1024, 768);

/// Everything the user can ask the viewer to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Add files (folders are expanded) and show the first one
    Open(Vec<PathBuf>),
    /// Re-read the current image from disk
    Reload,
    CloseCurrent,
    NextImage,
    PrevImage,
    /// Swap with the previously shown image
    ToggleImage,
    NextSubimage,
    PrevSubimage,
    ZoomIn,
    ZoomOut,
    NormalSize,
    FitWindow,
    /// Size the window to the image at the current zoom
    FitWindowToImage,
    /// Window-level; the viewer itself has nothing to change
    ToggleFullScreen,
    SetChannel(ChannelView),
    NextChannel,
    PrevChannel,
    Adjust(ImageAdjustment),
    /// Drag by a window-pixel delta
    Pan { dx: f32, dy: f32 },
    /// One wheel notch at a window position
    WheelZoom { x: f32, y: f32, zoom_in: bool },
    MouseMove { x: f32, y: f32 },
    Resize { width: u32, height: u32 },
    TogglePixelPeek,
    /// Log the long description of the current image
    LogInfo,
    /// Log the key bindings; handled by the window owner
    ShowHelp,
}

pub struct Viewer {
    images: ImageCollection,
    decoder: Arc<dyn ImageDecoder>,
    worker: Option<DecodeWorker>,
    main_view: DisplayView,
    peek_view: DisplayView,
    channel: ChannelView,
    prefs: Preferences,
    show_peek: bool,
    /// Image the views were last bound to
    shown: Option<ImageId>,
    /// Last error, shown in the title until the next navigation
    status: Option<String>,
}

impl Viewer {
    /// Create a viewer. The decode thread is started when the preferences
    /// ask for background decoding; if it cannot start, decoding is
    /// synchronous.
    pub fn new(decoder: Arc<dyn ImageDecoder>, prefs: Preferences) -> Self {
        let worker = if prefs.background_decode {
            match DecodeWorker::spawn(Arc::clone(&decoder)) {
                Ok(worker) => Some(worker),
                Err(e) => {
                    log::warn!("Decoding on the main thread: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let (w, h) = DEFAULT_WINDOW_SIZE;
        let peek_size = prefs.pixel_peek_size.max(1);
        Self {
            images: ImageCollection::new(),
            decoder,
            worker,
            main_view: DisplayView::new(ViewMode::Free, w, h),
            peek_view: DisplayView::new(
                ViewMode::PixelPeek {
                    zoom: prefs.pixel_peek_zoom,
                },
                peek_size,
                peek_size,
            ),
            channel: ChannelView::default(),
            show_peek: prefs.show_pixel_peek,
            prefs,
            shown: None,
            status: None,
        }
    }

    pub fn images(&self) -> &ImageCollection {
        &self.images
    }

    pub fn current(&self) -> Option<&IvImage> {
        self.images.current()
    }

    pub fn channel(&self) -> ChannelView {
        self.channel
    }

    pub fn main_view(&self) -> &DisplayView {
        &self.main_view
    }

    pub fn pixel_peek_visible(&self) -> bool {
        self.show_peek
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Apply a command. Returns whether the window needs a redraw.
    pub fn apply(&mut self, command: Command) -> bool {
        log::trace!("{:?}", command);
        match command {
            Command::Open(paths) => self.open(&paths),
            Command::Reload => self.reload(),
            Command::CloseCurrent => {
                if self.images.close_current().is_none() {
                    return false;
                }
                self.status = None;
                self.load_current(None, false);
            }
            Command::NextImage => self.navigate(ImageCollection::next),
            Command::PrevImage => self.navigate(ImageCollection::prev),
            Command::ToggleImage => self.navigate(ImageCollection::toggle_last),
            Command::NextSubimage => return self.step_subimage(true),
            Command::PrevSubimage => return self.step_subimage(false),
            Command::ZoomIn => self.main_view.zoom_in(),
            Command::ZoomOut => self.main_view.zoom_out(),
            Command::NormalSize => self.main_view.normal_size(),
            Command::FitWindow => self.main_view.fit_image_to_window(),
            Command::FitWindowToImage => self.main_view.fit_window_to_image(),
            Command::ToggleFullScreen | Command::ShowHelp => return false,
            Command::SetChannel(channel) => self.channel = channel,
            Command::NextChannel => self.channel = self.channel.next(),
            Command::PrevChannel => self.channel = self.channel.prev(),
            Command::Adjust(adjustment) => match self.images.current_mut() {
                Some(image) => image.apply_adjustment(adjustment),
                None => return false,
            },
            Command::Pan { dx, dy } => self.main_view.pan(dx, dy),
            Command::WheelZoom { x, y, zoom_in } => self.main_view.zoom_at(x, y, zoom_in),
            Command::MouseMove { x, y } => self.main_view.set_mouse(x, y),
            Command::Resize { width, height } => self.main_view.set_window_size(width, height),
            Command::TogglePixelPeek => self.show_peek = !self.show_peek,
            Command::LogInfo => match self.images.current() {
                Some(image) if image.spec_valid() => log::info!("\n{}", image.longinfo()),
                Some(image) => log::info!("{}: no header information", image.name()),
                None => return false,
            },
        }
        self.update_peek_focus();
        true
    }

    /// Window size showing the current image at the current zoom.
    pub fn window_size_for_image(&self) -> Option<(u32, u32)> {
        self.main_view.viewport().window_size_for_image()
    }

    fn open(&mut self, paths: &[PathBuf]) {
        let first_new = self.images.len();
        for path in collect_image_paths(paths) {
            self.images.add(path, self.decoder.as_ref(), true);
        }
        if self.images.len() > first_new {
            self.images.select(first_new);
            self.status = None;
            self.load_current(None, false);
        } else {
            log::warn!("No images found in {:?}", paths);
        }
    }

    fn navigate(&mut self, step: fn(&mut ImageCollection) -> Option<usize>) {
        if step(&mut self.images).is_some() {
            self.status = None;
            self.load_current(None, false);
        }
    }

    fn reload(&mut self) {
        let decoder = Arc::clone(&self.decoder);
        let Some(image) = self.images.current_mut() else {
            return;
        };
        let subimage = image.subimage();
        image.cancel_decode();
        if image.init_spec(decoder.as_ref(), true).is_err() && !image.pixels_valid() {
            self.take_error();
            self.sync_views();
            return;
        }
        self.load_current(Some(subimage), true);
    }

    fn step_subimage(&mut self, forward: bool) -> bool {
        let Some(image) = self.images.current() else {
            return false;
        };
        let sub = image.decoding_subimage().unwrap_or_else(|| image.subimage());
        let target = if forward {
            sub + 1
        } else {
            match sub.checked_sub(1) {
                Some(s) => s,
                None => return false,
            }
        };
        if target >= image.nsubimages() {
            return false;
        }
        self.load_current(Some(target), false);
        self.update_peek_focus();
        true
    }

    /// Make the current image's pixels resident, on the worker if there is one.
    ///
    /// `subimage` defaults to the image's current one.
    fn load_current(&mut self, subimage: Option<u32>, force: bool) {
        let Some(index) = self.images.current_index() else {
            self.sync_views();
            return;
        };
        self.release_inactive();

        let decoder = Arc::clone(&self.decoder);
        let Some(image) = self.images.get_mut(index) else {
            return;
        };
        let subimage = subimage.unwrap_or_else(|| image.subimage());

        if !force && image.is_resident_for(subimage) {
            self.sync_views();
            return;
        }
        if !force && image.decoding_subimage() == Some(subimage) {
            // Join the decode already in flight
            return;
        }
        image.cancel_decode();

        let mut sync = true;
        if let Some(worker) = self.worker.as_mut() {
            if image.bad_file() && !force {
                log::debug!("Not decoding {}: file is broken", image.name());
                sync = false;
            } else {
                match image.start_decode(subimage) {
                    Ok(ticket) => match worker.request(ticket) {
                        Ok(()) => sync = false,
                        Err(e) => {
                            log::warn!("{}; decoding on the main thread", e);
                            image.cancel_decode();
                            self.worker = None;
                        }
                    },
                    Err(e) => {
                        log::warn!("Cannot start decode: {}", e);
                        sync = false;
                    }
                }
            }
        }

        if sync {
            if let Some(image) = self.images.get_mut(index) {
                if let Err(e) = image.read(decoder.as_ref(), subimage, force, None) {
                    log::debug!("Read of {} failed: {}", image.name(), e);
                }
            }
        }
        self.take_error();
        self.sync_views();
    }

    /// Abort decodes of every image but the current one, and free pixel
    /// buffers of images that are neither current nor last.
    fn release_inactive(&mut self) {
        let current = self.images.current_index();
        let last = self.images.last_index();
        for index in 0..self.images.len() {
            if current == Some(index) {
                continue;
            }
            if let Some(image) = self.images.get_mut(index) {
                image.cancel_decode();
                if last != Some(index) {
                    image.release_pixels();
                }
            }
        }
    }

    /// Move the current image's error message into the status text.
    fn take_error(&mut self) {
        if let Some(image) = self.images.current_mut() {
            if image.has_error() {
                self.status = Some(image.error_message());
            }
        }
    }

    /// Bind both views to the current image if its pixels are resident.
    fn sync_views(&mut self) {
        let current = self.images.current().filter(|img| img.pixels_valid());
        self.main_view.bind_image(current);
        self.peek_view.bind_image(current);

        let id = current.map(IvImage::id);
        if id != self.shown {
            self.shown = id;
            if id.is_some() && self.prefs.fit_on_open {
                self.main_view.fit_image_to_window();
            }
        }
        self.update_peek_focus();
    }

    fn update_peek_focus(&mut self) {
        let focus = self.main_view.viewport().get_focus_pixel();
        self.peek_view.focus_on(focus);
    }

    /// Install finished background decodes. Returns whether anything changed.
    pub fn poll_decodes(&mut self) -> bool {
        let mut outcomes = Vec::new();
        if let Some(worker) = self.worker.as_mut() {
            while let Some(outcome) = worker.take_one_result() {
                outcomes.push(outcome);
            }
        }
        let mut changed = false;
        for outcome in outcomes {
            changed |= self.install_outcome(outcome);
        }
        changed
    }

    /// Block up to `timeout` until every requested decode has come back.
    pub fn wait_for_decodes(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut changed = false;
        while self.pending_decodes() > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            let outcome = self.worker.as_mut().and_then(|w| w.wait_one_result(left));
            match outcome {
                Some(outcome) => changed |= self.install_outcome(outcome),
                None => break,
            }
        }
        changed
    }

    fn install_outcome(&mut self, outcome: DecodeOutcome) -> bool {
        let Some(index) = self.images.find(outcome.image) else {
            log::debug!("Dropping decode result for evicted image {}", outcome.image);
            return false;
        };
        let is_current = self.images.current_index() == Some(index);
        let Some(image) = self.images.get_mut(index) else {
            return false;
        };
        match image.complete_decode(outcome.token, outcome.result) {
            Ok(()) => {}
            Err(IvError::InvalidState(reason)) => {
                log::debug!("{}", reason);
                return false;
            }
            Err(_) => {}
        }
        if is_current {
            self.take_error();
            self.sync_views();
        }
        is_current
    }

    /// Decodes requested but not yet installed.
    pub fn pending_decodes(&self) -> usize {
        self.worker.as_ref().map_or(0, DecodeWorker::pending_count)
    }

    /// Where the pixel-peek inset goes, if it is shown.
    pub fn peek_rect(&self) -> Option<ViewRect> {
        if !self.show_peek || self.shown.is_none() {
            return None;
        }
        let (win_w, win_h) = self.main_view.viewport().window_size();
        let size = self
            .prefs
            .pixel_peek_size
            .min(win_w.saturating_sub(2 * PEEK_MARGIN))
            .min(win_h.saturating_sub(2 * PEEK_MARGIN));
        if size == 0 {
            return None;
        }
        Some(ViewRect::new(win_w - size - PEEK_MARGIN, PEEK_MARGIN, size, size))
    }

    /// Upload and parameterize both views for this frame.
    pub fn prepare(&mut self, ctx: &GpuContext) -> Result<()> {
        let current = self.images.current();
        let transform = current
            .map(|img| DisplayTransform::for_image(img, self.channel))
            .unwrap_or_default();

        self.main_view.prepare(ctx, current, &transform)?;
        if let Some(rect) = self.peek_rect() {
            self.peek_view.set_window_size(rect.width, rect.height);
            self.peek_view.prepare(ctx, current, &transform)?;
        }
        Ok(())
    }

    /// Draw the main view, then the inset over it, clipped to a target of
    /// `target_w` x `target_h` pixels.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, target_w: u32, target_h: u32) {
        let (w, h) = self.main_view.viewport().window_size();
        if let Some(rect) = ViewRect::new(0, 0, w, h).clipped(target_w, target_h) {
            self.main_view.draw(pass, rect);
        }
        if let Some(rect) = self.peek_rect().and_then(|r| r.clipped(target_w, target_h)) {
            self.peek_view.draw(pass, rect);
        }
    }

    /// Drop every GPU object, e.g. when the context is lost.
    pub fn release_gpu(&mut self) {
        self.main_view.release_gpu();
        self.peek_view.release_gpu();
    }

    /// Thumbnail of the current image for the window icon.
    pub fn thumbnail(&mut self) -> Option<Thumbnail> {
        let size = self.prefs.thumbnail_size;
        self.images.current_mut()?.thumbnail(size).cloned()
    }

    /// Raw and displayed values under the pointer.
    pub fn pixel_readout(&self) -> Option<String> {
        let image = self.images.current()?;
        let spec = image.spec()?;
        let (x, y) = self.main_view.viewport().get_focus_pixel()?;

        let n = spec.nchannels as usize;
        let mut floats = vec![0.0f32; n];
        image.getpixel_float(x, y, &mut floats).ok()?;
        let raw = if spec.format == SampleFormat::F32 {
            join(floats.iter().map(|v| format!("{:.4}", v)))
        } else {
            let mut ints = vec![0i32; n];
            image.getpixel_int(x, y, &mut ints).ok()?;
            join(ints.iter().map(i32::to_string))
        };
        let shown = DisplayTransform::for_image(image, self.channel).apply(&floats);
        Some(format!(
            "({}, {}) = [{}] -> [{}]",
            x,
            y,
            raw,
            join(shown.iter().map(|v| format!("{:.3}", v)))
        ))
    }

    /// Window title with the status of the current image.
    pub fn title(&self) -> String {
        let Some(image) = self.images.current() else {
            return "iv".to_string();
        };
        let index = self.images.current_index().map_or(0, |i| i + 1);
        let mut parts = vec![format!("{} [{}/{}]", image.name(), index, self.images.len())];

        if image.is_decoding() {
            parts.push("loading...".to_string());
        } else if !image.shortinfo().is_empty() {
            parts.push(image.shortinfo().to_string());
        }
        parts.push(format_zoom(self.main_view.viewport().zoom()));
        parts.push(self.channel.to_string());
        if image.exposure() != 0.0 || image.gamma() != 1.0 {
            parts.push(format!("exp {:+.2} gamma {:.2}", image.exposure(), image.gamma()));
        }
        if let Some(readout) = self.pixel_readout() {
            parts.push(readout);
        }
        if let Some(status) = &self.status {
            parts.push(format!("error: {}", status));
        }
        parts.join(" | ")
    }
}

fn join(values: impl Iterator<Item = String>) -> String {
    values.collect::<Vec<_>>().join(" ")
}

/// `4:1` for magnification, `1:4` for minification.
pub fn format_zoom(zoom: f32) -> String {
    let fmt = |v: f32| {
        if v.fract() == 0.0 {
            format!("{}", v)
        } else {
            format!("{:.2}", v)
        }
    };
    if zoom >= 1.0 {
        format!("{}:1", fmt(zoom))
    } else {
        format!("1:{}", fmt(-zoom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::mock::MemoryDecoder;
    use crate::image::ImageState;
    use crate::spec::ImageSpec;

    fn sync_prefs() -> Preferences {
        Preferences {
            background_decode: false,
            ..Preferences::default()
        }
    }

    fn rgb_2x2() -> (ImageSpec, Vec<u8>) {
        (
            ImageSpec::new(2, 2, 3, SampleFormat::U8),
            vec![0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255],
        )
    }

    fn viewer_with(n: usize, prefs: Preferences) -> (Viewer, Arc<MemoryDecoder>) {
        let decoder = Arc::new(MemoryDecoder::new());
        let mut paths = Vec::new();
        for i in 0..n {
            let path = PathBuf::from(format!("img{}.png", i));
            decoder.insert(path.clone(), vec![rgb_2x2()]);
            paths.push(path);
        }
        let mut viewer = Viewer::new(decoder.clone(), prefs);
        viewer.apply(Command::Resize {
            width: 400,
            height: 400,
        });
        viewer.apply(Command::Open(paths));
        (viewer, decoder)
    }

    fn current_name(viewer: &Viewer) -> String {
        viewer.current().map(IvImage::name).unwrap_or_default()
    }

    #[test]
    fn test_open_shows_first_image() {
        let (viewer, decoder) = viewer_with(3, sync_prefs());
        assert_eq!(current_name(&viewer), "img0.png");
        assert_eq!(viewer.current().map(IvImage::state), Some(ImageState::Resident));
        assert_eq!(decoder.read_calls(), 1);
        assert_eq!(viewer.main_view().viewport().image_size(), (2, 2));
        // fit_on_open: 2x2 in 400x400 hits the zoom limit
        assert_eq!(viewer.main_view().viewport().zoom(), 64.0);
        assert!(viewer.title().starts_with("img0.png [1/3]"));
    }

    #[test]
    fn test_navigation_wraps() {
        let (mut viewer, _) = viewer_with(3, sync_prefs());
        viewer.apply(Command::PrevImage);
        assert_eq!(current_name(&viewer), "img2.png");
        viewer.apply(Command::NextImage);
        assert_eq!(current_name(&viewer), "img0.png");
        viewer.apply(Command::NextImage);
        viewer.apply(Command::ToggleImage);
        assert_eq!(current_name(&viewer), "img0.png");
    }

    #[test]
    fn test_toggle_does_no_decode_work() {
        let (mut viewer, decoder) = viewer_with(3, sync_prefs());
        viewer.apply(Command::NextImage);
        assert_eq!(decoder.read_calls(), 2);
        for _ in 0..4 {
            viewer.apply(Command::ToggleImage);
        }
        assert_eq!(decoder.read_calls(), 2);

        // img0 was released when img2 became current with img1 as last
        viewer.apply(Command::NextImage);
        assert_eq!(viewer.images().get(0).map(IvImage::pixels_valid), Some(false));
    }

    #[test]
    fn test_failed_reload_keeps_pixels_and_reports_once() {
        let (mut viewer, decoder) = viewer_with(1, sync_prefs());
        let before = viewer.current().and_then(IvImage::pixels).map(<[u8]>::to_vec);

        decoder.fail_reads("img0.png", true);
        viewer.apply(Command::Reload);
        assert_eq!(
            viewer.current().and_then(IvImage::pixels).map(<[u8]>::to_vec),
            before
        );
        assert!(viewer.status().is_some_and(|s| s.contains("unexpected end of file")));
        assert!(viewer.title().contains("error:"));
        // The message moved to the status line; the image no longer has one
        assert!(!viewer.current().unwrap().has_error());

        viewer.apply(Command::NextImage);
        assert!(viewer.status().is_none());
    }

    #[test]
    fn test_missing_file_shows_nothing() {
        let decoder = Arc::new(MemoryDecoder::new());
        let mut viewer = Viewer::new(decoder, sync_prefs());
        viewer.apply(Command::Open(vec![PathBuf::from("gone.png")]));
        assert_eq!(viewer.current().map(IvImage::state), Some(ImageState::Broken));
        assert!(!viewer.main_view().viewport().has_image());
        assert!(viewer.status().is_some());
        assert!(viewer.peek_rect().is_none());
    }

    #[test]
    fn test_red_channel_shows_every_pixel_as_grey() {
        let (mut viewer, _) = viewer_with(1, sync_prefs());
        viewer.apply(Command::NormalSize);
        viewer.apply(Command::SetChannel(ChannelView::Red));

        let (_, pixels) = rgb_2x2();
        for (x, y) in [(0u32, 0u32), (1, 0), (0, 1), (1, 1)] {
            viewer.apply(Command::MouseMove {
                x: 199.5 + x as f32,
                y: 199.5 + y as f32,
            });
            let red = f32::from(pixels[((y * 2 + x) * 3) as usize]) / 255.0;
            let expected = format!("-> [{0:.3} {0:.3} {0:.3} 1.000]", red);
            let readout = viewer.pixel_readout().unwrap();
            assert!(readout.starts_with(&format!("({}, {})", x, y)), "{}", readout);
            assert!(readout.ends_with(&expected), "{}", readout);
        }
    }

    #[test]
    fn test_pixel_readout_with_channels_and_exposure() {
        let (mut viewer, _) = viewer_with(1, sync_prefs());
        viewer.apply(Command::NormalSize);
        // 2x2 at 1:1 centred in 400x400: pixel (1, 0) sits at window (200, 199)
        viewer.apply(Command::MouseMove { x: 200.5, y: 199.5 });
        assert_eq!(
            viewer.pixel_readout().unwrap(),
            "(1, 0) = [255 0 0] -> [1.000 0.000 0.000 1.000]"
        );

        viewer.apply(Command::SetChannel(ChannelView::Green));
        assert!(viewer.pixel_readout().unwrap().ends_with("[0.000 0.000 0.000 1.000]"));

        viewer.apply(Command::SetChannel(ChannelView::Red));
        viewer.apply(Command::Adjust(ImageAdjustment::AdjustExposure(-1.0)));
        assert!(viewer.pixel_readout().unwrap().ends_with("[0.500 0.500 0.500 1.000]"));
        assert!(viewer.title().contains("exp -1.00 gamma 1.00"));
    }

    #[test]
    fn test_zoom_commands() {
        let (mut viewer, _) = viewer_with(1, sync_prefs());
        viewer.apply(Command::NormalSize);
        viewer.apply(Command::ZoomIn);
        assert_eq!(viewer.main_view().viewport().zoom(), 2.0);
        viewer.apply(Command::ZoomOut);
        viewer.apply(Command::ZoomOut);
        assert_eq!(viewer.main_view().viewport().zoom(), -2.0);
        viewer.apply(Command::FitWindow);
        assert_eq!(viewer.main_view().viewport().zoom(), 64.0);
        assert!(viewer.title().contains("64:1"));
    }

    #[test]
    fn test_fit_window_to_image() {
        let (mut viewer, _) = viewer_with(1, sync_prefs());
        viewer.apply(Command::NormalSize);
        viewer.apply(Command::ZoomIn);
        viewer.apply(Command::ZoomIn);
        assert_eq!(viewer.window_size_for_image(), Some((8, 8)));

        assert!(viewer.apply(Command::FitWindowToImage));
        assert_eq!(viewer.main_view().viewport().window_size(), (8, 8));
        assert_eq!(viewer.main_view().viewport().zoom(), 4.0);

        // Nothing in the viewer changes for window-level commands
        assert!(!viewer.apply(Command::ToggleFullScreen));
        assert!(!viewer.apply(Command::ShowHelp));

        viewer.apply(Command::CloseCurrent);
        assert_eq!(viewer.window_size_for_image(), None);
    }

    #[test]
    fn test_peek_rect() {
        let (mut viewer, _) = viewer_with(1, sync_prefs());
        assert_eq!(viewer.peek_rect(), Some(ViewRect::new(232, 8, 160, 160)));
        viewer.apply(Command::TogglePixelPeek);
        assert!(viewer.peek_rect().is_none());
        viewer.apply(Command::TogglePixelPeek);

        viewer.apply(Command::Resize {
            width: 100,
            height: 50,
        });
        assert_eq!(viewer.peek_rect(), Some(ViewRect::new(58, 8, 34, 34)));

        viewer.apply(Command::CloseCurrent);
        assert!(viewer.current().is_none());
        assert!(viewer.peek_rect().is_none());
        assert_eq!(viewer.title(), "iv");
    }

    #[test]
    fn test_subimage_navigation() {
        let decoder = Arc::new(MemoryDecoder::new());
        decoder.insert(
            "multi.tif",
            vec![rgb_2x2(), (ImageSpec::new(1, 1, 1, SampleFormat::U8), vec![9])],
        );
        let mut viewer = Viewer::new(decoder, sync_prefs());
        viewer.apply(Command::Open(vec![PathBuf::from("multi.tif")]));

        assert!(!viewer.apply(Command::PrevSubimage));
        assert!(viewer.apply(Command::NextSubimage));
        assert_eq!(viewer.current().map(IvImage::subimage), Some(1));
        assert_eq!(viewer.main_view().viewport().image_size(), (1, 1));
        assert!(!viewer.apply(Command::NextSubimage));
        assert!(viewer.apply(Command::PrevSubimage));
        assert_eq!(viewer.current().map(IvImage::subimage), Some(0));
    }

    #[test]
    fn test_background_decode() {
        let (mut viewer, decoder) = viewer_with(2, Preferences::default());
        assert!(viewer.title().contains("loading..."));
        assert!(!viewer.main_view().viewport().has_image());

        viewer.wait_for_decodes(Duration::from_secs(5));
        assert_eq!(viewer.pending_decodes(), 0);
        assert_eq!(viewer.current().map(IvImage::state), Some(ImageState::Resident));
        assert_eq!(viewer.main_view().viewport().image_size(), (2, 2));
        assert!(viewer.thumbnail().is_some());

        // Switching away before the decode lands leaves the result to be dropped
        viewer.apply(Command::NextImage);
        viewer.apply(Command::CloseCurrent);
        viewer.wait_for_decodes(Duration::from_secs(5));
        assert_eq!(viewer.images().len(), 1);
        assert_eq!(current_name(&viewer), "img0.png");
        assert!(viewer.current().is_some_and(IvImage::pixels_valid));
        assert!(decoder.read_calls() >= 1);
    }

    #[test]
    fn test_switching_images_aborts_stale_decode() {
        let (mut viewer, _) = viewer_with(2, Preferences::default());
        assert!(viewer.current().is_some_and(IvImage::is_decoding));

        viewer.apply(Command::NextImage);
        assert!(!viewer.images().get(0).is_some_and(IvImage::is_decoding));
        assert!(viewer.current().is_some_and(IvImage::is_decoding));

        viewer.wait_for_decodes(Duration::from_secs(5));
        assert_eq!(viewer.pending_decodes(), 0);
        assert_eq!(viewer.images().get(0).map(IvImage::pixels_valid), Some(false));
        assert_eq!(viewer.current().map(IvImage::state), Some(ImageState::Resident));

        // Toggling back decodes the abandoned image again
        viewer.apply(Command::ToggleImage);
        viewer.wait_for_decodes(Duration::from_secs(5));
        assert_eq!(current_name(&viewer), "img0.png");
        assert!(viewer.current().is_some_and(IvImage::pixels_valid));
    }

    #[test]
    fn test_format_zoom() {
        assert_eq!(format_zoom(1.0), "1:1");
        assert_eq!(format_zoom(4.0), "4:1");
        assert_eq!(format_zoom(-8.0), "1:8");
        assert_eq!(format_zoom(1.5), "1.50:1");
    }
}
