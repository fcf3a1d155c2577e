use iv_gpu::{
    DisplayPipeline, GpuContext, PixelData, SampleKind, Texture, TransformUniform, ViewRect,
};

use super::DisplayTransform;
use crate::error::Result;
use crate::image::{ImageId, IvImage};
use crate::spec::SampleFormat;
use crate::viewport::Viewport;

/// How a view places the image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewMode {
    /// Main view: user-driven pan and zoom.
    Free,
    /// Magnified inset centred on the focus pixel at a fixed scale.
    PixelPeek { zoom: f32 },
}

/// Identifies the pixel buffer a texture was uploaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureKey {
    pub image: ImageId,
    pub generation: u64,
}

impl TextureKey {
    pub fn of(image: &IvImage) -> Self {
        Self {
            image: image.id(),
            generation: image.pixel_generation(),
        }
    }
}

/// Whether a view holding `current` must upload `wanted`.
pub fn needs_upload(current: Option<TextureKey>, wanted: TextureKey) -> bool {
    current != Some(wanted)
}

pub fn sample_kind(format: SampleFormat) -> SampleKind {
    match format {
        SampleFormat::U8 => SampleKind::U8,
        SampleFormat::U16 => SampleKind::U16,
        SampleFormat::F32 => SampleKind::F32,
    }
}

struct Upload {
    key: TextureKey,
    texture: Texture,
    bind_group: wgpu::BindGroup,
}

struct ViewGpu {
    pipeline: DisplayPipeline,
    upload: Option<Upload>,
}

/// One on-screen rendering of the current image.
///
/// The view never holds on to an image: each frame the controller passes the
/// current one to [`DisplayView::prepare`], which re-checks residency and
/// re-uploads only when the pixel buffer changed. GPU objects are created on
/// the first prepare and rebuilt when the rendering context changes.
pub struct DisplayView {
    mode: ViewMode,
    viewport: Viewport,
    gpu: Option<ViewGpu>,
    /// Upload the device refused (e.g. too large); not retried every frame.
    rejected: Option<TextureKey>,
}

impl DisplayView {
    pub fn new(mode: ViewMode, width: u32, height: u32) -> Self {
        let mut viewport = Viewport::new(width, height);
        if let ViewMode::PixelPeek { zoom } = mode {
            viewport.set_zoom(zoom);
        }
        Self {
            mode,
            viewport,
            gpu: None,
            rejected: None,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn is_pixel_peek(&self) -> bool {
        matches!(self.mode, ViewMode::PixelPeek { .. })
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.viewport.set_window_size(width, height);
        if !self.is_pixel_peek() {
            self.viewport.clamp_view_to_window();
        }
    }

    /// Size the viewport for `image`, or for nothing.
    pub fn bind_image(&mut self, image: Option<&IvImage>) {
        let (w, h) = image
            .and_then(IvImage::spec)
            .map_or((0, 0), |s| (s.width, s.height));
        self.viewport.set_image_size(w, h);
    }

    /// Record the pointer; a pixel-peek view re-centres on the focus pixel.
    pub fn set_mouse(&mut self, x: f32, y: f32) {
        self.viewport.set_mouse(x, y);
    }

    pub fn focus_on(&mut self, pixel: Option<(u32, u32)>) {
        if let (ViewMode::PixelPeek { .. }, Some((x, y))) = (self.mode, pixel) {
            self.viewport.set_center(x as f32 + 0.5, y as f32 + 0.5);
        }
    }

    pub fn fit_image_to_window(&mut self) {
        if !self.is_pixel_peek() {
            self.viewport.fit_image_to_window();
        }
    }

    pub fn fit_window_to_image(&mut self) {
        if !self.is_pixel_peek() {
            self.viewport.fit_window_to_image();
        }
    }

    pub fn normal_size(&mut self) {
        if !self.is_pixel_peek() {
            self.viewport.normal_size();
        }
    }

    pub fn zoom_in(&mut self) {
        if !self.is_pixel_peek() {
            self.viewport.zoom_in();
        }
    }

    pub fn zoom_out(&mut self) {
        if !self.is_pixel_peek() {
            self.viewport.zoom_out();
        }
    }

    pub fn zoom_at(&mut self, x: f32, y: f32, zoom_in: bool) {
        if !self.is_pixel_peek() {
            self.viewport.zoom_at(x, y, zoom_in);
        }
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        if !self.is_pixel_peek() {
            self.viewport.pan(dx, dy);
        }
    }

    /// Make GPU state match `image` and `transform`.
    ///
    /// Returns whether there is anything to draw. Textures the device rejects
    /// are logged and skipped; pipeline failures are returned.
    pub fn prepare(
        &mut self,
        ctx: &GpuContext,
        image: Option<&IvImage>,
        transform: &DisplayTransform,
    ) -> Result<bool> {
        if self
            .gpu
            .as_ref()
            .is_some_and(|g| g.pipeline.context_id() != ctx.id)
        {
            log::debug!("GPU context changed, rebuilding view resources");
            self.gpu = None;
            self.rejected = None;
        }
        if self.gpu.is_none() {
            self.gpu = Some(ViewGpu {
                pipeline: DisplayPipeline::new(ctx)?,
                upload: None,
            });
        }
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(false);
        };

        let resident = image.and_then(|img| Some((img, img.spec()?, img.pixels()?)));
        let Some((image, spec, pixels)) = resident else {
            gpu.upload = None;
            return Ok(false);
        };

        let key = TextureKey::of(image);
        if needs_upload(gpu.upload.as_ref().map(|u| u.key), key) {
            if self.rejected == Some(key) {
                return Ok(false);
            }
            gpu.upload = None;
            let data = PixelData {
                data: pixels,
                width: spec.width,
                height: spec.height,
                nchannels: spec.nchannels,
                kind: sample_kind(spec.format),
                scanline_stride: spec.scanline_bytes(),
            };
            match Texture::from_pixels(ctx, &data) {
                Ok(texture) => {
                    let bind_group = gpu.pipeline.create_texture_bind_group(ctx, &texture);
                    log::debug!(
                        "Uploaded {} generation {} ({}x{} {})",
                        key.image,
                        key.generation,
                        spec.width,
                        spec.height,
                        spec.format
                    );
                    gpu.upload = Some(Upload {
                        key,
                        texture,
                        bind_group,
                    });
                }
                Err(e) if !e.is_fatal() => {
                    log::warn!("Cannot display {}: {}", image.name(), e);
                    self.rejected = Some(key);
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let [sx, sy, ox, oy] = self.viewport.ndc_transform();
        gpu.pipeline
            .update_transform(ctx, TransformUniform::from_scale_offset(sx, sy, ox, oy));
        gpu.pipeline
            .update_display(ctx, transform.uniform(spec.nchannels, spec.format));
        Ok(true)
    }

    /// Draw the prepared image into `rect` of the pass.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, rect: ViewRect) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        if let Some(upload) = &gpu.upload {
            gpu.pipeline
                .draw(pass, upload.texture.kind, &upload.bind_group, rect);
        }
    }

    /// Drop all GPU objects, e.g. before the context goes away.
    pub fn release_gpu(&mut self) {
        self.gpu = None;
        self.rejected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::mock::MemoryDecoder;
    use crate::spec::ImageSpec;

    fn resident_image() -> IvImage {
        let decoder = MemoryDecoder::new();
        decoder.insert(
            "a.png",
            vec![(ImageSpec::new(8, 4, 1, SampleFormat::U8), vec![0; 32])],
        );
        let mut img = IvImage::new("a.png");
        img.read(&decoder, 0, false, None).unwrap();
        img
    }

    #[test]
    fn test_upload_only_when_buffer_changes() {
        let decoder = MemoryDecoder::new();
        decoder.insert(
            "a.png",
            vec![(ImageSpec::new(1, 1, 1, SampleFormat::U8), vec![3])],
        );
        let mut img = IvImage::new("a.png");
        img.read(&decoder, 0, false, None).unwrap();
        let key = TextureKey::of(&img);
        assert!(needs_upload(None, key));
        assert!(!needs_upload(Some(key), key));

        img.read(&decoder, 0, false, None).unwrap();
        assert!(!needs_upload(Some(key), TextureKey::of(&img)));

        img.read(&decoder, 0, true, None).unwrap();
        assert!(needs_upload(Some(key), TextureKey::of(&img)));

        let other = IvImage::new("a.png");
        assert!(needs_upload(Some(key), TextureKey::of(&other)));
    }

    #[test]
    fn test_sample_kind_mapping() {
        assert_eq!(sample_kind(SampleFormat::U8), SampleKind::U8);
        assert_eq!(sample_kind(SampleFormat::U16), SampleKind::U16);
        assert!(sample_kind(SampleFormat::F32).is_float());
    }

    #[test]
    fn test_pixel_peek_ignores_navigation() {
        let img = resident_image();
        let mut peek = DisplayView::new(ViewMode::PixelPeek { zoom: 16.0 }, 160, 160);
        peek.bind_image(Some(&img));
        peek.focus_on(Some((2, 1)));
        let before = peek.viewport().clone();

        peek.zoom_in();
        peek.zoom_out();
        peek.pan(50.0, 50.0);
        peek.fit_image_to_window();
        peek.normal_size();
        peek.zoom_at(0.0, 0.0, true);
        assert_eq!(peek.viewport(), &before);
        assert_eq!(peek.viewport().zoom(), 16.0);
        assert_eq!(peek.viewport().center(), (2.5, 1.5));
    }

    #[test]
    fn test_free_view_follows_navigation() {
        let img = resident_image();
        let mut view = DisplayView::new(ViewMode::Free, 800, 600);
        view.bind_image(Some(&img));
        view.focus_on(Some((7, 3)));
        assert_eq!(view.viewport().center(), (4.0, 2.0));

        view.zoom_in();
        assert_eq!(view.viewport().zoom(), 2.0);
        view.fit_image_to_window();
        assert_eq!(view.viewport().zoom(), 64.0);

        view.bind_image(None);
        assert!(!view.viewport().has_image());
    }
}
