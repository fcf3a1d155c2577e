use std::borrow::Cow;

use crate::context::GpuContext;
use crate::error::{GpuError, Result};

/// Storage type of one channel sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    U8,
    U16,
    F32,
}

impl SampleKind {
    /// Bytes per sample.
    pub fn bytes(self) -> usize {
        match self {
            SampleKind::U8 => 1,
            SampleKind::U16 => 2,
            SampleKind::F32 => 4,
        }
    }

    /// Value mapping to 1.0 on screen.
    pub fn max_value(self) -> f32 {
        match self {
            SampleKind::U8 => 255.0,
            SampleKind::U16 => 65535.0,
            SampleKind::F32 => 1.0,
        }
    }

    pub fn is_float(self) -> bool {
        self == SampleKind::F32
    }

    /// Append the native-endian encoding of `max_value` to `out`.
    fn push_one(self, out: &mut Vec<u8>) {
        match self {
            SampleKind::U8 => out.push(u8::MAX),
            SampleKind::U16 => out.extend_from_slice(&u16::MAX.to_ne_bytes()),
            SampleKind::F32 => out.extend_from_slice(&1.0f32.to_ne_bytes()),
        }
    }
}

/// Texture lanes used for a source channel count.
///
/// wgpu has no three-lane formats, so RGB gets an opaque fourth lane and
/// anything wider than four channels keeps its first four.
pub fn lanes_for(nchannels: u32) -> u32 {
    match nchannels {
        0 | 1 => 1,
        2 => 2,
        _ => 4,
    }
}

/// Narrowest format holding `lanes` samples of `kind` without conversion.
pub fn texture_format(kind: SampleKind, lanes: u32) -> wgpu::TextureFormat {
    use wgpu::TextureFormat as F;
    match (kind, lanes) {
        (SampleKind::U8, 1) => F::R8Uint,
        (SampleKind::U8, 2) => F::Rg8Uint,
        (SampleKind::U8, _) => F::Rgba8Uint,
        (SampleKind::U16, 1) => F::R16Uint,
        (SampleKind::U16, 2) => F::Rg16Uint,
        (SampleKind::U16, _) => F::Rgba16Uint,
        (SampleKind::F32, 1) => F::R32Float,
        (SampleKind::F32, 2) => F::Rg32Float,
        (SampleKind::F32, _) => F::Rgba32Float,
    }
}

/// Borrowed view of a decoded pixel buffer ready for upload.
#[derive(Debug, Clone, Copy)]
pub struct PixelData<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub nchannels: u32,
    pub kind: SampleKind,
    /// Bytes from one scanline to the next.
    pub scanline_stride: usize,
}

impl<'a> PixelData<'a> {
    pub fn lanes(&self) -> u32 {
        lanes_for(self.nchannels)
    }

    fn pixel_bytes(&self) -> usize {
        self.nchannels as usize * self.kind.bytes()
    }

    /// Repack into tightly packed texture lanes.
    ///
    /// Borrows the source when it already matches the texture layout.
    pub fn pack(&self) -> Result<Cow<'a, [u8]>> {
        if self.nchannels == 0 {
            return Err(GpuError::Texture("image has no channels".into()));
        }
        let width = self.width as usize;
        let height = self.height as usize;
        let pixel_bytes = self.pixel_bytes();
        let row_bytes = width * pixel_bytes;
        if self.scanline_stride < row_bytes || self.data.len() < self.scanline_stride * height {
            return Err(GpuError::Texture(format!(
                "Invalid data size: expected {} bytes for {}x{} with stride {}, got {}",
                self.scanline_stride * height,
                self.width,
                self.height,
                self.scanline_stride,
                self.data.len()
            )));
        }

        let lanes = self.lanes() as usize;
        let nchannels = self.nchannels as usize;
        if lanes == nchannels && self.scanline_stride == row_bytes {
            return Ok(Cow::Borrowed(&self.data[..row_bytes * height]));
        }

        let sample = self.kind.bytes();
        let copied = nchannels.min(lanes) * sample;
        let mut out = Vec::with_capacity(width * height * lanes * sample);
        for row in self.data.chunks(self.scanline_stride).take(height) {
            for px in row[..row_bytes].chunks_exact(pixel_bytes) {
                out.extend_from_slice(&px[..copied]);
                for _ in nchannels..lanes {
                    self.kind.push_one(&mut out);
                }
            }
        }
        Ok(Cow::Owned(out))
    }
}

/// GPU texture holding raw (unnormalized) pixel samples.
///
/// Read in the shader with `textureLoad`, so there is no sampler.
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
    pub kind: SampleKind,
}

impl Texture {
    /// Upload pixels using the narrowest format that keeps their precision.
    pub fn from_pixels(ctx: &GpuContext, pixels: &PixelData<'_>) -> Result<Self> {
        let max_dim = ctx.max_texture_dimension();
        if pixels.width == 0 || pixels.height == 0 {
            return Err(GpuError::Texture("empty image".into()));
        }
        if pixels.width > max_dim || pixels.height > max_dim {
            return Err(GpuError::Texture(format!(
                "{}x{} exceeds the device texture limit of {}",
                pixels.width, pixels.height, max_dim
            )));
        }

        let packed = pixels.pack()?;
        let lanes = pixels.lanes();
        let format = texture_format(pixels.kind, lanes);

        let size = wgpu::Extent3d {
            width: pixels.width,
            height: pixels.height,
            depth_or_array_layers: 1,
        };

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Image Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let bytes_per_row = lanes * pixels.kind.bytes() as u32 * pixels.width;
        ctx.queue.write_texture(
            texture.as_image_copy(),
            &packed,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(pixels.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        log::debug!(
            "Uploaded {}x{} texture as {:?} ({} bytes)",
            pixels.width,
            pixels.height,
            format,
            packed.len()
        );

        Ok(Self {
            texture,
            view,
            width: pixels.width,
            height: pixels.height,
            kind: pixels.kind,
        })
    }
}
