//! Decoder seam between image resources and the file-format library.
//!
//! [`ImageDecoder`] is the only thing [`IvImage`](crate::image::IvImage) knows
//! about file formats. The production implementation wraps the `image` crate.

use std::path::Path;

use image::{ColorType, ImageError, ImageReader};

use crate::error::{IvError, Result};
use crate::spec::{ImageSpec, SampleFormat};

/// Supported image file extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "tif", "tga", "pnm", "ppm", "pgm",
    "exr", "hdr", "qoi",
];

/// Check if a path has a supported image extension.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reads headers and pixels from image files.
pub trait ImageDecoder: Send + Sync {
    /// Unique identifier for this decoder.
    fn id(&self) -> &'static str;

    /// Read the header of `subimage` without decoding pixels.
    fn open(&self, path: &Path, subimage: u32) -> Result<ImageSpec>;

    /// Decode the pixels described by `spec` into `buf`.
    ///
    /// `buf` is exactly `spec.image_bytes()` long. `progress` receives the
    /// fraction done; returning `false` aborts with [`IvError::Cancelled`].
    fn read_pixels(
        &self,
        path: &Path,
        spec: &ImageSpec,
        buf: &mut [u8],
        progress: &mut dyn FnMut(f32) -> bool,
    ) -> Result<()>;
}

/// Decoder backed by the `image` crate.
///
/// The crate exposes one frame per file, so every spec has a single subimage.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    fn reader(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>> {
        let reader = ImageReader::open(path).map_err(|e| map_open_error(path, e))?;
        reader
            .with_guessed_format()
            .map_err(|e| map_io_error(path, e))
    }
}

impl ImageDecoder for ImageCrateDecoder {
    fn id(&self) -> &'static str {
        "image"
    }

    fn open(&self, path: &Path, subimage: u32) -> Result<ImageSpec> {
        if subimage != 0 {
            return Err(IvError::invalid_state(format!(
                "subimage {} out of range (file has 1)",
                subimage
            )));
        }

        let reader = Self::reader(path)?;
        let format_name = reader
            .format()
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("unknown")
            .to_string();
        let decoder = reader
            .into_decoder()
            .map_err(|e| map_image_error(path, e))?;

        let (width, height) = image::ImageDecoder::dimensions(&decoder);
        let color = image::ImageDecoder::color_type(&decoder);
        let (nchannels, format) = layout_for(color).ok_or_else(|| {
            IvError::unsupported(path, format!("unsupported color type {:?}", color))
        })?;

        let mut spec = ImageSpec::new(width, height, nchannels, format);
        spec.format_name = format_name;
        log::trace!(
            "Opened {:?}: {}x{} {} channel {}",
            path,
            width,
            height,
            nchannels,
            format
        );
        Ok(spec)
    }

    /// `read_image` decodes the whole file in one call and offers no hook,
    /// so progress is reported at 0 and 1 only. A cancel is honoured before
    /// decoding starts or once it has finished, never in between.
    fn read_pixels(
        &self,
        path: &Path,
        spec: &ImageSpec,
        buf: &mut [u8],
        progress: &mut dyn FnMut(f32) -> bool,
    ) -> Result<()> {
        if !progress(0.0) {
            return Err(IvError::Cancelled);
        }

        let decoder = Self::reader(path)?
            .into_decoder()
            .map_err(|e| map_image_error(path, e))?;

        // The file may have changed since its header was read
        let expected = image::ImageDecoder::total_bytes(&decoder);
        if expected != buf.len() as u64 || expected != spec.image_bytes() as u64 {
            return Err(IvError::decode(
                path,
                format!(
                    "file layout changed: expected {} bytes, header now says {}",
                    spec.image_bytes(),
                    expected
                ),
            ));
        }

        image::ImageDecoder::read_image(decoder, buf).map_err(|e| map_image_error(path, e))?;

        if !progress(1.0) {
            return Err(IvError::Cancelled);
        }
        Ok(())
    }
}

/// Channel count and sample format for an `image` colour type.
fn layout_for(color: ColorType) -> Option<(u32, SampleFormat)> {
    let layout = match color {
        ColorType::L8 => (1, SampleFormat::U8),
        ColorType::La8 => (2, SampleFormat::U8),
        ColorType::Rgb8 => (3, SampleFormat::U8),
        ColorType::Rgba8 => (4, SampleFormat::U8),
        ColorType::L16 => (1, SampleFormat::U16),
        ColorType::La16 => (2, SampleFormat::U16),
        ColorType::Rgb16 => (3, SampleFormat::U16),
        ColorType::Rgba16 => (4, SampleFormat::U16),
        ColorType::Rgb32F => (3, SampleFormat::F32),
        ColorType::Rgba32F => (4, SampleFormat::F32),
        _ => return None,
    };
    Some(layout)
}

/// The file itself could not be opened, e.g. missing or not readable.
fn map_open_error(path: &Path, err: std::io::Error) -> IvError {
    log::debug!("Cannot open {:?}: {}", path, err);
    IvError::file_not_found(path)
}

fn map_io_error(path: &Path, err: std::io::Error) -> IvError {
    if err.kind() == std::io::ErrorKind::NotFound {
        IvError::file_not_found(path)
    } else {
        IvError::decode(path, err.to_string())
    }
}

fn map_image_error(path: &Path, err: ImageError) -> IvError {
    match err {
        ImageError::IoError(e) => map_io_error(path, e),
        ImageError::Unsupported(e) => IvError::unsupported(path, e.to_string()),
        other => IvError::decode(path, other.to_string()),
    }
}
