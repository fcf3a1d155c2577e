//! Image resource: one file's identity, decoded pixels, thumbnail and
//! display parameters.
//!
//! An [`IvImage`] moves through these states (see [`ImageState`]):
//!
//! ```text
//! Uninitialized ──init_spec──▶ NonResidentSpecKnown ──read──▶ Resident
//!       │                             ▲                          │
//!       └──── open fails ──▶ Broken ──┘ (forced retry)           │
//!                                                                ▼
//!                                          forced re-read failure keeps pixels
//! ```
//!
//! Failures are recorded on the resource (read-and-clear message) as well as
//! returned, so a broken image simply shows as "no image" in the views.

use std::cell::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use crate::decoder::ImageDecoder;
use crate::error::{IvError, Result};
use crate::spec::{ImageSpec, SampleFormat};

/// Smallest gamma reachable through [`ImageAdjustment::AdjustGamma`].
pub const MIN_GAMMA: f32 = 0.1;

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an image resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageId(u64);

impl ImageId {
    fn next() -> Self {
        Self(NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state, derived from the validity flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    /// No file name
    Uninitialized,
    /// The file could not be opened
    Broken,
    /// Name only, header not read yet
    NonResidentUnknown,
    /// Header read, pixels not decoded
    NonResidentSpecKnown,
    /// Pixels decoded and in memory
    Resident,
}

/// User intent that changes an image's display parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageAdjustment {
    /// Add stops of exposure
    AdjustExposure(f32),
    /// Add to gamma (clamped at [`MIN_GAMMA`])
    AdjustGamma(f32),
    /// Back to gamma 1, exposure 0
    ResetAdjustments,
}

/// Result of a finished decode, ready to be installed.
#[derive(Debug)]
pub struct DecodedPixels {
    pub spec: ImageSpec,
    pub pixels: Vec<u8>,
}

/// RGBA8 downsample of the resident pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Everything a background decode needs, plus its cancellation flag.
#[derive(Debug, Clone)]
pub struct DecodeTicket {
    pub image: ImageId,
    pub token: u64,
    pub path: PathBuf,
    pub subimage: u32,
    pub cancel: Arc<AtomicBool>,
}

#[derive(Debug)]
struct InFlight {
    token: u64,
    subimage: u32,
    cancel: Arc<AtomicBool>,
}

/// One image file and everything cached about it.
///
/// Invariants:
/// * `pixels.is_some()` is exactly `pixels_valid()`.
/// * `bad_file` implies no pixels.
/// * at most one decode is in flight.
#[derive(Debug)]
pub struct IvImage {
    id: ImageId,
    path: PathBuf,
    spec: Option<ImageSpec>,
    pixels: Option<Vec<u8>>,
    thumbnail: Option<Thumbnail>,
    bad_file: bool,
    error: Option<String>,
    gamma: f32,
    exposure: f32,
    file_size: Option<u64>,
    pixel_generation: u64,
    shortinfo: OnceCell<String>,
    longinfo: OnceCell<String>,
    in_flight: Option<InFlight>,
    next_token: u64,
}

impl IvImage {
    /// Create a resource for `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            id: ImageId::next(),
            path: path.into(),
            spec: None,
            pixels: None,
            thumbnail: None,
            bad_file: false,
            error: None,
            gamma: 1.0,
            exposure: 0.0,
            file_size: None,
            pixel_generation: 0,
            shortinfo: OnceCell::new(),
            longinfo: OnceCell::new(),
            in_flight: None,
            next_token: 1,
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name for titles and lists.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn state(&self) -> ImageState {
        if self.path.as_os_str().is_empty() {
            ImageState::Uninitialized
        } else if self.bad_file {
            ImageState::Broken
        } else if self.pixels.is_some() {
            ImageState::Resident
        } else if self.spec.is_some() {
            ImageState::NonResidentSpecKnown
        } else {
            ImageState::NonResidentUnknown
        }
    }

    pub fn spec(&self) -> Option<&ImageSpec> {
        self.spec.as_ref()
    }

    pub fn spec_valid(&self) -> bool {
        self.spec.is_some()
    }

    pub fn pixels_valid(&self) -> bool {
        self.pixels.is_some()
    }

    pub fn thumbnail_valid(&self) -> bool {
        self.thumbnail.is_some()
    }

    pub fn bad_file(&self) -> bool {
        self.bad_file
    }

    /// Resident pixel buffer.
    pub fn pixels(&self) -> Option<&[u8]> {
        self.pixels.as_deref()
    }

    /// Bumped every time a new pixel buffer is installed.
    pub fn pixel_generation(&self) -> u64 {
        self.pixel_generation
    }

    /// Subimage of the current spec (0 when unknown).
    pub fn subimage(&self) -> u32 {
        self.spec.as_ref().map_or(0, |s| s.subimage)
    }

    pub fn nsubimages(&self) -> u32 {
        self.spec.as_ref().map_or(0, |s| s.nsubimages)
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    pub fn set_gamma(&mut self, gamma: f32) {
        self.gamma = gamma;
    }

    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    /// Apply a display-parameter command.
    pub fn apply_adjustment(&mut self, adjustment: ImageAdjustment) {
        match adjustment {
            ImageAdjustment::AdjustExposure(stops) => {
                self.exposure = snap(self.exposure + stops);
            }
            ImageAdjustment::AdjustGamma(delta) => {
                self.gamma = snap(self.gamma + delta).max(MIN_GAMMA);
            }
            ImageAdjustment::ResetAdjustments => {
                self.gamma = 1.0;
                self.exposure = 0.0;
            }
        }
        log::debug!(
            "{}: exposure {:+.2}, gamma {:.2}",
            self.name(),
            self.exposure,
            self.gamma
        );
    }

    /// Last error message; cleared by this call.
    pub fn error_message(&mut self) -> String {
        self.error.take().unwrap_or_default()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Read the header of subimage 0.
    ///
    /// No-op when the spec is already known, unless `force`.
    pub fn init_spec(&mut self, decoder: &dyn ImageDecoder, force: bool) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(self.record_failure(IvError::invalid_state("image has no file name")));
        }
        if self.spec.is_some() && !force {
            return Ok(());
        }

        match decoder.open(&self.path, 0) {
            Ok(spec) => {
                // Resident pixels may belong to another subimage; keep that spec
                if self.pixels.is_none() {
                    self.set_spec(spec);
                }
                self.bad_file = false;
                self.file_size = std::fs::metadata(&self.path).ok().map(|m| m.len());
                Ok(())
            }
            Err(err) => {
                let err = self.record_failure(err);
                // Any header failure means the file cannot be shown
                if self.pixels.is_none() {
                    self.bad_file = true;
                }
                Err(err)
            }
        }
    }

    /// Make the pixels of `subimage` resident.
    ///
    /// Does no decoding when they already are and `force` is false. On failure
    /// a previously resident buffer is kept untouched.
    pub fn read(
        &mut self,
        decoder: &dyn ImageDecoder,
        subimage: u32,
        force: bool,
        progress: Option<&mut dyn FnMut(f32) -> bool>,
    ) -> Result<()> {
        if !force && self.is_resident_for(subimage) {
            return Ok(());
        }
        if self.in_flight.is_some() {
            return Err(IvError::invalid_state(format!(
                "{} is already being decoded",
                self.name()
            )));
        }
        if self.path.as_os_str().is_empty() {
            return Err(self.record_failure(IvError::invalid_state("image has no file name")));
        }
        if self.bad_file && !force {
            return Err(IvError::invalid_state(format!(
                "{} could not be opened; reload to retry",
                self.name()
            )));
        }

        let mut keep_going = |_: f32| true;
        let progress: &mut dyn FnMut(f32) -> bool = match progress {
            Some(p) => p,
            None => &mut keep_going,
        };

        let started = Instant::now();
        match decode_subimage(decoder, &self.path, subimage, progress) {
            Ok(decoded) => {
                log::info!(
                    "🖼️ Decoded {} subimage {} ({}x{}) in {:.1?}",
                    self.name(),
                    subimage,
                    decoded.spec.width,
                    decoded.spec.height,
                    started.elapsed()
                );
                self.install(decoded);
                Ok(())
            }
            Err(IvError::Cancelled) => Err(IvError::Cancelled),
            Err(err) => Err(self.record_failure(err)),
        }
    }

    /// Whether pixels for `subimage` are resident.
    pub fn is_resident_for(&self, subimage: u32) -> bool {
        self.pixels.is_some() && self.subimage() == subimage
    }

    /// Reserve the single decode slot for a background decode.
    ///
    /// Fails while another decode is in flight; callers wanting the same
    /// subimage should wait for that one instead.
    pub fn start_decode(&mut self, subimage: u32) -> Result<DecodeTicket> {
        if let Some(flight) = &self.in_flight {
            return Err(IvError::invalid_state(format!(
                "{} already decoding subimage {}",
                self.name(),
                flight.subimage
            )));
        }
        if self.path.as_os_str().is_empty() {
            return Err(self.record_failure(IvError::invalid_state("image has no file name")));
        }

        let token = self.next_token;
        self.next_token += 1;
        let cancel = Arc::new(AtomicBool::new(false));
        self.in_flight = Some(InFlight {
            token,
            subimage,
            cancel: Arc::clone(&cancel),
        });

        Ok(DecodeTicket {
            image: self.id,
            token,
            path: self.path.clone(),
            subimage,
            cancel,
        })
    }

    /// Subimage currently being decoded in the background.
    pub fn decoding_subimage(&self) -> Option<u32> {
        self.in_flight.as_ref().map(|f| f.subimage)
    }

    pub fn is_decoding(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Hand back the result of a background decode.
    ///
    /// Results whose token does not match the in-flight decode (cancelled or
    /// superseded) are discarded with `InvalidState` and change nothing.
    pub fn complete_decode(&mut self, token: u64, result: Result<DecodedPixels>) -> Result<()> {
        match &self.in_flight {
            Some(flight) if flight.token == token => {}
            _ => {
                return Err(IvError::invalid_state(format!(
                    "stale decode result {} for {}",
                    token,
                    self.name()
                )));
            }
        }
        self.in_flight = None;

        match result {
            Ok(decoded) => {
                log::info!(
                    "🖼️ Decoded {} subimage {} ({}x{}) in background",
                    self.name(),
                    decoded.spec.subimage,
                    decoded.spec.width,
                    decoded.spec.height
                );
                self.install(decoded);
                Ok(())
            }
            Err(IvError::Cancelled) => Err(IvError::Cancelled),
            Err(err) => Err(self.record_failure(err)),
        }
    }

    /// Signal the in-flight decode to stop and free the decode slot.
    pub fn cancel_decode(&mut self) -> bool {
        match self.in_flight.take() {
            Some(flight) => {
                flight.cancel.store(true, Ordering::Relaxed);
                log::debug!("Cancelled decode {} of {}", flight.token, self.name());
                true
            }
            None => false,
        }
    }

    /// Drop the pixel buffer, keeping the spec.
    pub fn release_pixels(&mut self) {
        if self.pixels.take().is_some() {
            self.thumbnail = None;
            log::debug!("Released pixels of {}", self.name());
        }
    }

    /// Bytes of scanline `y`.
    pub fn scanline(&self, y: u32) -> Result<&[u8]> {
        let (spec, pixels) = self.resident()?;
        if y >= spec.height {
            return Err(IvError::invalid_state(format!(
                "scanline {} outside 0..{}",
                y, spec.height
            )));
        }
        let stride = spec.scanline_bytes();
        let start = y as usize * stride;
        Ok(&pixels[start..start + stride])
    }

    /// Bytes of pixel `(x, y)`.
    pub fn pixeladdr(&self, x: u32, y: u32) -> Result<&[u8]> {
        let (spec, _) = self.resident()?;
        if x >= spec.width {
            return Err(IvError::invalid_state(format!(
                "x {} outside 0..{}",
                x, spec.width
            )));
        }
        let row = self.scanline(y)?;
        let stride = spec.pixel_bytes();
        let start = x as usize * stride;
        Ok(&row[start..start + stride])
    }

    /// Channel values of `(x, y)` normalized to 0..1 for integer data.
    ///
    /// Fills `min(out.len(), nchannels)` values.
    pub fn getpixel_float(&self, x: u32, y: u32, out: &mut [f32]) -> Result<()> {
        let format = self.resident()?.0.format;
        let px = self.pixeladdr(x, y)?;
        for (o, sample) in out.iter_mut().zip(px.chunks_exact(format.bytes())) {
            *o = match format {
                SampleFormat::U8 => f32::from(sample[0]) / 255.0,
                SampleFormat::U16 => f32::from(read_u16(sample)) / 65535.0,
                SampleFormat::F32 => read_f32(sample),
            };
        }
        Ok(())
    }

    /// Raw integer channel values of `(x, y)`.
    ///
    /// Float data is clamped to 0..1 and quantized to 0..255.
    pub fn getpixel_int(&self, x: u32, y: u32, out: &mut [i32]) -> Result<()> {
        let format = self.resident()?.0.format;
        let px = self.pixeladdr(x, y)?;
        for (o, sample) in out.iter_mut().zip(px.chunks_exact(format.bytes())) {
            *o = match format {
                SampleFormat::U8 => i32::from(sample[0]),
                SampleFormat::U16 => i32::from(read_u16(sample)),
                SampleFormat::F32 => (read_f32(sample).clamp(0.0, 1.0) * 255.0).round() as i32,
            };
        }
        Ok(())
    }

    /// One-line summary, e.g. `640 x 480, 3 channel, uint8 png`.
    pub fn shortinfo(&self) -> &str {
        match &self.spec {
            Some(spec) => self.shortinfo.get_or_init(|| {
                let mut info = format!(
                    "{} x {}, {} channel, {} {}",
                    spec.width, spec.height, spec.nchannels, spec.format, spec.format_name
                );
                if spec.nsubimages > 1 {
                    info.push_str(&format!(
                        " (subimage {}/{})",
                        spec.subimage + 1,
                        spec.nsubimages
                    ));
                }
                info
            }),
            None => "",
        }
    }

    /// Multi-line `Key: value` description.
    pub fn longinfo(&self) -> &str {
        match &self.spec {
            Some(spec) => self.longinfo.get_or_init(|| {
                let mut lines = vec![
                    format!("File: {}", self.path.display()),
                    format!("Dimensions: {} x {} pixels", spec.width, spec.height),
                    format!(
                        "Channels: {} ({})",
                        spec.nchannels,
                        spec.channel_names.join(", ")
                    ),
                    format!("Data format: {}", spec.format),
                    format!("File format: {}", spec.format_name),
                    format!("Subimage: {} of {}", spec.subimage + 1, spec.nsubimages),
                    format!("Decoded size: {}", human_size(spec.image_bytes() as u64)),
                ];
                if let Some(size) = self.file_size {
                    lines.push(format!("File size: {}", human_size(size)));
                }
                lines.join("\n")
            }),
            None => "",
        }
    }

    /// RGBA8 thumbnail no larger than `max_size` on either edge.
    ///
    /// Built from the resident pixels on first use; `None` when not resident.
    pub fn thumbnail(&mut self, max_size: u32) -> Option<&Thumbnail> {
        let stale = self
            .thumbnail
            .as_ref()
            .is_some_and(|t| t.width.max(t.height) > max_size.max(1));
        if stale {
            self.thumbnail = None;
        }
        if self.thumbnail.is_none() {
            self.thumbnail = self.build_thumbnail(max_size.max(1));
        }
        self.thumbnail.as_ref()
    }

    fn build_thumbnail(&self, max_size: u32) -> Option<Thumbnail> {
        let spec = self.spec.as_ref()?;
        if self.pixels.is_none() || spec.width == 0 || spec.height == 0 {
            return None;
        }
        let scale = (max_size as f32 / spec.width.max(spec.height) as f32).min(1.0);
        let width = ((spec.width as f32 * scale).round() as u32).max(1);
        let height = ((spec.height as f32 * scale).round() as u32).max(1);

        let mut values = vec![0.0f32; spec.nchannels as usize];
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for ty in 0..height {
            let sy = (ty as u64 * spec.height as u64 / height as u64) as u32;
            for tx in 0..width {
                let sx = (tx as u64 * spec.width as u64 / width as u64) as u32;
                self.getpixel_float(sx, sy, &mut values).ok()?;
                for c in expand_to_rgba(&values) {
                    rgba.push((c.clamp(0.0, 1.0) * 255.0).round() as u8);
                }
            }
        }
        Some(Thumbnail {
            width,
            height,
            rgba,
        })
    }

    fn resident(&self) -> Result<(&ImageSpec, &[u8])> {
        match (&self.spec, &self.pixels) {
            (Some(spec), Some(pixels)) => Ok((spec, pixels)),
            _ => Err(IvError::invalid_state(format!(
                "{} has no resident pixels",
                self.name()
            ))),
        }
    }

    fn set_spec(&mut self, spec: ImageSpec) {
        if self.spec.as_ref() != Some(&spec) {
            self.shortinfo.take();
            self.longinfo.take();
        }
        self.spec = Some(spec);
    }

    fn install(&mut self, decoded: DecodedPixels) {
        self.set_spec(decoded.spec);
        self.pixels = Some(decoded.pixels);
        self.thumbnail = None;
        self.bad_file = false;
        self.pixel_generation += 1;
    }

    /// Record `err` on the resource and hand it back.
    fn record_failure(&mut self, err: IvError) -> IvError {
        log::warn!("{}: {}", self.name(), err);
        self.error = Some(err.to_string());
        // A good buffer from an earlier read keeps the image usable
        if err.is_unopenable() && self.pixels.is_none() {
            self.bad_file = true;
        }
        err
    }
}

/// Open and fully decode one subimage.
///
/// Shared by synchronous reads and the background worker.
pub fn decode_subimage(
    decoder: &dyn ImageDecoder,
    path: &Path,
    subimage: u32,
    progress: &mut dyn FnMut(f32) -> bool,
) -> Result<DecodedPixels> {
    let spec = decoder.open(path, subimage)?;
    let size = spec.image_bytes();
    let mut pixels = Vec::new();
    pixels.try_reserve_exact(size).map_err(|e| {
        IvError::decode(path, format!("cannot allocate {} bytes: {}", size, e))
    })?;
    pixels.resize(size, 0);
    decoder.read_pixels(path, &spec, &mut pixels, progress)?;
    Ok(DecodedPixels { spec, pixels })
}

/// Expand normalized channel values to RGBA.
///
/// 1 channel is grey, 2 is grey + alpha, 3 or more is RGB(A) with opaque
/// alpha when missing.
pub fn expand_to_rgba(values: &[f32]) -> [f32; 4] {
    match *values {
        [] => [0.0, 0.0, 0.0, 1.0],
        [y] => [y, y, y, 1.0],
        [y, a] => [y, y, y, a],
        [r, g, b] => [r, g, b, 1.0],
        [r, g, b, a, ..] => [r, g, b, a],
    }
}

/// Human-readable byte count ("512 B", "1.5 KB", "12.0 MB").
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Round to 1/1000 so decimal nudges cancel exactly.
fn snap(v: f32) -> f32 {
    (v * 1000.0).round() / 1000.0
}

fn read_u16(b: &[u8]) -> u16 {
    u16::from_ne_bytes([b[0], b[1]])
}

fn read_f32(b: &[u8]) -> f32 {
    f32::from_ne_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::mock::MemoryDecoder;

    /// 2x2 RGB8: black, red / green, blue.
    fn rgb_2x2() -> (ImageSpec, Vec<u8>) {
        (
            ImageSpec::new(2, 2, 3, SampleFormat::U8),
            vec![0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255],
        )
    }

    fn decoder_with(path: &str) -> MemoryDecoder {
        let decoder = MemoryDecoder::new();
        decoder.insert(path, vec![rgb_2x2()]);
        decoder
    }

    #[test]
    fn test_state_progression() {
        let decoder = decoder_with("a.png");
        assert_eq!(IvImage::new("").state(), ImageState::Uninitialized);

        let mut img = IvImage::new("a.png");
        assert_eq!(img.state(), ImageState::NonResidentUnknown);

        img.init_spec(&decoder, false).unwrap();
        assert_eq!(img.state(), ImageState::NonResidentSpecKnown);
        assert!(img.spec_valid());
        assert_eq!(img.subimage(), 0);

        img.read(&decoder, 0, false, None).unwrap();
        assert_eq!(img.state(), ImageState::Resident);
        assert_eq!(img.pixels().map(<[u8]>::len), Some(12));
    }

    #[test]
    fn test_init_spec_is_idempotent() {
        let decoder = decoder_with("a.png");
        let mut img = IvImage::new("a.png");
        img.init_spec(&decoder, false).unwrap();
        img.init_spec(&decoder, false).unwrap();
        assert_eq!(decoder.open_calls(), 1);
        img.init_spec(&decoder, true).unwrap();
        assert_eq!(decoder.open_calls(), 2);
    }

    #[test]
    fn test_missing_file_is_broken() {
        let decoder = MemoryDecoder::new();
        let mut img = IvImage::new("missing.png");
        let err = img.init_spec(&decoder, false).unwrap_err();
        assert!(matches!(err, IvError::FileNotFound { .. }));
        assert_eq!(img.state(), ImageState::Broken);
        assert!(!img.spec_valid());
        assert!(!img.error_message().is_empty());
        assert!(img.error_message().is_empty());

        // No retry without force
        assert!(img.read(&decoder, 0, false, None).is_err());
        assert_eq!(decoder.read_calls(), 0);
    }

    #[test]
    fn test_corrupt_header_is_broken() {
        let decoder = decoder_with("bad.png");
        decoder.corrupt_header("bad.png", true);
        let mut img = IvImage::new("bad.png");

        let err = img.init_spec(&decoder, false).unwrap_err();
        assert!(matches!(err, IvError::DecodeError { .. }));
        assert_eq!(img.state(), ImageState::Broken);

        // Later reads stay off the disk until forced
        assert!(img.read(&decoder, 0, false, None).is_err());
        assert_eq!(decoder.read_calls(), 0);

        decoder.corrupt_header("bad.png", false);
        img.read(&decoder, 0, true, None).unwrap();
        assert_eq!(img.state(), ImageState::Resident);
    }

    #[test]
    fn test_header_failure_with_resident_pixels_is_not_broken() {
        let decoder = decoder_with("a.png");
        let mut img = IvImage::new("a.png");
        img.read(&decoder, 0, false, None).unwrap();

        decoder.corrupt_header("a.png", true);
        assert!(img.init_spec(&decoder, true).is_err());
        assert!(!img.bad_file());
        assert_eq!(img.state(), ImageState::Resident);
    }

    #[test]
    fn test_forced_retry_recovers_broken_file() {
        let decoder = MemoryDecoder::new();
        let mut img = IvImage::new("late.png");
        assert!(img.read(&decoder, 0, false, None).is_err());
        assert!(img.bad_file());

        decoder.insert("late.png", vec![rgb_2x2()]);
        img.read(&decoder, 0, true, None).unwrap();
        assert!(!img.bad_file());
        assert_eq!(img.state(), ImageState::Resident);
    }

    #[test]
    fn test_repeat_read_does_no_decode_work() {
        let decoder = decoder_with("a.png");
        let mut img = IvImage::new("a.png");
        img.read(&decoder, 0, false, None).unwrap();
        let generation = img.pixel_generation();
        assert_eq!(decoder.read_calls(), 1);

        for _ in 0..5 {
            img.read(&decoder, 0, false, None).unwrap();
        }
        assert_eq!(decoder.read_calls(), 1);
        assert_eq!(img.pixel_generation(), generation);

        img.read(&decoder, 0, true, None).unwrap();
        assert_eq!(decoder.read_calls(), 2);
        assert_eq!(img.pixel_generation(), generation + 1);
    }

    #[test]
    fn test_failed_forced_reread_keeps_pixels() {
        let decoder = decoder_with("a.png");
        let mut img = IvImage::new("a.png");
        img.read(&decoder, 0, false, None).unwrap();
        let before = img.pixels().unwrap().to_vec();
        let generation = img.pixel_generation();

        decoder.fail_reads("a.png", true);
        let err = img.read(&decoder, 0, true, None).unwrap_err();
        assert!(matches!(err, IvError::DecodeError { .. }));

        assert!(img.pixels_valid());
        assert!(!img.bad_file());
        assert_eq!(img.pixels().unwrap(), &before[..]);
        assert_eq!(img.pixel_generation(), generation);

        let msg = img.error_message();
        assert!(!msg.is_empty());
        assert!(img.error_message().is_empty());
    }

    #[test]
    fn test_unopenable_reread_keeps_pixels_and_is_not_broken() {
        let decoder = decoder_with("a.png");
        let mut img = IvImage::new("a.png");
        img.read(&decoder, 0, false, None).unwrap();

        decoder.remove(Path::new("a.png"));
        assert!(img.read(&decoder, 0, true, None).is_err());
        assert!(img.pixels_valid());
        assert!(!img.bad_file());
        assert_eq!(img.state(), ImageState::Resident);
    }

    #[test]
    fn test_progress_cancel_keeps_previous_state() {
        let decoder = decoder_with("a.png");
        let mut img = IvImage::new("a.png");
        let mut calls = Vec::new();
        let mut stop_early = |f: f32| {
            calls.push(f);
            false
        };
        let err = img.read(&decoder, 0, false, Some(&mut stop_early)).unwrap_err();
        assert!(matches!(err, IvError::Cancelled));
        assert_eq!(calls, vec![0.5]);
        assert!(!img.pixels_valid());
        assert!(!img.has_error());
    }

    #[test]
    fn test_progress_reports_fractions() {
        let decoder = decoder_with("a.png");
        let mut img = IvImage::new("a.png");
        let mut seen = Vec::new();
        let mut record = |f: f32| {
            seen.push(f);
            true
        };
        img.read(&decoder, 0, false, Some(&mut record)).unwrap();
        assert_eq!(seen, vec![0.5, 1.0]);
    }

    #[test]
    fn test_getpixel_on_synthetic_image() {
        let decoder = decoder_with("a.png");
        let mut img = IvImage::new("a.png");
        img.read(&decoder, 0, false, None).unwrap();

        let expected = [
            ((0, 0), [0, 0, 0]),
            ((1, 0), [255, 0, 0]),
            ((0, 1), [0, 255, 0]),
            ((1, 1), [0, 0, 255]),
        ];
        for ((x, y), want) in expected {
            let mut ints = [0i32; 3];
            img.getpixel_int(x, y, &mut ints).unwrap();
            assert_eq!(ints, want);

            let mut floats = [0f32; 3];
            img.getpixel_float(x, y, &mut floats).unwrap();
            let want_f = want.map(|v| v as f32 / 255.0);
            assert_eq!(floats, want_f);
        }
    }

    #[test]
    fn test_getpixel_u16_and_float() {
        let decoder = MemoryDecoder::new();
        let u16_px: Vec<u8> = [0u16, 32768, 65535]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();
        decoder.insert("deep.png", vec![(ImageSpec::new(1, 1, 3, SampleFormat::U16), u16_px)]);
        let f32_px: Vec<u8> = [0.25f32, 2.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
        decoder.insert("hdr.exr", vec![(ImageSpec::new(1, 1, 2, SampleFormat::F32), f32_px)]);

        let mut deep = IvImage::new("deep.png");
        deep.read(&decoder, 0, false, None).unwrap();
        let mut ints = [0i32; 3];
        deep.getpixel_int(0, 0, &mut ints).unwrap();
        assert_eq!(ints, [0, 32768, 65535]);
        let mut floats = [0f32; 3];
        deep.getpixel_float(0, 0, &mut floats).unwrap();
        assert_eq!(floats[2], 1.0);

        let mut hdr = IvImage::new("hdr.exr");
        hdr.read(&decoder, 0, false, None).unwrap();
        let mut floats = [0f32; 2];
        hdr.getpixel_float(0, 0, &mut floats).unwrap();
        assert_eq!(floats, [0.25, 2.0]);
        let mut ints = [0i32; 2];
        hdr.getpixel_int(0, 0, &mut ints).unwrap();
        assert_eq!(ints, [64, 255]);
    }

    #[test]
    fn test_accessors_require_residency() {
        let decoder = decoder_with("a.png");
        let mut img = IvImage::new("a.png");
        img.init_spec(&decoder, false).unwrap();
        assert!(matches!(img.scanline(0), Err(IvError::InvalidState(_))));
        assert!(matches!(img.pixeladdr(0, 0), Err(IvError::InvalidState(_))));

        img.read(&decoder, 0, false, None).unwrap();
        assert_eq!(img.scanline(1).unwrap(), &[0, 255, 0, 0, 0, 255]);
        assert_eq!(img.pixeladdr(1, 0).unwrap(), &[255, 0, 0]);
        assert!(img.scanline(2).is_err());
        assert!(img.pixeladdr(2, 0).is_err());
    }

    #[test]
    fn test_subimage_switch() {
        let decoder = MemoryDecoder::new();
        let (spec, px) = rgb_2x2();
        decoder.insert(
            "multi.tif",
            vec![
                (spec.clone(), px),
                (ImageSpec::new(1, 1, 1, SampleFormat::U8), vec![7]),
            ],
        );
        let mut img = IvImage::new("multi.tif");
        img.read(&decoder, 0, false, None).unwrap();
        assert_eq!(img.nsubimages(), 2);
        assert!(img.shortinfo().contains("subimage 1/2"));

        img.read(&decoder, 1, false, None).unwrap();
        assert_eq!(img.subimage(), 1);
        assert!(img.is_resident_for(1));
        assert!(!img.is_resident_for(0));
        assert_eq!(img.pixels().unwrap(), &[7]);
        assert!(img.shortinfo().starts_with("1 x 1, 1 channel"));

        // Out-of-range subimage leaves the current one resident
        assert!(img.read(&decoder, 5, false, None).is_err());
        assert!(img.is_resident_for(1));
    }

    #[test]
    fn test_info_strings_are_stable() {
        let decoder = decoder_with("a.png");
        let mut img = IvImage::new("a.png");
        assert_eq!(img.shortinfo(), "");
        img.init_spec(&decoder, false).unwrap();
        assert_eq!(img.shortinfo(), "2 x 2, 3 channel, uint8 mem");
        let long = img.longinfo().to_string();
        assert!(long.contains("Dimensions: 2 x 2 pixels"));
        assert!(long.contains("Channels: 3 (R, G, B)"));
        img.read(&decoder, 0, false, None).unwrap();
        assert_eq!(img.longinfo(), long);
    }

    #[test]
    fn test_adjustments() {
        let mut img = IvImage::new("a.png");
        img.apply_adjustment(ImageAdjustment::AdjustExposure(0.1));
        img.apply_adjustment(ImageAdjustment::AdjustExposure(0.5));
        img.apply_adjustment(ImageAdjustment::AdjustExposure(-0.1));
        img.apply_adjustment(ImageAdjustment::AdjustExposure(-0.5));
        assert_eq!(img.exposure(), 0.0);

        for _ in 0..40 {
            img.apply_adjustment(ImageAdjustment::AdjustGamma(-0.05));
        }
        assert_eq!(img.gamma(), MIN_GAMMA);

        img.apply_adjustment(ImageAdjustment::ResetAdjustments);
        assert_eq!((img.gamma(), img.exposure()), (1.0, 0.0));

        // Plain setters do not validate
        img.set_gamma(-3.0);
        assert_eq!(img.gamma(), -3.0);
    }

    #[test]
    fn test_background_decode_tokens() {
        let decoder = decoder_with("a.png");
        let mut img = IvImage::new("a.png");

        let ticket = img.start_decode(0).unwrap();
        assert!(img.is_decoding());
        assert!(img.start_decode(0).is_err());
        assert!(img.read(&decoder, 0, false, None).is_err());

        // Superseded request: cancel, start again, deliver the old result late
        assert!(img.cancel_decode());
        assert!(ticket.cancel.load(Ordering::Relaxed));
        let second = img.start_decode(0).unwrap();
        let stale = decode_subimage(&decoder, &ticket.path, 0, &mut |_| true);
        assert!(img.complete_decode(ticket.token, stale).is_err());
        assert!(!img.pixels_valid());

        let fresh = decode_subimage(&decoder, &second.path, 0, &mut |_| true);
        img.complete_decode(second.token, fresh).unwrap();
        assert!(img.pixels_valid());
        assert!(!img.is_decoding());
    }

    #[test]
    fn test_thumbnail() {
        let decoder = decoder_with("a.png");
        let mut img = IvImage::new("a.png");
        assert!(img.thumbnail(64).is_none());

        img.read(&decoder, 0, false, None).unwrap();
        let thumb = img.thumbnail(64).unwrap().clone();
        assert_eq!((thumb.width, thumb.height), (2, 2));
        assert_eq!(&thumb.rgba[4..8], &[255, 0, 0, 255]);
        assert!(img.thumbnail_valid());

        let small = img.thumbnail(1).unwrap();
        assert_eq!((small.width, small.height), (1, 1));

        img.read(&decoder, 0, true, None).unwrap();
        assert!(!img.thumbnail_valid());
    }

    #[test]
    fn test_expand_to_rgba() {
        assert_eq!(expand_to_rgba(&[0.5]), [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(expand_to_rgba(&[0.5, 0.2]), [0.5, 0.5, 0.5, 0.2]);
        assert_eq!(expand_to_rgba(&[0.1, 0.2, 0.3]), [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(
            expand_to_rgba(&[0.1, 0.2, 0.3, 0.4, 0.9]),
            [0.1, 0.2, 0.3, 0.4]
        );
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}
