//! Image format descriptor.

use std::fmt;

/// Storage type of one channel sample in a decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    U8,
    U16,
    F32,
}

impl SampleFormat {
    /// Bytes per sample.
    pub fn bytes(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::U16 => 2,
            SampleFormat::F32 => 4,
        }
    }

    /// Largest representable integer value (1.0 for float).
    pub fn max_value(self) -> f32 {
        match self {
            SampleFormat::U8 => u8::MAX as f32,
            SampleFormat::U16 => u16::MAX as f32,
            SampleFormat::F32 => 1.0,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SampleFormat::U8 => "uint8",
            SampleFormat::U16 => "uint16",
            SampleFormat::F32 => "float",
        };
        f.write_str(name)
    }
}

/// Everything known about an image without decoding its pixels.
///
/// Pixels are stored interleaved, native-endian, with no row padding, so
/// `scanline_bytes() == width * pixel_bytes()`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub nchannels: u32,
    pub format: SampleFormat,
    /// Subimage this spec describes.
    pub subimage: u32,
    /// Number of subimages in the file (at least 1).
    pub nsubimages: u32,
    pub channel_names: Vec<String>,
    /// Short name of the file format ("png", "tiff", ...).
    pub format_name: String,
}

impl ImageSpec {
    pub fn new(width: u32, height: u32, nchannels: u32, format: SampleFormat) -> Self {
        Self {
            width,
            height,
            nchannels,
            format,
            subimage: 0,
            nsubimages: 1,
            channel_names: default_channel_names(nchannels),
            format_name: String::new(),
        }
    }

    /// Bytes from one pixel to the next.
    pub fn pixel_bytes(&self) -> usize {
        self.nchannels as usize * self.format.bytes()
    }

    /// Bytes from one scanline to the next.
    pub fn scanline_bytes(&self) -> usize {
        self.width as usize * self.pixel_bytes()
    }

    /// Size of the whole pixel buffer.
    pub fn image_bytes(&self) -> usize {
        self.height as usize * self.scanline_bytes()
    }
}

/// Conventional names for the first channels, numbered names past RGBA.
pub fn default_channel_names(nchannels: u32) -> Vec<String> {
    let named: &[&str] = match nchannels {
        1 => &["Y"],
        2 => &["Y", "A"],
        _ => &["R", "G", "B", "A"],
    };
    (0..nchannels as usize)
        .map(|i| {
            named
                .get(i)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("channel{}", i))
        })
        .collect()
}
