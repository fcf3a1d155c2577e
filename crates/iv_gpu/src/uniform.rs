//! Uniform types shared by the Rust side and the display shaders.

use bytemuck::{Pod, Zeroable};

/// Channel code meaning "pass RGB(A) through".
pub const CHANNEL_FULL_COLOR: i32 = -1;
/// Channel code meaning "Rec.709 luminance replicated to grey".
pub const CHANNEL_LUMINANCE: i32 = -2;

/// 4x4 column-major transform applied to the unit quad.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TransformUniform {
    pub matrix: [[f32; 4]; 4],
}

impl TransformUniform {
    pub fn new() -> Self {
        Self {
            matrix: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Scale the [-1, 1] quad by `(sx, sy)` and move its centre to `(ox, oy)`
    /// in normalized device coordinates.
    pub fn from_scale_offset(sx: f32, sy: f32, ox: f32, oy: f32) -> Self {
        Self {
            matrix: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [ox, oy, 0.0, 1.0],
            ],
        }
    }

    /// Apply the transform to a 2D point (w = 1).
    pub fn apply(&self, x: f32, y: f32) -> [f32; 2] {
        let m = &self.matrix;
        [
            m[0][0] * x + m[1][0] * y + m[3][0],
            m[0][1] * x + m[1][1] * y + m[3][1],
        ]
    }
}

impl Default for TransformUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-draw colour grading parameters for the display shader.
///
/// Layout matches `struct Display` in `display_common.wgsl` (32 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct DisplayUniform {
    /// `2^exposure`, multiplied in before gamma.
    pub exposure_scale: f32,
    /// `1/gamma`; the shader skips `pow` when this is exactly 1.
    pub inv_gamma: f32,
    /// Channel to isolate (0..=3), or one of the `CHANNEL_*` codes.
    pub channel: i32,
    /// Source channel count, clamped to 1..=4.
    pub nchannels: u32,
    /// Divisor turning raw integer samples into 0..1 (1.0 for float data).
    pub max_value: f32,
    pub _pad: [f32; 3],
}

impl DisplayUniform {
    pub fn new(exposure: f32, gamma: f32, channel: i32, nchannels: u32, max_value: f32) -> Self {
        let gamma = if gamma > 0.0 { gamma } else { 1.0 };
        Self {
            exposure_scale: exposure.exp2(),
            inv_gamma: 1.0 / gamma,
            channel,
            nchannels: nchannels.clamp(1, 4),
            max_value,
            _pad: [0.0; 3],
        }
    }

    /// Identity grading for 8-bit RGBA.
    pub fn identity() -> Self {
        Self::new(0.0, 1.0, CHANNEL_FULL_COLOR, 4, 255.0)
    }
}

impl Default for DisplayUniform {
    fn default() -> Self {
        Self::identity()
    }
}
