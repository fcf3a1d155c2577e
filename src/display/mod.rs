//! Display pipeline: channel selection, exposure/gamma grading and the GPU
//! views that draw resident images.
//!
//! [`DisplayTransform`] is the CPU mirror of `display_common.wgsl`; the views
//! feed the same parameters to the shader through [`DisplayUniform`], so the
//! status line and the screen always agree.

mod view;

pub use view::{DisplayView, TextureKey, ViewMode, needs_upload, sample_kind};

use std::fmt;

use iv_gpu::{CHANNEL_FULL_COLOR, CHANNEL_LUMINANCE, DisplayUniform};

use crate::image::{IvImage, expand_to_rgba};
use crate::spec::SampleFormat;

/// Rec.709 luma weights.
pub const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Which part of the colour signal the views show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelView {
    #[default]
    FullColor,
    Red,
    Green,
    Blue,
    Alpha,
    Luminance,
}

impl ChannelView {
    /// Cycle order for channel prev/next.
    pub const ALL: [ChannelView; 6] = [
        ChannelView::FullColor,
        ChannelView::Red,
        ChannelView::Green,
        ChannelView::Blue,
        ChannelView::Alpha,
        ChannelView::Luminance,
    ];

    /// Channel code understood by the display shader.
    pub fn shader_code(self) -> i32 {
        match self {
            ChannelView::FullColor => CHANNEL_FULL_COLOR,
            ChannelView::Luminance => CHANNEL_LUMINANCE,
            ChannelView::Red => 0,
            ChannelView::Green => 1,
            ChannelView::Blue => 2,
            ChannelView::Alpha => 3,
        }
    }

    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|&c| c == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let i = Self::ALL.iter().position(|&c| c == self).unwrap_or(0);
        Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ChannelView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelView::FullColor => "RGB",
            ChannelView::Red => "Red",
            ChannelView::Green => "Green",
            ChannelView::Blue => "Blue",
            ChannelView::Alpha => "Alpha",
            ChannelView::Luminance => "Luminance",
        };
        f.write_str(name)
    }
}

/// Grading applied between the stored samples and the screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    pub channel: ChannelView,
    /// Stops; the signal is multiplied by `2^exposure`.
    pub exposure: f32,
    pub gamma: f32,
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self {
            channel: ChannelView::FullColor,
            exposure: 0.0,
            gamma: 1.0,
        }
    }
}

impl DisplayTransform {
    pub fn new(channel: ChannelView, exposure: f32, gamma: f32) -> Self {
        Self {
            channel,
            exposure,
            gamma,
        }
    }

    /// Transform for `image`'s own exposure and gamma.
    pub fn for_image(image: &IvImage, channel: ChannelView) -> Self {
        Self::new(channel, image.exposure(), image.gamma())
    }

    /// True when full-colour output equals the stored values.
    pub fn is_identity(&self) -> bool {
        self.channel == ChannelView::FullColor && self.exposure == 0.0 && self.gamma == 1.0
    }

    /// Shader parameters for an image with `nchannels` samples of `format`.
    pub fn uniform(&self, nchannels: u32, format: SampleFormat) -> DisplayUniform {
        DisplayUniform::new(
            self.exposure,
            self.gamma,
            self.channel.shader_code(),
            nchannels,
            format.max_value(),
        )
    }

    /// Displayed RGBA for normalized channel values, as the shader computes it.
    pub fn apply(&self, values: &[f32]) -> [f32; 4] {
        let params = DisplayUniform::new(self.exposure, self.gamma, 0, 1, 1.0);
        let [r, g, b, a] = select_channel(self.channel, expand_to_rgba(values));

        let mut rgb = [r, g, b].map(|c| c * params.exposure_scale);
        if params.inv_gamma != 1.0 {
            rgb = rgb.map(|c| c.max(0.0).powf(params.inv_gamma));
        }
        [rgb[0], rgb[1], rgb[2], a]
    }
}

fn select_channel(channel: ChannelView, c: [f32; 4]) -> [f32; 4] {
    match channel {
        ChannelView::FullColor => c,
        ChannelView::Luminance => {
            let y = c[0] * LUMA_WEIGHTS[0] + c[1] * LUMA_WEIGHTS[1] + c[2] * LUMA_WEIGHTS[2];
            [y, y, y, c[3]]
        }
        other => {
            let v = c[other.shader_code() as usize];
            [v, v, v, 1.0]
        }
    }
}
