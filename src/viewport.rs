//! Viewport: zoom and pan mapping between window and image pixels.
//!
//! Zoom is stored as a positive scale (window pixels per image pixel) and
//! reported as the signed zoom users see: `+n` magnifies n times, `-n` shows
//! one window pixel per n image pixels, and 1 is one-to-one.

/// Smallest scale (1:64).
pub const MIN_SCALE: f32 = 1.0 / 64.0;
/// Largest scale (64:1).
pub const MAX_SCALE: f32 = 64.0;

const EPSILON: f32 = 1e-4;

/// Signed zoom for a scale.
pub fn scale_to_zoom(scale: f32) -> f32 {
    if scale >= 1.0 { scale } else { -1.0 / scale }
}

/// Scale for a signed zoom; `None` for 0, non-finite values and (-1, 0).
pub fn zoom_to_scale(zoom: f32) -> Option<f32> {
    if !zoom.is_finite() || zoom == 0.0 {
        None
    } else if zoom > 0.0 {
        Some(zoom)
    } else if zoom <= -1.0 {
        Some(-1.0 / zoom)
    } else {
        None
    }
}

/// Where the last off-ladder zoom step started, so the opposite step can
/// return to it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SnapOrigin {
    from: f32,
    to: f32,
    zoomed_in: bool,
}

/// Zoom, pan centre and the window/image sizes they relate.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    scale: f32,
    center_x: f32,
    center_y: f32,
    image_w: u32,
    image_h: u32,
    window_w: u32,
    window_h: u32,
    mouse: Option<(f32, f32)>,
    snap: Option<SnapOrigin>,
}

impl Viewport {
    pub fn new(window_w: u32, window_h: u32) -> Self {
        Self {
            scale: 1.0,
            center_x: 0.0,
            center_y: 0.0,
            image_w: 0,
            image_h: 0,
            window_w: window_w.max(1),
            window_h: window_h.max(1),
            mouse: None,
            snap: None,
        }
    }

    /// Signed zoom (see module docs).
    pub fn zoom(&self) -> f32 {
        scale_to_zoom(self.scale)
    }

    /// Window pixels per image pixel.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Set the signed zoom. Returns `false` for invalid values.
    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        match zoom_to_scale(zoom) {
            Some(scale) => {
                self.set_scale(scale);
                true
            }
            None => {
                log::warn!("Ignoring invalid zoom {}", zoom);
                false
            }
        }
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
        self.snap = None;
    }

    pub fn center(&self) -> (f32, f32) {
        (self.center_x, self.center_y)
    }

    pub fn set_center(&mut self, x: f32, y: f32) {
        if x.is_finite() && y.is_finite() {
            self.center_x = x;
            self.center_y = y;
        }
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_w, self.window_h)
    }

    /// Resize the window; sizes below 1 are treated as 1.
    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_w = width.max(1);
        self.window_h = height.max(1);
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_w, self.image_h)
    }

    pub fn has_image(&self) -> bool {
        self.image_w > 0 && self.image_h > 0
    }

    /// Bind to an image of `width` x `height`; a new size recentres the view.
    pub fn set_image_size(&mut self, width: u32, height: u32) {
        if (width, height) != (self.image_w, self.image_h) {
            self.image_w = width;
            self.image_h = height;
            self.center_x = width as f32 / 2.0;
            self.center_y = height as f32 / 2.0;
        }
    }

    /// Largest signed zoom showing the whole image in a `window_w` x
    /// `window_h` window, aspect preserved.
    pub fn zoom_needed_to_fit(&self, window_w: u32, window_h: u32) -> f32 {
        if !self.has_image() {
            return 1.0;
        }
        let sx = window_w.max(1) as f32 / self.image_w as f32;
        let sy = window_h.max(1) as f32 / self.image_h as f32;
        scale_to_zoom(sx.min(sy).clamp(MIN_SCALE, MAX_SCALE))
    }

    /// Zoom to fit the window and centre the image.
    pub fn fit_image_to_window(&mut self) {
        let zoom = self.zoom_needed_to_fit(self.window_w, self.window_h);
        if let Some(scale) = zoom_to_scale(zoom) {
            self.set_scale(scale);
        }
        self.center_x = self.image_w as f32 / 2.0;
        self.center_y = self.image_h as f32 / 2.0;
    }

    /// Window size that shows the whole image at the current zoom.
    pub fn window_size_for_image(&self) -> Option<(u32, u32)> {
        if !self.has_image() {
            return None;
        }
        let edge = |n: u32| (n as f32 * self.scale).round().max(1.0) as u32;
        Some((edge(self.image_w), edge(self.image_h)))
    }

    /// Resize the window to the scaled image and centre it; zoom is kept.
    pub fn fit_window_to_image(&mut self) {
        if let Some((w, h)) = self.window_size_for_image() {
            self.set_window_size(w, h);
            self.center_x = self.image_w as f32 / 2.0;
            self.center_y = self.image_h as f32 / 2.0;
        }
    }

    /// One image pixel per window pixel, keeping the centre.
    pub fn normal_size(&mut self) {
        self.set_scale(1.0);
        self.clamp_view_to_window();
    }

    /// Move the image by a window-pixel drag of `(dx, dy)`.
    ///
    /// The image follows the pointer, so the centre moves the opposite way by
    /// the delta expressed in image pixels.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        if !(dx.is_finite() && dy.is_finite()) {
            return;
        }
        self.center_x -= dx / self.scale;
        self.center_y -= dy / self.scale;
        self.clamp_view_to_window();
    }

    /// Keep the view on the image.
    ///
    /// An axis where the scaled image fits in the window is centred; otherwise
    /// the window edges are kept inside the image.
    pub fn clamp_view_to_window(&mut self) {
        self.center_x = clamp_axis(self.center_x, self.image_w, self.window_w, self.scale);
        self.center_y = clamp_axis(self.center_y, self.image_h, self.window_h, self.scale);
    }

    /// Step to the next power-of-two zoom above the current one.
    pub fn zoom_in(&mut self) {
        self.step(true);
        self.clamp_view_to_window();
    }

    /// Step to the next power-of-two zoom below the current one.
    pub fn zoom_out(&mut self) {
        self.step(false);
        self.clamp_view_to_window();
    }

    /// Zoom one step while keeping the image point under `(wx, wy)` fixed.
    pub fn zoom_at(&mut self, wx: f32, wy: f32, zoom_in: bool) {
        let (ix, iy) = self.window_to_image(wx, wy);
        self.step(zoom_in);
        self.center_x = ix - (wx - self.window_w as f32 / 2.0) / self.scale;
        self.center_y = iy - (wy - self.window_h as f32 / 2.0) / self.scale;
        self.clamp_view_to_window();
    }

    fn step(&mut self, zoom_in: bool) {
        let current = self.scale;

        if let Some(snap) = self.snap.take() {
            if snap.zoomed_in != zoom_in && approx_eq(snap.to, current) {
                self.scale = snap.from;
                return;
            }
        }

        let exp = current.log2();
        let target = if zoom_in {
            (exp + EPSILON).floor() + 1.0
        } else {
            (exp - EPSILON).ceil() - 1.0
        };
        let next = target.exp2().clamp(MIN_SCALE, MAX_SCALE);
        if approx_eq(next, current) {
            // Stuck at a bound: the opposite step has to stay put as well
            self.snap = Some(SnapOrigin {
                from: current,
                to: current,
                zoomed_in: zoom_in,
            });
            return;
        }

        if (exp - exp.round()).abs() > EPSILON {
            self.snap = Some(SnapOrigin {
                from: current,
                to: next,
                zoomed_in: zoom_in,
            });
        }
        self.scale = next;
    }

    /// Image coordinates of a window position.
    pub fn window_to_image(&self, wx: f32, wy: f32) -> (f32, f32) {
        (
            self.center_x + (wx - self.window_w as f32 / 2.0) / self.scale,
            self.center_y + (wy - self.window_h as f32 / 2.0) / self.scale,
        )
    }

    /// Window coordinates of an image position.
    pub fn image_to_window(&self, ix: f32, iy: f32) -> (f32, f32) {
        (
            (ix - self.center_x) * self.scale + self.window_w as f32 / 2.0,
            (iy - self.center_y) * self.scale + self.window_h as f32 / 2.0,
        )
    }

    /// Record the pointer position in window pixels.
    pub fn set_mouse(&mut self, wx: f32, wy: f32) {
        if wx.is_finite() && wy.is_finite() {
            self.mouse = Some((wx, wy));
        }
    }

    pub fn mouse(&self) -> Option<(f32, f32)> {
        self.mouse
    }

    /// Image pixel under the last pointer position, clamped to the image.
    pub fn get_focus_pixel(&self) -> Option<(u32, u32)> {
        if !self.has_image() {
            return None;
        }
        let (wx, wy) = self.mouse?;
        let (ix, iy) = self.window_to_image(wx, wy);
        let x = ix.floor().clamp(0.0, (self.image_w - 1) as f32) as u32;
        let y = iy.floor().clamp(0.0, (self.image_h - 1) as f32) as u32;
        Some((x, y))
    }

    /// Scale and offset placing the [-1, 1] quad over the image in NDC.
    ///
    /// Returns `[sx, sy, ox, oy]`; NDC y points up, window y points down.
    pub fn ndc_transform(&self) -> [f32; 4] {
        let win_w = self.window_w as f32;
        let win_h = self.window_h as f32;
        let width = self.image_w as f32 * self.scale;
        let height = self.image_h as f32 * self.scale;
        let left = win_w / 2.0 - self.center_x * self.scale;
        let top = win_h / 2.0 - self.center_y * self.scale;
        [
            width / win_w,
            height / win_h,
            (2.0 * left + width) / win_w - 1.0,
            1.0 - (2.0 * top + height) / win_h,
        ]
    }
}

fn clamp_axis(center: f32, image: u32, window: u32, scale: f32) -> f32 {
    let image = image as f32;
    let half_view = window.max(1) as f32 / (2.0 * scale);
    if !center.is_finite() || image * scale <= window as f32 {
        image / 2.0
    } else {
        center.clamp(half_view, image - half_view)
    }
}

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() <= EPSILON * a.abs().max(b.abs()).max(1.0)
}
