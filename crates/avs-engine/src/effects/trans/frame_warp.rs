//! Shared history buffer + bilinear sampler for the warp/resample kernels.

use crate::context::RenderContext;

/// Owned RGBA copy of the last rendered frame with normalized-coordinate
/// sampling. Effects that warp with history embed one of these.
#[derive(Default)]
pub struct FrameWarp {
    history: Vec<u8>,
    width: i32,
    height: i32,
}

impl FrameWarp {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Seed the history from the current frame on first use or size change.
    /// Returns false when the context has no usable framebuffer.
    pub fn prepare(&mut self, context: &RenderContext<'_>) -> bool {
        if context.width <= 0 || context.height <= 0 {
            return false;
        }
        let expected = context.required_bytes();
        if context.framebuffer.data.len() < expected {
            return false;
        }
        self.width = context.width;
        self.height = context.height;
        if self.history.len() != expected {
            self.history.clear();
            self.history
                .extend_from_slice(&context.framebuffer.data[..expected]);
        }
        true
    }

    /// Capture the rendered frame as next frame's history.
    pub fn store(&mut self, context: &RenderContext<'_>) {
        let expected = (self.width * self.height * 4) as usize;
        if self.width <= 0 || context.framebuffer.data.len() < expected {
            return;
        }
        self.history.resize(expected, 0);
        self.history
            .copy_from_slice(&context.framebuffer.data[..expected]);
    }

    fn wrap_index(value: i32, size: i32) -> i32 {
        if size <= 0 { 0 } else { value.rem_euclid(size) }
    }

    fn wrap_coord(value: f32, size: f32) -> f32 {
        if size <= 0.0 {
            return 0.0;
        }
        let wrapped = value % size;
        if wrapped < 0.0 { wrapped + size } else { wrapped }
    }

    fn fetch(&self, x: i32, y: i32) -> [u8; 4] {
        let index = ((y * self.width + x) * 4) as usize;
        self.history[index..index + 4].try_into().unwrap_or([0; 4])
    }

    /// Bilinear sample at normalized coordinates `(x, y) in [-1, 1]`, with
    /// y up. `wrap` selects positive-mod wrapping over clamping.
    pub fn sample(&self, norm_x: f32, norm_y: f32, wrap: bool) -> [u8; 4] {
        if self.history.is_empty() || self.width <= 0 || self.height <= 0 {
            return [0, 0, 0, 255];
        }
        let u = (norm_x + 1.0) * 0.5;
        let v = 1.0 - (norm_y + 1.0) * 0.5;
        let mut fx = u * (self.width - 1) as f32;
        let mut fy = v * (self.height - 1) as f32;
        if wrap {
            fx = Self::wrap_coord(fx, self.width as f32);
            fy = Self::wrap_coord(fy, self.height as f32);
        } else {
            fx = fx.clamp(0.0, (self.width - 1) as f32);
            fy = fy.clamp(0.0, (self.height - 1) as f32);
        }

        let x0 = fx.floor() as i32;
        let y0 = fy.floor() as i32;
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;

        let x1 = if wrap {
            Self::wrap_index(x0 + 1, self.width)
        } else {
            (x0 + 1).min(self.width - 1)
        };
        let y1 = if wrap {
            Self::wrap_index(y0 + 1, self.height)
        } else {
            (y0 + 1).min(self.height - 1)
        };
        let ix0 = if wrap {
            Self::wrap_index(x0, self.width)
        } else {
            x0.clamp(0, self.width - 1)
        };
        let iy0 = if wrap {
            Self::wrap_index(y0, self.height)
        } else {
            y0.clamp(0, self.height - 1)
        };

        let c00 = self.fetch(ix0, iy0);
        let c10 = self.fetch(x1, iy0);
        let c01 = self.fetch(ix0, y1);
        let c11 = self.fetch(x1, y1);

        let mut out = [0u8; 4];
        for c in 0..4 {
            let top = f32::from(c00[c]) + (f32::from(c10[c]) - f32::from(c00[c])) * tx;
            let bottom = f32::from(c01[c]) + (f32::from(c11[c]) - f32::from(c01[c])) * tx;
            let value = top + (bottom - top) * ty;
            out[c] = value.round().clamp(0.0, 255.0) as u8;
        }
        out
    }

    /// Nearest-neighbor sample in pixel space (subpixel disabled paths).
    pub fn sample_nearest(&self, fx: f32, fy: f32) -> [u8; 4] {
        if self.history.is_empty() || self.width <= 0 || self.height <= 0 {
            return [0, 0, 0, 255];
        }
        let x = (fx.round() as i32).clamp(0, self.width - 1);
        let y = (fy.round() as i32).clamp(0, self.height - 1);
        self.fetch(x, y)
    }

    /// Bilinear sample in pixel space.
    pub fn sample_pixel(&self, fx: f32, fy: f32) -> [u8; 4] {
        if self.width <= 0 || self.height <= 0 {
            return [0, 0, 0, 255];
        }
        let norm_x = fx / (self.width - 1).max(1) as f32 * 2.0 - 1.0;
        let norm_y = 1.0 - fy / (self.height - 1).max(1) as f32 * 2.0;
        self.sample(norm_x, norm_y, false)
    }
}
