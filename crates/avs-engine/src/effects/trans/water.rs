//! Reaction-diffusion style water: neighbor sum minus last frame.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

pub struct WaterEffect {
    enabled: bool,
    last_frame: Vec<u8>,
    scratch: Vec<u8>,
}

impl Default for WaterEffect {
    fn default() -> Self {
        Self {
            enabled: true,
            last_frame: Vec::new(),
            scratch: Vec::new(),
        }
    }
}

impl Effect for WaterEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.enabled = params.get_bool("enabled", self.enabled);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !self.enabled || !context.has_framebuffer() {
            return true;
        }
        let width = context.width;
        let height = context.height;
        let bytes = context.required_bytes();
        if self.last_frame.len() != bytes {
            self.last_frame = vec![0; bytes];
        }
        self.scratch.resize(bytes, 0);

        let src = &context.framebuffer.data[..bytes];
        let prev = &self.last_frame;
        let dst = &mut self.scratch;

        for y in 0..height {
            for x in 0..width {
                let offset = ((y * width + x) * 4) as usize;
                let mut sums = [0i32; 3];
                let mut contributions = 0;
                for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
                    if nx < 0 || nx >= width || ny < 0 || ny >= height {
                        continue;
                    }
                    let n = ((ny * width + nx) * 4) as usize;
                    for c in 0..3 {
                        sums[c] += i32::from(src[n + c]);
                    }
                    contributions += 1;
                }
                // Full neighborhoods halve the sum; edges keep it.
                if contributions >= 3 {
                    for sum in &mut sums {
                        *sum /= 2;
                    }
                }
                for c in 0..3 {
                    let value = sums[c] - i32::from(prev[offset + c]);
                    dst[offset + c] = value.clamp(0, 255) as u8;
                }
                dst[offset + 3] = src[offset + 3];
            }
        }

        self.last_frame.copy_from_slice(dst);
        context.framebuffer.data[..bytes].copy_from_slice(dst);
        true
    }
}
