//! Separable box blur with edge replication, radius 0..32.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

const MAX_RADIUS: i32 = 32;

pub struct BoxBlurEffect {
    radius: i32,
    preserve_alpha: bool,
    scratch: Vec<u8>,
    prefix: Vec<i32>,
}

impl Default for BoxBlurEffect {
    fn default() -> Self {
        Self {
            radius: 5,
            preserve_alpha: true,
            scratch: Vec::new(),
            prefix: Vec::new(),
        }
    }
}

impl BoxBlurEffect {
    fn horizontal_pass(&mut self, src: &[u8], dst: &mut [u8], width: usize, height: usize) {
        let radius = self.radius as usize;
        let window = (2 * radius + 1) as i32;
        let stride = width * 4;
        self.prefix.resize((width + 1) * 4, 0);
        for y in 0..height {
            let row = &src[y * stride..(y + 1) * stride];
            self.prefix[..4].fill(0);
            for x in 0..width {
                for c in 0..4 {
                    self.prefix[(x + 1) * 4 + c] = self.prefix[x * 4 + c] + i32::from(row[x * 4 + c]);
                }
            }
            let dst_row = &mut dst[y * stride..(y + 1) * stride];
            for x in 0..width {
                let left = x as i32 - radius as i32;
                let right = x as i32 + radius as i32;
                let clamped_left = left.clamp(0, width as i32 - 1) as usize;
                let clamped_right = right.clamp(0, width as i32 - 1) as usize;
                let left_pad = clamped_left as i32 - left;
                let right_pad = right - clamped_right as i32;
                for c in 0..4 {
                    if self.preserve_alpha && c == 3 {
                        dst_row[x * 4 + c] = row[x * 4 + c];
                        continue;
                    }
                    let mut sum =
                        self.prefix[(clamped_right + 1) * 4 + c] - self.prefix[clamped_left * 4 + c];
                    if left_pad > 0 {
                        sum += left_pad * i32::from(row[c]);
                    }
                    if right_pad > 0 {
                        sum += right_pad * i32::from(row[(width - 1) * 4 + c]);
                    }
                    dst_row[x * 4 + c] = ((sum + window / 2) / window).clamp(0, 255) as u8;
                }
            }
        }
    }

    fn vertical_pass(&mut self, src: &[u8], dst: &mut [u8], width: usize, height: usize) {
        let radius = self.radius as usize;
        let window = (2 * radius + 1) as i32;
        self.prefix.resize((height + 1) * 4, 0);
        for x in 0..width {
            self.prefix[..4].fill(0);
            for y in 0..height {
                let index = (y * width + x) * 4;
                for c in 0..4 {
                    self.prefix[(y + 1) * 4 + c] = self.prefix[y * 4 + c] + i32::from(src[index + c]);
                }
            }
            for y in 0..height {
                let top = y as i32 - radius as i32;
                let bottom = y as i32 + radius as i32;
                let clamped_top = top.clamp(0, height as i32 - 1) as usize;
                let clamped_bottom = bottom.clamp(0, height as i32 - 1) as usize;
                let top_pad = clamped_top as i32 - top;
                let bottom_pad = bottom - clamped_bottom as i32;
                let dst_index = (y * width + x) * 4;
                for c in 0..4 {
                    if self.preserve_alpha && c == 3 {
                        dst[dst_index + c] = src[dst_index + c];
                        continue;
                    }
                    let mut sum =
                        self.prefix[(clamped_bottom + 1) * 4 + c] - self.prefix[clamped_top * 4 + c];
                    if top_pad > 0 {
                        sum += top_pad * i32::from(src[x * 4 + c]);
                    }
                    if bottom_pad > 0 {
                        sum += bottom_pad * i32::from(src[((height - 1) * width + x) * 4 + c]);
                    }
                    dst[dst_index + c] = ((sum + window / 2) / window).clamp(0, 255) as u8;
                }
            }
        }
    }
}

impl Effect for BoxBlurEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.radius = params.get_int("radius", self.radius).clamp(0, MAX_RADIUS);
        self.preserve_alpha = params.get_bool("preserve_alpha", self.preserve_alpha);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() || self.radius <= 0 {
            return true;
        }
        let width = context.width as usize;
        let height = context.height as usize;
        let bytes = width * height * 4;
        self.scratch.resize(bytes, 0);

        let mut scratch = std::mem::take(&mut self.scratch);
        self.horizontal_pass(context.framebuffer.data, &mut scratch, width, height);
        let src = scratch.clone();
        self.vertical_pass(&src, context.framebuffer.data, width, height);
        self.scratch = scratch;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    fn apply(rig: &mut TestRig, radius: i32, preserve_alpha: bool) {
        let mut effect = BoxBlurEffect::default();
        let mut params = ParamBlock::new();
        params.set_int("radius", radius);
        params.set_bool("preserve_alpha", preserve_alpha);
        effect.set_params(&params);
        rig.run(&mut effect);
    }

    #[test]
    fn zero_radius_is_identity() {
        let mut rig = TestRig::new(8, 8);
        rig.fill([10, 20, 30, 255]);
        rig.pixels[0] = 200;
        let before = rig.pixels.clone();
        apply(&mut rig, 0, true);
        assert_eq!(rig.pixels, before);
    }

    #[test]
    fn uniform_frame_stays_uniform() {
        let mut rig = TestRig::new(8, 8);
        rig.fill([100, 50, 25, 255]);
        apply(&mut rig, 3, true);
        for px in rig.pixels.chunks_exact(4) {
            assert_eq!(px, &[100, 50, 25, 255]);
        }
    }

    #[test]
    fn impulse_spreads_and_preserves_mass_center() {
        let mut rig = TestRig::new(9, 9);
        let center = (4 * 9 + 4) * 4;
        rig.pixels[center] = 255;
        apply(&mut rig, 1, true);
        // center keeps the largest share, neighbors get some
        assert!(rig.pixel(4, 4)[0] > 0);
        assert!(rig.pixel(3, 4)[0] > 0);
        assert!(rig.pixel(4, 3)[0] > 0);
        assert_eq!(rig.pixel(0, 0)[0], 0);
    }

    #[test]
    fn preserve_alpha_keeps_alpha_channel() {
        let mut rig = TestRig::new(4, 4);
        rig.fill([0, 0, 0, 0]);
        let offset = (1 * 4 + 1) * 4;
        rig.pixels[offset + 3] = 200;
        apply(&mut rig, 2, true);
        assert_eq!(rig.pixel(1, 1)[3], 200);
        assert_eq!(rig.pixel(0, 0)[3], 0);
    }
}
