//! Per-pixel pseudo-random local displacement with edge falloff.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

const FALLOFF_RADIUS: i32 = 4;
const OFFSET_TABLE_SIZE: usize = 512;
const OFFSET_MASK: u32 = OFFSET_TABLE_SIZE as u32 - 1;
const KERNEL_SIZE: i32 = 8;

pub struct ScatterEffect {
    enabled: bool,
    offsets: Vec<i32>,
    offsets_width: i32,
    scratch: Vec<u8>,
}

impl Default for ScatterEffect {
    fn default() -> Self {
        Self {
            enabled: true,
            offsets: Vec::new(),
            offsets_width: -1,
            scratch: Vec::new(),
        }
    }
}

impl ScatterEffect {
    /// 512-entry table of flattened 8x8 neighborhood offsets.
    fn rebuild_offsets(&mut self, width: i32) {
        self.offsets.clear();
        self.offsets.reserve(OFFSET_TABLE_SIZE);
        for i in 0..OFFSET_TABLE_SIZE as i32 {
            let mut offset_x = (i % KERNEL_SIZE) - KERNEL_SIZE / 2;
            let mut offset_y = ((i / KERNEL_SIZE) % KERNEL_SIZE) - KERNEL_SIZE / 2;
            if offset_x < 0 {
                offset_x += 1;
            }
            if offset_y < 0 {
                offset_y += 1;
            }
            self.offsets.push(offset_y * width + offset_x);
        }
        self.offsets_width = width;
    }

    fn lerp_pixel(original: &[u8], scattered: &[u8], weight: i32) -> [u8; 4] {
        let scale = FALLOFF_RADIUS;
        let inv = scale - weight;
        let bias = scale / 2;
        let mut out = [0u8; 4];
        for c in 0..4 {
            let value = i32::from(original[c]) * inv + i32::from(scattered[c]) * weight + bias;
            out[c] = (value / scale).clamp(0, 255) as u8;
        }
        out
    }
}

impl Effect for ScatterEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.enabled = params.get_bool("enabled", self.enabled);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !self.enabled || !context.has_framebuffer() {
            return true;
        }
        let width = context.width;
        let height = context.height;
        if self.offsets_width != width {
            self.rebuild_offsets(width);
        }
        let bytes = context.required_bytes();
        self.scratch.resize(bytes, 0);
        self.scratch.copy_from_slice(&context.framebuffer.data[..bytes]);
        let src = &self.scratch;
        let total_pixels = width * height;

        for y in 0..height {
            let distance_y = y.min(height - 1 - y);
            for x in 0..width {
                let index = y * width + x;
                let distance_x = x.min(width - 1 - x);
                let weight = distance_x.min(distance_y).max(0).min(FALLOFF_RADIUS);
                if weight <= 0 {
                    continue;
                }

                let random = context.rng.next_uint32();
                let table_index = (random & OFFSET_MASK) as usize;
                let sample_index =
                    (index + self.offsets[table_index]).clamp(0, total_pixels - 1) as usize;
                let dst_offset = (index * 4) as usize;
                let sample_offset = sample_index * 4;
                let scattered = &src[sample_offset..sample_offset + 4];
                if weight >= FALLOFF_RADIUS {
                    context.framebuffer.data[dst_offset..dst_offset + 4]
                        .copy_from_slice(scattered);
                } else {
                    let original = &src[dst_offset..dst_offset + 4];
                    let blended = Self::lerp_pixel(original, scattered, weight);
                    context.framebuffer.data[dst_offset..dst_offset + 4]
                        .copy_from_slice(&blended);
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    fn sequential_pattern(rig: &mut TestRig) {
        for (i, px) in rig.pixels.chunks_exact_mut(4).enumerate() {
            let word = ((i + 1) as u32).wrapping_mul(0x0102_0408);
            px.copy_from_slice(&word.to_le_bytes());
        }
    }

    #[test]
    fn disabled_is_a_no_op() {
        let mut rig = TestRig::new(12, 10);
        sequential_pattern(&mut rig);
        let before = rig.pixels.clone();
        let mut effect = ScatterEffect::default();
        let mut params = ParamBlock::new();
        params.set_bool("enabled", false);
        effect.set_params(&params);
        rig.run(&mut effect);
        assert_eq!(rig.pixels, before);
    }

    #[test]
    fn edge_pixels_are_preserved() {
        let mut rig = TestRig::new(16, 12);
        sequential_pattern(&mut rig);
        let before = rig.pixels.clone();
        let mut effect = ScatterEffect::default();
        rig.run(&mut effect);
        for y in 0..12 {
            for x in 0..16 {
                let distance = x.min(16 - 1 - x).min(y.min(12 - 1 - y));
                if distance == 0 {
                    let offset = ((y * 16 + x) * 4) as usize;
                    assert_eq!(
                        &rig.pixels[offset..offset + 4],
                        &before[offset..offset + 4],
                        "edge pixel moved at ({x},{y})"
                    );
                }
            }
        }
    }

    #[test]
    fn same_seed_and_frame_reproduce_exactly() {
        let mut a = TestRig::with_seed(24, 18, 0xABCD_EF01);
        let mut b = TestRig::with_seed(24, 18, 0xABCD_EF01);
        sequential_pattern(&mut a);
        sequential_pattern(&mut b);
        a.frame_index = 42;
        b.frame_index = 42;
        let mut ea = ScatterEffect::default();
        let mut eb = ScatterEffect::default();
        a.run(&mut ea);
        b.run(&mut eb);
        assert_eq!(a.pixels, b.pixels);
    }

    #[test]
    fn interior_blend_uses_falloff_weights() {
        let mut rig = TestRig::new(24, 18);
        sequential_pattern(&mut rig);
        let before = rig.pixels.clone();
        let mut effect = ScatterEffect::default();
        rig.run(&mut effect);
        // Deep interior pixels may be replaced wholesale; at distance 1..3
        // the result is a strict lerp so it stays within the channel range
        // spanned by the neighborhood. Spot-check determinism instead of
        // exact bytes: rerunning with the same frame must match.
        let first = rig.pixels.clone();
        rig.pixels.copy_from_slice(&before);
        rig.frame_index -= 1;
        rig.run(&mut effect);
        assert_eq!(first, rig.pixels);
    }
}
