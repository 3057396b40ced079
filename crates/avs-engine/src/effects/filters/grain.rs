//! Additive film grain, per-frame or cached static pattern.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

use super::NoiseRng;

const MAX_AMOUNT: i32 = 255;

fn add_signed(value: u8, delta: i32) -> u8 {
    (i32::from(value) + delta).clamp(0, 255) as u8
}

pub struct GrainEffect {
    amount: i32,
    monochrome: bool,
    static_grain: bool,
    seed_offset: i32,

    pattern: Vec<i32>,
    pattern_width: i32,
    pattern_height: i32,
    pattern_seed: u64,
    dirty: bool,
}

impl Default for GrainEffect {
    fn default() -> Self {
        Self {
            amount: 40,
            monochrome: false,
            static_grain: false,
            seed_offset: 0,
            pattern: Vec::new(),
            pattern_width: 0,
            pattern_height: 0,
            pattern_seed: 0,
            dirty: true,
        }
    }
}

impl GrainEffect {
    fn regenerate_pattern(&mut self, width: i32, height: i32, seed: u64) {
        self.pattern_width = width;
        self.pattern_height = height;
        self.pattern_seed = seed;
        let pixels = (width * height) as usize;
        self.pattern.clear();
        self.pattern.resize(pixels * 3, 0);
        if self.amount <= 0 {
            self.dirty = false;
            return;
        }
        let mut rng = NoiseRng::new((seed ^ (seed >> 32)) as u32);
        for i in 0..pixels {
            if self.monochrome {
                let value = rng.next_signed(self.amount);
                self.pattern[i * 3] = value;
                self.pattern[i * 3 + 1] = value;
                self.pattern[i * 3 + 2] = value;
            } else {
                self.pattern[i * 3] = rng.next_signed(self.amount);
                self.pattern[i * 3 + 1] = rng.next_signed(self.amount);
                self.pattern[i * 3 + 2] = rng.next_signed(self.amount);
            }
        }
        self.dirty = false;
    }
}

impl Effect for GrainEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.amount = params.get_int("amount", self.amount).clamp(0, MAX_AMOUNT);
        self.monochrome = params.get_bool("monochrome", self.monochrome);
        self.static_grain = params.get_bool("static", self.static_grain);
        self.seed_offset = params.get_int("seed", self.seed_offset);
        self.dirty = true;
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() || self.amount <= 0 {
            return true;
        }
        let width = context.width;
        let height = context.height;
        let total_pixels = (width * height) as usize;

        if self.static_grain {
            let seed_base = context.rng.base_seed()
                ^ (self.seed_offset as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
            if self.dirty
                || width != self.pattern_width
                || height != self.pattern_height
                || seed_base != self.pattern_seed
            {
                self.regenerate_pattern(width, height, seed_base);
            }
            for i in 0..total_pixels {
                let px = &mut context.framebuffer.data[i * 4..i * 4 + 4];
                px[0] = add_signed(px[0], self.pattern[i * 3]);
                px[1] = add_signed(px[1], self.pattern[i * 3 + 1]);
                px[2] = add_signed(px[2], self.pattern[i * 3 + 2]);
            }
            return true;
        }

        let frame_seed = context.rng.next_uint32() ^ self.seed_offset as u32;
        let mut rng = NoiseRng::new(frame_seed);
        for i in 0..total_pixels {
            let px = &mut context.framebuffer.data[i * 4..i * 4 + 4];
            if self.monochrome {
                let value = rng.next_signed(self.amount);
                px[0] = add_signed(px[0], value);
                px[1] = add_signed(px[1], value);
                px[2] = add_signed(px[2], value);
            } else {
                px[0] = add_signed(px[0], rng.next_signed(self.amount));
                px[1] = add_signed(px[1], rng.next_signed(self.amount));
                px[2] = add_signed(px[2], rng.next_signed(self.amount));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    #[test]
    fn zero_amount_is_identity() {
        let mut rig = TestRig::new(4, 4);
        rig.fill([100, 100, 100, 255]);
        let mut effect = GrainEffect::default();
        let mut params = ParamBlock::new();
        params.set_int("amount", 0);
        effect.set_params(&params);
        rig.run(&mut effect);
        assert_eq!(rig.pixel(2, 2), [100, 100, 100, 255]);
    }

    #[test]
    fn noise_is_bounded_by_amount() {
        let mut rig = TestRig::new(16, 16);
        rig.fill([128, 128, 128, 255]);
        let mut effect = GrainEffect::default();
        let mut params = ParamBlock::new();
        params.set_int("amount", 10);
        effect.set_params(&params);
        rig.run(&mut effect);
        for px in rig.pixels.chunks_exact(4) {
            for c in 0..3 {
                assert!((118..=138).contains(&px[c]));
            }
        }
    }

    #[test]
    fn static_pattern_repeats_across_frames() {
        let mut rig = TestRig::new(8, 8);
        let mut effect = GrainEffect::default();
        let mut params = ParamBlock::new();
        params.set_bool("static", true);
        params.set_int("amount", 60);
        effect.set_params(&params);

        rig.fill([128, 128, 128, 255]);
        rig.run(&mut effect);
        let first = rig.pixels.clone();
        rig.fill([128, 128, 128, 255]);
        rig.run(&mut effect);
        assert_eq!(first, rig.pixels);
    }

    #[test]
    fn per_frame_noise_differs_between_frames() {
        let mut rig = TestRig::new(8, 8);
        let mut effect = GrainEffect::default();
        rig.fill([128, 128, 128, 255]);
        rig.run(&mut effect);
        let first = rig.pixels.clone();
        rig.fill([128, 128, 128, 255]);
        rig.run(&mut effect);
        assert_ne!(first, rig.pixels);
    }

    #[test]
    fn monochrome_noise_is_gray() {
        let mut rig = TestRig::new(8, 8);
        rig.fill([128, 128, 128, 255]);
        let mut effect = GrainEffect::default();
        let mut params = ParamBlock::new();
        params.set_bool("monochrome", true);
        params.set_int("amount", 50);
        effect.set_params(&params);
        rig.run(&mut effect);
        for px in rig.pixels.chunks_exact(4) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }
}
