//! Dominant-channel color fader with smooth drift and beat randomization.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

const MIN_OFFSET: i32 = -32;
const MAX_OFFSET: i32 = 32;

const OFFSET_KEYS_A: [&str; 3] = ["offset_a", "offset0", "offset_r"];
const OFFSET_KEYS_B: [&str; 3] = ["offset_b", "offset1", "offset_g"];
const OFFSET_KEYS_C: [&str; 3] = ["offset_c", "offset2", "offset_b"];
const BEAT_KEYS_A: [&str; 3] = ["beat_offset_a", "beat_offset0", "beat_offset_r"];
const BEAT_KEYS_B: [&str; 3] = ["beat_offset_b", "beat_offset1", "beat_offset_g"];
const BEAT_KEYS_C: [&str; 3] = ["beat_offset_c", "beat_offset2", "beat_offset_b"];

fn saturating_offset(base: u8, delta: i32) -> u8 {
    (i32::from(base) + delta).clamp(0, 255) as u8
}

fn read_offset(params: &ParamBlock, keys: &[&str; 3], fallback: i32) -> i32 {
    for key in keys {
        if params.contains(key) {
            return params.get_int(key, fallback);
        }
    }
    fallback
}

pub struct ColorfadeEffect {
    enabled: bool,
    randomize_on_beat: bool,
    smooth: bool,
    base_offsets: [i32; 3],
    beat_offsets: [i32; 3],
    current_offsets: [i32; 3],
}

impl Default for ColorfadeEffect {
    fn default() -> Self {
        let base = [8, -8, -8];
        Self {
            enabled: true,
            randomize_on_beat: false,
            smooth: false,
            base_offsets: base,
            beat_offsets: base,
            current_offsets: base,
        }
    }
}

impl ColorfadeEffect {
    fn clamp_offset(value: i32) -> i32 {
        value.clamp(MIN_OFFSET, MAX_OFFSET)
    }

    fn update_offsets(&mut self, context: &mut RenderContext<'_>) {
        if !self.smooth {
            self.current_offsets = self.base_offsets;
            return;
        }

        // Drift back toward the base sliders by one per frame.
        for (current, &base) in self.current_offsets.iter_mut().zip(&self.base_offsets) {
            if *current < base {
                *current += 1;
            } else if *current > base {
                *current -= 1;
            }
        }

        if context.audio_beat {
            if self.randomize_on_beat {
                let mut offset_a = (context.rng.next_uint32() % 32) as i32 - 6;
                let mut offset_b = (context.rng.next_uint32() % 64) as i32 - 32;
                if offset_b < 0 && offset_b > -16 {
                    offset_b = -32;
                }
                if offset_b >= 0 && offset_b < 16 {
                    offset_b = 32;
                }
                let mut offset_c = (context.rng.next_uint32() % 32) as i32 - 6;
                offset_a = Self::clamp_offset(offset_a);
                offset_b = Self::clamp_offset(offset_b);
                offset_c = Self::clamp_offset(offset_c);
                self.current_offsets = [offset_a, offset_b, offset_c];
            } else {
                self.current_offsets = self.beat_offsets;
            }
        }
    }
}

impl Effect for ColorfadeEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("flags") {
            let flags = params.get_int("flags", 0);
            self.enabled = flags & 1 != 0;
            self.randomize_on_beat = flags & 2 != 0;
            self.smooth = flags & 4 != 0;
        } else {
            self.enabled = params.get_bool("enabled", self.enabled);
            self.randomize_on_beat = params.get_bool("randomize", self.randomize_on_beat);
            self.smooth = params.get_bool("smooth", self.smooth);
        }

        self.base_offsets[0] =
            Self::clamp_offset(read_offset(params, &OFFSET_KEYS_A, self.base_offsets[0]));
        self.base_offsets[1] =
            Self::clamp_offset(read_offset(params, &OFFSET_KEYS_B, self.base_offsets[1]));
        self.base_offsets[2] =
            Self::clamp_offset(read_offset(params, &OFFSET_KEYS_C, self.base_offsets[2]));

        self.beat_offsets[0] =
            Self::clamp_offset(read_offset(params, &BEAT_KEYS_A, self.beat_offsets[0]));
        self.beat_offsets[1] =
            Self::clamp_offset(read_offset(params, &BEAT_KEYS_B, self.beat_offsets[1]));
        self.beat_offsets[2] =
            Self::clamp_offset(read_offset(params, &BEAT_KEYS_C, self.beat_offsets[2]));

        if !self.smooth {
            self.current_offsets = self.base_offsets;
        } else {
            for value in &mut self.current_offsets {
                *value = Self::clamp_offset(*value);
            }
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !self.enabled || !context.has_framebuffer() {
            return true;
        }
        self.update_offsets(context);

        let [a, b, c] = self.current_offsets;
        if a == 0 && b == 0 && c == 0 {
            return true;
        }

        // One table per dominant channel; ties use the uniform table.
        let tables = [
            [c, b, a], // green dominant
            [b, a, c], // red dominant
            [a, c, b], // blue dominant
            [c, c, c], // all equal
        ];

        for px in context.framebuffer.data.chunks_exact_mut(4) {
            let table = if px[1] > px[2] && px[1] > px[0] {
                &tables[0]
            } else if px[0] > px[1] && px[0] > px[2] {
                &tables[1]
            } else if px[2] > px[0] && px[2] > px[1] {
                &tables[2]
            } else {
                &tables[3]
            };
            px[0] = saturating_offset(px[0], table[0]);
            px[1] = saturating_offset(px[1], table[1]);
            px[2] = saturating_offset(px[2], table[2]);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    #[test]
    fn smooth_drift_converges_to_base_offsets() {
        let mut effect = ColorfadeEffect::default();
        let mut params = ParamBlock::new();
        params.set_bool("smooth", true);
        params.set_int("offset_a", 4);
        params.set_int("offset_b", -3);
        params.set_int("offset_c", 0);
        effect.set_params(&params);
        effect.current_offsets = [20, -20, 10];

        let mut rig = TestRig::new(2, 2);
        rig.beat = false;
        for _ in 0..40 {
            rig.fill([50, 50, 50, 255]);
            rig.run(&mut effect);
        }
        assert_eq!(effect.current_offsets, [4, -3, 0]);
    }

    #[test]
    fn beat_snaps_to_beat_offsets_when_not_randomizing() {
        let mut effect = ColorfadeEffect::default();
        let mut params = ParamBlock::new();
        params.set_bool("smooth", true);
        params.set_int("beat_offset_a", 12);
        params.set_int("beat_offset_b", -12);
        params.set_int("beat_offset_c", 6);
        effect.set_params(&params);

        let mut rig = TestRig::new(2, 2);
        rig.beat = true;
        rig.fill([50, 50, 50, 255]);
        rig.run(&mut effect);
        assert_eq!(effect.current_offsets, [12, -12, 6]);
    }

    #[test]
    fn randomized_beat_offsets_follow_documented_ranges() {
        let mut effect = ColorfadeEffect::default();
        let mut params = ParamBlock::new();
        params.set_bool("smooth", true);
        params.set_bool("randomize", true);
        effect.set_params(&params);

        let mut rig = TestRig::new(2, 2);
        rig.beat = true;
        for _ in 0..50 {
            rig.fill([50, 50, 50, 255]);
            rig.run(&mut effect);
            let [a, b, c] = effect.current_offsets;
            assert!((-6..=25).contains(&a));
            assert!((-6..=25).contains(&c));
            // offset B avoids the dead zone around zero
            assert!(b <= -16 || b >= 16);
            assert!((MIN_OFFSET..=MAX_OFFSET).contains(&b));
        }
    }

    #[test]
    fn dominant_channel_selects_table() {
        let mut effect = ColorfadeEffect::default();
        let mut params = ParamBlock::new();
        params.set_int("offset_a", 10);
        params.set_int("offset_b", -10);
        params.set_int("offset_c", 5);
        effect.set_params(&params);

        let mut rig = TestRig::new(1, 1);
        // red dominant pixel gets table [b, a, c]
        rig.fill([200, 10, 10, 255]);
        rig.run(&mut effect);
        assert_eq!(rig.pixel(0, 0), [190, 20, 15, 255]);

        // uniform pixel gets the all-equal table [c, c, c]
        rig.fill([50, 50, 50, 255]);
        rig.run(&mut effect);
        assert_eq!(rig.pixel(0, 0), [55, 55, 55, 255]);
    }
}
