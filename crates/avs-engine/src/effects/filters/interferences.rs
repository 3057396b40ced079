//! Two-frequency sine interference bands with optional noise and tint.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

use super::NoiseRng;

const MAX_AMPLITUDE: i32 = 255;
const MAX_NOISE: i32 = 255;
/// Phase hash constant kept from the legacy noise seeding.
const PHASE_HASH: i32 = 1315423911;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterferenceMode {
    Add,
    Subtract,
    Multiply,
}

pub struct InterferencesEffect {
    amplitude: i32,
    period: i32,
    speed: i32,
    noise: i32,
    phase: i32,
    vertical: bool,
    tint: [i32; 3],
    mode: InterferenceMode,
}

impl Default for InterferencesEffect {
    fn default() -> Self {
        Self {
            amplitude: 48,
            period: 32,
            speed: 1,
            noise: 0,
            phase: 0,
            vertical: false,
            tint: [255, 255, 255],
            mode: InterferenceMode::Add,
        }
    }
}

fn add_signed(value: u8, delta: i32) -> u8 {
    (i32::from(value) + delta).clamp(0, 255) as u8
}

impl Effect for InterferencesEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.amplitude = params
            .get_int("amplitude", self.amplitude)
            .clamp(0, MAX_AMPLITUDE);
        self.period = params.get_int("period", self.period).max(1);
        self.speed = params.get_int("speed", self.speed);
        self.noise = params.get_int("noise", self.noise).clamp(0, MAX_NOISE);
        self.phase = params.get_int("phase", self.phase);
        self.vertical = params.get_bool("vertical", self.vertical);
        if params.contains("tint") {
            let packed = params.get_int("tint", 0xFF_FFFF) as u32;
            self.tint = [
                ((packed >> 16) & 0xFF) as i32,
                ((packed >> 8) & 0xFF) as i32,
                (packed & 0xFF) as i32,
            ];
        }
        if params.contains("mode") {
            let token = params.get_string("mode", "").to_ascii_lowercase();
            self.mode = match token.as_str() {
                "add" => InterferenceMode::Add,
                "subtract" | "sub" => InterferenceMode::Subtract,
                "multiply" | "mul" => InterferenceMode::Multiply,
                _ => self.mode,
            };
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() || self.amplitude <= 0 {
            return true;
        }
        let width = context.width;
        let height = context.height;
        let inv_period = std::f32::consts::TAU / self.period as f32;
        let phase_shift = self.phase + self.speed * context.frame_index as i32;

        let mut noise_rng = if self.noise > 0 {
            let base = context.rng.next_uint32() ^ (phase_shift.wrapping_mul(PHASE_HASH)) as u32;
            Some(NoiseRng::new(base))
        } else {
            None
        };

        for y in 0..height {
            for x in 0..width {
                let coord_primary = if self.vertical { x } else { y };
                let coord_secondary = if self.vertical { y } else { x };
                let angle_primary = (coord_primary + phase_shift) as f32 * inv_period;
                let angle_secondary = (coord_secondary + phase_shift) as f32 * (inv_period * 0.37);
                let wave = angle_primary.sin() * 0.75 + angle_secondary.sin() * 0.25;
                let mut base = (wave * self.amplitude as f32).round() as i32;
                if let Some(rng) = noise_rng.as_mut() {
                    base += rng.next_signed(self.noise);
                }
                base = base.clamp(-255, 255);

                let offset = ((y * width + x) * 4) as usize;
                let px = &mut context.framebuffer.data[offset..offset + 4];
                for c in 0..3 {
                    let tinted = base * self.tint[c] / 255;
                    match self.mode {
                        InterferenceMode::Add => px[c] = add_signed(px[c], tinted),
                        InterferenceMode::Subtract => px[c] = add_signed(px[c], -tinted),
                        InterferenceMode::Multiply => {
                            let factor = (255 + tinted).clamp(0, 512);
                            let value = (i32::from(px[c]) * factor + 127) / 255;
                            px[c] = value.clamp(0, 255) as u8;
                        }
                    }
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

    #[test]
    fn zero_amplitude_is_identity() {
        let mut rig = TestRig::new(8, 8);
        rig.fill([100, 100, 100, 255]);
        let mut effect = InterferencesEffect::default();
        let mut params = ParamBlock::new();
        params.set_int("amplitude", 0);
        effect.set_params(&params);
        rig.run(&mut effect);
        assert_eq!(rig.pixel(4, 4), [100, 100, 100, 255]);
    }

    #[test]
    fn pattern_is_deterministic_per_frame() {
        let mut a = TestRig::with_seed(16, 16, 9);
        let mut b = TestRig::with_seed(16, 16, 9);
        a.fill([120, 120, 120, 255]);
        b.fill([120, 120, 120, 255]);
        let mut ea = InterferencesEffect::default();
        let mut eb = InterferencesEffect::default();
        let mut params = ParamBlock::new();
        params.set_int("noise", 30);
        ea.set_params(&params);
        eb.set_params(&params);
        a.run(&mut ea);
        b.run(&mut eb);
        assert_eq!(a.pixels, b.pixels);
    }

    #[test]
    fn tint_limits_affected_channels() {
        let mut rig = TestRig::new(8, 8);
        rig.fill([100, 100, 100, 255]);
        let mut effect = InterferencesEffect::default();
        let mut params = ParamBlock::new();
        params.set_int("tint", 0x00FF_0000);
        params.set_int("amplitude", 200);
        effect.set_params(&params);
        rig.run(&mut effect);
        for px in rig.pixels.chunks_exact(4) {
            assert_eq!(px[1], 100);
            assert_eq!(px[2], 100);
        }
    }

    #[test]
    fn speed_shifts_pattern_between_frames() {
        let mut rig = TestRig::new(16, 4);
        let mut effect = InterferencesEffect::default();
        let mut params = ParamBlock::new();
        params.set_bool("vertical", true);
        params.set_int("speed", 5);
        effect.set_params(&params);
        rig.fill([100, 100, 100, 255]);
        rig.run(&mut effect);
        let first = rig.pixels.clone();
        rig.fill([100, 100, 100, 255]);
        rig.run(&mut effect);
        assert_ne!(first, rig.pixels);
    }
}
