//! Two spinning arms whose angular velocity tracks the low end of the
//! waveform.

use crate::audio::Analysis;
use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::{self, Rgba};
use crate::params::ParamBlock;

/// Waveform samples summed into the drive signal.
const BASS_WINDOW: usize = 80;
const ROTATION_STEP: f64 = std::f64::consts::PI / 6.0;
const AMPLITUDE_CLAMP: f32 = 255.0;
const SMOOTHING_BASE: f32 = 30.0 * 256.0;
const CHANNEL_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Lines,
    Triangles,
}

#[derive(Debug, Clone, Copy, Default)]
struct Trail {
    x: i32,
    y: i32,
    valid: bool,
}

pub struct BassSpinEffect {
    enabled_mask: i32,
    mode: Mode,
    colors: [Rgba; CHANNEL_COUNT],
    angles: [f64; CHANNEL_COUNT],
    velocities: [f64; CHANNEL_COUNT],
    directions: [f64; CHANNEL_COUNT],
    trails: [[Trail; 2]; CHANNEL_COUNT],
    last_bass_sum: f32,
}

impl Default for BassSpinEffect {
    fn default() -> Self {
        Self {
            enabled_mask: 0b11,
            mode: Mode::Lines,
            colors: [Rgba::WHITE; CHANNEL_COUNT],
            angles: [std::f64::consts::PI, 0.0],
            velocities: [0.0; CHANNEL_COUNT],
            directions: [-1.0, 1.0],
            trails: [[Trail::default(); 2]; CHANNEL_COUNT],
            last_bass_sum: 0.0,
        }
    }
}

impl BassSpinEffect {
    fn clear_trails(&mut self) {
        self.trails = [[Trail::default(); 2]; CHANNEL_COUNT];
    }

    fn bass_window_sum(analysis: &Analysis) -> f32 {
        let count = BASS_WINDOW.min(analysis.waveform.len());
        let mut sum = 0.0f32;
        for &v in &analysis.waveform[..count] {
            sum += ((v + 1.0) * 0.5).clamp(0.0, 1.0) * 255.0;
        }
        sum
    }

    fn compute_amplitude(&mut self, bass_sum: f32) -> f32 {
        let mut denominator = self.last_bass_sum + SMOOTHING_BASE;
        if denominator < f32::EPSILON {
            denominator = SMOOTHING_BASE;
        }
        let amplitude = ((bass_sum * 512.0) / denominator).min(AMPLITUDE_CLAMP);
        self.last_bass_sum = bass_sum;
        amplitude
    }
}

impl Effect for BassSpinEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("enabled") {
            let mask = params.get_int("enabled", self.enabled_mask) & 0b11;
            if mask != self.enabled_mask {
                self.enabled_mask = mask;
                self.clear_trails();
            }
        }
        for (bit, key) in [(0b01, "enable_left"), (0b10, "enable_right")] {
            if params.contains(key) {
                let on = params.get_bool(key, self.enabled_mask & bit != 0);
                let mask = if on {
                    self.enabled_mask | bit
                } else {
                    self.enabled_mask & !bit
                };
                if mask != self.enabled_mask {
                    self.enabled_mask = mask;
                    self.clear_trails();
                }
            }
        }
        if params.contains("mode") {
            let token = params.get_string("mode", "").to_ascii_lowercase();
            let mode = match token.as_str() {
                "line" | "lines" => Mode::Lines,
                "triangle" | "triangles" | "tri" => Mode::Triangles,
                _ => {
                    if params.get_int("mode", i32::from(self.mode == Mode::Triangles)) == 0 {
                        Mode::Lines
                    } else {
                        Mode::Triangles
                    }
                }
            };
            if mode != self.mode {
                self.mode = mode;
                self.clear_trails();
            }
        }
        for (i, key) in ["color0", "color1"].iter().enumerate() {
            if params.contains(key) {
                self.colors[i] = Rgba::from_u32(params.get_int(key, 0xFF_FFFF) as u32);
            }
        }
        if params.contains("color_left") {
            self.colors[0] = Rgba::from_u32(params.get_int("color_left", 0xFF_FFFF) as u32);
        }
        if params.contains("color_right") {
            self.colors[1] = Rgba::from_u32(params.get_int("color_right", 0xFF_FFFF) as u32);
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        let ss = (context.height / 2).min(context.width * 3 / 8);
        if ss <= 0 {
            return true;
        }
        let bass_sum = context.audio.map_or(0.0, Self::bass_window_sum);

        for channel in 0..CHANNEL_COUNT {
            if self.enabled_mask & (1 << channel) == 0 {
                self.trails[channel] = [Trail::default(); 2];
                continue;
            }

            let amplitude = self.compute_amplitude(bass_sum);
            let target = f64::from((amplitude - 104.0).max(12.0) / 96.0);
            self.velocities[channel] = 0.7 * target + 0.3 * self.velocities[channel];
            self.angles[channel] +=
                ROTATION_STEP * self.velocities[channel] * self.directions[channel];

            let radius = f64::from(ss) * f64::from(amplitude) / 256.0;
            let offset_x = (self.angles[channel].cos() * radius).trunc() as i32;
            let offset_y = (self.angles[channel].sin() * radius).trunc() as i32;

            let center_x = context.width / 2 + if channel == 0 { -ss / 2 } else { ss / 2 };
            let center_y = context.height / 2;

            let primary = (center_x + offset_x, center_y + offset_y);
            let mirror = (center_x - offset_x, center_y - offset_y);
            let color = self.colors[channel];
            let legacy = context.globals.legacy_render;

            match self.mode {
                Mode::Lines => {
                    for (tip, trail_index) in [(primary, 0usize), (mirror, 1usize)] {
                        let trail = self.trails[channel][trail_index];
                        if trail.valid {
                            primitives::draw_line(
                                &mut context.framebuffer,
                                &legacy,
                                trail.x,
                                trail.y,
                                tip.0,
                                tip.1,
                                color,
                            );
                        }
                        primitives::draw_line(
                            &mut context.framebuffer,
                            &legacy,
                            center_x,
                            center_y,
                            tip.0,
                            tip.1,
                            color,
                        );
                        self.trails[channel][trail_index] = Trail {
                            x: tip.0,
                            y: tip.1,
                            valid: true,
                        };
                    }
                }
                Mode::Triangles => {
                    for (tip, trail_index) in [(primary, 0usize), (mirror, 1usize)] {
                        let trail = self.trails[channel][trail_index];
                        if trail.valid {
                            primitives::draw_filled_triangle(
                                &mut context.framebuffer,
                                &legacy,
                                (center_x, center_y),
                                (trail.x, trail.y),
                                tip,
                                color,
                            );
                        }
                        self.trails[channel][trail_index] = Trail {
                            x: tip.0,
                            y: tip.1,
                            valid: true,
                        };
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

    fn loud_analysis() -> crate::audio::Analysis {
        let mut analysis = crate::audio::Analysis::default();
        for v in analysis.waveform.iter_mut().take(BASS_WINDOW) {
            *v = 0.8;
        }
        analysis
    }

    #[test]
    fn lines_mode_draws_arms() {
        let mut rig = TestRig::new(64, 64);
        rig.analysis = loud_analysis();
        let mut effect = BassSpinEffect::default();
        rig.run(&mut effect);
        let lit = rig.pixels.chunks_exact(4).filter(|px| px[0] > 0).count();
        assert!(lit > 4);
    }

    #[test]
    fn velocity_smoothing_accumulates() {
        let mut rig = TestRig::new(64, 64);
        rig.analysis = loud_analysis();
        let mut effect = BassSpinEffect::default();
        let start = effect.angles[1];
        for _ in 0..5 {
            rig.fill([0, 0, 0, 0]);
            rig.run(&mut effect);
        }
        assert!(effect.angles[1] > start);
        assert!(effect.angles[0] < std::f64::consts::PI);
    }

    #[test]
    fn disabling_a_channel_clears_its_trail() {
        let mut rig = TestRig::new(32, 32);
        rig.analysis = loud_analysis();
        let mut effect = BassSpinEffect::default();
        rig.run(&mut effect);
        assert!(effect.trails[0][0].valid);
        let mut params = ParamBlock::new();
        params.set_int("enabled", 0b10);
        effect.set_params(&params);
        rig.run(&mut effect);
        assert!(!effect.trails[0][0].valid);
        assert!(effect.trails[1][0].valid);
    }
}
