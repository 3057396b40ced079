//! Underdamped 2-D spring chasing beat-selected targets.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::{self, Rgba};
use crate::params::ParamBlock;

const SPRING_K: f64 = 0.004;
const VELOCITY_DAMPING: f64 = 0.991;
/// Beat targets land in [-16/48, 16/48] of the half-extent.
const TARGET_RANGE: f32 = 16.0 / 48.0;

pub struct MovingParticleEffect {
    color: Rgba,
    size_base: i32,
    size_beat: i32,
    blend_average: bool,

    position: [f64; 2],
    velocity: [f64; 2],
    target: [f64; 2],
    size: f64,
}

impl Default for MovingParticleEffect {
    fn default() -> Self {
        Self {
            color: Rgba::WHITE,
            size_base: 8,
            size_beat: 16,
            blend_average: false,
            position: [0.0, 0.0],
            velocity: [0.0, 0.0],
            target: [0.0, 0.0],
            size: 8.0,
        }
    }
}

impl Effect for MovingParticleEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("color") {
            self.color = Rgba::from_u32(params.get_int("color", 0xFF_FFFF) as u32);
        }
        self.size_base = params.get_int("size", self.size_base).clamp(1, 128);
        self.size_beat = params
            .get_int("size_beat", self.size_beat)
            .clamp(self.size_base, 256);
        self.blend_average = params.get_bool("blend", self.blend_average);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }

        if context.audio_beat {
            self.target = [
                f64::from(context.rng.uniform(-TARGET_RANGE, TARGET_RANGE)),
                f64::from(context.rng.uniform(-TARGET_RANGE, TARGET_RANGE)),
            ];
            self.size = f64::from(self.size_beat);
        }

        for axis in 0..2 {
            self.velocity[axis] -= SPRING_K * (self.position[axis] - self.target[axis]);
            self.position[axis] += self.velocity[axis];
            self.velocity[axis] *= VELOCITY_DAMPING;
        }
        // Radius decays back toward the base size.
        self.size = (self.size + f64::from(self.size_base)) / 2.0;

        let half_w = f64::from(context.width) / 2.0;
        let half_h = f64::from(context.height) / 2.0;
        let cx = (half_w + self.position[0] * half_w) as i32;
        let cy = (half_h + self.position[1] * half_h) as i32;
        let radius = self.size.round().max(1.0) as i32;

        let color = if self.blend_average {
            Rgba {
                a: 128,
                ..self.color
            }
        } else {
            self.color
        };
        primitives::draw_filled_circle(
            &mut context.framebuffer,
            &context.globals.legacy_render,
            cx,
            cy,
            radius,
            color,
        );
        true
    }
}
