//! Five-armed star whose arm amplitude follows the oscilloscope.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::{self, Rgba};
use crate::effects::render::ring::COLOR_CYCLE;
use crate::params::ParamBlock;

const ARMS: i32 = 5;
const SAMPLES_PER_ARM: usize = 32;

pub struct OscilloscopeStarEffect {
    size: i32,
    rotation_step: f32,
    colors: Vec<Rgba>,
    color_cursor: i32,
    phase: f32,
}

impl Default for OscilloscopeStarEffect {
    fn default() -> Self {
        Self {
            size: 16,
            rotation_step: 0.04,
            colors: vec![Rgba::WHITE],
            color_cursor: 0,
            phase: 0.0,
        }
    }
}

impl OscilloscopeStarEffect {
    fn current_color(&self) -> Rgba {
        if self.colors.is_empty() {
            return Rgba::WHITE;
        }
        let cycle = self.colors.len() as i32 * COLOR_CYCLE;
        let pos = self.color_cursor.rem_euclid(cycle.max(1));
        let index = (pos / COLOR_CYCLE) as usize;
        let next = (index + 1) % self.colors.len();
        Rgba::cycle_blend(
            self.colors[index],
            self.colors[next],
            pos % COLOR_CYCLE,
            COLOR_CYCLE,
        )
    }
}

impl Effect for OscilloscopeStarEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.size = params.get_int("size", self.size).clamp(1, 64);
        self.rotation_step = params.get_float("rotate", self.rotation_step);
        if params.contains("colors") {
            let parsed = primitives::parse_color_list(&params.get_string("colors", ""));
            if !parsed.is_empty() {
                self.colors = parsed;
                let cycle = self.colors.len() as i32 * COLOR_CYCLE;
                self.color_cursor = self.color_cursor.rem_euclid(cycle.max(1));
            }
        } else if params.contains("color") {
            self.colors = vec![Rgba::from_u32(params.get_int("color", 0xFF_FFFF) as u32)];
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        let cycle = self.colors.len() as i32 * COLOR_CYCLE;
        self.color_cursor = (self.color_cursor + 1) % cycle.max(1);
        let color = self.current_color();
        self.phase += self.rotation_step;

        let center_x = context.width as f32 * 0.5;
        let center_y = context.height as f32 * 0.5;
        let max_radius = self.size as f32 / 32.0 * context.width.min(context.height) as f32;

        let waveform = context.audio.map(|a| a.waveform);
        for arm in 0..ARMS {
            let angle = self.phase + arm as f32 * std::f32::consts::TAU / ARMS as f32;
            let (sin, cos) = angle.sin_cos();
            let mut prev = (center_x.round() as i32, center_y.round() as i32);
            for step in 1..=SAMPLES_PER_ARM {
                let t = step as f32 / SAMPLES_PER_ARM as f32;
                let sample_index =
                    (arm as usize * SAMPLES_PER_ARM + step) % waveform.map_or(1, |w| w.len());
                let deflection = waveform.map_or(0.0, |w| w[sample_index]);
                let radius = t * max_radius;
                // Deflect perpendicular to the arm by the waveform sample.
                let wobble = deflection * max_radius * 0.25;
                let x = center_x + cos * radius - sin * wobble;
                let y = center_y + sin * radius + cos * wobble;
                let point = (x.round() as i32, y.round() as i32);
                primitives::draw_line(
                    &mut context.framebuffer,
                    &context.globals.legacy_render,
                    prev.0,
                    prev.1,
                    point.0,
                    point.1,
                    color,
                );
                prev = point;
            }
        }
        true
    }
}
