//! Pair of rotating five-point star outlines scaled by the band scalars.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::{self, Rgba};
use crate::effects::render::ring::COLOR_CYCLE;
use crate::params::ParamBlock;

const POINTS: i32 = 5;

pub struct RotatingStarsEffect {
    size: i32,
    rotation_step: f32,
    colors: Vec<Rgba>,
    color_cursor: i32,
    phase: f32,
}

impl Default for RotatingStarsEffect {
    fn default() -> Self {
        Self {
            size: 12,
            rotation_step: 0.05,
            colors: vec![Rgba::WHITE],
            color_cursor: 0,
            phase: 0.0,
        }
    }
}

impl RotatingStarsEffect {
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

    fn draw_star(
        context: &mut RenderContext<'_>,
        center: (f32, f32),
        radius: f32,
        phase: f32,
        color: Rgba,
    ) {
        // Star polygon: connect every second vertex of a pentagon.
        let vertex = |index: i32| {
            let angle = phase + (index * 2 % POINTS) as f32 * std::f32::consts::TAU / POINTS as f32;
            (
                (center.0 + angle.cos() * radius).round() as i32,
                (center.1 + angle.sin() * radius).round() as i32,
            )
        };
        let legacy = context.globals.legacy_render;
        let mut prev = vertex(0);
        for i in 1..=POINTS {
            let next = vertex(i);
            primitives::draw_line(
                &mut context.framebuffer,
                &legacy,
                prev.0,
                prev.1,
                next.0,
                next.1,
                color,
            );
            prev = next;
        }
    }
}

impl Effect for RotatingStarsEffect {
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

        let (bass, treb) = context
            .audio
            .map_or((0.0, 0.0), |a| (a.bass, a.treb));
        let base = self.size as f32 / 32.0 * context.width.min(context.height) as f32 * 0.5;
        let left_radius = base * (0.6 + (bass * 4.0).min(1.0) * 0.4);
        let right_radius = base * (0.6 + (treb * 4.0).min(1.0) * 0.4);

        let height_mid = context.height as f32 * 0.5;
        Self::draw_star(
            context,
            (context.width as f32 * 0.25, height_mid),
            left_radius,
            self.phase,
            color,
        );
        Self::draw_star(
            context,
            (context.width as f32 * 0.75, height_mid),
            right_radius,
            -self.phase,
            color,
        );
        true
    }
}
