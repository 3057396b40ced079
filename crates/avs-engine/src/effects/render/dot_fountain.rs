//! Fountain of colored dots launched from the center by the spectrum.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::{self, Rgba};
use crate::params::ParamBlock;

const ROWS: usize = 64;
const POINTS_PER_ROW: usize = 32;
const GRAVITY: f32 = 0.05;

#[derive(Clone, Copy, Default)]
struct Particle {
    radius: f32,
    height: f32,
    radial_velocity: f32,
    vertical_velocity: f32,
    color: Rgba,
    alive: bool,
}

pub struct DotFountainEffect {
    rotation_velocity: f32,
    rotation: f32,
    rows: Vec<[Particle; POINTS_PER_ROW]>,
    colors: [Rgba; 5],
}

impl Default for DotFountainEffect {
    fn default() -> Self {
        Self {
            rotation_velocity: 16.0,
            rotation: 0.0,
            rows: vec![[Particle::default(); POINTS_PER_ROW]; ROWS],
            colors: [
                Rgba::opaque(28, 107, 24),
                Rgba::opaque(255, 10, 35),
                Rgba::opaque(42, 29, 116),
                Rgba::opaque(144, 54, 217),
                Rgba::opaque(107, 136, 255),
            ],
        }
    }
}

impl DotFountainEffect {
    fn color_for(&self, t: f32) -> Rgba {
        let scaled = t.clamp(0.0, 1.0) * (self.colors.len() - 1) as f32;
        let index = (scaled as usize).min(self.colors.len() - 2);
        let frac = scaled - index as f32;
        let a = self.colors[index];
        let b = self.colors[index + 1];
        let mix = |x: u8, y: u8| (f32::from(x) + (f32::from(y) - f32::from(x)) * frac) as u8;
        Rgba::opaque(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
    }

    fn advance(&mut self, spectrum: &[f32]) {
        // Age rows back, applying simple ballistics.
        for row in (1..ROWS).rev() {
            let (front, back) = self.rows.split_at_mut(row);
            back[0] = front[row - 1];
            for particle in &mut back[0] {
                if !particle.alive {
                    continue;
                }
                particle.radius += particle.radial_velocity;
                particle.height += particle.vertical_velocity;
                particle.vertical_velocity -= GRAVITY;
            }
        }
        // Fresh row launched by the spectrum.
        let bins = spectrum.len().max(1);
        let mut peak = 0.0f32;
        for &m in spectrum {
            peak = peak.max(m);
        }
        let mut fresh = [Particle::default(); POINTS_PER_ROW];
        for (i, particle) in fresh.iter_mut().enumerate() {
            let bin = i * bins / POINTS_PER_ROW;
            let normalized = if peak > 0.0 {
                spectrum[bin.min(bins - 1)] / peak
            } else {
                0.0
            };
            *particle = Particle {
                radius: 0.05,
                height: 0.0,
                radial_velocity: 0.01 + normalized * 0.03,
                vertical_velocity: normalized * 0.9,
                color: self.color_for(normalized),
                alive: normalized > 0.0,
            };
        }
        self.rows[0] = fresh;
    }
}

impl Effect for DotFountainEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.rotation_velocity = params.get_float("rotvel", self.rotation_velocity);
        for (i, key) in ["color0", "color1", "color2", "color3", "color4"]
            .iter()
            .enumerate()
        {
            if params.contains(key) {
                self.colors[i] = Rgba::from_u32(params.get_int(key, 0) as u32);
            }
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        self.advance(context.audio_spectrum);
        self.rotation += self.rotation_velocity / 5.0;
        self.rotation = self.rotation.rem_euclid(360.0);

        let base_rotation = self.rotation.to_radians();
        let width = context.width as f32;
        let height = context.height as f32;
        let scale = width.min(height) * 0.45;
        let legacy = context.globals.legacy_render;

        for row in &self.rows {
            for (i, particle) in row.iter().enumerate() {
                if !particle.alive {
                    continue;
                }
                let angle =
                    base_rotation + i as f32 * std::f32::consts::TAU / POINTS_PER_ROW as f32;
                let x = width * 0.5 + angle.cos() * particle.radius * scale;
                let y = height * 0.7 - particle.height * scale * 0.3
                    + angle.sin() * particle.radius * scale * 0.2;
                primitives::blend_pixel(
                    &mut context.framebuffer,
                    &legacy,
                    x.round() as i32,
                    y.round() as i32,
                    particle.color,
                    255,
                );
            }
        }
        true
    }
}
