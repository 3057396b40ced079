//! Rotating 3-D plane of dots whose heights ripple with the spectrum.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::{self, Rgba};
use crate::params::ParamBlock;

const GRID: usize = 64;
/// Palette stops interpolated across the height range.
const PALETTE_STOPS: usize = 5;

pub struct DotPlaneEffect {
    rotation_velocity: f32,
    tilt_degrees: f32,
    colors: [Rgba; PALETTE_STOPS],
    rotation: f32,
    heights: Vec<f32>,
    velocities: Vec<f32>,
}

impl Default for DotPlaneEffect {
    fn default() -> Self {
        Self {
            rotation_velocity: 16.0,
            tilt_degrees: -20.0,
            colors: [
                Rgba::opaque(24, 107, 28),
                Rgba::opaque(35, 10, 255),
                Rgba::opaque(116, 29, 42),
                Rgba::opaque(217, 54, 144),
                Rgba::opaque(255, 136, 107),
            ],
            rotation: 0.0,
            heights: vec![0.0; GRID * GRID],
            velocities: vec![0.0; GRID * GRID],
        }
    }
}

impl DotPlaneEffect {
    fn color_for_height(&self, height: f32) -> Rgba {
        let t = (height / 200.0).clamp(0.0, 1.0) * (PALETTE_STOPS - 1) as f32;
        let index = (t as usize).min(PALETTE_STOPS - 2);
        let frac = t - index as f32;
        let a = self.colors[index];
        let b = self.colors[index + 1];
        let mix = |x: u8, y: u8| (f32::from(x) + (f32::from(y) - f32::from(x)) * frac) as u8;
        Rgba::opaque(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b))
    }

    /// Scroll rows back one step and inject a new front row from the
    /// spectrum; interior rows relax like a damped wave.
    fn advance_heights(&mut self, spectrum: &[f32]) {
        for row in (1..GRID).rev() {
            for col in 0..GRID {
                let src = (row - 1) * GRID + col;
                let dst = row * GRID + col;
                if row == 1 {
                    self.heights[dst] = self.heights[src];
                    self.velocities[dst] = self.velocities[src];
                } else {
                    let mut height = self.heights[src] + self.velocities[src];
                    let mut velocity = self.velocities[src];
                    if height > 255.0 {
                        height = 255.0;
                        velocity = 0.0;
                    }
                    velocity -= 1.2;
                    if height < 0.0 {
                        height = 0.0;
                        velocity = 0.0;
                    }
                    self.heights[dst] = height;
                    self.velocities[dst] = velocity;
                }
            }
        }
        let bins = spectrum.len().max(1);
        let mut peak = 0.0f32;
        for &m in spectrum {
            peak = peak.max(m);
        }
        for col in 0..GRID {
            let bin = col * bins / GRID;
            let normalized = if peak > 0.0 {
                spectrum[bin.min(bins - 1)] / peak
            } else {
                0.0
            };
            let height = normalized * 200.0;
            self.heights[col] = height;
            self.velocities[col] = (height - self.heights[GRID + col]) * 0.2;
        }
    }
}

impl Effect for DotPlaneEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.rotation_velocity = params.get_float("rotvel", self.rotation_velocity);
        self.tilt_degrees = params.get_float("angle", self.tilt_degrees);
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
        self.advance_heights(context.audio_spectrum);
        self.rotation += self.rotation_velocity / 5.0;
        if self.rotation >= 360.0 {
            self.rotation -= 360.0;
        }
        if self.rotation < 0.0 {
            self.rotation += 360.0;
        }

        let rotation = self.rotation.to_radians();
        let tilt = self.tilt_degrees.to_radians();
        let (sin_r, cos_r) = rotation.sin_cos();
        let (sin_t, cos_t) = tilt.sin_cos();
        let width = context.width as f32;
        let height = context.height as f32;
        let scale = width.min(height) * 0.9;
        let legacy = context.globals.legacy_render;

        for row in 0..GRID {
            for col in 0..GRID {
                let value = self.heights[row * GRID + col];
                // Grid coordinates centered on the origin, unit extent.
                let gx = (col as f32 / (GRID - 1) as f32) - 0.5;
                let gz = (row as f32 / (GRID - 1) as f32) - 0.5;
                let gy = value / 400.0;

                // Rotate about the vertical axis, then tilt toward camera.
                let rx = gx * cos_r - gz * sin_r;
                let rz = gx * sin_r + gz * cos_r;
                let ry = gy * cos_t - rz * sin_t;
                let depth = gy * sin_t + rz * cos_t + 2.0;
                if depth <= 0.1 {
                    continue;
                }

                let px = (width * 0.5 + rx * scale / depth).round() as i32;
                let py = (height * 0.5 - ry * scale / depth).round() as i32;
                primitives::blend_pixel(
                    &mut context.framebuffer,
                    &legacy,
                    px,
                    py,
                    self.color_for_height(value),
                    255,
                );
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
    fn renders_dot_grid() {
        let mut rig = TestRig::new(80, 60);
        let mut effect = DotPlaneEffect::default();
        rig.analysis.spectrum[10] = 1.0;
        rig.run(&mut effect);
        let lit = rig
            .pixels
            .chunks_exact(4)
            .filter(|px| px[0] > 0 || px[1] > 0 || px[2] > 0)
            .count();
        assert!(lit > 100);
    }

    #[test]
    fn spectrum_feeds_front_row() {
        let mut effect = DotPlaneEffect::default();
        let mut spectrum = vec![0.0f32; 513];
        spectrum[0] = 1.0;
        effect.advance_heights(&spectrum);
        assert!(effect.heights[0] > 0.0);
        // second advance scrolls the row backwards
        effect.advance_heights(&vec![0.0f32; 513]);
        assert!(effect.heights[GRID] > 0.0);
    }

    #[test]
    fn rotation_wraps_at_full_turn() {
        let mut rig = TestRig::new(16, 16);
        let mut effect = DotPlaneEffect::default();
        effect.rotation_velocity = 1000.0;
        for _ in 0..4 {
            rig.run(&mut effect);
        }
        assert!(effect.rotation >= 0.0 && effect.rotation < 360.0);
    }
}
