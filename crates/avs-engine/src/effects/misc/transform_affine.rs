//! Beat-gated spinning triangle with anchor control and a gating log strip.

use glam::{Mat2, Vec2};

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::{self, Rgba};
use crate::params::ParamBlock;

use super::gating::{BeatGate, GateFlag, GateOptions};

fn anchor_from_token(token: &str) -> Option<(f32, f32)> {
    match token {
        "center" => Some((0.5, 0.5)),
        "top_left" | "topleft" => Some((0.0, 0.0)),
        "top_right" | "topright" => Some((1.0, 0.0)),
        "bottom_left" | "bottomleft" => Some((0.0, 1.0)),
        "bottom_right" | "bottomright" => Some((1.0, 1.0)),
        "center_left" | "centerleft" => Some((0.0, 0.5)),
        "center_right" | "centerright" => Some((1.0, 0.5)),
        "top_center" | "topcenter" => Some((0.5, 0.0)),
        "bottom_center" | "bottomcenter" => Some((0.5, 1.0)),
        _ => None,
    }
}

fn color_for_flag(flag: GateFlag) -> [u8; 3] {
    match flag {
        GateFlag::Beat => [200, 40, 40],
        GateFlag::Hold => [40, 160, 40],
        GateFlag::Sticky => [220, 220, 40],
        GateFlag::Off => [24, 24, 24],
    }
}

pub struct TransformAffineEffect {
    anchor: (f32, f32),
    base_angle_degrees: f32,
    rotate_speed_degrees: f32,
    scale: f32,
    double_size: bool,
    fifty_blend: bool,
    test_mode: bool,
    random_position: bool,
    log_rows: i32,
    color: Rgba,
    cross_color: Rgba,

    random_angle_amplitude: f32,
    random_scale_amplitude: f32,
    random_offset_amplitude: f32,

    gate: BeatGate,
    gate_options: GateOptions,
    history: Vec<GateFlag>,
    history_limit: usize,
    jitter: (f32, f32),
    random_angle_offset: f32,
    random_scale_factor: f32,
}

impl Default for TransformAffineEffect {
    fn default() -> Self {
        let gate_options = GateOptions {
            hold_frames: 2,
            ..GateOptions::default()
        };
        Self {
            anchor: (0.5, 0.5),
            base_angle_degrees: 0.0,
            rotate_speed_degrees: 0.0,
            scale: 1.0,
            double_size: false,
            fifty_blend: false,
            test_mode: false,
            random_position: false,
            log_rows: 1,
            color: Rgba::WHITE,
            cross_color: Rgba::opaque(255, 0, 0),
            random_angle_amplitude: 0.0,
            random_scale_amplitude: 0.0,
            random_offset_amplitude: 0.0,
            gate: BeatGate::new(gate_options),
            gate_options,
            history: Vec::new(),
            history_limit: 0,
            jitter: (0.0, 0.0),
            random_angle_offset: 0.0,
            random_scale_factor: 1.0,
        }
    }
}

impl TransformAffineEffect {
    fn update_random(&mut self, context: &mut RenderContext<'_>, beat_triggered: bool) {
        if !beat_triggered {
            return;
        }
        self.random_angle_offset = if self.random_angle_amplitude > 0.0 {
            context
                .rng
                .uniform(-self.random_angle_amplitude, self.random_angle_amplitude)
        } else {
            0.0
        };
        self.random_scale_factor = if self.random_scale_amplitude > 0.0 {
            1.0 + context
                .rng
                .uniform(-self.random_scale_amplitude, self.random_scale_amplitude)
        } else {
            1.0
        };
        if self.random_position || self.random_offset_amplitude > 0.0 {
            let amplitude = if self.random_offset_amplitude > 0.0 {
                self.random_offset_amplitude
            } else {
                0.25
            };
            let dx = context.rng.uniform(-amplitude, amplitude);
            let dy = context.rng.uniform(-amplitude, amplitude);
            self.jitter = (
                dx * context.width as f32,
                dy * context.height as f32,
            );
        } else {
            self.jitter = (0.0, 0.0);
        }
    }

    fn draw_gating_log(&self, context: &mut RenderContext<'_>) {
        if self.history.is_empty() || !context.has_framebuffer() {
            return;
        }
        let rows = self.log_rows.min(context.height);
        let width = context.width as usize;
        let off = color_for_flag(GateFlag::Off);

        for row in 0..rows {
            let y = context.height - 1 - row;
            let row_start = (y as usize) * width * 4;
            for x in 0..width {
                let offset = row_start + x * 4;
                context.framebuffer.data[offset..offset + 3].copy_from_slice(&off);
                context.framebuffer.data[offset + 3] = 255;
            }

            let row_offset = width * row as usize;
            if self.history.len() <= row_offset {
                continue;
            }
            let available = self.history.len() - row_offset;
            let to_draw = width.min(available);
            if to_draw == 0 {
                continue;
            }
            let start_index = self.history.len() - row_offset - to_draw;
            let start_x = width - to_draw;
            for x in start_x..width {
                let flag = self.history[start_index + (x - start_x)];
                let color = color_for_flag(flag);
                let offset = row_start + x * 4;
                context.framebuffer.data[offset..offset + 3].copy_from_slice(&color);
                context.framebuffer.data[offset + 3] = 255;
            }
        }
    }

    fn draw_crosshair(&self, context: &mut RenderContext<'_>, x: f32, y: f32) {
        let ix = x.round() as i32;
        let iy = y.round() as i32;
        const RADIUS: i32 = 3;
        for dx in -RADIUS..=RADIUS {
            primitives::put_pixel(&mut context.framebuffer, ix + dx, iy, self.cross_color);
        }
        for dy in -RADIUS..=RADIUS {
            primitives::put_pixel(&mut context.framebuffer, ix, iy + dy, self.cross_color);
        }
    }
}

impl Effect for TransformAffineEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("anchor") {
            if let Some(anchor) =
                anchor_from_token(&params.get_string("anchor", "").to_ascii_lowercase())
            {
                self.anchor = anchor;
            }
        }
        if params.get_bool("center", false) {
            self.anchor = (0.5, 0.5);
        }
        if params.contains("anchor_x") || params.contains("anchor_y") {
            self.anchor.0 = params.get_float("anchor_x", self.anchor.0).clamp(0.0, 1.0);
            self.anchor.1 = params.get_float("anchor_y", self.anchor.1).clamp(0.0, 1.0);
        }

        self.base_angle_degrees = params.get_float("angle", self.base_angle_degrees);
        if params.contains("rotate") {
            // `rotate` doubles as a bare flag (90 deg/frame) or a speed.
            let token = params.get_string("rotate", "");
            if token.eq_ignore_ascii_case("true") {
                self.rotate_speed_degrees = 90.0;
            } else {
                self.rotate_speed_degrees = params.get_float("rotate", self.rotate_speed_degrees);
            }
        }
        self.rotate_speed_degrees = params.get_float("rotate_speed", self.rotate_speed_degrees);
        self.scale = params.get_float("scale", self.scale);
        self.double_size = params.get_bool("2x", params.get_bool("double", self.double_size));
        self.test_mode = params.get_bool("test", params.get_bool("debug", self.test_mode));
        self.random_position = params.get_bool("randompos", self.random_position);
        self.fifty_blend =
            params.get_bool("5050", params.get_bool("fifty", self.fifty_blend));
        self.log_rows = params.get_int("log_rows", self.log_rows).clamp(1, 8);

        if params.contains("color") {
            self.color = Rgba::from_u32(params.get_int("color", 0xFF_FFFF) as u32);
        }
        if params.contains("cross_color") {
            self.cross_color = Rgba::from_u32(params.get_int("cross_color", 0xFF_0000) as u32);
        }

        self.random_angle_amplitude =
            params.get_float("random_angle", self.random_angle_amplitude);
        self.random_scale_amplitude =
            params.get_float("random_scale", self.random_scale_amplitude);
        self.random_offset_amplitude =
            params.get_float("random_offset", self.random_offset_amplitude);

        let mut options = self.gate_options;
        options.enable_on_beat = params.get_bool("onbeat", options.enable_on_beat);
        options.sticky_toggle = params.get_bool("stick", options.sticky_toggle);
        options.only_sticky = params.get_bool("onlysticky", options.only_sticky);
        options.hold_frames = params.get_int("hold", options.hold_frames).max(1);
        self.gate_options = options;
        self.gate.configure(options);
        self.gate.reset();
        self.history.clear();
        self.history_limit = 0;
        self.jitter = (0.0, 0.0);
        self.random_angle_offset = 0.0;
        self.random_scale_factor = 1.0;
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        let gate = self.gate.step(context.audio_beat);
        self.update_random(context, gate.flag == GateFlag::Beat);

        let width_f = (context.width - 1) as f32;
        let height_f = (context.height - 1) as f32;
        let anchor_x = (self.anchor.0 * width_f + self.jitter.0).clamp(0.0, width_f);
        let anchor_y = (self.anchor.1 * height_f + self.jitter.1).clamp(0.0, height_f);

        let target_limit = (context.width * self.log_rows).max(1) as usize;
        if self.history_limit != target_limit {
            self.history_limit = target_limit;
            if self.history.len() > target_limit {
                let excess = self.history.len() - target_limit;
                self.history.drain(..excess);
            }
        }
        self.history.push(gate.flag);
        while self.history.len() > self.history_limit {
            self.history.remove(0);
        }

        if gate.render {
            let base_scale = width_f.min(height_f) * 0.25
                * self.scale
                * if self.double_size { 2.0 } else { 1.0 }
                * self.random_scale_factor.max(0.1);
            let angle = (self.base_angle_degrees
                + self.rotate_speed_degrees * context.frame_index as f32
                + self.random_angle_offset)
                .to_radians();

            let rotation = Mat2::from_angle(angle);
            let anchor = Vec2::new(anchor_x, anchor_y);
            let base = [
                Vec2::new(0.0, -1.0),
                Vec2::new(0.866_025_4, 0.5),
                Vec2::new(-0.866_025_4, 0.5),
            ];
            let transformed: Vec<(i32, i32)> = base
                .iter()
                .map(|v| {
                    let p = anchor + rotation * (*v * base_scale);
                    (p.x.round() as i32, p.y.round() as i32)
                })
                .collect();

            let color = if self.fifty_blend {
                Rgba {
                    a: 128,
                    ..self.color
                }
            } else {
                self.color
            };
            primitives::draw_filled_triangle(
                &mut context.framebuffer,
                &context.globals.legacy_render,
                transformed[0],
                transformed[1],
                transformed[2],
                color,
            );
        }

        self.draw_gating_log(context);
        if self.test_mode {
            self.draw_crosshair(context, anchor_x, anchor_y);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    fn lit_pixels(rig: &TestRig) -> usize {
        rig.pixels
            .chunks_exact(4)
            .filter(|px| px[0] > 100 && px[1] > 100 && px[2] > 100)
            .count()
    }

    #[test]
    fn triangle_renders_while_gate_is_open() {
        let mut rig = TestRig::new(64, 64);
        let mut effect = TransformAffineEffect::default();
        rig.beat = true;
        rig.run(&mut effect);
        assert!(lit_pixels(&rig) > 20);
    }

    #[test]
    fn gate_closed_draws_only_the_log() {
        let mut rig = TestRig::new(32, 32);
        let mut effect = TransformAffineEffect::default();
        rig.beat = false;
        rig.run(&mut effect);
        assert_eq!(lit_pixels(&rig), 0);
        // log strip exists on the bottom row
        assert_ne!(rig.pixel(31, 31), [0, 0, 0, 0]);
    }

    #[test]
    fn rotation_90_moves_vertices_between_frames() {
        let run_frames = |frames: u64| {
            let mut rig = TestRig::new(33, 33);
            let mut effect = TransformAffineEffect::default();
            let mut params = ParamBlock::new();
            params.set_float("rotate_speed", 90.0);
            params.set_bool("center", true);
            effect.set_params(&params);
            for frame in 0..=frames {
                rig.fill([0, 0, 0, 0]);
                rig.beat = frame == 0 || rig.frame_index % 2 == 0;
                rig.run(&mut effect);
            }
            rig
        };
        // One frame: apex points up. A quarter turn later the footprint
        // differs; two quarter turns flip it to the opposite side.
        let first = run_frames(0);
        let quarter = run_frames(1);
        let opposite = run_frames(2);
        assert_ne!(first.pixels, quarter.pixels);
        assert_ne!(quarter.pixels, opposite.pixels);

        // apex at frame 0 sits above center; after two turns the flipped
        // triangle covers below-center rows
        let above = (0..16)
            .filter(|&y| first.pixel(16, y) != [0, 0, 0, 0])
            .count();
        assert!(above > 0);
    }

    #[test]
    fn hold_frames_keep_rendering_after_the_pulse() {
        let mut rig = TestRig::new(48, 48);
        let mut effect = TransformAffineEffect::default();
        rig.beat = true;
        rig.run(&mut effect);
        rig.fill([0, 0, 0, 0]);
        rig.beat = false;
        rig.run(&mut effect); // hold frame 1 of 2
        assert!(lit_pixels(&rig) > 0);
    }
}
