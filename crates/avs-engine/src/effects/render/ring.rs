//! Pulsing radial ring driven by the waveform or spectrum.

use crate::audio::Analysis;
use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::{self, Rgba};
use crate::params::ParamBlock;

const SEGMENTS: i32 = 80;
/// Frames spent blending between adjacent palette entries.
pub const COLOR_CYCLE: i32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Left,
    Right,
    Mix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Oscilloscope,
    Spectrum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Left,
    Center,
    Right,
}

struct Range {
    begin: usize,
    count: usize,
}

pub struct RingEffect {
    size: i32,
    channel: Channel,
    source: Source,
    placement: Placement,
    colors: Vec<Rgba>,
    color_cursor: i32,
}

impl Default for RingEffect {
    fn default() -> Self {
        Self {
            size: 8,
            channel: Channel::Mix,
            source: Source::Oscilloscope,
            placement: Placement::Center,
            colors: vec![Rgba::WHITE],
            color_cursor: 0,
        }
    }
}

fn channel_from_int(value: i32, fallback: Channel) -> Channel {
    match value & 3 {
        0 => Channel::Left,
        1 => Channel::Right,
        2 => Channel::Mix,
        _ => fallback,
    }
}

fn placement_from_int(value: i32, fallback: Placement) -> Placement {
    match value & 3 {
        0 => Placement::Left,
        1 => Placement::Right,
        2 => Placement::Center,
        _ => fallback,
    }
}

impl RingEffect {
    fn mirrored_segment(segment: i32) -> i32 {
        let half = SEGMENTS / 2;
        if segment > half {
            SEGMENTS - segment
        } else {
            segment
        }
    }

    fn sample_position(segment: i32) -> f32 {
        let mirrored = Self::mirrored_segment(segment);
        (mirrored as f32 / (SEGMENTS / 2) as f32).clamp(0.0, 1.0)
    }

    fn channel_range(&self, total: usize) -> Range {
        match self.channel {
            Channel::Left => Range {
                begin: 0,
                count: (total / 2).max(1),
            },
            Channel::Right => {
                let half = total / 2;
                Range {
                    begin: half,
                    count: (total - half).max(1),
                }
            }
            Channel::Mix => Range {
                begin: 0,
                count: total,
            },
        }
    }

    fn sample_waveform(&self, analysis: &Analysis, range: &Range, segment: i32) -> f32 {
        if range.count == 0 {
            return 0.5;
        }
        let position = Self::sample_position(segment);
        let last = range.count - 1;
        let index = range.begin + (position * last as f32).round() as usize;
        let sample = analysis.waveform[index.min(range.begin + last)];
        ((sample + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    fn sample_spectrum(
        &self,
        analysis: &Analysis,
        range: &Range,
        range_max: f32,
        segment: i32,
    ) -> f32 {
        if range.count == 0 || range_max <= f32::EPSILON {
            return 0.0;
        }
        let position = Self::sample_position(segment);
        let last = range.count - 1;
        let index = range.begin + (position * last as f32).round() as usize;
        let sample = analysis.spectrum[index.min(range.begin + last)];
        (sample / range_max).clamp(0.0, 1.0).sqrt()
    }

    fn current_color(&self) -> Rgba {
        if self.colors.is_empty() {
            return Rgba::WHITE;
        }
        let cycle = self.colors.len() as i32 * COLOR_CYCLE;
        if cycle <= 0 {
            return self.colors[0];
        }
        let pos = self.color_cursor.rem_euclid(cycle);
        let index = (pos / COLOR_CYCLE) as usize;
        let next = (index + 1) % self.colors.len();
        let remainder = pos % COLOR_CYCLE;
        Rgba::cycle_blend(self.colors[index], self.colors[next], remainder, COLOR_CYCLE)
    }

    fn parse_colors(&mut self, params: &ParamBlock) {
        let mut parsed = Vec::new();
        if params.contains("colors") {
            parsed = primitives::parse_color_list(&params.get_string("colors", ""));
        }
        if parsed.is_empty() {
            if params.contains("color") {
                parsed.push(Rgba::from_u32(params.get_int("color", 0) as u32));
            }
            let count = params.get_int("num_colors", 0).clamp(0, 16);
            let limit = if count > 0 { count } else { 16 };
            for i in 0..limit {
                let key = format!("color{i}");
                if params.contains(&key) {
                    parsed.push(Rgba::from_u32(params.get_int(&key, 0) as u32));
                }
            }
        }
        if !parsed.is_empty() {
            self.colors = parsed;
            let cycle = self.colors.len() as i32 * COLOR_CYCLE;
            self.color_cursor = self.color_cursor.rem_euclid(cycle.max(1));
        }
        if self.colors.is_empty() {
            self.colors.push(Rgba::WHITE);
        }
    }
}

impl Effect for RingEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("size") {
            self.size = params.get_int("size", self.size).clamp(1, 64);
        }
        if params.contains("effect") {
            let bits = params.get_int("effect", 0);
            self.channel = channel_from_int((bits >> 2) & 3, self.channel);
            self.placement = placement_from_int((bits >> 4) & 3, self.placement);
        }
        if params.contains("channel") {
            let token = params.get_string("channel", "").to_ascii_lowercase();
            self.channel = match token.as_str() {
                "left" => Channel::Left,
                "right" => Channel::Right,
                "mid" | "mix" | "center" => Channel::Mix,
                _ => channel_from_int(params.get_int("channel", 2), self.channel),
            };
        }
        if params.contains("placement") {
            let token = params.get_string("placement", "").to_ascii_lowercase();
            self.placement = match token.as_str() {
                "left" | "top" => Placement::Left,
                "right" | "bottom" => Placement::Right,
                "center" | "centre" => Placement::Center,
                _ => placement_from_int(params.get_int("placement", 2), self.placement),
            };
        }
        if params.contains("source") {
            let token = params.get_string("source", "").to_ascii_lowercase();
            self.source = match token.as_str() {
                "osc" | "oscilloscope" | "wave" => Source::Oscilloscope,
                "spec" | "spectrum" => Source::Spectrum,
                _ => self.source,
            };
        }
        self.parse_colors(params);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }

        let cycle = self.colors.len() as i32 * COLOR_CYCLE;
        if cycle > 0 {
            self.color_cursor = (self.color_cursor + 1) % cycle;
        }
        let color = self.current_color();

        let radius_scale = self.size as f32 / 32.0;
        let base_radius = radius_scale * context.width.min(context.height) as f32;
        let center_y = context.height as f32 * 0.5;
        let center_x = match self.placement {
            Placement::Left => context.width as f32 * 0.25,
            Placement::Center => context.width as f32 * 0.5,
            Placement::Right => context.width as f32 * 0.75,
        };

        let analysis = context.audio;
        let wave_range = analysis.map(|a| self.channel_range(a.waveform.len()));
        let spec_range = analysis.map(|a| self.channel_range(a.spectrum.len()));
        let spectrum_max = match (analysis, &spec_range) {
            (Some(a), Some(range)) => {
                let mut max = 0.0f32;
                for i in 0..range.count {
                    max = max.max(a.spectrum[range.begin + i]);
                }
                max
            }
            _ => 0.0,
        };

        let sample_value = |segment: i32| -> f32 {
            match (analysis, &wave_range, &spec_range) {
                (Some(a), Some(wave), Some(spec)) => match self.source {
                    Source::Oscilloscope => self.sample_waveform(a, wave, segment),
                    Source::Spectrum => self.sample_spectrum(a, spec, spectrum_max, segment),
                },
                _ => 0.5,
            }
        };

        let mut angle = 0.0f32;
        let initial_scale = 0.1 + sample_value(0) * 0.9;
        let mut prev_x = (center_x + angle.cos() * base_radius * initial_scale).round() as i32;
        let mut prev_y = (center_y + angle.sin() * base_radius * initial_scale).round() as i32;

        for segment in 1..=SEGMENTS {
            angle -= std::f32::consts::TAU / SEGMENTS as f32;
            let scale = 0.1 + sample_value(segment) * 0.9;
            let x = (center_x + angle.cos() * base_radius * scale).round() as i32;
            let y = (center_y + angle.sin() * base_radius * scale).round() as i32;
            primitives::draw_line(
                &mut context.framebuffer,
                &context.globals.legacy_render,
                prev_x,
                prev_y,
                x,
                y,
                color,
            );
            prev_x = x;
            prev_y = y;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    #[test]
    fn ring_draws_closed_loop() {
        let mut rig = TestRig::new(64, 64);
        let mut effect = RingEffect::default();
        let mut params = ParamBlock::new();
        params.set_int("size", 16);
        effect.set_params(&params);
        rig.run(&mut effect);
        let lit = rig.pixels.chunks_exact(4).filter(|px| px[0] > 0).count();
        assert!(lit >= SEGMENTS as usize / 2);
    }

    #[test]
    fn palette_cursor_cycles_colors() {
        let mut effect = RingEffect::default();
        let mut params = ParamBlock::new();
        params.set_string("colors", "ff0000,0000ff");
        effect.set_params(&params);

        let mut rig = TestRig::new(16, 16);
        // First frame: cursor lands on 1, nearly pure first color.
        rig.run(&mut effect);
        let early = effect.current_color();
        assert!(early.r > early.b);
        // Advance into the second color's half of the cycle.
        for _ in 0..COLOR_CYCLE {
            rig.fill([0, 0, 0, 0]);
            rig.run(&mut effect);
        }
        let later = effect.current_color();
        assert!(later.b > later.r);
    }

    #[test]
    fn set_params_is_idempotent() {
        let mut a = RingEffect::default();
        let mut b = RingEffect::default();
        let mut params = ParamBlock::new();
        params.set_int("size", 20);
        params.set_string("source", "spectrum");
        params.set_string("colors", "00ff00");
        a.set_params(&params);
        b.set_params(&params);
        b.set_params(&params);
        let mut rig_a = TestRig::new(32, 32);
        let mut rig_b = TestRig::new(32, 32);
        rig_a.run(&mut a);
        rig_b.run(&mut b);
        assert_eq!(rig_a.pixels, rig_b.pixels);
    }
}
