//! Waveform polyline, spectrum bars, and the three-band bar renderer.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::{self, Rgba};
use crate::params::ParamBlock;

fn fade_half(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px[0] /= 2;
        px[1] /= 2;
        px[2] /= 2;
    }
}

fn clear_black(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        px.copy_from_slice(&[0, 0, 0, 255]);
    }
}

/// Draws the analyzer waveform as a polyline across the frame.
pub struct WaveEffect {
    gain: f32,
    damp: bool,
    color: Rgba,
}

impl Default for WaveEffect {
    fn default() -> Self {
        Self {
            gain: 1.0,
            damp: false,
            color: Rgba::WHITE,
        }
    }
}

impl Effect for WaveEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.gain = params.get_float("gain", self.gain);
        self.damp = params.get_bool("damp", self.damp);
        if params.contains("color") {
            self.color = Rgba::from_u32(params.get_int("color", 0xFF_FFFF) as u32);
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        // Damped mode keeps the previous frame as a half-strength trail;
        // otherwise the canvas is cleared each frame.
        if self.damp {
            fade_half(context.framebuffer.data);
        } else {
            clear_black(context.framebuffer.data);
        }

        let Some(analysis) = context.audio else {
            return true;
        };
        let width = context.width;
        let height = context.height;
        let mid = height / 2;
        let samples = analysis.waveform.len();

        let mut prev: Option<(i32, i32)> = None;
        for x in 0..width {
            let index = (x as usize * samples) / width.max(1) as usize;
            let value = analysis.waveform[index.min(samples - 1)] * self.gain;
            let y = mid - (value * (height as f32 / 2.0 - 1.0)) as i32;
            let y = y.clamp(0, height - 1);
            if let Some((px, py)) = prev {
                primitives::draw_line(
                    &mut context.framebuffer,
                    &context.globals.legacy_render,
                    px,
                    py,
                    x,
                    y,
                    self.color,
                );
            }
            prev = Some((x, y));
        }
        true
    }
}

/// Vertical spectrum bars with logarithmic or linear bin mapping.
pub struct SpectrumEffect {
    bars: i32,
    logarithmic: bool,
    gain: f32,
    color: Rgba,
}

impl Default for SpectrumEffect {
    fn default() -> Self {
        Self {
            bars: 64,
            logarithmic: true,
            gain: 1.0,
            color: Rgba::WHITE,
        }
    }
}

impl Effect for SpectrumEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.bars = params.get_int("bars", self.bars).clamp(1, 1024);
        self.logarithmic = params.get_bool("log", self.logarithmic);
        self.gain = params.get_float("gain", self.gain);
        if params.contains("color") {
            self.color = Rgba::from_u32(params.get_int("color", 0xFF_FFFF) as u32);
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        let spectrum = context.audio_spectrum;
        if spectrum.is_empty() {
            return true;
        }
        let width = context.width;
        let height = context.height;
        let bins = spectrum.len();
        let mut peak = 0.0f32;
        for &m in spectrum {
            peak = peak.max(m);
        }
        if peak <= 0.0 {
            return true;
        }

        let bars = self.bars.min(width.max(1));
        let bar_width = (width / bars).max(1);
        for bar in 0..bars {
            let t0 = bar as f32 / bars as f32;
            let t1 = (bar + 1) as f32 / bars as f32;
            let (lo, hi) = if self.logarithmic {
                // Exponential bin walk so low bins get their own bars.
                let lo = ((bins as f32).powf(t0) - 1.0) as usize;
                let hi = ((bins as f32).powf(t1) - 1.0) as usize;
                (lo, hi.max(lo + 1))
            } else {
                let lo = (t0 * bins as f32) as usize;
                let hi = (t1 * bins as f32) as usize;
                (lo, hi.max(lo + 1))
            };
            let hi = hi.min(bins);
            let lo = lo.min(hi.saturating_sub(1));
            let mut value = 0.0f32;
            for &m in &spectrum[lo..hi] {
                value = value.max(m);
            }
            let normalized = ((value / peak) * self.gain).clamp(0.0, 1.0);
            let bar_height = (normalized * (height - 1) as f32) as i32;
            let x0 = bar * bar_width;
            for x in x0..(x0 + bar_width).min(width) {
                for y in (height - 1 - bar_height)..height {
                    primitives::blend_pixel(
                        &mut context.framebuffer,
                        &context.globals.legacy_render,
                        x,
                        y,
                        self.color,
                        255,
                    );
                }
            }
        }
        true
    }
}

/// Three wide bars sourced from the bass/mid/treb scalars.
pub struct BandsEffect {
    gain: f32,
    colors: [Rgba; 3],
}

impl Default for BandsEffect {
    fn default() -> Self {
        Self {
            gain: 1.0,
            colors: [
                Rgba::opaque(220, 60, 60),
                Rgba::opaque(60, 220, 60),
                Rgba::opaque(60, 60, 220),
            ],
        }
    }
}

impl Effect for BandsEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.gain = params.get_float("gain", self.gain);
        for (i, key) in ["color_bass", "color_mid", "color_treb"].iter().enumerate() {
            if params.contains(key) {
                self.colors[i] = Rgba::from_u32(params.get_int(key, 0) as u32);
            }
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        let Some(analysis) = context.audio else {
            return true;
        };
        let bands = [analysis.bass, analysis.mid, analysis.treb];
        let peak = bands.iter().fold(0.0f32, |a, &b| a.max(b)).max(1e-6);
        let width = context.width;
        let height = context.height;
        let bar_width = width / 3;
        for (i, &value) in bands.iter().enumerate() {
            let normalized = ((value / peak) * self.gain).clamp(0.0, 1.0);
            let bar_height = (normalized * (height - 1) as f32) as i32;
            let x0 = i as i32 * bar_width;
            let x1 = if i == 2 { width } else { x0 + bar_width };
            for x in x0..x1 {
                for y in (height - 1 - bar_height)..height {
                    primitives::blend_pixel(
                        &mut context.framebuffer,
                        &context.globals.legacy_render,
                        x,
                        y,
                        self.colors[i],
                        255,
                    );
                }
            }
        }
        true
    }
}
