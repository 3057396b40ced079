//! Per-channel brightness sliders with the legacy -4096..4096 range.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlendMode {
    Replace,
    Additive,
    Average,
}

pub struct BrightnessEffect {
    enabled: bool,
    red: i32,
    green: i32,
    blue: i32,
    blend: BlendMode,
    table: [[u8; 256]; 3],
    dirty: bool,
}

impl Default for BrightnessEffect {
    fn default() -> Self {
        Self {
            enabled: true,
            red: 0,
            green: 0,
            blue: 0,
            blend: BlendMode::Replace,
            table: [[0; 256]; 3],
            dirty: true,
        }
    }
}

impl BrightnessEffect {
    fn rebuild_tables(&mut self) {
        for (channel, slider) in [self.red, self.green, self.blue].iter().enumerate() {
            // -4096 maps to x0, 0 to x1, 4096 to x2.
            let factor = f64::from((*slider).clamp(-4096, 4096)) / 4096.0 + 1.0;
            for value in 0..256usize {
                let scaled = (value as f64 * factor).round().clamp(0.0, 255.0);
                self.table[channel][value] = scaled as u8;
            }
        }
        self.dirty = false;
    }
}

impl Effect for BrightnessEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.enabled = params.get_bool("enabled", self.enabled);
        let red = params.get_int("red", self.red).clamp(-4096, 4096);
        let green = params.get_int("green", self.green).clamp(-4096, 4096);
        let blue = params.get_int("blue", self.blue).clamp(-4096, 4096);
        if red != self.red || green != self.green || blue != self.blue {
            self.red = red;
            self.green = green;
            self.blue = blue;
            self.dirty = true;
        }
        if params.contains("blend") {
            let token = params.get_string("blend", "").to_ascii_lowercase();
            self.blend = match token.as_str() {
                "add" | "additive" => BlendMode::Additive,
                "avg" | "average" | "5050" => BlendMode::Average,
                _ => BlendMode::Replace,
            };
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !self.enabled || !context.has_framebuffer() {
            return true;
        }
        if self.dirty {
            self.rebuild_tables();
        }
        for px in context.framebuffer.data.chunks_exact_mut(4) {
            for c in 0..3 {
                let mapped = self.table[c][px[c] as usize];
                px[c] = match self.blend {
                    BlendMode::Replace => mapped,
                    BlendMode::Additive => px[c].saturating_add(mapped),
                    BlendMode::Average => ((u16::from(px[c]) + u16::from(mapped)) / 2) as u8,
                };
            }
        }
        true
    }
}
