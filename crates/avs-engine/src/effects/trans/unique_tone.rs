//! Recolor the frame to a single tone scaled by source luma.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::Rgba;
use crate::params::ParamBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlendMode {
    Replace,
    Additive,
    Average,
}

pub struct UniqueToneEffect {
    enabled: bool,
    tone: Rgba,
    invert: bool,
    blend: BlendMode,
}

impl Default for UniqueToneEffect {
    fn default() -> Self {
        Self {
            enabled: true,
            tone: Rgba::opaque(192, 192, 255),
            invert: false,
            blend: BlendMode::Replace,
        }
    }
}

fn luma(px: &[u8]) -> u32 {
    (u32::from(px[0]) * 54 + u32::from(px[1]) * 183 + u32::from(px[2]) * 19) >> 8
}

impl Effect for UniqueToneEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.enabled = params.get_bool("enabled", self.enabled);
        if params.contains("color") {
            self.tone = Rgba::from_u32(params.get_int("color", 0) as u32);
        }
        self.invert = params.get_bool("invert", self.invert);
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
        let tone = [
            u32::from(self.tone.r),
            u32::from(self.tone.g),
            u32::from(self.tone.b),
        ];
        for px in context.framebuffer.data.chunks_exact_mut(4) {
            let mut level = luma(px);
            if self.invert {
                level = 255 - level;
            }
            for c in 0..3 {
                let toned = ((tone[c] * level) / 255) as u8;
                px[c] = match self.blend {
                    BlendMode::Replace => toned,
                    BlendMode::Additive => px[c].saturating_add(toned),
                    BlendMode::Average => ((u16::from(px[c]) + u16::from(toned)) / 2) as u8,
                };
            }
        }
        true
    }
}
