//! Writes the shared line-blend routing consumed by the primitive drawers.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

pub struct SetRenderModeEffect {
    enabled: bool,
    blend_mode: u32,
    adjustable_alpha: u32,
    line_width: u32,
}

impl Default for SetRenderModeEffect {
    fn default() -> Self {
        Self {
            enabled: true,
            blend_mode: 0,
            adjustable_alpha: 128,
            line_width: 0,
        }
    }
}

fn parse_blend_mode(token: &str, fallback: u32) -> u32 {
    match token.to_ascii_lowercase().as_str() {
        "replace" => 0,
        "add" | "additive" => 1,
        "max" | "maximum" => 2,
        "5050" | "avg" | "average" => 3,
        "sub1" | "subtract_ab" => 4,
        "sub2" | "subtract_ba" => 5,
        "multiply" | "mul" => 6,
        "adjustable" => 7,
        "xor" => 8,
        "min" | "minimum" => 9,
        _ => fallback,
    }
}

impl Effect for SetRenderModeEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.enabled = params.get_bool("enabled", self.enabled);
        if params.contains("blend") {
            let token = params.get_string("blend", "");
            self.blend_mode = if token.parse::<u32>().is_ok() {
                params.get_int("blend", self.blend_mode as i32).clamp(0, 9) as u32
            } else {
                parse_blend_mode(&token, self.blend_mode)
            };
        }
        if params.contains("alpha") {
            self.adjustable_alpha = params
                .get_int("alpha", self.adjustable_alpha as i32)
                .clamp(0, 255) as u32;
        }
        if params.contains("line_width") {
            self.line_width = params
                .get_int("line_width", self.line_width as i32)
                .clamp(0, 255) as u32;
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        let legacy = &mut context.globals.legacy_render;
        legacy.line_blend_mode_active = self.enabled;
        legacy.line_blend_mode =
            self.blend_mode | (self.adjustable_alpha << 8) | (self.line_width << 16);
        true
    }
}
