//! Numeric readouts drawn with the built-in bitmap font.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::{self, Rgba, FONT_HEIGHT};
use crate::params::ParamBlock;

/// RMS / BPM / confidence readout.
pub struct LevelTextEffect {
    color: Rgba,
    x: i32,
    y: i32,
}

impl Default for LevelTextEffect {
    fn default() -> Self {
        Self {
            color: Rgba::WHITE,
            x: 2,
            y: 2,
        }
    }
}

impl Effect for LevelTextEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("color") {
            self.color = Rgba::from_u32(params.get_int("color", 0xFF_FFFF) as u32);
        }
        self.x = params.get_int("x", self.x);
        self.y = params.get_int("y", self.y);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        let Some(analysis) = context.audio else {
            return true;
        };
        let line1 = format!("RMS={:.3}", analysis.rms());
        let line2 = format!("BPM={:.1} C={:.2}", analysis.bpm, analysis.confidence);
        primitives::draw_text(&mut context.framebuffer, self.x, self.y, &line1, self.color);
        primitives::draw_text(
            &mut context.framebuffer,
            self.x,
            self.y + FONT_HEIGHT + 2,
            &line2,
            self.color,
        );
        true
    }
}

/// Bass/mid/treble readout.
pub struct BandTextEffect {
    color: Rgba,
    x: i32,
    y: i32,
}

impl Default for BandTextEffect {
    fn default() -> Self {
        Self {
            color: Rgba::WHITE,
            x: 2,
            y: 2,
        }
    }
}

impl Effect for BandTextEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("color") {
            self.color = Rgba::from_u32(params.get_int("color", 0xFF_FFFF) as u32);
        }
        self.x = params.get_int("x", self.x);
        self.y = params.get_int("y", self.y);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        let Some(analysis) = context.audio else {
            return true;
        };
        let text = format!(
            "B={:.2} M={:.2} T={:.2}",
            analysis.bass, analysis.mid, analysis.treb
        );
        primitives::draw_text(&mut context.framebuffer, self.x, self.y, &text, self.color);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    #[test]
    fn level_text_draws_pixels() {
        let mut rig = TestRig::new(128, 24);
        let mut effect = LevelTextEffect::default();
        rig.run(&mut effect);
        let lit = rig.pixels.chunks_exact(4).filter(|px| px[0] > 0).count();
        assert!(lit > 10);
    }

    #[test]
    fn band_text_is_deterministic() {
        let mut a = TestRig::new(128, 16);
        let mut b = TestRig::new(128, 16);
        a.analysis.bass = 0.5;
        b.analysis.bass = 0.5;
        let mut ea = BandTextEffect::default();
        let mut eb = BandTextEffect::default();
        a.run(&mut ea);
        b.run(&mut eb);
        assert_eq!(a.pixels, b.pixels);
    }
}
