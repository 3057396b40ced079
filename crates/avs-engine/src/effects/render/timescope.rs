//! Scrolling spectrogram: one vertical column per frame.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::Rgba;
use crate::params::ParamBlock;

pub struct TimescopeEffect {
    color: Rgba,
    /// Spectrum bins sampled into the column.
    bands: i32,
    cursor: i32,
}

impl Default for TimescopeEffect {
    fn default() -> Self {
        Self {
            color: Rgba::opaque(255, 255, 255),
            bands: 576,
            cursor: 0,
        }
    }
}

impl Effect for TimescopeEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("color") {
            self.color = Rgba::from_u32(params.get_int("color", 0xFF_FFFF) as u32);
        }
        self.bands = params.get_int("bands", self.bands).clamp(16, 576);
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

        self.cursor = if width > 0 { (self.cursor + 1) % width } else { 0 };
        let x = self.cursor;

        let mut peak = 0.0f32;
        for &m in spectrum {
            peak = peak.max(m);
        }

        for y in 0..height {
            // Low frequencies at the bottom of the column.
            let band = ((height - 1 - y) * self.bands / height.max(1))
                .clamp(0, self.bands - 1) as usize;
            let bin = band * spectrum.len() / self.bands as usize;
            let normalized = if peak > 0.0 {
                (spectrum[bin.min(spectrum.len() - 1)] / peak).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let offset = context.framebuffer.offset(x, y);
            let px = &mut context.framebuffer.data[offset..offset + 4];
            px[0] = (f32::from(self.color.r) * normalized) as u8;
            px[1] = (f32::from(self.color.g) * normalized) as u8;
            px[2] = (f32::from(self.color.b) * normalized) as u8;
            px[3] = 255;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    #[test]
    fn cursor_advances_and_wraps() {
        let mut rig = TestRig::new(4, 8);
        let mut effect = TimescopeEffect::default();
        for _ in 0..6 {
            rig.run(&mut effect);
        }
        assert_eq!(effect.cursor, 6 % 4);
    }

    #[test]
    fn column_intensity_tracks_spectrum() {
        let mut rig = TestRig::new(8, 16);
        for m in rig.analysis.spectrum.iter_mut() {
            *m = 1.0;
        }
        let mut effect = TimescopeEffect::default();
        rig.run(&mut effect);
        // column 1 written on the first frame
        assert_eq!(rig.pixel(1, 0), [255, 255, 255, 255]);
        assert_eq!(rig.pixel(3, 0), [0, 0, 0, 0]);
    }
}
