//! Mirror/quarter-turn feedback with a channel gain, sampled from history.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

use super::frame_warp::FrameWarp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuarterTurn {
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

pub struct BlitterFeedbackEffect {
    mirror_horizontal: bool,
    mirror_vertical: bool,
    rotation: QuarterTurn,
    /// Feedback gain applied to R/G/B on each pass.
    gain: f32,
    warp: FrameWarp,
}

impl Default for BlitterFeedbackEffect {
    fn default() -> Self {
        Self {
            mirror_horizontal: false,
            mirror_vertical: false,
            rotation: QuarterTurn::None,
            gain: 1.0,
            warp: FrameWarp::default(),
        }
    }
}

fn parse_rotation(value: i32, fallback: QuarterTurn) -> QuarterTurn {
    match value.rem_euclid(360) {
        0 => QuarterTurn::None,
        90 => QuarterTurn::Quarter,
        180 => QuarterTurn::Half,
        270 => QuarterTurn::ThreeQuarter,
        _ => fallback,
    }
}

impl Effect for BlitterFeedbackEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.mirror_horizontal = params.get_bool("mirror_x", self.mirror_horizontal);
        self.mirror_vertical = params.get_bool("mirror_y", self.mirror_vertical);
        if params.contains("rotation") {
            self.rotation = parse_rotation(params.get_int("rotation", 0), self.rotation);
        }
        self.gain = params.get_float("gain", self.gain).clamp(0.0, 1.0);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !self.warp.prepare(context) {
            return true;
        }
        let width = self.warp.width();
        let height = self.warp.height();

        for py in 0..height {
            for px in 0..width {
                let mut norm_x = (px as f32 + 0.5) / width as f32 * 2.0 - 1.0;
                let mut norm_y = 1.0 - (py as f32 + 0.5) / height as f32 * 2.0;
                if self.mirror_horizontal {
                    norm_x = -norm_x;
                }
                if self.mirror_vertical {
                    norm_y = -norm_y;
                }
                let (sample_x, sample_y) = match self.rotation {
                    QuarterTurn::None => (norm_x, norm_y),
                    QuarterTurn::Quarter => (norm_y, -norm_x),
                    QuarterTurn::Half => (-norm_x, -norm_y),
                    QuarterTurn::ThreeQuarter => (-norm_y, norm_x),
                };
                let mut color = self.warp.sample(sample_x, sample_y, false);
                for c in 0..3 {
                    color[c] = (f32::from(color[c]) * self.gain) as u8;
                }
                let index = ((py * width + px) * 4) as usize;
                context.framebuffer.data[index..index + 4].copy_from_slice(&color);
            }
        }

        self.warp.store(context);
        true
    }
}
