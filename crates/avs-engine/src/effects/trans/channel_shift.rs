//! Permutes the three color channels, optionally rerolled on every beat.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Rgb,
    Rbg,
    Gbr,
    Grb,
    Brg,
    Bgr,
}

/// Fixed array indexed by `rng.next_uint32() % 6` on beat.
pub const BEAT_MODES: [Mode; 6] = [
    Mode::Rgb,
    Mode::Rbg,
    Mode::Gbr,
    Mode::Grb,
    Mode::Brg,
    Mode::Bgr,
];

// Legacy dialog control IDs still appear in old presets.
const ID_RGB: i32 = 1183;
const ID_RBG: i32 = 1020;
const ID_GBR: i32 = 1018;
const ID_GRB: i32 = 1022;
const ID_BRG: i32 = 1019;
const ID_BGR: i32 = 1021;

impl Mode {
    fn order(self) -> [usize; 3] {
        match self {
            Mode::Rgb => [0, 1, 2],
            Mode::Rbg => [0, 2, 1],
            Mode::Gbr => [1, 2, 0],
            Mode::Grb => [1, 0, 2],
            Mode::Brg => [2, 0, 1],
            Mode::Bgr => [2, 1, 0],
        }
    }

    fn from_id(id: i32, fallback: Self) -> Self {
        match id {
            ID_RGB => Mode::Rgb,
            ID_RBG => Mode::Rbg,
            ID_GBR => Mode::Gbr,
            ID_GRB => Mode::Grb,
            ID_BRG => Mode::Brg,
            ID_BGR => Mode::Bgr,
            _ => fallback,
        }
    }

    fn from_token(token: &str, fallback: Self) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "rgb" => Mode::Rgb,
            "rbg" => Mode::Rbg,
            "gbr" => Mode::Gbr,
            "grb" => Mode::Grb,
            "brg" => Mode::Brg,
            "bgr" => Mode::Bgr,
            _ => fallback,
        }
    }
}

pub struct ChannelShiftEffect {
    configured: Mode,
    current: Mode,
    randomize_on_beat: bool,
}

impl Default for ChannelShiftEffect {
    fn default() -> Self {
        Self {
            configured: Mode::Rbg,
            current: Mode::Rbg,
            randomize_on_beat: true,
        }
    }
}

impl Effect for ChannelShiftEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        let mut target = self.configured;
        if params.contains("mode") {
            let token = params.get_string("mode", "");
            if token.parse::<i32>().is_ok() {
                target = Mode::from_id(params.get_int("mode", 0), target);
            } else {
                target = Mode::from_token(&token, target);
            }
        }
        if params.contains("order") {
            target = Mode::from_token(&params.get_string("order", ""), target);
        }
        self.configured = target;
        self.current = target;
        self.randomize_on_beat = params.get_bool("onbeat", self.randomize_on_beat);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        if context.audio_beat && self.randomize_on_beat {
            let index = (context.rng.next_uint32() as usize) % BEAT_MODES.len();
            self.current = BEAT_MODES[index];
        } else if !self.randomize_on_beat && self.current != self.configured {
            self.current = self.configured;
        }
        if self.current == Mode::Rgb {
            return true;
        }

        let order = self.current.order();
        for px in context.framebuffer.data.chunks_exact_mut(4) {
            let original = [px[0], px[1], px[2]];
            px[0] = original[order[0]];
            px[1] = original[order[1]];
            px[2] = original[order[2]];
        }
        true
    }
}
