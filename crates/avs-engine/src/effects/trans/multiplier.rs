//! Power-of-two channel multiply/divide plus the infinite clamp modes.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplyMode {
    /// Zero stays zero; anything else saturates to 255.
    InfiniteSquare,
    X8,
    X4,
    X2,
    X05,
    X025,
    X0125,
    /// 255 stays 255; anything else collapses to 0.
    InfiniteRoot,
}

pub struct MultiplierEffect {
    mode: MultiplyMode,
}

impl Default for MultiplierEffect {
    fn default() -> Self {
        Self {
            mode: MultiplyMode::X2,
        }
    }
}

fn parse_mode(token: &str, fallback: MultiplyMode) -> MultiplyMode {
    match token.to_ascii_lowercase().as_str() {
        "xi" | "infinite" | "square" => MultiplyMode::InfiniteSquare,
        "x8" => MultiplyMode::X8,
        "x4" => MultiplyMode::X4,
        "x2" => MultiplyMode::X2,
        "x05" | "x0.5" => MultiplyMode::X05,
        "x025" | "x0.25" => MultiplyMode::X025,
        "x0125" | "x0.125" => MultiplyMode::X0125,
        "xs" | "root" => MultiplyMode::InfiniteRoot,
        _ => fallback,
    }
}

impl Effect for MultiplierEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("mode") {
            self.mode = parse_mode(&params.get_string("mode", ""), self.mode);
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        for px in context.framebuffer.data.chunks_exact_mut(4) {
            for c in 0..3 {
                px[c] = match self.mode {
                    MultiplyMode::InfiniteSquare => {
                        if px[c] == 0 {
                            0
                        } else {
                            255
                        }
                    }
                    MultiplyMode::X8 => px[c].saturating_mul(8),
                    MultiplyMode::X4 => px[c].saturating_mul(4),
                    MultiplyMode::X2 => px[c].saturating_mul(2),
                    MultiplyMode::X05 => px[c] >> 1,
                    MultiplyMode::X025 => px[c] >> 2,
                    MultiplyMode::X0125 => px[c] >> 3,
                    MultiplyMode::InfiniteRoot => {
                        if px[c] == 255 {
                            255
                        } else {
                            0
                        }
                    }
                };
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    fn apply(fill: [u8; 4], mode: &str) -> [u8; 4] {
        let mut rig = TestRig::new(2, 2);
        rig.fill(fill);
        let mut effect = MultiplierEffect::default();
        let mut params = ParamBlock::new();
        params.set_string("mode", mode);
        effect.set_params(&params);
        rig.run(&mut effect);
        rig.pixel(0, 0)
    }

    #[test]
    fn doubling_saturates() {
        assert_eq!(apply([100, 200, 0, 255], "x2"), [200, 255, 0, 255]);
    }

    #[test]
    fn halving_shifts_down() {
        assert_eq!(apply([100, 201, 3, 255], "x05"), [50, 100, 1, 255]);
    }

    #[test]
    fn infinite_modes_clamp_both_ways() {
        assert_eq!(apply([0, 1, 254, 255], "xi"), [0, 255, 255, 255]);
        assert_eq!(apply([0, 1, 255, 255], "xs"), [0, 0, 255, 255]);
    }
}
