//! 256-entry LUT keyed off one source channel (or luma).

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapChannel {
    Red,
    Green,
    Blue,
    Alpha,
    Luma,
}

pub struct ColorMapEffect {
    table: [[u8; 4]; 256],
    channel: MapChannel,
    map_alpha: bool,
    invert: bool,
}

impl Default for ColorMapEffect {
    fn default() -> Self {
        let mut table = [[0u8; 4]; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = [i as u8, i as u8, i as u8, 255];
        }
        Self {
            table,
            channel: MapChannel::Luma,
            map_alpha: false,
            invert: false,
        }
    }
}

fn parse_channel(token: &str, fallback: MapChannel) -> MapChannel {
    match token {
        "red" | "r" => MapChannel::Red,
        "green" | "g" => MapChannel::Green,
        "blue" | "b" => MapChannel::Blue,
        "alpha" | "a" => MapChannel::Alpha,
        "luma" | "y" | "brightness" => MapChannel::Luma,
        _ => fallback,
    }
}

fn sanitize_hex_token(token: &str) -> &str {
    let token = token.trim();
    let token = token.strip_prefix('#').unwrap_or(token);
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token)
}

impl ColorMapEffect {
    /// Parse a whitespace/comma separated hex color list into the LUT. The
    /// last parsed entry fills any remaining slots; a missing table is the
    /// identity ramp.
    fn parse_table(&mut self, text: &str) {
        for (i, entry) in self.table.iter_mut().enumerate() {
            *entry = [i as u8, i as u8, i as u8, 255];
        }
        let mut index = 0usize;
        for raw in text.split([' ', '\t', '\n', ',', ';']) {
            if index >= self.table.len() {
                break;
            }
            let digits = sanitize_hex_token(raw);
            if digits.is_empty() {
                continue;
            }
            let Ok(value) = u32::from_str_radix(digits, 16) else {
                continue;
            };
            let entry = if digits.len() <= 6 {
                [
                    ((value >> 16) & 0xFF) as u8,
                    ((value >> 8) & 0xFF) as u8,
                    (value & 0xFF) as u8,
                    255,
                ]
            } else {
                [
                    ((value >> 16) & 0xFF) as u8,
                    ((value >> 8) & 0xFF) as u8,
                    (value & 0xFF) as u8,
                    ((value >> 24) & 0xFF) as u8,
                ]
            };
            self.table[index] = entry;
            index += 1;
        }
        if index > 0 {
            let last = self.table[index - 1];
            for entry in self.table.iter_mut().skip(index) {
                *entry = last;
            }
        }
    }

    fn index_for(&self, px: &[u8]) -> usize {
        let index = match self.channel {
            MapChannel::Red => i32::from(px[0]),
            MapChannel::Green => i32::from(px[1]),
            MapChannel::Blue => i32::from(px[2]),
            MapChannel::Alpha => i32::from(px[3]),
            MapChannel::Luma => {
                (i32::from(px[0]) * 54 + i32::from(px[1]) * 183 + i32::from(px[2]) * 19) >> 8
            }
        };
        let index = if self.invert { 255 - index } else { index };
        index.clamp(0, 255) as usize
    }
}

impl Effect for ColorMapEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        let fallback = params.get_string("map", "");
        let table = params.get_string("table", &fallback);
        if !table.is_empty() {
            self.parse_table(&table);
        }
        if params.contains("channel") {
            let token = params.get_string("channel", "").to_ascii_lowercase();
            self.channel = parse_channel(&token, self.channel);
        }
        self.map_alpha = params.get_bool("map_alpha", self.map_alpha);
        self.invert = params.get_bool("invert", self.invert);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        for px in context.framebuffer.data.chunks_exact_mut(4) {
            let mapped = self.table[self.index_for(px)];
            px[0] = mapped[0];
            px[1] = mapped[1];
            px[2] = mapped[2];
            if self.map_alpha {
                px[3] = mapped[3];
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    #[test]
    fn default_identity_ramp_keeps_grayscale() {
        let mut rig = TestRig::new(2, 2);
        rig.fill([90, 90, 90, 255]);
        let mut effect = ColorMapEffect::default();
        rig.run(&mut effect);
        assert_eq!(rig.pixel(0, 0), [90, 90, 90, 255]);
    }

    #[test]
    fn table_fills_tail_with_last_entry() {
        let mut effect = ColorMapEffect::default();
        let mut params = ParamBlock::new();
        params.set_string("table", "ff0000, 00ff00");
        effect.set_params(&params);
        assert_eq!(effect.table[0], [255, 0, 0, 255]);
        assert_eq!(effect.table[1], [0, 255, 0, 255]);
        assert_eq!(effect.table[255], [0, 255, 0, 255]);
    }

    #[test]
    fn invert_reads_lut_backwards() {
        let mut rig = TestRig::new(1, 1);
        rig.fill([0, 0, 0, 255]);
        let mut effect = ColorMapEffect::default();
        let mut params = ParamBlock::new();
        params.set_bool("invert", true);
        effect.set_params(&params);
        rig.run(&mut effect);
        // luma 0 inverted reads entry 255 of the identity ramp
        assert_eq!(rig.pixel(0, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn channel_selection_uses_named_channel() {
        let mut rig = TestRig::new(1, 1);
        rig.fill([200, 10, 10, 255]);
        let mut effect = ColorMapEffect::default();
        let mut params = ParamBlock::new();
        params.set_string("channel", "red");
        effect.set_params(&params);
        rig.run(&mut effect);
        // identity ramp keyed by red channel turns pixel gray at 200
        assert_eq!(rig.pixel(0, 0), [200, 200, 200, 255]);
    }

    #[test]
    fn luma_weights_match_fixed_point_formula() {
        let effect = ColorMapEffect::default();
        let px = [100u8, 50, 25, 255];
        let expected = ((100 * 54 + 50 * 183 + 25 * 19) >> 8) as usize;
        assert_eq!(effect.index_for(&px), expected);
    }
}
