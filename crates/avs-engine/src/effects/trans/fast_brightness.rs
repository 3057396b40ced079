//! `c' = c * amount + bias`, clamped or wrapping.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

pub struct FastBrightnessEffect {
    amount: f32,
    bias: f32,
    clamp: bool,
    table: [u8; 256],
    dirty: bool,
}

impl Default for FastBrightnessEffect {
    fn default() -> Self {
        Self {
            amount: 2.0,
            bias: 0.0,
            clamp: true,
            table: [0; 256],
            dirty: true,
        }
    }
}

impl FastBrightnessEffect {
    fn rebuild_table(&mut self) {
        for value in 0..256usize {
            let scaled = value as f32 * self.amount + self.bias;
            self.table[value] = if self.clamp {
                scaled.round().clamp(0.0, 255.0) as u8
            } else {
                // Legacy arithmetic rolls over as unsigned 8-bit.
                (scaled.round() as i64).rem_euclid(256) as u8
            };
        }
        self.dirty = false;
    }
}

impl Effect for FastBrightnessEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        let amount = params.get_float("amount", self.amount);
        let bias = params.get_float("bias", self.bias);
        let clamp = params.get_bool("clamp", self.clamp);
        if amount != self.amount || bias != self.bias || clamp != self.clamp {
            self.amount = amount;
            self.bias = bias;
            self.clamp = clamp;
            self.dirty = true;
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        if self.dirty {
            self.rebuild_table();
        }
        for px in context.framebuffer.data.chunks_exact_mut(4) {
            px[0] = self.table[px[0] as usize];
            px[1] = self.table[px[1] as usize];
            px[2] = self.table[px[2] as usize];
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    #[test]
    fn default_doubles_with_clamp() {
        let mut rig = TestRig::new(2, 2);
        rig.fill([100, 200, 0, 255]);
        let mut effect = FastBrightnessEffect::default();
        rig.run(&mut effect);
        assert_eq!(rig.pixel(0, 0), [200, 255, 0, 255]);
    }

    #[test]
    fn unclamped_wraps_as_u8() {
        let mut rig = TestRig::new(2, 2);
        rig.fill([200, 0, 0, 255]);
        let mut effect = FastBrightnessEffect::default();
        let mut params = ParamBlock::new();
        params.set_float("amount", 2.0);
        params.set_bool("clamp", false);
        effect.set_params(&params);
        rig.run(&mut effect);
        assert_eq!(rig.pixel(0, 0)[0], (400 % 256) as u8);
    }

    #[test]
    fn bias_shifts_output() {
        let mut rig = TestRig::new(2, 2);
        rig.fill([10, 10, 10, 255]);
        let mut effect = FastBrightnessEffect::default();
        let mut params = ParamBlock::new();
        params.set_float("amount", 1.0);
        params.set_float("bias", 5.0);
        effect.set_params(&params);
        rig.run(&mut effect);
        assert_eq!(rig.pixel(0, 0)[0], 15);
    }
}
