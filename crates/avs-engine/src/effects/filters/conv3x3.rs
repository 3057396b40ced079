//! User-supplied 3x3 convolution with legacy wrap-around arithmetic.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

pub struct Convolution3x3Effect {
    kernel: [f32; 9],
    divisor: f32,
    bias: f32,
    clamp_output: bool,
    preserve_alpha: bool,
    scratch: Vec<u8>,
}

impl Default for Convolution3x3Effect {
    fn default() -> Self {
        let mut kernel = [0.0; 9];
        kernel[4] = 1.0;
        Self {
            kernel,
            divisor: 1.0,
            bias: 0.0,
            clamp_output: true,
            preserve_alpha: true,
            scratch: Vec::new(),
        }
    }
}

impl Convolution3x3Effect {
    fn parse_kernel(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut parsed = self.kernel;
        let mut index = 0;
        for token in text.split_whitespace() {
            if index >= parsed.len() {
                break;
            }
            if let Ok(value) = token.parse::<f32>() {
                parsed[index] = value;
                index += 1;
            }
        }
        if index == 0 {
            return;
        }
        for slot in parsed.iter_mut().skip(index) {
            *slot = 0.0;
        }
        self.kernel = parsed;
    }

    fn channel_value(&self, accum: f32, divisor: f32) -> u8 {
        let mut value = accum / divisor + self.bias;
        if self.clamp_output {
            value = value.clamp(0.0, 255.0);
            value.round() as u8
        } else {
            // Unclamped channels roll as unsigned 8-bit, matching the
            // legacy integer math.
            (value.round() as i64).rem_euclid(256) as u8
        }
    }
}

impl Effect for Convolution3x3Effect {
    fn set_params(&mut self, params: &ParamBlock) {
        let fallback = params.get_string("matrix", "");
        let kernel_text = params.get_string("kernel", &fallback);
        self.parse_kernel(&kernel_text);
        if params.contains("divisor") {
            self.divisor = params.get_float("divisor", self.divisor);
        } else {
            let sum: f32 = self.kernel.iter().sum();
            self.divisor = if sum.abs() > 1e-6 { sum } else { 1.0 };
        }
        if self.divisor.abs() < 1e-6 {
            self.divisor = 1.0;
        }
        self.bias = params.get_float("bias", self.bias);
        self.clamp_output = params.get_bool("clamp", self.clamp_output);
        self.preserve_alpha = params.get_bool("preserve_alpha", self.preserve_alpha);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        let width = context.width;
        let height = context.height;
        let bytes = context.required_bytes();
        self.scratch.resize(bytes, 0);
        self.scratch.copy_from_slice(&context.framebuffer.data[..bytes]);

        let divisor = if self.divisor.abs() < 1e-6 { 1.0 } else { self.divisor };

        for y in 0..height {
            for x in 0..width {
                let mut accum = [0.0f32; 4];
                for ky in -1i32..=1 {
                    let sy = (y + ky).clamp(0, height - 1);
                    for kx in -1i32..=1 {
                        let sx = (x + kx).clamp(0, width - 1);
                        let weight = self.kernel[((ky + 1) * 3 + (kx + 1)) as usize];
                        let src = ((sy * width + sx) * 4) as usize;
                        accum[0] += weight * f32::from(self.scratch[src]);
                        accum[1] += weight * f32::from(self.scratch[src + 1]);
                        accum[2] += weight * f32::from(self.scratch[src + 2]);
                        if !self.preserve_alpha {
                            accum[3] += weight * f32::from(self.scratch[src + 3]);
                        }
                    }
                }
                let dst = ((y * width + x) * 4) as usize;
                for c in 0..3 {
                    context.framebuffer.data[dst + c] = self.channel_value(accum[c], divisor);
                }
                context.framebuffer.data[dst + 3] = if self.preserve_alpha {
                    self.scratch[dst + 3]
                } else {
                    self.channel_value(accum[3], divisor)
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

    #[test]
    fn identity_kernel_is_identity() {
        let mut rig = TestRig::new(4, 4);
        rig.fill([37, 73, 137, 255]);
        rig.pixels[0] = 200;
        let before = rig.pixels.clone();
        let mut effect = Convolution3x3Effect::default();
        rig.run(&mut effect);
        assert_eq!(rig.pixels, before);
    }

    #[test]
    fn box_kernel_averages_neighborhood() {
        let mut rig = TestRig::new(3, 3);
        rig.fill([90, 90, 90, 255]);
        let mut effect = Convolution3x3Effect::default();
        let mut params = ParamBlock::new();
        params.set_string("kernel", "1 1 1 1 1 1 1 1 1");
        effect.set_params(&params);
        rig.run(&mut effect);
        // uniform input stays uniform under a normalized box
        assert_eq!(rig.pixel(1, 1), [90, 90, 90, 255]);
    }

    #[test]
    fn default_divisor_is_kernel_sum() {
        let mut effect = Convolution3x3Effect::default();
        let mut params = ParamBlock::new();
        params.set_string("kernel", "0 0 0 0 4 0 0 0 0");
        effect.set_params(&params);
        assert_eq!(effect.divisor, 4.0);
    }

    #[test]
    fn unclamped_output_wraps() {
        let mut rig = TestRig::new(2, 2);
        rig.fill([200, 0, 0, 255]);
        let mut effect = Convolution3x3Effect::default();
        let mut params = ParamBlock::new();
        params.set_string("kernel", "0 0 0 0 2 0 0 0 0");
        params.set_float("divisor", 1.0);
        params.set_bool("clamp", false);
        effect.set_params(&params);
        rig.run(&mut effect);
        assert_eq!(rig.pixel(0, 0)[0], (400 % 256) as u8);
    }

    #[test]
    fn bias_shifts_channels() {
        let mut rig = TestRig::new(2, 2);
        rig.fill([10, 10, 10, 255]);
        let mut effect = Convolution3x3Effect::default();
        let mut params = ParamBlock::new();
        params.set_float("bias", 20.0);
        effect.set_params(&params);
        rig.run(&mut effect);
        assert_eq!(rig.pixel(0, 0)[0], 30);
    }
}
