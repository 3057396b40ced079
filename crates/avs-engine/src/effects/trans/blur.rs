//! Legacy neighborhood blur (light/medium/heavy).

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurLevel {
    Light,
    Medium,
    Heavy,
}

pub struct BlurEffect {
    enabled: bool,
    level: BlurLevel,
    scratch: Vec<u8>,
}

impl Default for BlurEffect {
    fn default() -> Self {
        Self {
            enabled: true,
            level: BlurLevel::Medium,
            scratch: Vec::new(),
        }
    }
}

impl Effect for BlurEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.enabled = params.get_bool("enabled", self.enabled);
        if params.contains("level") {
            let token = params.get_string("level", "").to_ascii_lowercase();
            self.level = match token.as_str() {
                "light" => BlurLevel::Light,
                "medium" | "normal" => BlurLevel::Medium,
                "heavy" | "more" => BlurLevel::Heavy,
                _ => match params.get_int("level", 1) {
                    0 => BlurLevel::Light,
                    2 => BlurLevel::Heavy,
                    _ => BlurLevel::Medium,
                },
            };
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !self.enabled || !context.has_framebuffer() {
            return true;
        }
        let width = context.width as usize;
        let height = context.height as usize;
        let bytes = width * height * 4;
        self.scratch.resize(bytes, 0);
        self.scratch.copy_from_slice(&context.framebuffer.data[..bytes]);
        let src = &self.scratch;
        let dst = &mut context.framebuffer.data;

        // Center weight by level: heavy spreads the most.
        let center_weight: i32 = match self.level {
            BlurLevel::Light => 4,
            BlurLevel::Medium => 2,
            BlurLevel::Heavy => 0,
        };

        for y in 0..height {
            for x in 0..width {
                let index = (y * width + x) * 4;
                let mut neighbors = [0i32; 3];
                let mut count = 0i32;
                let add = |nx: isize, ny: isize, neighbors: &mut [i32; 3], count: &mut i32| {
                    if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                        return;
                    }
                    let n = (ny as usize * width + nx as usize) * 4;
                    for c in 0..3 {
                        neighbors[c] += i32::from(src[n + c]);
                    }
                    *count += 1;
                };
                add(x as isize - 1, y as isize, &mut neighbors, &mut count);
                add(x as isize + 1, y as isize, &mut neighbors, &mut count);
                add(x as isize, y as isize - 1, &mut neighbors, &mut count);
                add(x as isize, y as isize + 1, &mut neighbors, &mut count);

                let total_weight = count + center_weight;
                for c in 0..3 {
                    let value = (neighbors[c] + i32::from(src[index + c]) * center_weight)
                        / total_weight.max(1);
                    dst[index + c] = value.clamp(0, 255) as u8;
                }
            }
        }
        true
    }
}
