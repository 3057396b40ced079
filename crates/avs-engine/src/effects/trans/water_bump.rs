//! Integer ripple solver displacing the image by its height gradient.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;
use crate::rng::DeterministicRng;

pub struct WaterBumpEffect {
    enabled: bool,
    /// Damping shift applied after the neighbor relaxation, 0..10.
    density: i32,
    depth: i32,
    random_drop: bool,
    drop_position_x: i32,
    drop_position_y: i32,
    drop_radius: i32,
    /// 0 = sine blob, 1 = flat blob.
    method: i32,

    buffer_width: i32,
    buffer_height: i32,
    current_page: usize,
    height_maps: [Vec<i32>; 2],
    scratch: Vec<u8>,
}

impl Default for WaterBumpEffect {
    fn default() -> Self {
        Self {
            enabled: true,
            density: 6,
            depth: 600,
            random_drop: false,
            drop_position_x: 1,
            drop_position_y: 1,
            drop_radius: 40,
            method: 0,
            buffer_width: 0,
            buffer_height: 0,
            current_page: 0,
            height_maps: [Vec::new(), Vec::new()],
            scratch: Vec::new(),
        }
    }
}

impl WaterBumpEffect {
    fn ensure_resources(&mut self, width: i32, height: i32, bytes: usize) {
        let total = (width * height) as usize;
        if self.buffer_width != width
            || self.buffer_height != height
            || self.height_maps[0].len() != total
        {
            self.buffer_width = width;
            self.buffer_height = height;
            self.current_page = 0;
            self.height_maps[0] = vec![0; total];
            self.height_maps[1] = vec![0; total];
        }
        if self.scratch.len() < bytes {
            self.scratch.resize(bytes, 0);
        }
    }

    fn apply_drop(&mut self, beat: bool, rng: &mut DeterministicRng) {
        if !beat || self.depth <= 0 || self.buffer_width <= 2 || self.buffer_height <= 2 {
            return;
        }
        let width = self.buffer_width;
        let height = self.buffer_height;

        let mut radius = self.drop_radius.max(1);
        let mut center_x;
        let mut center_y;
        if self.random_drop {
            let max_dimension = width.max(height);
            radius = ((self.drop_radius * max_dimension) / 100).max(1);
            let min_x = (radius + 1).max(1);
            let max_x = (width - radius - 2).max(min_x);
            let min_y = (radius + 1).max(1);
            let max_y = (height - radius - 2).max(min_y);
            center_x = rng.range_i32(min_x, max_x).clamp(1, width - 2);
            center_y = rng.range_i32(min_y, max_y).clamp(1, height - 2);
        } else {
            center_x = match self.drop_position_x {
                0 => width / 4,
                2 => width * 3 / 4,
                _ => width / 2,
            };
            center_y = match self.drop_position_y {
                0 => height / 4,
                2 => height * 3 / 4,
                _ => height / 2,
            };
            center_x = center_x.clamp(1, (width - 2).max(1));
            center_y = center_y.clamp(1, (height - 2).max(1));
        }

        if self.method == 1 {
            self.apply_height_blob(center_x, center_y, radius, -self.depth);
        } else {
            self.apply_sine_blob(center_x, center_y, radius, -self.depth);
        }
    }

    fn blob_bounds(&self, x: i32, y: i32, radius: i32) -> (i32, i32, i32, i32) {
        let width = self.buffer_width;
        let height = self.buffer_height;
        let mut left = -radius;
        let mut right = radius;
        let mut top = -radius;
        let mut bottom = radius;
        if x - radius < 1 {
            left -= x - radius - 1;
        }
        if y - radius < 1 {
            top -= y - radius - 1;
        }
        if x + radius > width - 1 {
            right -= x + radius - width + 1;
        }
        if y + radius > height - 1 {
            bottom -= y + radius - height + 1;
        }
        (left, right, top, bottom)
    }

    fn apply_sine_blob(&mut self, x: i32, y: i32, radius: i32, height_delta: i32) {
        let width = self.buffer_width;
        let height = self.buffer_height;
        let radius = radius.clamp(1, (width.min(height) - 1).max(1));
        let (left, right, top, bottom) = self.blob_bounds(x, y, radius);
        let radius_squared = radius * radius;
        let scale = 1024.0 / f64::from(radius);
        let length = scale * scale;
        let map = &mut self.height_maps[self.current_page];

        for cy in top..bottom {
            let actual_y = y + cy;
            if actual_y <= 0 || actual_y >= height - 1 {
                continue;
            }
            for cx in left..right {
                let actual_x = x + cx;
                if actual_x <= 0 || actual_x >= width - 1 {
                    continue;
                }
                let square = cy * cy + cx * cx;
                if square >= radius_squared {
                    continue;
                }
                let dist = (f64::from(square) * length).sqrt();
                let scaled = (dist.cos() + 65535.0) * f64::from(height_delta);
                let delta = (scaled as i64 >> 19) as i32;
                if delta == 0 {
                    continue;
                }
                map[(actual_y * width + actual_x) as usize] += delta;
            }
        }
    }

    fn apply_height_blob(&mut self, x: i32, y: i32, radius: i32, height_delta: i32) {
        let width = self.buffer_width;
        let height = self.buffer_height;
        let radius = radius.clamp(1, (width.min(height) - 1).max(1));
        let (left, right, top, bottom) = self.blob_bounds(x, y, radius);
        let radius_squared = radius * radius;
        let map = &mut self.height_maps[self.current_page];

        for cy in top..bottom {
            let actual_y = y + cy;
            if actual_y <= 0 || actual_y >= height - 1 {
                continue;
            }
            for cx in left..right {
                let actual_x = x + cx;
                if actual_x <= 0 || actual_x >= width - 1 {
                    continue;
                }
                if cx * cx + cy * cy >= radius_squared {
                    continue;
                }
                map[(actual_y * width + actual_x) as usize] += height_delta;
            }
        }
    }

    /// One relaxation step: eight-neighbor average minus the other page,
    /// damped by the density shift, with edges pinned to zero.
    fn simulate(&mut self) {
        let width = self.buffer_width;
        let height = self.buffer_height;
        if width <= 0 || height <= 0 {
            return;
        }
        let next_page = 1 - self.current_page;
        let (current, next) = if self.current_page == 0 {
            let (a, b) = self.height_maps.split_at_mut(1);
            (&a[0], &mut b[0])
        } else {
            let (a, b) = self.height_maps.split_at_mut(1);
            (&b[0], &mut a[0])
        };

        if width < 3 || height < 3 {
            next.fill(0);
            self.current_page = next_page;
            return;
        }

        let damping = self.density.clamp(0, 10);
        let w = width as usize;
        for y in 1..(height - 1) as usize {
            let row = y * w;
            for x in 1..(width - 1) as usize {
                let index = row + x;
                let mut value = current[index - w]
                    + current[index + w]
                    + current[index - 1]
                    + current[index + 1]
                    + current[index - w - 1]
                    + current[index - w + 1]
                    + current[index + w - 1]
                    + current[index + w + 1];
                value >>= 2;
                value -= next[index];
                next[index] = value - (value >> damping);
            }
        }

        for x in 0..w {
            next[x] = 0;
            next[(height as usize - 1) * w + x] = 0;
        }
        for y in 0..height as usize {
            next[y * w] = 0;
            next[y * w + w - 1] = 0;
        }

        self.current_page = next_page;
    }
}

impl Effect for WaterBumpEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.enabled = params.get_bool("enabled", self.enabled);
        if params.contains("density") {
            self.density = params.get_int("density", self.density).clamp(0, 10);
        }
        if params.contains("depth") {
            self.depth = params.get_int("depth", self.depth).max(0);
        }
        self.random_drop = params.get_bool("random_drop", self.random_drop);
        if params.contains("drop_position_x") {
            self.drop_position_x = params
                .get_int("drop_position_x", self.drop_position_x)
                .clamp(0, 2);
        }
        if params.contains("drop_position_y") {
            self.drop_position_y = params
                .get_int("drop_position_y", self.drop_position_y)
                .clamp(0, 2);
        }
        if params.contains("drop_radius") {
            self.drop_radius = params.get_int("drop_radius", self.drop_radius).max(1);
        }
        if params.contains("method") {
            self.method = params.get_int("method", self.method).clamp(0, 1);
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !self.enabled || !context.has_framebuffer() {
            return true;
        }
        let width = context.width;
        let height = context.height;
        let bytes = context.required_bytes();
        self.ensure_resources(width, height, bytes);

        self.apply_drop(context.audio_beat, context.rng);

        // Displace each pixel along the local height gradient, sampling a
        // preserved copy of the input frame.
        {
            let map = &self.height_maps[self.current_page];
            let src = &context.framebuffer.data[..bytes];
            let dst = &mut self.scratch[..bytes];
            let w = width as usize;
            for y in 0..height {
                for x in 0..width {
                    let index = y as usize * w + x as usize;
                    let pixel_offset = index * 4;
                    let center = map[index];
                    let right = if x + 1 < width { map[index + 1] } else { center };
                    let down = if y + 1 < height { map[index + w] } else { center };
                    let dx = center - right;
                    let dy = center - down;
                    let sample_x = x + (dx >> 3);
                    let sample_y = y + (dy >> 3);
                    if sample_x < 0 || sample_x >= width || sample_y < 0 || sample_y >= height {
                        dst[pixel_offset..pixel_offset + 4]
                            .copy_from_slice(&src[pixel_offset..pixel_offset + 4]);
                        continue;
                    }
                    let sample_offset = (sample_y as usize * w + sample_x as usize) * 4;
                    dst[pixel_offset..pixel_offset + 4]
                        .copy_from_slice(&src[sample_offset..sample_offset + 4]);
                }
            }
        }
        context.framebuffer.data[..bytes].copy_from_slice(&self.scratch[..bytes]);

        self.simulate();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    #[test]
    fn flat_height_field_is_identity_on_pixels() {
        let mut rig = TestRig::new(8, 8);
        rig.fill([40, 80, 120, 255]);
        rig.pixels[0] = 200;
        let before = rig.pixels.clone();
        let mut effect = WaterBumpEffect::default();
        rig.run(&mut effect);
        assert_eq!(rig.pixels, before);
    }

    #[test]
    fn beat_drop_disturbs_the_height_field() {
        let mut rig = TestRig::new(32, 32);
        let mut effect = WaterBumpEffect::default();
        let mut params = ParamBlock::new();
        params.set_int("depth", 600);
        params.set_int("drop_radius", 6);
        effect.set_params(&params);
        rig.beat = true;
        rig.run(&mut effect);
        let disturbed = effect.height_maps.iter().flatten().any(|&h| h != 0);
        assert!(disturbed);
    }

    #[test]
    fn edges_stay_pinned_to_zero() {
        let mut rig = TestRig::new(16, 16);
        let mut effect = WaterBumpEffect::default();
        rig.beat = true;
        for _ in 0..5 {
            rig.run(&mut effect);
            rig.beat = false;
        }
        let map = &effect.height_maps[effect.current_page];
        for x in 0..16usize {
            assert_eq!(map[x], 0);
            assert_eq!(map[15 * 16 + x], 0);
        }
        for y in 0..16usize {
            assert_eq!(map[y * 16], 0);
            assert_eq!(map[y * 16 + 15], 0);
        }
    }

    #[test]
    fn fixed_drop_evolution_is_reproducible() {
        let run = || {
            let mut rig = TestRig::with_seed(24, 24, 555);
            let mut effect = WaterBumpEffect::default();
            let mut params = ParamBlock::new();
            params.set_bool("random_drop", false);
            params.set_int("depth", 500);
            effect.set_params(&params);
            for frame in 0..6 {
                rig.beat = frame % 3 == 0;
                rig.fill([128, 128, 128, 255]);
                rig.run(&mut effect);
            }
            (rig.pixels.clone(), effect.height_maps)
        };
        let (pixels_a, heights_a) = run();
        let (pixels_b, heights_b) = run();
        assert_eq!(pixels_a, pixels_b);
        assert_eq!(heights_a, heights_b);
    }
}
