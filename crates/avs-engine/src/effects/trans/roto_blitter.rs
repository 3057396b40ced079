//! Pixel-space rotation + uniform zoom around an anchor, fed from history.

use glam::{Mat2, Vec2};

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

use super::frame_warp::FrameWarp;

/// Legacy slider centers: 31 is unit zoom, 32 is zero rotation.
const ZOOM_IDENTITY: i32 = 31;
const ROTATION_IDENTITY: i32 = 32;

fn anchor_from_token(token: &str) -> Option<(f32, f32)> {
    match token {
        "center" => Some((0.5, 0.5)),
        "top_left" | "topleft" => Some((0.0, 0.0)),
        "top_right" | "topright" => Some((1.0, 0.0)),
        "bottom_left" | "bottomleft" => Some((0.0, 1.0)),
        "bottom_right" | "bottomright" => Some((1.0, 1.0)),
        "center_left" | "centerleft" => Some((0.0, 0.5)),
        "center_right" | "centerright" => Some((1.0, 0.5)),
        "top_center" | "topcenter" => Some((0.5, 0.0)),
        "bottom_center" | "bottomcenter" => Some((0.5, 1.0)),
        _ => None,
    }
}

pub struct RotoBlitterEffect {
    zoom_scale: i32,
    rotation_dir: i32,
    anchor: (f32, f32),
    blend: bool,
    subpixel: bool,
    angle_degrees: f32,
    warp: FrameWarp,
}

impl Default for RotoBlitterEffect {
    fn default() -> Self {
        Self {
            zoom_scale: ZOOM_IDENTITY,
            rotation_dir: ROTATION_IDENTITY,
            anchor: (0.5, 0.5),
            blend: false,
            subpixel: true,
            angle_degrees: 0.0,
            warp: FrameWarp::default(),
        }
    }
}

impl RotoBlitterEffect {
    fn zoom_factor(&self) -> f32 {
        (self.zoom_scale + 1) as f32 / 32.0
    }

    fn rotation_step(&self) -> f32 {
        (self.rotation_dir - ROTATION_IDENTITY) as f32
    }
}

impl Effect for RotoBlitterEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("zoom_scale") {
            self.zoom_scale = params.get_int("zoom_scale", self.zoom_scale).clamp(0, 255);
        }
        if params.contains("rot_dir") {
            self.rotation_dir = params.get_int("rot_dir", self.rotation_dir).clamp(0, 64);
        }
        if params.contains("anchor") {
            if let Some(anchor) =
                anchor_from_token(&params.get_string("anchor", "").to_ascii_lowercase())
            {
                self.anchor = anchor;
            }
        }
        if params.contains("anchor_x") || params.contains("anchor_y") {
            self.anchor.0 = params.get_float("anchor_x", self.anchor.0).clamp(0.0, 1.0);
            self.anchor.1 = params.get_float("anchor_y", self.anchor.1).clamp(0.0, 1.0);
        }
        self.blend = params.get_bool("blend", self.blend);
        self.subpixel = params.get_bool("subpixel", self.subpixel);
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !self.warp.prepare(context) {
            return true;
        }
        let width = self.warp.width();
        let height = self.warp.height();

        self.angle_degrees += self.rotation_step();
        let rotation = Mat2::from_angle(-self.angle_degrees.to_radians());
        let inv_zoom = 1.0 / self.zoom_factor().max(0.0001);
        let anchor_px = Vec2::new(
            self.anchor.0 * (width - 1) as f32,
            self.anchor.1 * (height - 1) as f32,
        );

        for py in 0..height {
            for px in 0..width {
                let point = Vec2::new(px as f32, py as f32);
                let source = anchor_px + rotation * ((point - anchor_px) * inv_zoom);
                let sampled = if self.subpixel {
                    self.warp.sample_pixel(source.x, source.y)
                } else {
                    self.warp.sample_nearest(source.x, source.y)
                };
                let index = ((py * width + px) * 4) as usize;
                let dst = &mut context.framebuffer.data[index..index + 4];
                if self.blend {
                    for c in 0..4 {
                        dst[c] = ((u16::from(dst[c]) + u16::from(sampled[c])) / 2) as u8;
                    }
                } else {
                    dst.copy_from_slice(&sampled);
                }
            }
        }

        self.warp.store(context);
        true
    }
}
