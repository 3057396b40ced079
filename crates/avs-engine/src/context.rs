//! The per-frame record handed to every effect.

use crate::audio::Analysis;
use crate::framebuffer::{BufferSlots, OverlayBands, CHANNELS};
use crate::globals::GlobalState;
use crate::rng::DeterministicRng;

/// Mutable view over the current frame's RGBA bytes.
pub struct FrameView<'a> {
    pub data: &'a mut [u8],
    pub width: i32,
    pub height: i32,
}

impl FrameView<'_> {
    pub fn len_ok(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() >= self.width as usize * self.height as usize * CHANNELS
    }

    #[inline]
    pub fn offset(&self, x: i32, y: i32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }
}

/// Per-frame record owned by the driver. Effects read and write the
/// framebuffer freely, may rewrite `audio_beat` for downstream effects, and
/// observe the RNG in pipeline order.
pub struct RenderContext<'a> {
    pub frame_index: u64,
    pub delta_seconds: f64,
    pub width: i32,
    pub height: i32,
    pub framebuffer: FrameView<'a>,
    /// Previous frame's bytes (read only).
    pub previous: &'a [u8],
    pub audio_spectrum: &'a [f32],
    pub audio: Option<&'a Analysis>,
    pub audio_beat: bool,
    pub rng: &'a mut DeterministicRng,
    pub globals: &'a mut GlobalState,
    pub slots: &'a mut BufferSlots,
    pub overlays: &'a mut OverlayBands,
    /// Name of the attached presentation backend, when one exists.
    pub backend_name: Option<&'a str>,
}

impl RenderContext<'_> {
    /// Total byte size the frame must have; effects bail out for the frame
    /// when the view is smaller.
    pub fn required_bytes(&self) -> usize {
        self.width.max(0) as usize * self.height.max(0) as usize * CHANNELS
    }

    pub fn has_framebuffer(&self) -> bool {
        self.width > 0 && self.height > 0 && self.framebuffer.data.len() >= self.required_bytes()
    }
}
