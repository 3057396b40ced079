//! Double-buffered RGBA frame state: current/previous frames, eight named
//! slots, and three persistent overlay bands.

pub mod backend;
pub mod ops;

pub use ops::{ClearBlendMode, ClearSettings, SlideDirection, SlideSettings, WrapSettings};

pub const CHANNELS: usize = 4;

/// One RGBA8 frame, row-major, top-to-bottom.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub width: i32,
    pub height: i32,
    pub pixels: Vec<u8>,
}

impl Frame {
    fn allocate(&mut self, width: i32, height: i32) {
        self.width = width.max(0);
        self.height = height.max(0);
        let size = self.width as usize * self.height as usize * CHANNELS;
        self.pixels.resize(size, 0);
    }
}

/// Named slots `Buffer0..Buffer7`, each empty or a byte copy of a past frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSlot {
    Buffer0,
    Buffer1,
    Buffer2,
    Buffer3,
    Buffer4,
    Buffer5,
    Buffer6,
    Buffer7,
}

impl BufferSlot {
    pub const COUNT: usize = 8;

    pub fn from_index(index: usize) -> Option<Self> {
        [
            Self::Buffer0,
            Self::Buffer1,
            Self::Buffer2,
            Self::Buffer3,
            Self::Buffer4,
            Self::Buffer5,
            Self::Buffer6,
            Self::Buffer7,
        ]
        .get(index)
        .copied()
    }

    fn index(self) -> usize {
        match self {
            Self::Buffer0 => 0,
            Self::Buffer1 => 1,
            Self::Buffer2 => 2,
            Self::Buffer3 => 3,
            Self::Buffer4 => 4,
            Self::Buffer5 => 5,
            Self::Buffer6 => 6,
            Self::Buffer7 => 7,
        }
    }
}

/// Slot storage, shared with effects through the render context.
#[derive(Debug, Default)]
pub struct BufferSlots {
    slots: [Option<Vec<u8>>; BufferSlot::COUNT],
}

impl BufferSlots {
    pub fn clear_all(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    pub fn save(&mut self, slot: BufferSlot, pixels: &[u8]) {
        self.slots[slot.index()] = Some(pixels.to_vec());
    }

    /// Byte copy back into `pixels`. A missing or size-mismatched slot is a
    /// no-op; the mismatch also invalidates the slot.
    pub fn restore(&mut self, slot: BufferSlot, pixels: &mut [u8]) {
        let idx = slot.index();
        match &self.slots[idx] {
            Some(stored) if stored.len() == pixels.len() => {
                pixels.copy_from_slice(stored);
            }
            Some(_) => {
                self.slots[idx] = None;
            }
            None => {}
        }
    }

    pub fn is_saved(&self, slot: BufferSlot) -> bool {
        self.slots[slot.index()].is_some()
    }
}

/// Which overlay band a persist effect schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayChannel {
    Title,
    Text1,
    Text2,
}

impl OverlayChannel {
    fn index(self) -> usize {
        match self {
            Self::Title => 0,
            Self::Text1 => 1,
            Self::Text2 => 2,
        }
    }

    /// Row the band bleeds over.
    fn row(self) -> i32 {
        self.index() as i32
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Overlay {
    duration: i32,
    remaining: i32,
    color: [u8; 3],
}

/// Three persistent one-row overlay bands with linearly decaying strength.
#[derive(Debug, Default)]
pub struct OverlayBands {
    overlays: [Overlay; 3],
}

impl OverlayBands {
    pub fn activate(&mut self, channel: OverlayChannel, duration_frames: i32, color: [u8; 3]) {
        let overlay = &mut self.overlays[channel.index()];
        overlay.duration = duration_frames.max(0);
        overlay.remaining = overlay.duration;
        overlay.color = color;
    }

    pub fn is_active(&self, channel: OverlayChannel) -> bool {
        let overlay = self.overlays[channel.index()];
        overlay.remaining > 0 && overlay.duration > 0
    }

    pub fn remaining(&self, channel: OverlayChannel) -> i32 {
        self.overlays[channel.index()].remaining
    }

    pub fn duration(&self, channel: OverlayChannel) -> i32 {
        self.overlays[channel.index()].duration
    }

    pub fn clear_all(&mut self) {
        self.overlays = [Overlay::default(); 3];
    }

    /// Blend every active band into the frame and decrement its counter;
    /// a band deactivates the frame after `remaining` hits zero.
    pub fn apply_and_decay(&mut self, pixels: &mut [u8], width: i32, height: i32) {
        for (index, overlay) in self.overlays.iter_mut().enumerate() {
            if overlay.remaining <= 0 || overlay.duration <= 0 {
                continue;
            }
            let row = OverlayChannel::row(match index {
                0 => OverlayChannel::Title,
                1 => OverlayChannel::Text1,
                _ => OverlayChannel::Text2,
            });
            if row < height {
                let strength = overlay.remaining as f32 / overlay.duration.max(1) as f32;
                let row_start = row as usize * width as usize * CHANNELS;
                for x in 0..width as usize {
                    let px = &mut pixels[row_start + x * CHANNELS..row_start + x * CHANNELS + 4];
                    for c in 0..3 {
                        let dst = f32::from(px[c]);
                        let src = f32::from(overlay.color[c]);
                        let blended = dst * (1.0 - strength) + src * strength;
                        px[c] = blended.round().clamp(0.0, 255.0) as u8;
                    }
                    px[3] = 255;
                }
            }
            overlay.remaining = (overlay.remaining - 1).max(0);
            if overlay.remaining == 0 {
                overlay.duration = 0;
            }
        }
    }
}

/// Split borrows over the frame state handed to the per-frame render context.
pub struct FrameParts<'a> {
    pub current: &'a mut Frame,
    pub previous: &'a Frame,
    pub slots: &'a mut BufferSlots,
    pub overlays: &'a mut OverlayBands,
}

/// The double-buffered frame set plus slots and overlay bands.
///
/// Invariant: `current` and `previous` always share dimensions; slots either
/// match that size or are dropped on restore.
pub struct Framebuffers {
    frames: [Frame; 2],
    current: usize,
    slots: BufferSlots,
    overlays: OverlayBands,
    frame_index: u64,
}

impl Framebuffers {
    pub fn new(width: i32, height: i32) -> Self {
        let mut fb = Self {
            frames: [Frame::default(), Frame::default()],
            current: 0,
            slots: BufferSlots::default(),
            overlays: OverlayBands::default(),
            frame_index: 0,
        };
        fb.resize(width, height);
        fb
    }

    pub fn width(&self) -> i32 {
        self.frames[self.current].width
    }

    pub fn height(&self) -> i32 {
        self.frames[self.current].height
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn current(&self) -> &Frame {
        &self.frames[self.current]
    }

    pub fn current_mut(&mut self) -> &mut Frame {
        &mut self.frames[self.current]
    }

    pub fn previous(&self) -> &Frame {
        &self.frames[1 - self.current]
    }

    pub fn slots_mut(&mut self) -> &mut BufferSlots {
        &mut self.slots
    }

    pub fn overlays_mut(&mut self) -> &mut OverlayBands {
        &mut self.overlays
    }

    /// Reallocate both frames, clear all slots and overlays, restart at
    /// frame 0.
    pub fn resize(&mut self, width: i32, height: i32) {
        for frame in &mut self.frames {
            frame.allocate(width, height);
            frame.pixels.fill(0);
        }
        self.slots.clear_all();
        self.overlays.clear_all();
        self.current = 0;
        self.frame_index = 0;
    }

    /// Swap roles and seed the new current frame with the previous frame's
    /// bytes.
    pub fn begin_frame(&mut self) {
        self.current = 1 - self.current;
        let (width, height) = {
            let prev = self.previous();
            (prev.width, prev.height)
        };
        if self.frames[self.current].width != width || self.frames[self.current].height != height {
            self.frames[self.current].allocate(width, height);
        }
        let (cur, prev) = self.split_frames();
        cur.pixels.copy_from_slice(&prev.pixels);
    }

    /// Composite overlay bands and advance the frame counter.
    pub fn finish_frame(&mut self) {
        let (width, height) = (self.width(), self.height());
        let current = &mut self.frames[self.current];
        self.overlays
            .apply_and_decay(&mut current.pixels, width, height);
        self.frame_index += 1;
    }

    fn split_frames(&mut self) -> (&mut Frame, &Frame) {
        let (left, right) = self.frames.split_at_mut(1);
        if self.current == 0 {
            (&mut left[0], &right[0])
        } else {
            (&mut right[0], &left[0])
        }
    }

    /// Borrow current (mutable), previous (shared), slots and overlays at
    /// once for building a render context.
    pub fn parts(&mut self) -> FrameParts<'_> {
        let current_index = self.current;
        let Framebuffers {
            frames,
            slots,
            overlays,
            ..
        } = self;
        let (left, right) = frames.split_at_mut(1);
        let (current, previous) = if current_index == 0 {
            (&mut left[0], &right[0])
        } else {
            (&mut right[0], &left[0])
        };
        FrameParts {
            current,
            previous,
            slots,
            overlays,
        }
    }

    pub fn clear(&mut self, settings: &ClearSettings) {
        if settings.first_frame_only && self.frame_index > 0 {
            return;
        }
        let frame = &mut self.frames[self.current];
        ops::clear(&mut frame.pixels, settings);
    }

    pub fn save(&mut self, slot: BufferSlot) {
        let pixels = self.frames[self.current].pixels.clone();
        self.slots.save(slot, &pixels);
    }

    pub fn restore(&mut self, slot: BufferSlot) {
        let frame = &mut self.frames[self.current];
        self.slots.restore(slot, &mut frame.pixels);
    }

    pub fn wrap(&mut self, settings: &WrapSettings) {
        let (cur, prev) = self.split_frames();
        ops::wrap(
            &mut cur.pixels,
            &prev.pixels,
            cur.width,
            cur.height,
            settings,
        );
    }

    pub fn slide_in(&mut self, settings: &SlideSettings) {
        let (cur, prev) = self.split_frames();
        ops::slide(
            &mut cur.pixels,
            &prev.pixels,
            cur.width,
            cur.height,
            settings,
            false,
        );
    }

    pub fn slide_out(&mut self, settings: &SlideSettings) {
        let (cur, prev) = self.split_frames();
        ops::slide(
            &mut cur.pixels,
            &prev.pixels,
            cur.width,
            cur.height,
            settings,
            true,
        );
    }

    pub fn transition(&mut self, progress: f32) {
        let (cur, prev) = self.split_frames();
        ops::transition(&mut cur.pixels, &prev.pixels, progress);
    }

    pub fn activate_overlay(
        &mut self,
        channel: OverlayChannel,
        duration_frames: i32,
        color: [u8; 3],
    ) {
        self.overlays.activate(channel, duration_frames, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_pattern(frame: &mut Frame) {
        for (i, px) in frame.pixels.chunks_exact_mut(4).enumerate() {
            px[0] = (i * 3) as u8;
            px[1] = (i * 5) as u8;
            px[2] = (i * 7) as u8;
            px[3] = 255;
        }
    }

    #[test]
    fn begin_then_finish_round_trips() {
        let mut fb = Framebuffers::new(8, 6);
        fb.begin_frame();
        fill_pattern(fb.current_mut());
        let rendered = fb.current().pixels.clone();
        fb.finish_frame();
        fb.begin_frame();
        assert_eq!(fb.previous().pixels, rendered);
        assert_eq!(fb.current().pixels, rendered);
    }

    #[test]
    fn save_restore_is_identity() {
        let mut fb = Framebuffers::new(4, 4);
        fill_pattern(fb.current_mut());
        let before = fb.current().pixels.clone();
        fb.save(BufferSlot::Buffer3);
        fb.current_mut().pixels.fill(9);
        fb.restore(BufferSlot::Buffer3);
        assert_eq!(fb.current().pixels, before);
    }

    #[test]
    fn restore_of_empty_slot_is_noop() {
        let mut fb = Framebuffers::new(4, 4);
        fill_pattern(fb.current_mut());
        let before = fb.current().pixels.clone();
        fb.restore(BufferSlot::Buffer0);
        assert_eq!(fb.current().pixels, before);
    }

    #[test]
    fn restore_after_resize_is_noop() {
        let mut fb = Framebuffers::new(4, 4);
        fb.save(BufferSlot::Buffer1);
        fb.resize(6, 6);
        // resize clears slots entirely
        assert!(!fb.slots_mut().is_saved(BufferSlot::Buffer1));
    }

    #[test]
    fn clear_first_frame_only_respects_frame_index() {
        let mut fb = Framebuffers::new(2, 2);
        let settings = ClearSettings {
            argb: 0xFF00_FF00,
            blend: ClearBlendMode::Replace,
            first_frame_only: true,
        };
        fb.clear(&settings);
        assert_eq!(fb.current().pixels[1], 255); // green replaced
        fb.finish_frame();
        fb.begin_frame();
        fb.current_mut().pixels.fill(0);
        fb.clear(&settings);
        assert_eq!(fb.current().pixels[1], 0); // no-op after frame 0
    }

    #[test]
    fn overlay_decays_and_deactivates() {
        let mut fb = Framebuffers::new(4, 4);
        fb.activate_overlay(OverlayChannel::Title, 2, [255, 0, 0]);
        assert!(fb.overlays_mut().is_active(OverlayChannel::Title));

        fb.finish_frame(); // remaining 2 -> 1
        let overlays = fb.overlays_mut();
        assert!(overlays.is_active(OverlayChannel::Title));
        assert!(overlays.remaining(OverlayChannel::Title) <= overlays.duration(OverlayChannel::Title));

        fb.finish_frame(); // remaining 1 -> 0, deactivates
        assert!(!fb.overlays_mut().is_active(OverlayChannel::Title));
    }

    #[test]
    fn wrap_translates_with_modulo() {
        let mut fb = Framebuffers::new(3, 1);
        fb.begin_frame();
        // previous row after swap is all zeros; paint previous via another cycle
        fb.current_mut().pixels[0..4].copy_from_slice(&[10, 0, 0, 255]);
        fb.current_mut().pixels[4..8].copy_from_slice(&[20, 0, 0, 255]);
        fb.current_mut().pixels[8..12].copy_from_slice(&[30, 0, 0, 255]);
        fb.finish_frame();
        fb.begin_frame();
        fb.wrap(&WrapSettings { offset_x: 1, offset_y: 0 });
        let px = &fb.current().pixels;
        assert_eq!(px[0], 20);
        assert_eq!(px[4], 30);
        assert_eq!(px[8], 10);
    }

    #[test]
    fn slide_in_fills_out_of_bounds_with_black() {
        let mut fb = Framebuffers::new(2, 1);
        fb.begin_frame();
        fb.current_mut().pixels[0..4].copy_from_slice(&[10, 0, 0, 255]);
        fb.current_mut().pixels[4..8].copy_from_slice(&[20, 0, 0, 255]);
        fb.finish_frame();
        fb.begin_frame();
        fb.slide_in(&SlideSettings {
            direction: SlideDirection::Left,
            amount: 1,
        });
        let px = &fb.current().pixels;
        assert_eq!(&px[0..4], &[0, 0, 0, 0]);
        assert_eq!(px[4], 10);
    }

    #[test]
    fn transition_lerps_between_frames() {
        let mut fb = Framebuffers::new(1, 1);
        fb.begin_frame();
        fb.current_mut().pixels.copy_from_slice(&[200, 0, 0, 255]);
        fb.finish_frame();
        fb.begin_frame();
        fb.current_mut().pixels.copy_from_slice(&[0, 0, 0, 255]);
        fb.transition(0.5);
        assert_eq!(fb.current().pixels[0], 100);
    }
}
