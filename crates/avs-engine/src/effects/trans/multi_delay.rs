//! Six shared delay slots with store/fetch render modes.
//!
//! The slot ring lives in process-wide storage so a Store instance and a
//! Fetch instance placed at different pipeline positions exchange frames,
//! matching the legacy effect's shared global buffers.

use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

pub const SLOT_COUNT: usize = 6;
const MAX_DELAY_FRAMES: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderMode {
    Off,
    Store,
    Fetch,
}

#[derive(Default)]
struct Slot {
    delay_frames: usize,
    use_beat: bool,
    ring: VecDeque<Vec<u8>>,
    frame_bytes: usize,
    last_effective_delay: usize,
}

struct SharedState {
    slots: [Slot; SLOT_COUNT],
    frames_since_beat: usize,
    beat_interval: usize,
    last_seen_frame: u64,
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            slots: Default::default(),
            frames_since_beat: 0,
            beat_interval: 0,
            last_seen_frame: u64::MAX,
        }
    }
}

fn shared() -> &'static Mutex<SharedState> {
    static STATE: OnceLock<Mutex<SharedState>> = OnceLock::new();
    STATE.get_or_init(|| Mutex::new(SharedState::default()))
}

/// Reset all shared slots (used between drivers and by tests).
pub fn reset_shared_state() {
    let mut state = shared().lock().expect("multi-delay mutex poisoned");
    *state = SharedState::default();
}

pub struct MultiDelayEffect {
    mode: RenderMode,
    buffer: usize,
}

impl Default for MultiDelayEffect {
    fn default() -> Self {
        Self {
            mode: RenderMode::Off,
            buffer: 0,
        }
    }
}

impl Effect for MultiDelayEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        if params.contains("mode") {
            self.mode = match params.get_int("mode", 0) {
                1 => RenderMode::Store,
                2 => RenderMode::Fetch,
                _ => RenderMode::Off,
            };
        }
        if params.contains("buffer") {
            self.buffer = params.get_int("buffer", self.buffer as i32).clamp(0, 5) as usize;
        }
        let mut state = shared().lock().expect("multi-delay mutex poisoned");
        for slot_index in 0..SLOT_COUNT {
            let delay_key = format!("delay{slot_index}");
            let beat_key = format!("usebeat{slot_index}");
            if params.contains(&delay_key) {
                let frames = params.get_int(&delay_key, 0).clamp(0, MAX_DELAY_FRAMES as i32);
                let slot = &mut state.slots[slot_index];
                if slot.delay_frames != frames as usize {
                    slot.delay_frames = frames as usize;
                    slot.ring.clear();
                }
            }
            if params.contains(&beat_key) {
                let use_beat = params.get_bool(&beat_key, false);
                let slot = &mut state.slots[slot_index];
                if slot.use_beat != use_beat {
                    slot.use_beat = use_beat;
                    slot.ring.clear();
                }
            }
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if self.mode == RenderMode::Off || !context.has_framebuffer() {
            return true;
        }
        let bytes = context.required_bytes();
        let mut state = shared().lock().expect("multi-delay mutex poisoned");

        // Beat bookkeeping once per frame regardless of instance count.
        if state.last_seen_frame != context.frame_index {
            state.last_seen_frame = context.frame_index;
            if context.audio_beat {
                state.beat_interval = state.frames_since_beat.min(MAX_DELAY_FRAMES);
                state.frames_since_beat = 0;
            }
            state.frames_since_beat = (state.frames_since_beat + 1).min(MAX_DELAY_FRAMES);
        }
        let beat_interval = state.beat_interval;

        let slot = &mut state.slots[self.buffer];
        if slot.frame_bytes != bytes {
            slot.frame_bytes = bytes;
            slot.ring.clear();
        }
        let delay = if slot.use_beat {
            beat_interval
        } else {
            slot.delay_frames
        };
        // A new delay length restarts the ring; stale frames from the old
        // cadence must not leak through.
        if slot.last_effective_delay != delay {
            slot.last_effective_delay = delay;
            slot.ring.clear();
        }

        match self.mode {
            RenderMode::Store => {
                if delay == 0 {
                    slot.ring.clear();
                    return true;
                }
                slot.ring.push_back(context.framebuffer.data[..bytes].to_vec());
                while slot.ring.len() > delay + 1 {
                    slot.ring.pop_front();
                }
            }
            RenderMode::Fetch => {
                if delay == 0 {
                    return true;
                }
                if slot.ring.len() > delay {
                    if let Some(oldest) = slot.ring.pop_front() {
                        if oldest.len() == bytes {
                            context.framebuffer.data[..bytes].copy_from_slice(&oldest);
                        }
                    }
                } else {
                    context.framebuffer.data[..bytes].fill(0);
                }
            }
            RenderMode::Off => {}
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    // The slot ring is process-shared; serialize the tests that touch it.
    fn test_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: Mutex<()> = Mutex::new(());
        LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn frame_color(frame: u8) -> [u8; 4] {
        [
            frame.wrapping_mul(17).wrapping_add(5),
            frame.wrapping_mul(31).wrapping_add(11),
            frame.wrapping_mul(47).wrapping_add(19),
            255,
        ]
    }

    fn make_pair(delay: i32, use_beat: bool, buffer: i32) -> (MultiDelayEffect, MultiDelayEffect) {
        reset_shared_state();
        let mut store = MultiDelayEffect::default();
        let mut fetch = MultiDelayEffect::default();

        let mut shared_params = ParamBlock::new();
        shared_params.set_int(&format!("delay{buffer}"), delay);
        shared_params.set_bool(&format!("usebeat{buffer}"), use_beat);
        store.set_params(&shared_params);
        fetch.set_params(&shared_params);

        let mut store_params = ParamBlock::new();
        store_params.set_int("mode", 1);
        store_params.set_int("buffer", buffer);
        store.set_params(&store_params);

        let mut fetch_params = ParamBlock::new();
        fetch_params.set_int("mode", 2);
        fetch_params.set_int("buffer", buffer);
        fetch.set_params(&fetch_params);

        (store, fetch)
    }

    #[test]
    fn store_then_fetch_delays_by_fixed_frames() {
        let _guard = test_lock();
        let (mut store, mut fetch) = make_pair(2, false, 0);
        let mut rig = TestRig::new(4, 1);
        let zero = [0u8, 0, 0, 0];
        let mut outputs = Vec::new();
        for frame in 0..6u8 {
            rig.fill(frame_color(frame));
            rig.run_same_frame(&mut store);
            rig.run(&mut fetch);
            outputs.push(rig.pixel(0, 0));
        }
        assert_eq!(outputs[0], zero);
        assert_eq!(outputs[1], zero);
        assert_eq!(outputs[2], frame_color(0));
        assert_eq!(outputs[3], frame_color(1));
        assert_eq!(outputs[4], frame_color(2));
        assert_eq!(outputs[5], frame_color(3));
    }

    #[test]
    fn beat_synchronized_delay_tracks_inter_beat_interval() {
        let _guard = test_lock();
        let (mut store, mut fetch) = make_pair(0, true, 1);
        let mut rig = TestRig::new(4, 1);
        let zero = [0u8, 0, 0, 0];
        let mut outputs = Vec::new();
        for frame in 0..8u8 {
            rig.beat = frame % 3 == 0;
            rig.fill(frame_color(frame));
            rig.run_same_frame(&mut store);
            rig.run(&mut fetch);
            outputs.push(rig.pixel(0, 0));
        }
        // Interval is 0 until the second beat measures three frames, so the
        // first three frames pass through, then the ring refills.
        assert_eq!(outputs[0], frame_color(0));
        assert_eq!(outputs[1], frame_color(1));
        assert_eq!(outputs[2], frame_color(2));
        assert_eq!(outputs[3], zero);
        assert_eq!(outputs[4], zero);
        assert_eq!(outputs[5], zero);
        assert_eq!(outputs[6], frame_color(3));
        assert_eq!(outputs[7], frame_color(4));
    }

    #[test]
    fn frame_size_change_clears_the_ring() {
        let _guard = test_lock();
        let (mut store, mut fetch) = make_pair(2, false, 2);
        let mut rig = TestRig::new(4, 1);
        let mut outputs = Vec::new();
        for frame in 0..3u8 {
            rig.fill(frame_color(frame));
            rig.run_same_frame(&mut store);
            rig.run(&mut fetch);
            outputs.push(rig.pixel(0, 0));
        }
        assert_eq!(outputs[2], frame_color(0));

        let mut small = TestRig::new(2, 2);
        small.frame_index = 3;
        for frame in 3..5u8 {
            small.fill(frame_color(frame));
            small.run_same_frame(&mut store);
            small.run(&mut fetch);
            assert_eq!(small.pixel(0, 0), [0, 0, 0, 0], "frame {frame}");
        }
    }
}
