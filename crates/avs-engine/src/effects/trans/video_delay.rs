//! Whole-frame delay line (fixed frame count or beat-synchronized).

use std::collections::VecDeque;

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

const MAX_DELAY_FRAMES: usize = 200;

pub struct VideoDelayEffect {
    enabled: bool,
    use_beats: bool,
    delay_frames: usize,
    ring: VecDeque<Vec<u8>>,
    frame_bytes: usize,
    frames_since_beat: usize,
    beat_interval: usize,
}

impl Default for VideoDelayEffect {
    fn default() -> Self {
        Self {
            enabled: true,
            use_beats: false,
            delay_frames: 10,
            ring: VecDeque::new(),
            frame_bytes: 0,
            frames_since_beat: 0,
            beat_interval: 0,
        }
    }
}

impl Effect for VideoDelayEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        self.enabled = params.get_bool("enabled", self.enabled);
        self.use_beats = params.get_bool("usebeat", self.use_beats);
        let delay = params.get_int("delay", self.delay_frames as i32);
        self.delay_frames = delay.clamp(0, MAX_DELAY_FRAMES as i32) as usize;
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !self.enabled || !context.has_framebuffer() {
            return true;
        }
        let bytes = context.required_bytes();
        if bytes != self.frame_bytes {
            self.ring.clear();
            self.frame_bytes = bytes;
        }

        if context.audio_beat {
            self.beat_interval = self.frames_since_beat.clamp(1, MAX_DELAY_FRAMES);
            self.frames_since_beat = 0;
        }
        self.frames_since_beat = (self.frames_since_beat + 1).min(MAX_DELAY_FRAMES);

        let effective_delay = if self.use_beats {
            self.beat_interval
        } else {
            self.delay_frames
        };

        self.ring.push_back(context.framebuffer.data[..bytes].to_vec());

        if effective_delay > 0 && self.ring.len() > effective_delay {
            while self.ring.len() > effective_delay + 1 {
                self.ring.pop_front();
            }
            if let Some(old) = self.ring.front() {
                context.framebuffer.data[..bytes].copy_from_slice(old);
            }
            self.ring.pop_front();
        } else if effective_delay == 0 {
            self.ring.clear();
        }
        true
    }
}
