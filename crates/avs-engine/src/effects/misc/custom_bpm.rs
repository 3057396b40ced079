//! Rewrites the beat stream seen by downstream effects.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

use super::gating::{BeatGate, GateFlag, GateOptions, GateResult};

const MIN_BPM: f32 = 10.0;
const MAX_BPM: f32 = 480.0;
const MIN_SKIP_INTERVAL: i32 = 1;
const MAX_SKIP_INTERVAL: i32 = 64;
const MAX_SKIP_FIRST: i32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpmMode {
    Passthrough,
    Arbitrary,
    Skip,
    Invert,
}

pub struct CustomBpmEffect {
    enabled: bool,
    mode: BpmMode,
    bpm: f32,
    skip_interval: i32,
    skip_first: i32,

    beats_seen: i32,
    skip_counter: i32,
    accumulator_seconds: f64,
    gate: BeatGate,
    gate_options: GateOptions,
    render_register: Option<usize>,
    flag_register: Option<usize>,
}

impl Default for CustomBpmEffect {
    fn default() -> Self {
        let gate_options = GateOptions {
            enable_on_beat: true,
            hold_frames: 0,
            ..GateOptions::default()
        };
        Self {
            enabled: true,
            mode: BpmMode::Arbitrary,
            bpm: 120.0,
            skip_interval: MIN_SKIP_INTERVAL,
            skip_first: 0,
            beats_seen: 0,
            skip_counter: 0,
            accumulator_seconds: 0.0,
            gate: BeatGate::new(gate_options),
            gate_options,
            render_register: None,
            flag_register: None,
        }
    }
}

fn register_index(params: &ParamBlock, key: &str) -> Option<usize> {
    if !params.contains(key) {
        return None;
    }
    let value = params.get_int(key, 0);
    if (1..=crate::globals::REGISTER_COUNT as i32).contains(&value) {
        Some(value as usize - 1)
    } else {
        None
    }
}

impl CustomBpmEffect {
    fn reset_state(&mut self) {
        self.beats_seen = 0;
        self.skip_counter = 0;
        self.accumulator_seconds = 0.0;
        self.gate.reset();
    }

    fn interval_seconds(&self) -> f64 {
        if self.bpm <= 0.0 {
            0.0
        } else {
            60.0 / f64::from(self.bpm)
        }
    }

    fn write_gate_registers(&self, context: &mut RenderContext<'_>, gate: &GateResult) {
        if let Some(index) = self.render_register {
            context.globals.registers[index] = if gate.render { 1.0 } else { 0.0 };
        }
        if let Some(index) = self.flag_register {
            context.globals.registers[index] = if gate.render {
                match gate.flag {
                    GateFlag::Beat => 1.0,
                    GateFlag::Hold => 2.0,
                    GateFlag::Sticky => 3.0,
                    GateFlag::Off => 0.0,
                }
            } else {
                0.0
            };
        }
    }
}

impl Effect for CustomBpmEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        let enabled = params.get_bool("enabled", self.enabled);

        let has_arbitrary = params.contains("arbitrary");
        let has_skip = params.contains("skip");
        let has_invert = params.contains("invert");
        let mut mode = self.mode;
        if has_arbitrary || has_skip || has_invert {
            mode = BpmMode::Passthrough;
            if params.get_bool("arbitrary", false) {
                mode = BpmMode::Arbitrary;
            } else if params.get_bool("skip", false) {
                mode = BpmMode::Skip;
            } else if params.get_bool("invert", false) {
                mode = BpmMode::Invert;
            }
        }

        let mut bpm = self.bpm;
        if params.contains("bpm") {
            bpm = params.get_float("bpm", bpm);
        } else if params.contains("interval_ms") {
            let interval_ms = params.get_int("interval_ms", 500).max(1);
            bpm = 60_000.0 / interval_ms as f32;
        }
        bpm = bpm.clamp(MIN_BPM, MAX_BPM);

        let mut skip_value = params.get_int("skip_val", self.skip_interval - 1);
        skip_value = skip_value.clamp(0, MAX_SKIP_INTERVAL - 1);
        let skip_interval = (skip_value + 1).clamp(MIN_SKIP_INTERVAL, MAX_SKIP_INTERVAL);

        let skip_first = params
            .get_int("skip_first", self.skip_first)
            .clamp(0, MAX_SKIP_FIRST);

        let mut options = self.gate_options;
        options.enable_on_beat = params.get_bool("gate_enable", options.enable_on_beat);
        options.sticky_toggle = params.get_bool("gate_sticky", options.sticky_toggle);
        options.only_sticky = params.get_bool("gate_only_sticky", options.only_sticky);
        options.hold_frames = params.get_int("gate_hold", options.hold_frames).max(0);

        if let Some(index) = register_index(params, "gate_register") {
            self.render_register = Some(index);
        }
        if let Some(index) = register_index(params, "gate_flag_register") {
            self.flag_register = Some(index);
        }

        let changed = self.enabled != enabled
            || self.mode != mode
            || self.bpm != bpm
            || self.skip_interval != skip_interval
            || self.skip_first != skip_first
            || self.gate_options.enable_on_beat != options.enable_on_beat
            || self.gate_options.sticky_toggle != options.sticky_toggle
            || self.gate_options.only_sticky != options.only_sticky
            || self.gate_options.hold_frames != options.hold_frames;

        self.enabled = enabled;
        self.mode = mode;
        self.bpm = bpm;
        self.skip_interval = skip_interval;
        self.skip_first = skip_first;
        self.gate_options = options;

        if changed {
            self.gate.configure(options);
            self.reset_state();
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !self.enabled {
            return true;
        }
        let base_beat = context.audio.map_or(context.audio_beat, |a| a.beat);

        let mut override_beat = false;
        let mut pulse = base_beat;

        if self.mode == BpmMode::Arbitrary {
            override_beat = true;
            let interval = self.interval_seconds();
            let mut emit = false;
            if interval > 0.0 {
                self.accumulator_seconds += context.delta_seconds.max(0.0);
                if self.accumulator_seconds >= interval {
                    emit = true;
                    self.accumulator_seconds %= interval;
                }
            }
            pulse = emit;
        } else {
            if base_beat {
                self.beats_seen += 1;
            }
            if self.skip_first > 0 && base_beat && self.beats_seen <= self.skip_first {
                // Suppression head: eat the first K beats.
                override_beat = true;
                pulse = false;
            } else if self.mode == BpmMode::Skip {
                override_beat = true;
                pulse = false;
                if base_beat {
                    self.skip_counter += 1;
                    if self.skip_counter >= self.skip_interval {
                        self.skip_counter = 0;
                        pulse = true;
                    }
                }
            } else if self.mode == BpmMode::Invert {
                override_beat = true;
                pulse = !base_beat;
            }
        }

        let gate = self.gate.step(pulse);
        self.write_gate_registers(context, &gate);

        if override_beat {
            context.audio_beat = gate.render;
        } else {
            // Passthrough keeps the gate in sync without rewriting beats.
            context.audio_beat = if gate.flag == GateFlag::Beat {
                true
            } else {
                base_beat
            };
        }
        true
    }
}
