//! Beat-pulse gating: the reusable `BeatGate` state machine and the visual
//! gating-log effect built on top of it.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateFlag {
    Off,
    Beat,
    Hold,
    Sticky,
}

#[derive(Debug, Clone, Copy)]
pub struct GateOptions {
    pub enable_on_beat: bool,
    pub sticky_toggle: bool,
    pub only_sticky: bool,
    pub hold_frames: i32,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self {
            enable_on_beat: true,
            sticky_toggle: false,
            only_sticky: false,
            hold_frames: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GateResult {
    pub render: bool,
    pub flag: GateFlag,
}

/// Converts beat pulses into a render-enable signal with hold and sticky
/// behaviors. The transition table:
///
/// | State  | pulse                                  | no pulse                      |
/// |--------|----------------------------------------|-------------------------------|
/// | Off    | Beat (latch when sticky)               | Off                           |
/// | Beat   | Beat (reset hold; Sticky when latched) | Hold if hold counter else Off |
/// | Hold   | Beat                                   | Hold, counting down to Off    |
/// | Sticky | Off (toggle releases the latch)        | Sticky                        |
#[derive(Debug)]
pub struct BeatGate {
    options: GateOptions,
    state: GateFlag,
    hold_counter: i32,
    latched: bool,
}

impl Default for BeatGate {
    fn default() -> Self {
        Self {
            options: GateOptions::default(),
            state: GateFlag::Off,
            hold_counter: 0,
            latched: false,
        }
    }
}

impl BeatGate {
    pub fn new(options: GateOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn configure(&mut self, options: GateOptions) {
        self.options = options;
    }

    pub fn reset(&mut self) {
        self.state = GateFlag::Off;
        self.hold_counter = 0;
        self.latched = false;
    }

    pub fn state(&self) -> GateFlag {
        self.state
    }

    pub fn step(&mut self, pulse: bool) -> GateResult {
        let pulse = pulse && self.options.enable_on_beat;
        self.state = match self.state {
            GateFlag::Off => {
                if pulse {
                    self.hold_counter = self.options.hold_frames;
                    if self.options.sticky_toggle {
                        self.latched = true;
                    }
                    GateFlag::Beat
                } else {
                    GateFlag::Off
                }
            }
            GateFlag::Beat => {
                if pulse {
                    if self.options.sticky_toggle && self.latched {
                        GateFlag::Sticky
                    } else {
                        self.hold_counter = self.options.hold_frames;
                        GateFlag::Beat
                    }
                } else if self.hold_counter > 0 {
                    GateFlag::Hold
                } else {
                    GateFlag::Off
                }
            }
            GateFlag::Hold => {
                if pulse {
                    GateFlag::Beat
                } else {
                    self.hold_counter -= 1;
                    if self.hold_counter <= 0 {
                        GateFlag::Off
                    } else {
                        GateFlag::Hold
                    }
                }
            }
            GateFlag::Sticky => {
                if pulse {
                    self.latched = false;
                    GateFlag::Off
                } else {
                    GateFlag::Sticky
                }
            }
        };

        let render = if self.options.only_sticky {
            self.state == GateFlag::Sticky
        } else {
            matches!(self.state, GateFlag::Beat | GateFlag::Hold | GateFlag::Sticky)
        };
        GateResult {
            render,
            flag: self.state,
        }
    }
}

const HISTORY_LIMIT: usize = 2048;

fn color_for_flag(flag: GateFlag) -> [u8; 3] {
    match flag {
        GateFlag::Off => [90, 20, 20],
        GateFlag::Beat => [245, 210, 40],
        GateFlag::Hold => [20, 170, 60],
        GateFlag::Sticky => [140, 70, 190],
    }
}

/// `Misc / Beat Gating`: drives a gate from the beat stream, optionally
/// exports render/flag registers, and paints a striped history log.
pub struct BeatGatingEffect {
    gate: BeatGate,
    options: GateOptions,
    log_height: i32,
    render_register: Option<usize>,
    flag_register: Option<usize>,
    history: Vec<GateFlag>,
}

impl Default for BeatGatingEffect {
    fn default() -> Self {
        Self {
            gate: BeatGate::default(),
            options: GateOptions::default(),
            log_height: 4,
            render_register: None,
            flag_register: None,
            history: Vec::new(),
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

impl Effect for BeatGatingEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        let mut options = self.options;
        options.enable_on_beat = params.get_bool("onbeat", options.enable_on_beat);
        options.sticky_toggle = params.get_bool("stick", options.sticky_toggle);
        options.only_sticky = params.get_bool("only_sticky", options.only_sticky);
        options.hold_frames = params.get_int("hold", options.hold_frames).max(0);
        self.log_height = params.get_int("log_height", self.log_height).clamp(0, 64);
        if let Some(index) = register_index(params, "render_register") {
            self.render_register = Some(index);
        }
        if let Some(index) = register_index(params, "flag_register") {
            self.flag_register = Some(index);
        }

        let changed = options.enable_on_beat != self.options.enable_on_beat
            || options.sticky_toggle != self.options.sticky_toggle
            || options.only_sticky != self.options.only_sticky
            || options.hold_frames != self.options.hold_frames;
        if changed {
            self.options = options;
            self.gate.configure(options);
            self.gate.reset();
            self.history.clear();
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        let result = self.gate.step(context.audio_beat);

        if let Some(index) = self.render_register {
            context.globals.registers[index] = if result.render { 1.0 } else { 0.0 };
        }
        if let Some(index) = self.flag_register {
            context.globals.registers[index] = match result.flag {
                GateFlag::Off => 0.0,
                GateFlag::Beat => 1.0,
                GateFlag::Hold => 2.0,
                GateFlag::Sticky => 3.0,
            };
        }

        self.history.push(result.flag);
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }

        if !context.has_framebuffer() {
            return true;
        }
        let rows = self.log_height.min(context.height);
        if rows <= 0 {
            return true;
        }
        let width = context.width as usize;
        let available = width.min(self.history.len());
        let padding = width - available;
        for y in 0..rows {
            let row_start = y as usize * width * 4;
            for x in 0..width {
                let flag = if x < padding {
                    GateFlag::Off
                } else {
                    self.history[self.history.len() - available + (x - padding)]
                };
                let color = color_for_flag(flag);
                let offset = row_start + x * 4;
                context.framebuffer.data[offset..offset + 3].copy_from_slice(&color);
                context.framebuffer.data[offset + 3] = 255;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    fn gate_with(
        enable_on_beat: bool,
        sticky_toggle: bool,
        only_sticky: bool,
        hold_frames: i32,
    ) -> BeatGate {
        BeatGate::new(GateOptions {
            enable_on_beat,
            sticky_toggle,
            only_sticky,
            hold_frames,
        })
    }

    #[test]
    fn off_state_transitions() {
        let mut gate = gate_with(true, false, false, 2);
        assert_eq!(gate.step(false).flag, GateFlag::Off);
        let result = gate.step(true);
        assert_eq!(result.flag, GateFlag::Beat);
        assert!(result.render);
    }

    #[test]
    fn beat_drops_to_hold_then_off() {
        let mut gate = gate_with(true, false, false, 2);
        gate.step(true);
        assert_eq!(gate.step(false).flag, GateFlag::Hold);
        assert_eq!(gate.step(false).flag, GateFlag::Hold);
        assert_eq!(gate.step(false).flag, GateFlag::Off);
    }

    #[test]
    fn beat_without_hold_goes_straight_off() {
        let mut gate = gate_with(true, false, false, 0);
        gate.step(true);
        let result = gate.step(false);
        assert_eq!(result.flag, GateFlag::Off);
        assert!(!result.render);
    }

    #[test]
    fn hold_repulse_returns_to_beat() {
        let mut gate = gate_with(true, false, false, 3);
        gate.step(true);
        gate.step(false);
        assert_eq!(gate.step(true).flag, GateFlag::Beat);
    }

    #[test]
    fn sticky_latches_and_releases() {
        let mut gate = gate_with(true, true, false, 0);
        gate.step(true); // Off -> Beat, latched
        assert_eq!(gate.step(true).flag, GateFlag::Sticky);
        // Sticky persists without pulses
        assert_eq!(gate.step(false).flag, GateFlag::Sticky);
        assert!(gate.step(false).render);
        // next pulse toggles off
        let result = gate.step(true);
        assert_eq!(result.flag, GateFlag::Off);
        assert!(!result.render);
    }

    #[test]
    fn only_sticky_gates_render_to_sticky_state() {
        let mut gate = gate_with(true, true, true, 2);
        let beat = gate.step(true);
        assert_eq!(beat.flag, GateFlag::Beat);
        assert!(!beat.render);
        let sticky = gate.step(true);
        assert_eq!(sticky.flag, GateFlag::Sticky);
        assert!(sticky.render);
    }

    #[test]
    fn exhaustive_table_property() {
        // Every (state, pulse, options) tuple must match the documented
        // transition table.
        let option_grid = [
            (true, false, false, 0),
            (true, false, false, 3),
            (true, true, false, 2),
            (true, true, true, 1),
        ];
        for (enable, sticky, only, hold) in option_grid {
            for seed_pulses in 0u32..16 {
                let mut gate = gate_with(enable, sticky, only, hold);
                let mut model_state = GateFlag::Off;
                let mut model_hold = 0i32;
                let mut model_latched = false;
                for step in 0..8 {
                    let pulse = (seed_pulses >> (step % 4)) & 1 == 1;
                    let result = gate.step(pulse);
                    // reference model straight from the table
                    model_state = match model_state {
                        GateFlag::Off => {
                            if pulse {
                                model_hold = hold;
                                if sticky {
                                    model_latched = true;
                                }
                                GateFlag::Beat
                            } else {
                                GateFlag::Off
                            }
                        }
                        GateFlag::Beat => {
                            if pulse {
                                if sticky && model_latched {
                                    GateFlag::Sticky
                                } else {
                                    model_hold = hold;
                                    GateFlag::Beat
                                }
                            } else if model_hold > 0 {
                                GateFlag::Hold
                            } else {
                                GateFlag::Off
                            }
                        }
                        GateFlag::Hold => {
                            if pulse {
                                GateFlag::Beat
                            } else {
                                model_hold -= 1;
                                if model_hold <= 0 {
                                    GateFlag::Off
                                } else {
                                    GateFlag::Hold
                                }
                            }
                        }
                        GateFlag::Sticky => {
                            if pulse {
                                model_latched = false;
                                GateFlag::Off
                            } else {
                                GateFlag::Sticky
                            }
                        }
                    };
                    assert_eq!(result.flag, model_state);
                    let expected_render = if only {
                        model_state == GateFlag::Sticky
                    } else {
                        matches!(
                            model_state,
                            GateFlag::Beat | GateFlag::Hold | GateFlag::Sticky
                        )
                    };
                    assert_eq!(result.render, expected_render);
                }
            }
        }
    }

    #[test]
    fn gating_effect_writes_registers_and_log() {
        let mut rig = TestRig::new(16, 8);
        let mut effect = BeatGatingEffect::default();
        let mut params = ParamBlock::new();
        params.set_int("render_register", 5);
        params.set_int("flag_register", 6);
        params.set_int("hold", 2);
        effect.set_params(&params);

        rig.beat = true;
        rig.run(&mut effect);
        assert_eq!(rig.globals.registers[4], 1.0);
        assert_eq!(rig.globals.registers[5], 1.0); // Beat
        // log row painted
        assert_ne!(rig.pixel(15, 0), [0, 0, 0, 0]);

        rig.beat = false;
        rig.run(&mut effect);
        assert_eq!(rig.globals.registers[5], 2.0); // Hold
    }
}
