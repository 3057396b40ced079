//! Script-driven effects: superscope point/line rendering and the scripted
//! color modifier LUT.

use crate::audio::{VisData, WAVEFORM_SIZE};
use crate::context::RenderContext;
use crate::effect::Effect;
use crate::effects::primitives::{self, Rgba, FONT_HEIGHT};
use crate::params::ParamBlock;
use crate::script::{Program, ScriptSources, VarHandle, Vm};

const MAX_POINTS: i64 = 131_072;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptMode {
    Superscope,
    ColorModifier,
}

struct Vars {
    time: VarHandle,
    frame: VarHandle,
    bass: VarHandle,
    mid: VarHandle,
    treb: VarHandle,
    rms: VarHandle,
    beat: VarHandle,
    b: VarHandle,
    w: VarHandle,
    h: VarHandle,
    n: VarHandle,
    i: VarHandle,
    v: VarHandle,
    skip: VarHandle,
    linesize: VarHandle,
    drawmode: VarHandle,
    x: VarHandle,
    y: VarHandle,
    red: VarHandle,
    green: VarHandle,
    blue: VarHandle,
    registers: Vec<VarHandle>,
}

struct Stages {
    init: Program,
    frame: Program,
    beat: Program,
    pixel: Program,
}

pub struct ScriptedEffect {
    mode: ScriptMode,
    init_script: String,
    frame_script: String,
    beat_script: String,
    pixel_script: String,
    recompute_lut: bool,

    vm: Vm,
    vars: Vars,
    stages: Option<Stages>,
    dirty: bool,
    init_executed: bool,
    time_seconds: f64,

    lut: [[u8; 256]; 3],
    lut_valid: bool,

    compile_error: Option<(String, String)>,
    runtime_error: Option<(String, String)>,
}

impl ScriptedEffect {
    fn new(mode: ScriptMode) -> Self {
        let mut vm = Vm::new();
        let registers = (1..=crate::globals::REGISTER_COUNT)
            .map(|index| vm.register_var(&format!("g{index}")))
            .collect();
        let vars = Vars {
            time: vm.register_var("time"),
            frame: vm.register_var("frame"),
            bass: vm.register_var("bass"),
            mid: vm.register_var("mid"),
            treb: vm.register_var("treb"),
            rms: vm.register_var("rms"),
            beat: vm.register_var("beat"),
            b: vm.register_var("b"),
            w: vm.register_var("w"),
            h: vm.register_var("h"),
            n: vm.register_var("n"),
            i: vm.register_var("i"),
            v: vm.register_var("v"),
            skip: vm.register_var("skip"),
            linesize: vm.register_var("linesize"),
            drawmode: vm.register_var("drawmode"),
            x: vm.register_var("x"),
            y: vm.register_var("y"),
            red: vm.register_var("red"),
            green: vm.register_var("green"),
            blue: vm.register_var("blue"),
            registers,
        };
        let mut effect = Self {
            mode,
            init_script: String::new(),
            frame_script: String::new(),
            beat_script: String::new(),
            pixel_script: String::new(),
            recompute_lut: false,
            vm,
            vars,
            stages: None,
            dirty: true,
            init_executed: false,
            time_seconds: 0.0,
            lut: [[0; 256]; 3],
            lut_valid: false,
            compile_error: None,
            runtime_error: None,
        };
        if mode == ScriptMode::Superscope {
            // The stock spiral preset ships as the default program.
            effect.init_script = "n=800".to_string();
            effect.frame_script = "t=t-0.05".to_string();
            effect.pixel_script =
                "d=i+v*0.2; r=t+i*$PI*4; x=cos(r)*d; y=sin(r)*d".to_string();
        }
        effect
    }

    pub fn superscope() -> Self {
        Self::new(ScriptMode::Superscope)
    }

    pub fn color_modifier() -> Self {
        Self::new(ScriptMode::ColorModifier)
    }

    fn compile(&mut self) {
        self.dirty = false;
        self.init_executed = false;
        self.lut_valid = false;
        self.compile_error = None;
        self.stages = None;

        let scripts = [
            ("INIT", self.init_script.clone()),
            ("FRAME", self.frame_script.clone()),
            ("BEAT", self.beat_script.clone()),
            ("PIXEL", self.pixel_script.clone()),
        ];
        let mut compiled = Vec::with_capacity(scripts.len());
        for (label, source) in scripts {
            match self.vm.compile(&source) {
                Ok(program) => compiled.push(program),
                Err(e) => {
                    log::warn!("script {label} stage failed to compile: {}", e.message);
                    self.compile_error = Some((label.to_string(), e.message));
                    return;
                }
            }
        }
        let pixel = compiled.pop().unwrap_or_default();
        let beat = compiled.pop().unwrap_or_default();
        let frame = compiled.pop().unwrap_or_default();
        let init = compiled.pop().unwrap_or_default();
        self.stages = Some(Stages {
            init,
            frame,
            beat,
            pixel,
        });
    }

    fn load_registers(&mut self, context: &RenderContext<'_>) {
        for (index, handle) in self.vars.registers.iter().enumerate() {
            self.vm.set(*handle, context.globals.registers[index]);
        }
    }

    fn store_registers(&self, context: &mut RenderContext<'_>) {
        for (index, handle) in self.vars.registers.iter().enumerate() {
            context.globals.registers[index] = self.vm.get(*handle);
        }
    }

    fn bind_frame(&mut self, context: &RenderContext<'_>) {
        self.time_seconds += context.delta_seconds;
        self.vm.set(self.vars.time, self.time_seconds);
        self.vm.set(self.vars.frame, context.frame_index as f64);
        self.vm.set(self.vars.w, f64::from(context.width));
        self.vm.set(self.vars.h, f64::from(context.height));
        let (bass, mid, treb, rms) = context.audio.map_or((0.0, 0.0, 0.0, 0.0), |a| {
            (a.bass, a.mid, a.treb, a.rms())
        });
        self.vm.set(self.vars.bass, f64::from(bass));
        self.vm.set(self.vars.mid, f64::from(mid));
        self.vm.set(self.vars.treb, f64::from(treb));
        self.vm.set(self.vars.rms, f64::from(rms));
        let beat_value = f64::from(u8::from(context.audio_beat));
        self.vm.set(self.vars.beat, beat_value);
        self.vm.set(self.vars.b, beat_value);

        let visdata = context.audio.map(VisData::from_analysis);
        self.vm.set_sources(ScriptSources {
            visdata,
            audio_time_seconds: self.time_seconds,
            engine_time_seconds: self.time_seconds,
        });
    }

    fn execute_stage(&mut self, program: &Program, label: &str) -> bool {
        match self.vm.execute(program) {
            Ok(()) => true,
            Err(e) => {
                self.runtime_error = Some((label.to_string(), e.message));
                false
            }
        }
    }

    fn rebuild_lut(&mut self, stages: &Stages) -> bool {
        for value in 0..256usize {
            let channel = value as f64 / 255.0;
            self.vm.set(self.vars.red, channel);
            self.vm.set(self.vars.green, channel);
            self.vm.set(self.vars.blue, channel);
            if !self.execute_stage(&stages.pixel, "PIXEL") {
                return false;
            }
            self.lut[0][value] =
                (self.vm.get(self.vars.red).clamp(0.0, 1.0) * 255.0).round() as u8;
            self.lut[1][value] =
                (self.vm.get(self.vars.green).clamp(0.0, 1.0) * 255.0).round() as u8;
            self.lut[2][value] =
                (self.vm.get(self.vars.blue).clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        self.lut_valid = true;
        true
    }

    fn render_superscope(&mut self, context: &mut RenderContext<'_>, stages: &Stages) -> bool {
        let width = context.width;
        let height = context.height;
        let n = (self.vm.get(self.vars.n) as i64).clamp(0, MAX_POINTS);
        if n <= 0 {
            return true;
        }
        let waveform = context.audio.map(|a| a.waveform);
        let mut previous: Option<(i32, i32)> = None;

        for idx in 0..n {
            let i = if n > 1 {
                idx as f64 / (n - 1) as f64
            } else {
                0.0
            };
            let sample_index =
                ((i * (WAVEFORM_SIZE - 1) as f64).round() as usize).min(WAVEFORM_SIZE - 1);
            let v = waveform.map_or(0.0, |w| f64::from(w[sample_index]));

            self.vm.set(self.vars.i, i);
            self.vm.set(self.vars.v, v);
            self.vm.set(self.vars.skip, 0.0);
            let default_x = 2.0 * i - 1.0;
            self.vm.set(self.vars.x, default_x);
            self.vm.set(self.vars.y, 0.0);

            // Default color reads the frame under the default point.
            let default_px = (((default_x + 1.0) * f64::from(width) / 2.0) as i32)
                .clamp(0, width - 1);
            let default_py = (height / 2).clamp(0, height - 1);
            if let Some(pixel) =
                primitives::get_pixel(&context.framebuffer, default_px, default_py)
            {
                self.vm.set(self.vars.red, f64::from(pixel[0]) / 255.0);
                self.vm.set(self.vars.green, f64::from(pixel[1]) / 255.0);
                self.vm.set(self.vars.blue, f64::from(pixel[2]) / 255.0);
            }

            if !self.execute_stage(&stages.pixel, "PIXEL") {
                return false;
            }

            let x = self.vm.get(self.vars.x);
            let y = self.vm.get(self.vars.y);
            let px = ((x + 1.0) * f64::from(width) / 2.0).floor() as i64;
            let py = ((y + 1.0) * f64::from(height) / 2.0).floor() as i64;
            let px = px.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
            let py = py.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;

            let skip = self.vm.get(self.vars.skip) != 0.0;
            if !skip {
                let color = Rgba::opaque(
                    (self.vm.get(self.vars.red).clamp(0.0, 1.0) * 255.0).round() as u8,
                    (self.vm.get(self.vars.green).clamp(0.0, 1.0) * 255.0).round() as u8,
                    (self.vm.get(self.vars.blue).clamp(0.0, 1.0) * 255.0).round() as u8,
                );
                let drawmode = self.vm.get(self.vars.drawmode);
                let linesize = (self.vm.get(self.vars.linesize) as i32).clamp(1, 255);
                if drawmode > 0.0 {
                    if let Some((prev_x, prev_y)) = previous {
                        primitives::draw_thick_line(
                            &mut context.framebuffer,
                            &context.globals.legacy_render,
                            prev_x,
                            prev_y,
                            px,
                            py,
                            linesize,
                            color,
                        );
                    }
                } else {
                    primitives::blend_pixel(
                        &mut context.framebuffer,
                        &context.globals.legacy_render,
                        px,
                        py,
                        color,
                        255,
                    );
                }
            }
            previous = Some((px, py));
        }
        true
    }

    fn draw_overlays(&self, context: &mut RenderContext<'_>) {
        let mut offset_y = 2;
        let error_color = Rgba::opaque(255, 64, 64);
        if let Some((stage, message)) = &self.compile_error {
            let text = format!("COMPILE {stage} {message}");
            primitives::draw_text(&mut context.framebuffer, 2, offset_y, &text, error_color);
            offset_y += FONT_HEIGHT + 4;
        }
        if let Some((stage, message)) = &self.runtime_error {
            let text = format!("{stage} {message}");
            primitives::draw_text(&mut context.framebuffer, 2, offset_y, &text, error_color);
        }
    }
}

impl Effect for ScriptedEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        let mut changed = false;
        for (keys, target) in [
            (&["init"][..], &mut self.init_script),
            (&["frame", "code1"][..], &mut self.frame_script),
            (&["beat"][..], &mut self.beat_script),
            (&["pixel", "point", "arbitrary"][..], &mut self.pixel_script),
        ] {
            for key in keys {
                if params.contains(key) {
                    let script = params.get_string(key, target);
                    if script != *target {
                        *target = script;
                        changed = true;
                    }
                }
            }
        }
        if params.contains("mode") {
            let token = params.get_string("mode", "").to_ascii_lowercase();
            let mode = match token.as_str() {
                "color_mod" | "colormod" => ScriptMode::ColorModifier,
                "superscope" => ScriptMode::Superscope,
                _ => self.mode,
            };
            if mode != self.mode {
                self.mode = mode;
                changed = true;
            }
        }
        self.recompute_lut = params.get_bool("recompute", self.recompute_lut);
        if changed {
            self.dirty = true;
            self.init_executed = false;
            self.compile_error = None;
            self.runtime_error = None;
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !context.has_framebuffer() {
            return true;
        }
        if self.dirty {
            self.compile();
        }
        self.runtime_error = None;

        self.vm.set_random_seed(context.rng.next_uint32());
        self.load_registers(context);
        self.bind_frame(context);

        if self.compile_error.is_none() {
            if let Some(stages) = self.stages.take() {
                let mut ok = true;
                if !self.init_executed {
                    ok = self.execute_stage(&stages.init, "INIT");
                    self.init_executed = true;
                }
                if ok {
                    ok = self.execute_stage(&stages.frame, "FRAME");
                }
                if ok && context.audio_beat {
                    ok = self.execute_stage(&stages.beat, "BEAT");
                }
                if ok {
                    match self.mode {
                        ScriptMode::Superscope => {
                            self.render_superscope(context, &stages);
                        }
                        ScriptMode::ColorModifier => {
                            if !self.lut_valid || self.recompute_lut || context.audio_beat {
                                self.rebuild_lut(&stages);
                            }
                            if self.lut_valid {
                                for px in context.framebuffer.data.chunks_exact_mut(4) {
                                    px[0] = self.lut[0][px[0] as usize];
                                    px[1] = self.lut[1][px[1] as usize];
                                    px[2] = self.lut[2][px[2] as usize];
                                }
                            }
                        }
                    }
                }
                self.stages = Some(stages);
            }
        }

        self.store_registers(context);
        self.draw_overlays(context);
        self.compile_error.is_none() && self.runtime_error.is_none()
    }
}
