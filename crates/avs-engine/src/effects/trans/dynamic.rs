//! Scripted per-pixel remaps: Dynamic Movement, Dynamic Shift, and the
//! Dynamic Distance Modifier. One shared driver; the variants differ only
//! in how the post-script state resolves to a sample coordinate.

use crate::context::RenderContext;
use crate::effect::Effect;
use crate::params::ParamBlock;
use crate::script::{Program, ScriptSources, VarHandle, Vm};

use super::frame_warp::FrameWarp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Movement,
    Shift,
    DistanceModifier,
}

struct Vars {
    x: VarHandle,
    y: VarHandle,
    orig_x: VarHandle,
    orig_y: VarHandle,
    radius: VarHandle,
    angle: VarHandle,
    dx: VarHandle,
    dy: VarHandle,
    frame: VarHandle,
    time: VarHandle,
    bass: VarHandle,
    mid: VarHandle,
    treb: VarHandle,
    width: VarHandle,
    height: VarHandle,
}

struct Stages {
    init: Program,
    frame: Program,
    pixel: Program,
}

pub struct DynamicEffect {
    kind: Kind,
    init_script: String,
    frame_script: String,
    pixel_script: String,
    wrap: bool,

    vm: Vm,
    vars: Vars,
    stages: Option<Stages>,
    dirty: bool,
    init_executed: bool,
    time_seconds: f64,
    warp: FrameWarp,
}

impl DynamicEffect {
    fn new(kind: Kind) -> Self {
        let mut vm = Vm::new();
        let vars = Vars {
            x: vm.register_var("x"),
            y: vm.register_var("y"),
            orig_x: vm.register_var("orig_x"),
            orig_y: vm.register_var("orig_y"),
            radius: vm.register_var("d"),
            angle: vm.register_var("angle"),
            dx: vm.register_var("dx"),
            dy: vm.register_var("dy"),
            frame: vm.register_var("frame"),
            time: vm.register_var("time"),
            bass: vm.register_var("bass"),
            mid: vm.register_var("mid"),
            treb: vm.register_var("treb"),
            width: vm.register_var("width"),
            height: vm.register_var("height"),
        };
        Self {
            kind,
            init_script: String::new(),
            frame_script: String::new(),
            pixel_script: String::new(),
            wrap: false,
            vm,
            vars,
            stages: None,
            dirty: true,
            init_executed: false,
            time_seconds: 0.0,
            warp: FrameWarp::default(),
        }
    }

    pub fn movement() -> Self {
        Self::new(Kind::Movement)
    }

    pub fn shift() -> Self {
        Self::new(Kind::Shift)
    }

    pub fn distance_modifier() -> Self {
        Self::new(Kind::DistanceModifier)
    }

    fn compile(&mut self) -> bool {
        let init = self.vm.compile(&self.init_script);
        let frame = self.vm.compile(&self.frame_script);
        let pixel = self.vm.compile(&self.pixel_script);
        match (init, frame, pixel) {
            (Ok(init), Ok(frame), Ok(pixel)) => {
                self.stages = Some(Stages { init, frame, pixel });
                self.dirty = false;
                true
            }
            (init, frame, pixel) => {
                for (stage, result) in [("init", &init), ("frame", &frame), ("pixel", &pixel)] {
                    if let Err(e) = result {
                        log::warn!("dynamic {stage} script failed to compile: {e}");
                    }
                }
                self.stages = None;
                self.dirty = false;
                false
            }
        }
    }

    fn resolve_sample(&self) -> (f32, f32) {
        match self.kind {
            Kind::Movement => (self.vm.get(self.vars.x) as f32, self.vm.get(self.vars.y) as f32),
            Kind::Shift => (
                (self.vm.get(self.vars.orig_x) + self.vm.get(self.vars.dx)) as f32,
                (self.vm.get(self.vars.orig_y) + self.vm.get(self.vars.dy)) as f32,
            ),
            Kind::DistanceModifier => {
                let radius = self.vm.get(self.vars.radius);
                let angle = self.vm.get(self.vars.angle);
                ((angle.cos() * radius) as f32, (angle.sin() * radius) as f32)
            }
        }
    }
}

impl Effect for DynamicEffect {
    fn set_params(&mut self, params: &ParamBlock) {
        for (key, target) in [
            ("init", &mut self.init_script),
            ("frame", &mut self.frame_script),
            ("pixel", &mut self.pixel_script),
        ] {
            if params.contains(key) {
                let script = params.get_string(key, target);
                if script != *target {
                    *target = script;
                    self.dirty = true;
                    self.init_executed = false;
                }
            }
        }
        if params.contains("wrap") {
            self.wrap = params.get_bool("wrap", self.wrap);
        }
    }

    fn render(&mut self, context: &mut RenderContext<'_>) -> bool {
        if !self.warp.prepare(context) {
            return true;
        }
        if self.dirty && !self.compile() {
            return false;
        }
        let Some(stages) = self.stages.take() else {
            return false;
        };

        self.vm.set_random_seed(context.rng.next_uint32());
        self.time_seconds += context.delta_seconds;
        self.vm.set_sources(ScriptSources {
            visdata: None,
            audio_time_seconds: self.time_seconds,
            engine_time_seconds: self.time_seconds,
        });

        self.vm.set(self.vars.frame, context.frame_index as f64);
        self.vm.set(self.vars.time, self.time_seconds);
        let (bass, mid, treb) = context
            .audio
            .map_or((0.0, 0.0, 0.0), |a| (a.bass, a.mid, a.treb));
        self.vm.set(self.vars.bass, f64::from(bass));
        self.vm.set(self.vars.mid, f64::from(mid));
        self.vm.set(self.vars.treb, f64::from(treb));
        self.vm.set(self.vars.width, f64::from(self.warp.width()));
        self.vm.set(self.vars.height, f64::from(self.warp.height()));

        let mut ok = true;
        if !self.init_executed {
            ok &= self.vm.execute(&stages.init).is_ok();
            self.init_executed = true;
        }
        if ok {
            ok = self.vm.execute(&stages.frame).is_ok();
        }

        if ok {
            let width = self.warp.width();
            let height = self.warp.height();
            'pixels: for py in 0..height {
                for px in 0..width {
                    let x = (px as f64 + 0.5) / f64::from(width) * 2.0 - 1.0;
                    let y = 1.0 - (py as f64 + 0.5) / f64::from(height) * 2.0;
                    self.vm.set(self.vars.orig_x, x);
                    self.vm.set(self.vars.orig_y, y);
                    self.vm.set(self.vars.x, x);
                    self.vm.set(self.vars.y, y);
                    let radius = (x * x + y * y).sqrt();
                    self.vm.set(self.vars.radius, radius);
                    // Angles use the legacy 0..2pi convention.
                    let mut angle = y.atan2(x);
                    if angle < 0.0 {
                        angle += std::f64::consts::TAU;
                    }
                    self.vm.set(self.vars.angle, angle);
                    self.vm.set(self.vars.dx, 0.0);
                    self.vm.set(self.vars.dy, 0.0);

                    if self.vm.execute(&stages.pixel).is_err() {
                        ok = false;
                        break 'pixels;
                    }
                    let (sample_x, sample_y) = self.resolve_sample();
                    let color = self.warp.sample(sample_x, sample_y, self.wrap);
                    let index = ((py * width + px) * 4) as usize;
                    context.framebuffer.data[index..index + 4].copy_from_slice(&color);
                }
            }
        }

        self.stages = Some(stages);
        if ok {
            self.warp.store(context);
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::TestRig;

    fn pattern(rig: &mut TestRig) {
        for (i, px) in rig.pixels.chunks_exact_mut(4).enumerate() {
            px[0] = (i * 11) as u8;
            px[3] = 255;
        }
    }

    #[test]
    fn empty_movement_scripts_resample_in_place() {
        let mut rig = TestRig::new(8, 8);
        pattern(&mut rig);
        let mut effect = DynamicEffect::movement();
        assert!(rig.run(&mut effect));
        // x/y default to orig_x/orig_y: a deterministic self-resample
        let first = rig.pixels.clone();
        let mut rig2 = TestRig::new(8, 8);
        pattern(&mut rig2);
        let mut effect2 = DynamicEffect::movement();
        rig2.run(&mut effect2);
        assert_eq!(first, rig2.pixels);
    }

    #[test]
    fn shift_script_translates_content() {
        let mut rig = TestRig::new(8, 8);
        pattern(&mut rig);
        let before = rig.pixels.clone();
        let mut effect = DynamicEffect::shift();
        let mut params = ParamBlock::new();
        params.set_string("pixel", "dx=0.5");
        effect.set_params(&params);
        assert!(rig.run(&mut effect));
        assert_ne!(rig.pixels, before);
    }

    #[test]
    fn compile_failure_returns_false() {
        let mut rig = TestRig::new(4, 4);
        let mut effect = DynamicEffect::movement();
        let mut params = ParamBlock::new();
        params.set_string("pixel", "x = nosuchfn(1)");
        effect.set_params(&params);
        assert!(!rig.run(&mut effect));
    }

    #[test]
    fn distance_modifier_uses_radius_and_angle() {
        let mut rig = TestRig::new(8, 8);
        pattern(&mut rig);
        let mut effect = DynamicEffect::distance_modifier();
        let mut params = ParamBlock::new();
        params.set_string("pixel", "d = d * 0.5");
        effect.set_params(&params);
        assert!(rig.run(&mut effect));
        // pulling the radius inward zooms the image out deterministically
        let first = rig.pixels.clone();
        let mut rig2 = TestRig::new(8, 8);
        pattern(&mut rig2);
        let mut effect2 = DynamicEffect::distance_modifier();
        effect2.set_params(&params);
        rig2.run(&mut effect2);
        assert_eq!(first, rig2.pixels);
    }
}
