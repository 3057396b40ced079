//! Deterministic expression VM for scripted effects.
//!
//! The VM satisfies the stage-script contract: compile a text stage to an
//! opaque program, register named scalar variables whose storage the VM
//! owns, and execute programs repeatedly with re-read variable values. The
//! per-frame `rand()` stream is reseeded from the context RNG by the host
//! effect so whole-frame output stays deterministic.

pub mod ast;

use rustc_hash::FxHashMap;

pub use ast::{ParseError, Program};

use crate::audio::VisData;
use crate::globals::{self, MEGABUF_BLOCKS, MEGABUF_ITEMS_PER_BLOCK};

use self::ast::{AssignOp, AssignTarget, BinOp, Expr, FuncId, VarInterner};

/// Default per-stage evaluation budget (AST nodes per execution).
pub const DEFAULT_NODE_BUDGET: u64 = 4_000_000;

#[derive(Debug, Clone)]
pub struct ScriptError {
    pub message: String,
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ScriptError {}

/// Stable handle to a VM variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarHandle(usize);

/// Audio/time sources consulted by `getosc`/`getspec`/`gettime`.
#[derive(Clone, Default)]
pub struct ScriptSources {
    pub visdata: Option<VisData>,
    pub audio_time_seconds: f64,
    pub engine_time_seconds: f64,
}

struct Slots {
    values: Vec<f64>,
    names: FxHashMap<String, usize>,
}

impl VarInterner for Slots {
    fn intern(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.names.get(name) {
            return slot;
        }
        let slot = self.values.len();
        self.values.push(0.0);
        self.names.insert(name.to_string(), slot);
        slot
    }
}

/// One script VM: variable slots, per-VM block arrays, and a frame-seeded
/// random stream.
pub struct Vm {
    slots: Slots,
    mega: Vec<Option<Vec<f64>>>,
    rand_state: u32,
    sources: ScriptSources,
    node_budget: u64,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self {
            slots: Slots {
                values: Vec::new(),
                names: FxHashMap::default(),
            },
            mega: (0..MEGABUF_BLOCKS).map(|_| None).collect(),
            rand_state: 1,
            sources: ScriptSources::default(),
            node_budget: DEFAULT_NODE_BUDGET,
        }
    }

    pub fn register_var(&mut self, name: &str) -> VarHandle {
        VarHandle(self.slots.intern(&name.to_ascii_lowercase()))
    }

    pub fn get(&self, handle: VarHandle) -> f64 {
        self.slots.values[handle.0]
    }

    pub fn set(&mut self, handle: VarHandle, value: f64) {
        self.slots.values[handle.0] = value;
    }

    pub fn set_random_seed(&mut self, seed: u32) {
        self.rand_state = if seed == 0 { 0x6C8E_9CF5 } else { seed };
    }

    pub fn set_sources(&mut self, sources: ScriptSources) {
        self.sources = sources;
    }

    pub fn set_node_budget(&mut self, budget: u64) {
        self.node_budget = budget.max(1);
    }

    pub fn compile(&mut self, source: &str) -> Result<Program, ScriptError> {
        ast::parse(source, &mut self.slots).map_err(|e| ScriptError { message: e.message })
    }

    pub fn execute(&mut self, program: &Program) -> Result<(), ScriptError> {
        let mut remaining = self.node_budget;
        for statement in &program.statements {
            self.eval(statement, &mut remaining)?;
        }
        Ok(())
    }

    fn next_rand_unit(&mut self) -> f64 {
        // xorshift32; the stream restarts from the host-provided seed each
        // frame, keeping script output a function of (seed, frame).
        let mut x = self.rand_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rand_state = x;
        f64::from(x) / f64::from(u32::MAX)
    }

    fn megabuf_read(&self, index: i64) -> f64 {
        if index < 0 {
            return 0.0;
        }
        let block = index as usize / MEGABUF_ITEMS_PER_BLOCK;
        let entry = index as usize % MEGABUF_ITEMS_PER_BLOCK;
        if block >= MEGABUF_BLOCKS {
            return 0.0;
        }
        self.mega[block].as_ref().map_or(0.0, |b| b[entry])
    }

    fn megabuf_write(&mut self, index: i64, value: f64) {
        if index < 0 {
            return;
        }
        let block = index as usize / MEGABUF_ITEMS_PER_BLOCK;
        let entry = index as usize % MEGABUF_ITEMS_PER_BLOCK;
        if block >= MEGABUF_BLOCKS {
            return;
        }
        self.mega[block].get_or_insert_with(|| vec![0.0; MEGABUF_ITEMS_PER_BLOCK])[entry] = value;
    }

    fn eval(&mut self, expr: &Expr, remaining: &mut u64) -> Result<f64, ScriptError> {
        if *remaining == 0 {
            return Err(ScriptError {
                message: "instruction budget exceeded".to_string(),
            });
        }
        *remaining -= 1;

        let value = match expr {
            Expr::Number(value) => *value,
            Expr::Var(slot) => self.slots.values[*slot],
            Expr::Neg(inner) => -self.eval(inner, remaining)?,
            Expr::Not(inner) => {
                if self.eval(inner, remaining)? == 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let a = self.eval(lhs, remaining)?;
                match op {
                    BinOp::And => {
                        if a == 0.0 {
                            0.0
                        } else if self.eval(rhs, remaining)? != 0.0 {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    BinOp::Or => {
                        if a != 0.0 {
                            1.0
                        } else if self.eval(rhs, remaining)? != 0.0 {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    _ => {
                        let b = self.eval(rhs, remaining)?;
                        apply_binop(*op, a, b)
                    }
                }
            }
            Expr::Assign { target, op, value } => {
                let rhs = self.eval(value, remaining)?;
                match target {
                    AssignTarget::Var(slot) => {
                        let current = self.slots.values[*slot];
                        let next = apply_assign(*op, current, rhs);
                        self.slots.values[*slot] = next;
                        next
                    }
                    AssignTarget::MegaBuf(index_expr) => {
                        let index = self.eval(index_expr, remaining)? as i64;
                        let next = apply_assign(*op, self.megabuf_read(index), rhs);
                        self.megabuf_write(index, next);
                        next
                    }
                    AssignTarget::GMegaBuf(index_expr) => {
                        let index = self.eval(index_expr, remaining)? as i64;
                        let next = apply_assign(*op, globals::gmegabuf_get(index), rhs);
                        globals::gmegabuf_set(index, next);
                        next
                    }
                }
            }
            Expr::Call { func, args } => self.eval_call(*func, args, remaining)?,
        };
        Ok(value)
    }

    fn eval_call(
        &mut self,
        func: FuncId,
        args: &[Expr],
        remaining: &mut u64,
    ) -> Result<f64, ScriptError> {
        let arg = |vm: &mut Self, i: usize, remaining: &mut u64| vm.eval(&args[i], remaining);
        let value = match func {
            FuncId::Sin => arg(self, 0, remaining)?.sin(),
            FuncId::Cos => arg(self, 0, remaining)?.cos(),
            FuncId::Tan => arg(self, 0, remaining)?.tan(),
            FuncId::Asin => arg(self, 0, remaining)?.asin(),
            FuncId::Acos => arg(self, 0, remaining)?.acos(),
            FuncId::Atan => arg(self, 0, remaining)?.atan(),
            FuncId::Atan2 => {
                let y = arg(self, 0, remaining)?;
                let x = arg(self, 1, remaining)?;
                y.atan2(x)
            }
            FuncId::Sqrt => {
                let v = arg(self, 0, remaining)?;
                if v < 0.0 { 0.0 } else { v.sqrt() }
            }
            FuncId::Sqr => {
                let v = arg(self, 0, remaining)?;
                v * v
            }
            FuncId::Pow => {
                let base = arg(self, 0, remaining)?;
                let exp = arg(self, 1, remaining)?;
                base.powf(exp)
            }
            FuncId::Exp => arg(self, 0, remaining)?.exp(),
            FuncId::Log => {
                let v = arg(self, 0, remaining)?;
                if v <= 0.0 { 0.0 } else { v.ln() }
            }
            FuncId::Log10 => {
                let v = arg(self, 0, remaining)?;
                if v <= 0.0 { 0.0 } else { v.log10() }
            }
            FuncId::Abs => arg(self, 0, remaining)?.abs(),
            FuncId::Min => {
                let a = arg(self, 0, remaining)?;
                let b = arg(self, 1, remaining)?;
                a.min(b)
            }
            FuncId::Max => {
                let a = arg(self, 0, remaining)?;
                let b = arg(self, 1, remaining)?;
                a.max(b)
            }
            FuncId::Sign => {
                let v = arg(self, 0, remaining)?;
                if v > 0.0 {
                    1.0
                } else if v < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            FuncId::Floor => arg(self, 0, remaining)?.floor(),
            FuncId::Ceil => arg(self, 0, remaining)?.ceil(),
            FuncId::Sigmoid => {
                let v = arg(self, 0, remaining)?;
                let constraint = arg(self, 1, remaining)?;
                let t = 1.0 + (-v * constraint).exp();
                if t.abs() > 1e-12 { 1.0 / t } else { 0.0 }
            }
            FuncId::If => {
                let cond = arg(self, 0, remaining)?;
                if cond != 0.0 {
                    arg(self, 1, remaining)?
                } else {
                    arg(self, 2, remaining)?
                }
            }
            FuncId::Equal => {
                let a = arg(self, 0, remaining)?;
                let b = arg(self, 1, remaining)?;
                f64::from(u8::from((a - b).abs() < 1e-9))
            }
            FuncId::Above => {
                let a = arg(self, 0, remaining)?;
                let b = arg(self, 1, remaining)?;
                f64::from(u8::from(a > b))
            }
            FuncId::Below => {
                let a = arg(self, 0, remaining)?;
                let b = arg(self, 1, remaining)?;
                f64::from(u8::from(a < b))
            }
            FuncId::Band => {
                let a = arg(self, 0, remaining)?;
                let b = arg(self, 1, remaining)?;
                f64::from(u8::from(a != 0.0 && b != 0.0))
            }
            FuncId::Bor => {
                let a = arg(self, 0, remaining)?;
                let b = arg(self, 1, remaining)?;
                f64::from(u8::from(a != 0.0 || b != 0.0))
            }
            FuncId::Rand => self.next_rand_unit(),
            FuncId::Clamp => {
                let v = arg(self, 0, remaining)?;
                let lo = arg(self, 1, remaining)?;
                let hi = arg(self, 2, remaining)?;
                v.clamp(lo.min(hi), hi.max(lo))
            }
            FuncId::Smooth => {
                let prev = arg(self, 0, remaining)?;
                let next = arg(self, 1, remaining)?;
                let t = arg(self, 2, remaining)?;
                prev + (next - prev) * t
            }
            FuncId::GetOsc => {
                let band = arg(self, 0, remaining)?;
                let bandw = arg(self, 1, remaining)?;
                let chan = arg(self, 2, remaining)? + 0.5;
                self.sources
                    .visdata
                    .as_ref()
                    .map_or(0.0, |v| v.sample(true, chan as i32, band, bandw))
            }
            FuncId::GetSpec => {
                let band = arg(self, 0, remaining)?;
                let bandw = arg(self, 1, remaining)?;
                let chan = arg(self, 2, remaining)? + 0.5;
                0.5 * self
                    .sources
                    .visdata
                    .as_ref()
                    .map_or(0.0, |v| v.sample(false, chan as i32, band, bandw))
            }
            FuncId::GetTime => {
                let sc = arg(self, 0, remaining)?;
                if (sc + 1.0).abs() < 0.001 {
                    self.sources.audio_time_seconds
                } else if (sc + 2.0).abs() < 0.001 {
                    self.sources.audio_time_seconds * 1000.0
                } else {
                    self.sources.engine_time_seconds - sc
                }
            }
            // No window system in the offscreen core: keyboard/mouse read 0.
            FuncId::GetKbMouse => {
                arg(self, 0, remaining)?;
                0.0
            }
            FuncId::SetMousePos => {
                arg(self, 0, remaining)?;
                arg(self, 1, remaining)?;
                0.0
            }
            FuncId::MegaBuf => {
                let index = arg(self, 0, remaining)? as i64;
                self.megabuf_read(index)
            }
            FuncId::GMegaBuf => {
                let index = arg(self, 0, remaining)? as i64;
                globals::gmegabuf_get(index)
            }
        };
        Ok(value)
    }
}

fn apply_assign(op: AssignOp, current: f64, rhs: f64) -> f64 {
    match op {
        AssignOp::Set => rhs,
        AssignOp::Add => current + rhs,
        AssignOp::Sub => current - rhs,
        AssignOp::Mul => current * rhs,
        AssignOp::Div => {
            if rhs == 0.0 {
                0.0
            } else {
                current / rhs
            }
        }
        AssignOp::Rem => {
            if rhs == 0.0 {
                0.0
            } else {
                current % rhs
            }
        }
    }
}

fn apply_binop(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                0.0
            } else {
                a / b
            }
        }
        BinOp::Rem => {
            if b == 0.0 {
                0.0
            } else {
                a % b
            }
        }
        BinOp::Pow => a.powf(b),
        BinOp::BitAnd => ((a as i64) & (b as i64)) as f64,
        BinOp::BitOr => ((a as i64) | (b as i64)) as f64,
        BinOp::Eq => f64::from(u8::from((a - b).abs() < 1e-9)),
        BinOp::Ne => f64::from(u8::from((a - b).abs() >= 1e-9)),
        BinOp::Lt => f64::from(u8::from(a < b)),
        BinOp::Gt => f64::from(u8::from(a > b)),
        BinOp::Le => f64::from(u8::from(a <= b)),
        BinOp::Ge => f64::from(u8::from(a >= b)),
        // short-circuit ops handled in eval
        BinOp::And | BinOp::Or => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executes_arithmetic_and_variables() {
        let mut vm = Vm::new();
        let x = vm.register_var("x");
        let program = vm.compile("x = 2 + 3 * 4").unwrap();
        vm.execute(&program).unwrap();
        assert_eq!(vm.get(x), 14.0);
    }

    #[test]
    fn host_variables_survive_executions() {
        let mut vm = Vm::new();
        let t = vm.register_var("t");
        let program = vm.compile("t = t - 0.05").unwrap();
        vm.set(t, 1.0);
        vm.execute(&program).unwrap();
        vm.execute(&program).unwrap();
        assert!((vm.get(t) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn division_by_zero_yields_zero() {
        let mut vm = Vm::new();
        let x = vm.register_var("x");
        let program = vm.compile("x = 5 / 0; x = x + 1").unwrap();
        vm.execute(&program).unwrap();
        assert_eq!(vm.get(x), 1.0);
    }

    #[test]
    fn if_selects_branch() {
        let mut vm = Vm::new();
        let x = vm.register_var("x");
        let program = vm.compile("x = if(above(3,2), 10, 20)").unwrap();
        vm.execute(&program).unwrap();
        assert_eq!(vm.get(x), 10.0);
    }

    #[test]
    fn megabuf_round_trips() {
        let mut vm = Vm::new();
        let x = vm.register_var("x");
        let program = vm.compile("megabuf(70000)=4.5; x=megabuf(70000)").unwrap();
        vm.execute(&program).unwrap();
        // 70000 exceeds 64*1024 entries: writes drop, reads return 0.
        assert_eq!(vm.get(x), 0.0);

        let program = vm.compile("megabuf(2048)=4.5; x=megabuf(2048)").unwrap();
        vm.execute(&program).unwrap();
        assert_eq!(vm.get(x), 4.5);
    }

    #[test]
    fn rand_stream_is_reproducible_per_seed() {
        let mut a = Vm::new();
        let mut b = Vm::new();
        let ra = a.register_var("r");
        let rb = b.register_var("r");
        let pa = a.compile("r = rand()").unwrap();
        let pb = b.compile("r = rand()").unwrap();
        a.set_random_seed(77);
        b.set_random_seed(77);
        for _ in 0..10 {
            a.execute(&pa).unwrap();
            b.execute(&pb).unwrap();
            assert_eq!(a.get(ra), b.get(rb));
        }
    }

    #[test]
    fn budget_stops_runaway_scripts() {
        let mut vm = Vm::new();
        vm.set_node_budget(100);
        let program = vm
            .compile("x=0; x=x+1; x=x+1; x=x+1; x=x+1; x=x+1")
            .unwrap();
        // Small budget still covers this program.
        vm.execute(&program).unwrap();
        vm.set_node_budget(3);
        assert!(vm.execute(&program).is_err());
    }

    #[test]
    fn gettime_sentinels() {
        let mut vm = Vm::new();
        vm.set_sources(ScriptSources {
            visdata: None,
            audio_time_seconds: 2.5,
            engine_time_seconds: 10.0,
        });
        let x = vm.register_var("x");
        let program = vm.compile("x = gettime(-1)").unwrap();
        vm.execute(&program).unwrap();
        assert_eq!(vm.get(x), 2.5);
        let program = vm.compile("x = gettime(-2)").unwrap();
        vm.execute(&program).unwrap();
        assert_eq!(vm.get(x), 2500.0);
        let program = vm.compile("x = gettime(4)").unwrap();
        vm.execute(&program).unwrap();
        assert_eq!(vm.get(x), 6.0);
    }
}
