//! Concrete interpreter for the parapet IR.
//!
//! This is the runtime of the check ABI: the two reserved callees are
//! intercepted and recorded as [`CheckEvent`]s in the run's [`Trace`]
//! instead of printing to stderr. A failed check does not halt execution,
//! mirroring the reporting-only behavior of the original stubs. That is
//! what makes before/after traces comparable in tests.

mod error;

pub use error::InterpError;

use parapet_ir::{
    CHECK_LOWER_BOUND, CHECK_UPPER_BOUND, Function, MALLOC, Module, Opcode, Value, ValueKind,
};
use rustc_hash::FxHashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckKind {
    Lower,
    Upper,
}

/// One executed check call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckEvent {
    pub kind: CheckKind,
    pub bound: i64,
    pub index: i64,
    pub line: i64,
    pub passed: bool,
}

/// The observable outcome of one run: every check executed, in order,
/// plus the return value.
#[derive(Clone, Debug, Default)]
pub struct Trace {
    pub events: Vec<CheckEvent>,
    pub returned: Option<i64>,
}

impl Trace {
    pub fn check_count(&self) -> usize {
        self.events.len()
    }

    pub fn failure_count(&self) -> usize {
        self.events.iter().filter(|e| !e.passed).count()
    }

    pub fn failed(&self) -> bool {
        self.failure_count() > 0
    }
}

/// Handler for calls that leave the module. Returns `Some(value)` to
/// supply a result, `None` to decline the callee.
pub type ExternHandler<'a> = Box<dyn FnMut(&str, &[i64]) -> Option<i64> + 'a>;

const DEFAULT_FUEL: u64 = 1 << 20;

pub struct Machine<'a> {
    module: &'a Module,
    memory: Vec<i64>,
    fuel: u64,
    extern_handler: Option<ExternHandler<'a>>,
    trace: Trace,
}

impl<'a> Machine<'a> {
    pub fn new(module: &'a Module) -> Self {
        Self {
            module,
            // cell 0 is reserved so no allocation hands out address zero
            memory: vec![0],
            fuel: DEFAULT_FUEL,
            extern_handler: None,
            trace: Trace::default(),
        }
    }

    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = fuel;
        self
    }

    pub fn with_extern_handler(mut self, handler: ExternHandler<'a>) -> Self {
        self.extern_handler = Some(handler);
        self
    }

    /// Run one function to completion and hand back the trace.
    pub fn run(mut self, index: usize, args: &[i64]) -> Result<Trace, InterpError> {
        let returned = self.call(self.module.function(index), args)?;
        self.trace.returned = returned;
        Ok(self.trace)
    }

    fn call(&mut self, f: &Function, args: &[i64]) -> Result<Option<i64>, InterpError> {
        if args.len() != f.params().len() {
            return Err(InterpError::ArityMismatch {
                callee: self.module.resolve(f.name()).to_string(),
                expected: f.params().len(),
                got: args.len(),
            });
        }
        let mut frame: FxHashMap<Value, i64> = FxHashMap::default();
        for (&param, &arg) in f.params().iter().zip(args) {
            frame.insert(param, arg);
        }

        let Some(entry) = f.entry() else {
            return Ok(None);
        };
        let mut block = entry;
        let mut previous = None;
        'blocks: loop {
            let mut cursor = f.block(block).first();
            while let Some(inst) = cursor {
                if self.fuel == 0 {
                    return Err(InterpError::FuelExhausted);
                }
                self.fuel -= 1;

                let info = f.inst(inst);
                cursor = info.next();
                match info.opcode() {
                    Opcode::Alloca { slots } => {
                        let base = self.memory.len() as i64;
                        self.memory.extend(std::iter::repeat_n(0, *slots as usize));
                        self.bind(f, &mut frame, inst, base);
                    }
                    Opcode::Load => {
                        let addr = self.eval(f, &frame, info.operands()[0])?;
                        let loaded = self.read(addr)?;
                        self.bind(f, &mut frame, inst, loaded);
                    }
                    Opcode::Store => {
                        let value = self.eval(f, &frame, info.operands()[0])?;
                        let addr = self.eval(f, &frame, info.operands()[1])?;
                        self.write(addr, value)?;
                    }
                    Opcode::Add | Opcode::Sub | Opcode::Mul => {
                        let lhs = self.eval(f, &frame, info.operands()[0])?;
                        let rhs = self.eval(f, &frame, info.operands()[1])?;
                        let out = match info.opcode() {
                            Opcode::Add => lhs.wrapping_add(rhs),
                            Opcode::Sub => lhs.wrapping_sub(rhs),
                            _ => lhs.wrapping_mul(rhs),
                        };
                        self.bind(f, &mut frame, inst, out);
                    }
                    Opcode::SExt | Opcode::ZExt => {
                        let v = self.eval(f, &frame, info.operands()[0])?;
                        self.bind(f, &mut frame, inst, v);
                    }
                    Opcode::Gep => {
                        let base = self.eval(f, &frame, info.operands()[0])?;
                        let offset = self.eval(f, &frame, info.operands()[1])?;
                        self.bind(f, &mut frame, inst, base.wrapping_add(offset));
                    }
                    Opcode::Icmp(pred) => {
                        let lhs = self.eval(f, &frame, info.operands()[0])?;
                        let rhs = self.eval(f, &frame, info.operands()[1])?;
                        self.bind(f, &mut frame, inst, pred.evaluate(lhs, rhs) as i64);
                    }
                    Opcode::Phi => {
                        let from = previous.ok_or(InterpError::MissingPhiEdge(block))?;
                        let position = info
                            .incoming()
                            .iter()
                            .position(|&b| b == from)
                            .ok_or(InterpError::MissingPhiEdge(block))?;
                        let v = self.eval(f, &frame, info.operands()[position])?;
                        self.bind(f, &mut frame, inst, v);
                    }
                    Opcode::Call(callee) => {
                        let name = self.module.resolve(*callee).to_string();
                        let mut argv = Vec::with_capacity(info.operands().len());
                        for &op in info.operands() {
                            argv.push(self.eval(f, &frame, op)?);
                        }
                        let result = self.dispatch(&name, &argv, f.inst(inst).result().is_some())?;
                        if let Some(out) = result {
                            self.bind(f, &mut frame, inst, out);
                        }
                    }
                    Opcode::Br => {
                        previous = Some(block);
                        block = info.successors()[0];
                        continue 'blocks;
                    }
                    Opcode::CondBr => {
                        let cond = self.eval(f, &frame, info.operands()[0])?;
                        previous = Some(block);
                        block = if cond != 0 {
                            info.successors()[0]
                        } else {
                            info.successors()[1]
                        };
                        continue 'blocks;
                    }
                    Opcode::Ret => {
                        return match info.operands().first() {
                            Some(&v) => Ok(Some(self.eval(f, &frame, v)?)),
                            None => Ok(None),
                        };
                    }
                }
            }
            return Err(InterpError::NoTerminator(block));
        }
    }

    fn dispatch(
        &mut self,
        name: &str,
        args: &[i64],
        wants_result: bool,
    ) -> Result<Option<i64>, InterpError> {
        match name {
            CHECK_LOWER_BOUND => {
                self.record(CheckKind::Lower, args);
                Ok(None)
            }
            CHECK_UPPER_BOUND => {
                self.record(CheckKind::Upper, args);
                Ok(None)
            }
            MALLOC => {
                let bytes = args.first().copied().unwrap_or(0).max(0) as usize;
                let base = self.memory.len() as i64;
                self.memory.extend(std::iter::repeat_n(0, bytes.div_ceil(8)));
                Ok(Some(base))
            }
            _ => {
                if let Some(found) = self.module.find_function(name) {
                    // the borrow of the module outlives self.memory mutation,
                    // so re-resolve the function by index
                    return self.call(self.module.function(found), args);
                }
                if let Some(handler) = self.extern_handler.as_mut() {
                    if let Some(out) = handler(name, args) {
                        return Ok(Some(out));
                    }
                }
                if wants_result {
                    Err(InterpError::UnknownExtern(name.to_string()))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn record(&mut self, kind: CheckKind, args: &[i64]) {
        let bound = args.first().copied().unwrap_or(0);
        let index = args.get(1).copied().unwrap_or(0);
        let line = args.get(3).copied().unwrap_or(0);
        let passed = match kind {
            CheckKind::Lower => bound <= index,
            CheckKind::Upper => index <= bound,
        };
        self.trace.events.push(CheckEvent {
            kind,
            bound,
            index,
            line,
            passed,
        });
    }

    fn bind(&self, f: &Function, frame: &mut FxHashMap<Value, i64>, inst: parapet_ir::Inst, v: i64) {
        if let Some(result) = f.inst(inst).result() {
            frame.insert(result, v);
        }
    }

    fn eval(
        &self,
        f: &Function,
        frame: &FxHashMap<Value, i64>,
        v: Value,
    ) -> Result<i64, InterpError> {
        match f.value_kind(v) {
            ValueKind::Const(c) => Ok(*c),
            // globals only ever flow into check-call file operands
            ValueKind::Global(_) => Ok(0),
            ValueKind::Argument(_) | ValueKind::Inst(_) => frame
                .get(&v)
                .copied()
                .ok_or(InterpError::UnboundValue(v)),
        }
    }

    fn read(&self, addr: i64) -> Result<i64, InterpError> {
        self.memory
            .get(usize::try_from(addr).map_err(|_| InterpError::BadAddress(addr))?)
            .copied()
            .ok_or(InterpError::BadAddress(addr))
    }

    fn write(&mut self, addr: i64, value: i64) -> Result<(), InterpError> {
        let slot = self
            .memory
            .get_mut(usize::try_from(addr).map_err(|_| InterpError::BadAddress(addr))?)
            .ok_or(InterpError::BadAddress(addr))?;
        *slot = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parapet_ir::{CmpPred, FunctionBuilder};

    /// for (i = 0; i < n; ++i) a[i] = i;  with explicit upper checks
    fn counting_loop(n_checked: bool) -> Module {
        let mut module = Module::new("loop.c");
        let check_upper = module.intern(CHECK_UPPER_BOUND);
        let check_lower = module.intern(CHECK_LOWER_BOUND);
        let file = module.intern("loop.c");
        let index = module.add_function("fill", 1);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        let header = b.add_block();
        let body = b.add_block();
        let exit = b.add_block();

        b.switch_to(entry);
        let arr = b.alloca(8);
        let i_slot = b.alloca(1);
        let zero = b.constant(0);
        b.store(zero, i_slot);
        b.br(header);

        b.switch_to(header);
        let i = b.load(i_slot);
        let n = b.param(0);
        let cond = b.icmp(CmpPred::Slt, i, n);
        b.cond_br(cond, body, exit);

        b.switch_to(body);
        let i2 = b.load(i_slot);
        if n_checked {
            let seven = b.constant(7);
            let file_ref = b.func().global_ref(file);
            let line = b.constant(2);
            b.call_void(check_lower, [zero, i2, file_ref, line]);
            b.call_void(check_upper, [seven, i2, file_ref, line]);
        }
        let slot = b.gep(arr, i2);
        b.store(i2, slot);
        let one = b.constant(1);
        let next = b.add(i2, one);
        b.store(next, i_slot);
        b.br(header);

        b.switch_to(exit);
        let last = b.load(arr);
        b.ret(Some(last));
        module
    }

    #[test]
    fn loop_executes_and_counts_checks() {
        let module = counting_loop(true);
        let trace = Machine::new(&module).run(0, &[5]).unwrap();
        // one lower and one upper check per iteration
        assert_eq!(trace.check_count(), 10);
        assert_eq!(trace.failure_count(), 0);
        assert_eq!(trace.returned, Some(0));
    }

    #[test]
    fn out_of_bounds_iteration_fails_upper_checks() {
        let module = counting_loop(true);
        let trace = Machine::new(&module).run(0, &[9]).unwrap();
        assert!(trace.failed());
        // i = 8 fails the upper check against bound 7
        assert_eq!(trace.failure_count(), 1);
    }

    #[test]
    fn unchecked_loop_has_empty_trace(){
        let module = counting_loop(false);
        let trace = Machine::new(&module).run(0, &[5]).unwrap();
        assert_eq!(trace.check_count(), 0);
    }

    #[test]
    fn fuel_runs_out() {
        let module = counting_loop(false);
        let err = Machine::new(&module).with_fuel(10).run(0, &[100]);
        assert!(matches!(err, Err(InterpError::FuelExhausted)));
    }
}
