//! Canonical instrumented programs shared by unit and integration tests.
//!
//! Each builder constructs the raw IR the way a `-O0` front end would
//! (scalars live in one-cell allocas, loop counters are load/store
//! traffic), then runs the detection and insertion passes so the checks
//! in the returned module are exactly what the instrumenter plants.

use parapet_instrument::instrument_module;
use parapet_ir::{
    CHECK_LOWER_BOUND, CHECK_UPPER_BOUND, CmpPred, FunctionBuilder, MALLOC, Module, Opcode, Value,
};

pub struct Scenario {
    pub module: Module,
    pub function: usize,
}

impl Scenario {
    /// `(lower, upper)` check-call counts of the scenario function.
    pub fn check_counts(&self) -> (usize, usize) {
        let lower = self.module.lookup(CHECK_LOWER_BOUND);
        let upper = self.module.lookup(CHECK_UPPER_BOUND);
        let f = self.module.function(self.function);
        let mut counts = (0, 0);
        for b in f.blocks() {
            for inst in f.insts(b) {
                if let Opcode::Call(callee) = f.inst(inst).opcode() {
                    if Some(*callee) == lower {
                        counts.0 += 1;
                    } else if Some(*callee) == upper {
                        counts.1 += 1;
                    }
                }
            }
        }
        counts
    }

    pub fn total_checks(&self) -> usize {
        let (lower, upper) = self.check_counts();
        lower + upper
    }
}

/// S1: a single block reads `a[3]` from a static array of size 10.
pub fn constant_index() -> Scenario {
    let mut module = Module::new("s1.c");
    let function = module.add_function("main", 0);
    let f = module.function_mut(function);
    let mut b = FunctionBuilder::new(f);
    let entry = b.add_block();
    b.switch_to(entry);
    b.set_line(2);
    let arr = b.alloca(10);
    b.set_line(3);
    let three = b.constant(3);
    let slot = b.gep(arr, three);
    let value = b.load(slot);
    b.ret(Some(value));

    instrument_module(&mut module);
    Scenario { module, function }
}

/// Shared skeleton: `entry → header → body → header | exit` with the
/// counter and the array pointer in one-cell slots. The `body` closure
/// receives the builder plus `(i_slot, array_slot)` and emits the body
/// *before* the counter update; `step` emits the update.
fn counted_loop(
    source: &str,
    init: impl FnOnce(&mut FunctionBuilder<'_>, Value) -> Value,
    guard: impl FnOnce(&mut FunctionBuilder<'_>, Value, Value) -> Value,
    body: impl FnOnce(&mut FunctionBuilder<'_>, Value, Value),
    step: impl FnOnce(&mut FunctionBuilder<'_>, Value),
) -> Scenario {
    let mut module = Module::new(source);
    let malloc = module.intern(MALLOC);
    let function = module.add_function("fill", 1);
    let f = module.function_mut(function);
    let mut b = FunctionBuilder::new(f);
    let entry = b.add_block();
    let header = b.add_block();
    let body_block = b.add_block();
    let exit = b.add_block();

    b.switch_to(entry);
    b.set_line(1);
    let n_slot = b.alloca(1);
    b.store(b.param(0), n_slot);
    let n = b.load(n_slot);
    let eight = b.constant(8);
    let bytes = b.mul(eight, n);
    let array = b.call(malloc, [bytes]);
    let array_slot = b.alloca(1);
    b.store(array, array_slot);
    let i_slot = b.alloca(1);
    let init_value = init(&mut b, n_slot);
    b.store(init_value, i_slot);
    b.br(header);

    b.switch_to(header);
    b.set_line(2);
    let i = b.load(i_slot);
    let keep_going = guard(&mut b, i, n_slot);
    b.cond_br(keep_going, body_block, exit);

    b.switch_to(body_block);
    b.set_line(3);
    body(&mut b, i_slot, array_slot);
    step(&mut b, i_slot);
    b.br(header);

    b.switch_to(exit);
    b.set_line(5);
    b.ret(None);

    instrument_module(&mut module);
    Scenario { module, function }
}

/// S2: `for (i = 0; i < n; ++i) a[i] = 0;` over `malloc(8 * n)`.
pub fn unit_stride_loop() -> Scenario {
    counted_loop(
        "s2.c",
        |b, _n_slot| b.constant(0),
        |b, i, n_slot| {
            let n = b.load(n_slot);
            b.icmp(CmpPred::Slt, i, n)
        },
        |b, i_slot, array_slot| {
            let i = b.load(i_slot);
            let array = b.load(array_slot);
            let slot = b.gep(array, i);
            let zero = b.constant(0);
            b.store(zero, slot);
        },
        |b, i_slot| {
            let i = b.load(i_slot);
            let one = b.constant(1);
            let next = b.add(i, one);
            b.store(next, i_slot);
        },
    )
}

/// S3: `for (i = 1; i <= n-1; ++i) a[i-1] = a[i];`.
pub fn strict_less_shift() -> Scenario {
    counted_loop(
        "s3.c",
        |b, _n_slot| b.constant(1),
        |b, i, n_slot| {
            let n = b.load(n_slot);
            let one = b.constant(1);
            let limit = b.sub(n, one);
            b.icmp(CmpPred::Sle, i, limit)
        },
        |b, i_slot, array_slot| {
            let i = b.load(i_slot);
            let array = b.load(array_slot);
            let src = b.gep(array, i);
            let value = b.load(src);
            let i2 = b.load(i_slot);
            let one = b.constant(1);
            let shifted = b.sub(i2, one);
            let array2 = b.load(array_slot);
            let dst = b.gep(array2, shifted);
            b.store(value, dst);
        },
        |b, i_slot| {
            let i = b.load(i_slot);
            let one = b.constant(1);
            let next = b.add(i, one);
            b.store(next, i_slot);
        },
    )
}

/// S4: `for (i = n-1; i >= 0; --i) a[i] = 0;`.
pub fn decreasing_loop() -> Scenario {
    counted_loop(
        "s4.c",
        |b, n_slot| {
            let n = b.load(n_slot);
            let one = b.constant(1);
            b.sub(n, one)
        },
        |b, i, _n_slot| {
            let zero = b.constant(0);
            b.icmp(CmpPred::Sge, i, zero)
        },
        |b, i_slot, array_slot| {
            let i = b.load(i_slot);
            let array = b.load(array_slot);
            let slot = b.gep(array, i);
            let zero = b.constant(0);
            b.store(zero, slot);
        },
        |b, i_slot| {
            let i = b.load(i_slot);
            let one = b.constant(1);
            let next = b.sub(i, one);
            b.store(next, i_slot);
        },
    )
}

/// S5: `a[i] = a[i] + a[i];` puts three identical subscripts in one block
/// against a static array of size 10.
pub fn same_block_duplicates() -> Scenario {
    let mut module = Module::new("s5.c");
    let function = module.add_function("sum", 1);
    let f = module.function_mut(function);
    let mut b = FunctionBuilder::new(f);
    let entry = b.add_block();
    b.switch_to(entry);
    b.set_line(2);
    let arr = b.alloca(10);
    let i_slot = b.alloca(1);
    b.store(b.param(0), i_slot);
    b.set_line(3);
    let i1 = b.load(i_slot);
    let first = b.gep(arr, i1);
    let lhs = b.load(first);
    let i2 = b.load(i_slot);
    let second = b.gep(arr, i2);
    let rhs = b.load(second);
    let sum = b.add(lhs, rhs);
    let i3 = b.load(i_slot);
    let dst = b.gep(arr, i3);
    b.store(sum, dst);
    b.ret(None);

    instrument_module(&mut module);
    Scenario { module, function }
}

/// One time-step of the jacobi-1d stencil:
/// `for (i = 1; i < n-1; ++i) b[i] = a[i-1] + a[i] + a[i+1];`
/// over two heap arrays of `n` elements. Four subscripts, eight checks.
pub fn jacobi_1d_step() -> Scenario {
    let mut module = Module::new("jacobi-1d.c");
    let malloc = module.intern(MALLOC);
    let function = module.add_function("kernel_jacobi_1d", 1);
    let f = module.function_mut(function);
    let mut b = FunctionBuilder::new(f);
    let entry = b.add_block();
    let header = b.add_block();
    let body = b.add_block();
    let exit = b.add_block();

    b.switch_to(entry);
    b.set_line(1);
    let n_slot = b.alloca(1);
    b.store(b.param(0), n_slot);
    let n = b.load(n_slot);
    let eight = b.constant(8);
    let bytes = b.mul(eight, n);
    let a = b.call(malloc, [bytes]);
    let a_slot = b.alloca(1);
    b.store(a, a_slot);
    let b_arr = b.call(malloc, [bytes]);
    let b_slot = b.alloca(1);
    b.store(b_arr, b_slot);
    let i_slot = b.alloca(1);
    let one = b.constant(1);
    b.store(one, i_slot);
    b.br(header);

    b.switch_to(header);
    b.set_line(3);
    let i = b.load(i_slot);
    let n2 = b.load(n_slot);
    let limit = b.sub(n2, one);
    let keep_going = b.icmp(CmpPred::Slt, i, limit);
    b.cond_br(keep_going, body, exit);

    b.switch_to(body);
    b.set_line(4);
    let i2 = b.load(i_slot);
    let a_base = b.load(a_slot);
    let left_index = b.sub(i2, one);
    let left = b.gep(a_base, left_index);
    let left_value = b.load(left);
    let mid = b.gep(a_base, i2);
    let mid_value = b.load(mid);
    let right_index = b.add(i2, one);
    let right = b.gep(a_base, right_index);
    let right_value = b.load(right);
    let partial = b.add(left_value, mid_value);
    let stencil = b.add(partial, right_value);
    let b_base = b.load(b_slot);
    let dst = b.gep(b_base, i2);
    b.store(stencil, dst);
    let next = b.add(i2, one);
    b.store(next, i_slot);
    b.br(header);

    b.switch_to(exit);
    b.set_line(6);
    b.ret(None);

    instrument_module(&mut module);
    Scenario { module, function }
}

/// S6: `for (i = 0; i < n; ++i) { a[i] = 0; i = f(); }` where the
/// counter's update is an opaque call, so nothing may move.
pub fn unknown_update_loop() -> Scenario {
    let mut module = Module::new("s6.c");
    let opaque = module.intern("f");
    let function = module.add_function("fill", 1);
    let f = module.function_mut(function);
    let mut b = FunctionBuilder::new(f);
    let entry = b.add_block();
    let header = b.add_block();
    let body = b.add_block();
    let exit = b.add_block();

    b.switch_to(entry);
    b.set_line(1);
    let arr = b.alloca(10);
    let n_slot = b.alloca(1);
    b.store(b.param(0), n_slot);
    let i_slot = b.alloca(1);
    let zero = b.constant(0);
    b.store(zero, i_slot);
    b.br(header);

    b.switch_to(header);
    b.set_line(2);
    let i = b.load(i_slot);
    let n = b.load(n_slot);
    let keep_going = b.icmp(CmpPred::Slt, i, n);
    b.cond_br(keep_going, body, exit);

    b.switch_to(body);
    b.set_line(3);
    let i2 = b.load(i_slot);
    let slot = b.gep(arr, i2);
    b.store(zero, slot);
    let fresh = b.call(opaque, []);
    b.store(fresh, i_slot);
    b.br(header);

    b.switch_to(exit);
    b.set_line(5);
    b.ret(None);

    instrument_module(&mut module);
    Scenario { module, function }
}
