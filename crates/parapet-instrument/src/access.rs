use rustc_hash::FxHashMap;

use parapet_ir::{
    ArrayAccess, Function, Inst, MALLOC, Module, Opcode, Value, is_host_library,
};

/// Cell size of the IR's integer type, in bytes. Allocation sizes are
/// expressed in bytes, bounds in elements.
const ELEM_SIZE: i64 = 8;

/// Attach `ArrayAccess` metadata to every `Gep` whose bound can be
/// recovered: the element count of a fixed-size alloca, or the `n` of a
/// `malloc(ELEM_SIZE * n)` allocation reached through load/store value
/// tracking. Geps with no recoverable bound stay unannotated.
pub fn detect_array_accesses(module: &mut Module, index: usize) {
    if is_host_library(module.resolve(module.function(index).name())) {
        return;
    }
    let malloc = module.lookup(MALLOC);
    let f = module.function_mut(index);

    // value-source tracking: which allocation call a pointer value
    // originates from, propagated through stores and loads of scalar slots
    let mut value_source: FxHashMap<Value, Inst> = FxHashMap::default();
    let mut geps: Vec<Inst> = Vec::new();
    for b in f.blocks().collect::<Vec<_>>() {
        for inst in f.insts(b) {
            let info = f.inst(inst);
            match info.opcode() {
                Opcode::Call(callee) if Some(*callee) == malloc => {
                    if let Some(result) = info.result() {
                        value_source.insert(result, inst);
                    }
                }
                Opcode::Store => {
                    let value = info.operands()[0];
                    let slot = info.operands()[1];
                    if let Some(&source) = value_source.get(&value) {
                        value_source.insert(slot, source);
                    }
                }
                Opcode::Load => {
                    let slot = info.operands()[0];
                    if let Some(&source) = value_source.get(&slot) {
                        if let Some(result) = info.result() {
                            value_source.insert(result, source);
                        }
                    }
                }
                Opcode::Gep => geps.push(inst),
                _ => {}
            }
        }
    }

    for gep in geps {
        if let Some(access) = classify_gep(f, gep, &value_source) {
            f.set_access(gep, access);
        }
    }
}

fn classify_gep(
    f: &mut Function,
    gep: Inst,
    value_source: &FxHashMap<Value, Inst>,
) -> Option<ArrayAccess> {
    let base = f.inst(gep).operands()[0];
    if let Some(def) = f.defining_inst(base) {
        if let Opcode::Alloca { slots } = *f.inst(def).opcode() {
            // a one-slot alloca is a scalar, not an array
            return (slots > 1).then_some(ArrayAccess::Static { count: slots });
        }
    }
    let allocator = *value_source.get(&base)?;
    let bound = allocation_bound(f, allocator)?;
    Some(ArrayAccess::Dynamic { bound, allocator })
}

/// Recover the element count from an allocation call's size operand.
/// Only the shape `ELEM_SIZE * n` (either operand order) and plain
/// constants are recognized; anything else yields no bound.
fn allocation_bound(f: &mut Function, allocator: Inst) -> Option<Value> {
    let size = *f.inst(allocator).operands().first()?;
    if let Some(bytes) = f.const_value(size) {
        return (bytes % ELEM_SIZE == 0).then(|| f.constant(bytes / ELEM_SIZE));
    }
    let def = f.defining_inst(size)?;
    if *f.inst(def).opcode() != Opcode::Mul {
        return None;
    }
    let lhs = f.inst(def).operands()[0];
    let rhs = f.inst(def).operands()[1];
    if f.const_value(lhs) == Some(ELEM_SIZE) {
        Some(rhs)
    } else if f.const_value(rhs) == Some(ELEM_SIZE) {
        Some(lhs)
    } else {
        None
    }
}
