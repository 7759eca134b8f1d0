use smallvec::SmallVec;

use parapet_ir::{
    ArrayAccess, CHECK_LOWER_BOUND, CHECK_UPPER_BOUND, Inst, InstData, Module, Opcode, Value,
    is_host_library,
};

/// Plant the guard pair before every annotated `Gep`:
/// `checkLowerBound(0, index, file, line)` asserting `0 ≤ index`, and
/// `checkUpperBound(bound − 1, index, file, line)` asserting
/// `index ≤ bound − 1`, the exclusive-lower / inclusive-upper convention
/// of the check ABI.
pub fn insert_bound_checks(module: &mut Module, index: usize) {
    if is_host_library(module.resolve(module.function(index).name())) {
        return;
    }
    let check_lower = module.intern(CHECK_LOWER_BOUND);
    let check_upper = module.intern(CHECK_UPPER_BOUND);
    let file = module.source_file();
    let f = module.function_mut(index);

    let mut annotated: Vec<(Inst, ArrayAccess)> = Vec::new();
    for b in f.blocks().collect::<Vec<_>>() {
        for inst in f.insts(b) {
            if *f.inst(inst).opcode() == Opcode::Gep {
                if let Some(access) = f.inst(inst).access() {
                    annotated.push((inst, *access));
                }
            }
        }
    }

    let file_ref = f.global_ref(file);
    let zero = f.constant(0);
    for (gep, access) in annotated {
        let line = f.inst(gep).line();
        let subscript = f.inst(gep).operands()[1];
        let upper = match access {
            ArrayAccess::Static { count } => f.constant(count as i64 - 1),
            ArrayAccess::Dynamic { bound, .. } => {
                let one = f.constant(1);
                let minus_one = f.insert_before(
                    gep,
                    InstData::new(Opcode::Sub)
                        .with_operands([bound, one])
                        .with_line(line),
                );
                f.inst(minus_one)
                    .result()
                    .expect("sub always produces a value")
            }
        };
        let lower_args: SmallVec<[Value; 4]> =
            SmallVec::from_iter([zero, subscript, file_ref, f.constant(line as i64)]);
        let upper_args: SmallVec<[Value; 4]> =
            SmallVec::from_iter([upper, subscript, file_ref, f.constant(line as i64)]);
        f.insert_before(
            gep,
            InstData::new(Opcode::Call(check_lower))
                .with_operands(lower_args)
                .with_line(line),
        );
        f.insert_before(
            gep,
            InstData::new(Opcode::Call(check_upper))
                .with_operands(upper_args)
                .with_line(line),
        );
    }
}
