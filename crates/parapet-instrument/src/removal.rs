use parapet_ir::{Module, Opcode};

/// Strip the `array-access` annotations once the consumers downstream are
/// done with them, so the metadata never leaks into emitted output.
/// Returns how many annotations were removed.
pub fn remove_access_metadata(module: &mut Module, index: usize) -> usize {
    let f = module.function_mut(index);
    let mut removed = 0;
    for block in f.blocks().collect::<Vec<_>>() {
        let annotated: Vec<_> = f
            .insts(block)
            .filter(|&inst| {
                *f.inst(inst).opcode() == Opcode::Gep && f.inst(inst).access().is_some()
            })
            .collect();
        for inst in annotated {
            f.clear_access(inst);
            removed += 1;
        }
    }
    removed
}
