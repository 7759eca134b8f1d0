use parapet_ir::{Block, Function, PredecessorMap};

use crate::cgen::{CheckUniverse, build_cgen};
use crate::dataflow::{Direction, run_fixpoint};
use crate::effect::EffectSummary;
use crate::error::OptError;
use crate::transfer::{drop_stored_bounds, filter_set};

/// Forward fixpoint per subscript variable, then delete every check whose
/// predicate is already implied at its block's entry, or which cannot
/// fail at all. Deletions cascade into single-use support instructions.
pub fn run_elimination(
    f: &mut Function,
    universe: &CheckUniverse,
    effects: &EffectSummary,
    preds: &PredecessorMap,
    rpo: &[Block],
) -> Result<usize, OptError> {
    let mut erased = 0;

    // constant predicates that hold unconditionally cannot fail; this is
    // what retires checks on constant subscripts
    for site in &universe.sites {
        if !f.is_erased(site.inst) && site.predicate.always_true() {
            f.erase_with_operands(site.inst);
            erased += 1;
        }
    }

    for &variable in &universe.subscript_variables {
        let cgen = build_cgen(f, universe, variable, Direction::Forward, effects)?;
        let result = run_fixpoint(f, preds, rpo, &cgen, Direction::Forward, |set, block| {
            let kept = filter_set(set, Direction::Forward, &effects.effect(variable, block))?;
            drop_stored_bounds(&kept, effects, block)
        })?;
        for site in universe.sites_of(variable) {
            if f.is_erased(site.inst) {
                continue;
            }
            if let Some(facts) = result.c_in.get(&site.block) {
                if facts.subsumes(&site.predicate) {
                    f.erase_with_operands(site.inst);
                    erased += 1;
                }
            }
        }
    }
    Ok(erased)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgen::{CheckSymbols, collect_checks};
    use crate::effect::EffectSummary;
    use parapet_ir::{FunctionBuilder, Module, Opcode, reverse_post_order, predecessors};

    fn count_checks(module: &Module, index: usize) -> usize {
        let f = module.function(index);
        f.blocks()
            .flat_map(|b| f.insts(b).collect::<Vec<_>>())
            .filter(|&inst| matches!(f.inst(inst).opcode(), Opcode::Call(_)))
            .count()
    }

    #[test]
    fn straight_line_duplicate_across_blocks_is_deleted() {
        // two consecutive blocks both check the same subscript; the second
        // pair is implied by the first
        let mut module = Module::new("t.c");
        let symbols = CheckSymbols::intern(&mut module);
        let file = module.source_file();
        let index = module.add_function("f", 1);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let first = b.add_block();
        let second = b.add_block();
        b.switch_to(first);
        let i_slot = b.alloca(1);
        b.store(b.param(0), i_slot);
        let zero = b.constant(0);
        let nine = b.constant(9);
        let file_ref = b.func().global_ref(file);
        let i = b.load(i_slot);
        b.call_void(symbols.lower, [zero, i, file_ref, zero]);
        b.call_void(symbols.upper, [nine, i, file_ref, zero]);
        b.br(second);
        b.switch_to(second);
        let i2 = b.load(i_slot);
        b.call_void(symbols.lower, [zero, i2, file_ref, zero]);
        b.call_void(symbols.upper, [nine, i2, file_ref, zero]);
        b.ret(None);

        assert_eq!(count_checks(&module, index), 4);
        let f = module.function_mut(index);
        let universe = collect_checks(f, symbols);
        let effects = EffectSummary::compute(f, &universe.subscript_variables);
        let preds = predecessors(f);
        let rpo = reverse_post_order(f);
        let erased = run_elimination(f, &universe, &effects, &preds, &rpo).unwrap();
        assert_eq!(erased, 2);
        assert_eq!(count_checks(&module, index), 2);
    }

    #[test]
    fn store_between_checks_blocks_deletion() {
        // the second block overwrites i with an unknown value, so its
        // checks must stay
        let mut module = Module::new("t.c");
        let symbols = CheckSymbols::intern(&mut module);
        let opaque = module.intern("mystery");
        let file = module.source_file();
        let index = module.add_function("f", 1);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let first = b.add_block();
        let second = b.add_block();
        b.switch_to(first);
        let i_slot = b.alloca(1);
        b.store(b.param(0), i_slot);
        let zero = b.constant(0);
        let nine = b.constant(9);
        let file_ref = b.func().global_ref(file);
        let i = b.load(i_slot);
        b.call_void(symbols.lower, [zero, i, file_ref, zero]);
        b.call_void(symbols.upper, [nine, i, file_ref, zero]);
        let fresh = b.call(opaque, []);
        b.store(fresh, i_slot);
        b.br(second);
        b.switch_to(second);
        let i2 = b.load(i_slot);
        b.call_void(symbols.lower, [zero, i2, file_ref, zero]);
        b.call_void(symbols.upper, [nine, i2, file_ref, zero]);
        b.ret(None);

        let f = module.function_mut(index);
        let universe = collect_checks(f, symbols);
        let effects = EffectSummary::compute(f, &universe.subscript_variables);
        let preds = predecessors(f);
        let rpo = reverse_post_order(f);
        let erased = run_elimination(f, &universe, &effects, &preds, &rpo).unwrap();
        assert_eq!(erased, 0);
        assert_eq!(count_checks(&module, index), 5);
    }

    #[test]
    fn constant_subscript_checks_vanish() {
        let mut module = Module::new("t.c");
        let symbols = CheckSymbols::intern(&mut module);
        let file = module.source_file();
        let index = module.add_function("f", 0);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        b.switch_to(entry);
        let three = b.constant(3);
        let nine = b.constant(9);
        let zero = b.constant(0);
        let file_ref = b.func().global_ref(file);
        b.call_void(symbols.lower, [zero, three, file_ref, zero]);
        b.call_void(symbols.upper, [nine, three, file_ref, zero]);
        b.ret(None);

        let f = module.function_mut(index);
        let universe = collect_checks(f, symbols);
        let effects = EffectSummary::compute(f, &universe.subscript_variables);
        let preds = predecessors(f);
        let rpo = reverse_post_order(f);
        let erased = run_elimination(f, &universe, &effects, &preds, &rpo).unwrap();
        assert_eq!(erased, 2);
        assert_eq!(count_checks(&module, index), 0);
    }
}
