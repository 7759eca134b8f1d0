use rustc_hash::FxHashMap;

use parapet_ir::{Block, DomTree, Function, PredecessorMap, Value};

use crate::cgen::{CheckSymbols, CheckUniverse, build_cgen};
use crate::dataflow::{Direction, run_fixpoint};
use crate::effect::EffectSummary;
use crate::emit::{adjust_bound_operand, expr_available, insert_check_before_terminator};
use crate::error::OptError;
use crate::predicate::{PredicateKind, PredicateParts};
use crate::set::BoundPredicateSet;
use crate::transfer::{drop_stored_bounds, filter_set};

/// Backward fixpoint per subscript variable, then rewrite surviving checks
/// with the tightest justified bound and plant checks for directions every
/// successor path already guarantees.
pub fn run_modification(
    f: &mut Function,
    universe: &CheckUniverse,
    effects: &EffectSummary,
    preds: &PredecessorMap,
    rpo: &[Block],
    dom: &DomTree,
    symbols: CheckSymbols,
) -> Result<(), OptError> {
    for &variable in &universe.subscript_variables {
        let cgen = build_cgen(f, universe, variable, Direction::Backward, effects)?;
        let result = run_fixpoint(f, preds, rpo, &cgen, Direction::Backward, |set, block| {
            let kept = filter_set(set, Direction::Backward, &effects.effect(variable, block))?;
            drop_stored_bounds(&kept, effects, block)
        })?;
        apply_modification(f, universe, variable, &result.c_out, dom, symbols)?;
    }
    Ok(())
}

fn apply_modification(
    f: &mut Function,
    universe: &CheckUniverse,
    variable: Value,
    c_out: &FxHashMap<Block, BoundPredicateSet>,
    dom: &DomTree,
    symbols: CheckSymbols,
) -> Result<(), OptError> {
    let Some(file) = universe.file else {
        return Ok(());
    };
    for block in f.blocks().collect::<Vec<_>>() {
        let Some(out) = c_out.get(&block) else {
            continue;
        };
        if out.is_empty() {
            continue;
        }

        let mut saw_lower = false;
        let mut saw_upper = false;
        for site in universe.sites_of(variable).filter(|s| s.block == block) {
            let matching = match site.kind {
                PredicateKind::Lower => {
                    saw_lower = true;
                    out.lowers()
                }
                PredicateKind::Upper => {
                    saw_upper = true;
                    out.uppers()
                }
            };
            let Some(tighter) = matching.iter().find(|p| {
                p.index == site.parts().index
                    && p.bound.identity() == site.parts().bound.identity()
            }) else {
                continue;
            };
            let diff = tighter.bound.b - site.parts().bound.b;
            let strictly_tighter = match site.kind {
                PredicateKind::Lower => diff > 0,
                PredicateKind::Upper => diff < 0,
            };
            if strictly_tighter {
                adjust_bound_operand(f, site.inst, diff);
            }
        }

        // a direction proven on every successor path but absent here
        // becomes a fresh check at the block's exit
        let missing: Vec<(PredicateKind, PredicateParts)> = [
            (PredicateKind::Lower, out.lowers(), saw_lower),
            (PredicateKind::Upper, out.uppers(), saw_upper),
        ]
        .into_iter()
        .filter(|(_, _, present)| !present)
        .flat_map(|(kind, list, _)| list.iter().map(move |p| (kind, *p)))
        .collect();

        for (kind, parts) in missing {
            if !expr_available(dom, f, &parts.bound, block)
                || !expr_available(dom, f, &parts.index, block)
            {
                continue;
            }
            insert_check_before_terminator(f, block, kind, &parts, symbols, file);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgen::collect_checks;
    use parapet_ir::{DomTree, FunctionBuilder, Module, Opcode, predecessors, reverse_post_order};

    /// A diamond where both arms check the same subscript, one of them
    /// tighter. The entry block's check is rewritten to the weaker of the
    /// two (the only bound every path justifies), and no new check
    /// appears anywhere.
    #[test]
    fn diamond_tightens_entry_check_to_common_bound() {
        let mut module = Module::new("t.c");
        let symbols = CheckSymbols::intern(&mut module);
        let file = module.source_file();
        let index = module.add_function("f", 1);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        let left = b.add_block();
        let right = b.add_block();
        let join = b.add_block();

        b.switch_to(entry);
        let i_slot = b.alloca(1);
        b.store(b.param(0), i_slot);
        let zero = b.constant(0);
        let file_ref = b.func().global_ref(file);
        let i0 = b.load(i_slot);
        let nine = b.constant(9);
        let entry_check = b.call_void(symbols.upper, [nine, i0, file_ref, zero]);
        let cond = b.icmp(parapet_ir::CmpPred::Slt, i0, zero);
        b.cond_br(cond, left, right);

        b.switch_to(left);
        let i1 = b.load(i_slot);
        let seven = b.constant(7);
        b.call_void(symbols.upper, [seven, i1, file_ref, zero]);
        b.br(join);

        b.switch_to(right);
        let i2 = b.load(i_slot);
        let five = b.constant(5);
        b.call_void(symbols.upper, [five, i2, file_ref, zero]);
        b.br(join);

        b.switch_to(join);
        b.ret(None);

        let f = module.function_mut(index);
        let universe = collect_checks(f, symbols);
        let effects = EffectSummary::compute(f, &universe.subscript_variables);
        let preds = predecessors(f);
        let rpo = reverse_post_order(f);
        let dom = DomTree::new(f);
        run_modification(f, &universe, &effects, &preds, &rpo, &dom, symbols).unwrap();

        // entry's bound 9 tightened to the weaker arm's 7
        assert_eq!(f.const_value(f.inst(entry_check).operands()[0]), Some(7));
    }

    /// Successor paths all perform a lower check the predecessor block
    /// lacks; modification plants one at the predecessor's exit.
    #[test]
    fn missing_direction_is_inserted_at_block_exit() {
        let mut module = Module::new("t.c");
        let symbols = CheckSymbols::intern(&mut module);
        let file = module.source_file();
        let index = module.add_function("f", 1);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        let next = b.add_block();

        b.switch_to(entry);
        let i_slot = b.alloca(1);
        b.store(b.param(0), i_slot);
        b.br(next);

        b.switch_to(next);
        let zero = b.constant(0);
        let file_ref = b.func().global_ref(file);
        let i = b.load(i_slot);
        b.call_void(symbols.lower, [zero, i, file_ref, zero]);
        b.ret(None);

        let f = module.function_mut(index);
        let universe = collect_checks(f, symbols);
        let effects = EffectSummary::compute(f, &universe.subscript_variables);
        let preds = predecessors(f);
        let rpo = reverse_post_order(f);
        let dom = DomTree::new(f);
        run_modification(f, &universe, &effects, &preds, &rpo, &dom, symbols).unwrap();

        let entry_checks = f
            .insts(entry)
            .filter(|&inst| matches!(f.inst(inst).opcode(), Opcode::Call(_)))
            .count();
        assert_eq!(entry_checks, 1);
    }
}
