use rustc_hash::FxHashMap;

use parapet_ir::{Function, Inst, Opcode};

use crate::cgen::CheckSymbols;
use crate::emit::adjust_bound_operand;
use crate::predicate::{PredicateKind, PredicateParts};
use crate::subscript::{SubscriptExpr, SubscriptIdentity};

type DuplicateKey = (PredicateKind, SubscriptExpr, SubscriptIdentity);

/// Within each block, keep only the first check of every
/// (subscript, bound-identity) pair. A later, tighter occurrence donates
/// its tightness to the survivor before being erased along with whatever
/// single-use instructions fed it.
pub fn clean_block_duplicates(f: &mut Function, symbols: CheckSymbols) -> usize {
    let mut erased = 0;
    for block in f.blocks().collect::<Vec<_>>() {
        let mut first_seen: FxHashMap<DuplicateKey, (Inst, PredicateParts)> = FxHashMap::default();
        let checks: Vec<Inst> = f.insts(block).collect();
        for inst in checks {
            let Opcode::Call(callee) = f.inst(inst).opcode() else {
                continue;
            };
            let Some(kind) = symbols.kind_of(*callee) else {
                continue;
            };
            let bound = SubscriptExpr::evaluate(f, f.inst(inst).operands()[0]);
            let index = SubscriptExpr::evaluate(f, f.inst(inst).operands()[1]);
            let parts = PredicateParts::new(bound, index).normalized();
            let key = (kind, parts.index, parts.bound.identity());
            match first_seen.get_mut(&key) {
                None => {
                    first_seen.insert(key, (inst, parts));
                }
                Some((survivor, kept)) => {
                    let diff = parts.bound.b - kept.bound.b;
                    let tighter = match kind {
                        PredicateKind::Lower => diff > 0,
                        PredicateKind::Upper => diff < 0,
                    };
                    if tighter {
                        kept.bound.b = parts.bound.b;
                        let survivor = *survivor;
                        adjust_bound_operand(f, survivor, diff);
                    }
                    f.erase_with_operands(inst);
                    erased += 1;
                }
            }
        }
    }
    erased
}
