use rustc_hash::FxHashSet;

use parapet_ir::{
    Block, CmpPred, DomTree, Function, Inst, NaturalLoop, Opcode, PredecessorMap, Value,
};

use crate::cgen::{CheckSite, CheckSymbols, scan_block_checks};
use crate::effect::EffectSummary;
use crate::emit::{expr_available, insert_check_before_terminator};
use crate::error::OptError;
use crate::predicate::{BoundPredicate, PredicateKind, PredicateParts};
use crate::set::BoundPredicateSet;
use crate::subscript::{SubscriptBase, SubscriptExpr, resolve_at_block_end};

/// How a check's subscript variable interacts with its enclosing loop.
/// A check may match several patterns; a check matching none is not a
/// candidate and is never moved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CandidateKinds {
    pub invariant: bool,
    pub increasing: bool,
    pub decreasing: bool,
    pub unit_stride: bool,
}

impl CandidateKinds {
    pub fn any(&self) -> bool {
        self.invariant || self.increasing || self.decreasing || self.unit_stride
    }
}

/// Classify one check against one loop from the affine store shapes of
/// the loop's blocks.
fn classify(f: &Function, lp: &NaturalLoop, effects: &EffectSummary, site: &CheckSite) -> CandidateKinds {
    let mut kinds = CandidateKinds::default();
    match site.parts().index.base {
        None => kinds.invariant = true,
        Some(SubscriptBase::Direct(v)) => {
            kinds.invariant = match f.defining_inst(v) {
                Some(def) => !lp.contains(f.inst(def).parent()),
                None => true,
            };
        }
        Some(SubscriptBase::Slot(variable)) => {
            let mut stored = false;
            let mut increasing = true;
            let mut decreasing = true;
            let mut unit_stride = true;
            for &block in &lp.blocks {
                for shape in effects.store_shapes(variable, block) {
                    stored = true;
                    let Some(expr) = shape else {
                        return CandidateKinds::default();
                    };
                    increasing &= expr.a >= 1 && expr.b >= 0;
                    decreasing &= expr.a == 1 && expr.b <= 0;
                    unit_stride &= expr.a == 1 && (expr.b == 1 || expr.b == -1);
                }
            }
            if stored {
                kinds.increasing = increasing;
                kinds.decreasing = decreasing;
                kinds.unit_stride = unit_stride;
            } else {
                kinds.invariant = true;
            }
        }
    }
    kinds
}

fn loop_has_store_to(f: &Function, lp: &NaturalLoop, slot: Value) -> bool {
    lp.blocks.iter().any(|&block| {
        f.insts(block).any(|inst| {
            let info = f.inst(inst);
            *info.opcode() == Opcode::Store && info.operands()[1] == slot
        })
    })
}

/// An expression is safe to move above the loop only when nothing inside
/// the loop rewrites the cells it reads.
fn expr_loop_invariant(f: &Function, lp: &NaturalLoop, expr: &SubscriptExpr) -> bool {
    match expr.base {
        None => true,
        _ if expr.is_constant() => true,
        Some(SubscriptBase::Slot(p)) => !loop_has_store_to(f, lp, p),
        Some(SubscriptBase::Direct(v)) => match f.defining_inst(v) {
            Some(def) => !lp.contains(f.inst(def).parent()),
            None => true,
        },
    }
}

/// Run both hoisting steps over every natural loop, innermost first.
pub fn run_loop_propagation(
    f: &mut Function,
    effects: &EffectSummary,
    dom: &DomTree,
    preds: &PredecessorMap,
    loops: &[NaturalLoop],
    symbols: CheckSymbols,
) -> Result<(), OptError> {
    for lp in loops {
        intra_loop_hoist(f, lp, dom, preds, effects, symbols)?;
        out_of_loop_hoist(f, lp, dom, preds, effects, symbols)?;
    }
    Ok(())
}

/// Step A: move checks performed by every non-dominating successor up to
/// their unique predecessor, one edge set at a time, to a fixpoint.
fn intra_loop_hoist(
    f: &mut Function,
    lp: &NaturalLoop,
    dom: &DomTree,
    preds: &PredecessorMap,
    effects: &EffectSummary,
    symbols: CheckSymbols,
) -> Result<(), OptError> {
    let dominating = lp.blocks_dominating_all_exits(f, dom);
    let nd: FxHashSet<Block> = lp
        .blocks
        .iter()
        .copied()
        .filter(|b| !dominating.contains(b))
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for n in f.blocks().collect::<Vec<_>>() {
            if !lp.contains(n) {
                continue;
            }
            let succs: Vec<Block> = f
                .successors(n)
                .iter()
                .copied()
                .filter(|&s| lp.contains(s) && s != n)
                .collect();
            if succs.is_empty()
                || !succs.iter().all(|s| nd.contains(s))
                || !succs
                    .iter()
                    .all(|s| preds.get(s).is_some_and(|p| p.len() == 1 && p[0] == n))
            {
                continue;
            }

            // group candidate checks of each successor by subscript identity
            let per_succ: Vec<Vec<CheckSite>> = succs
                .iter()
                .map(|&s| {
                    scan_block_checks(f, s, symbols)
                        .into_iter()
                        .filter(|site| classify(f, lp, effects, site).any())
                        .collect()
                })
                .collect();

            let identities: Vec<_> = {
                let mut seen = Vec::new();
                for site in per_succ.iter().flatten() {
                    let id = site.parts().index.identity();
                    if !seen.contains(&id) {
                        seen.push(id);
                    }
                }
                seen
            };

            for identity in identities {
                let mut sets = Vec::with_capacity(per_succ.len());
                for sites in &per_succ {
                    let mut set = BoundPredicateSet::new();
                    for site in sites {
                        if site.parts().index.identity() == identity {
                            set.add_predicate(&site.predicate)?;
                        }
                    }
                    sets.push(set);
                }
                let prop = BoundPredicateSet::and_all(&sets)?;
                if prop.is_empty() {
                    continue;
                }

                for predicate in prop.iter() {
                    // every successor must still hold a copy this predicate
                    // can stand in for, and the operands must be live at n
                    let mut victims: Vec<Inst> = Vec::new();
                    let mut covered = true;
                    for sites in &per_succ {
                        let subsumed: Vec<Inst> = sites
                            .iter()
                            .filter(|site| {
                                predicate.subsumes(&site.predicate) && !f.is_erased(site.inst)
                            })
                            .map(|site| site.inst)
                            .collect();
                        if subsumed.is_empty() {
                            covered = false;
                            break;
                        }
                        victims.extend(subsumed);
                    }
                    let parts = predicate.parts();
                    if !covered
                        || !expr_available(dom, f, &parts.bound, n)
                        || !expr_available(dom, f, &parts.index, n)
                    {
                        continue;
                    }
                    let file = victims
                        .first()
                        .and_then(|&v| f.inst(v).operands().get(2).copied());
                    let Some(file) = file else {
                        continue;
                    };
                    insert_check_before_terminator(f, n, predicate.kind(), parts, symbols, file);
                    for victim in victims {
                        f.erase_with_operands(victim);
                    }
                    changed = true;
                }
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Boundary {
    Max,
    Min,
}

/// Step B: for checks sitting in a block that dominates every exit and
/// whose terminator compares the subscript variable against a
/// loop-invariant boundary, move the check above the loop, substituting
/// the extremal value where the polarity table allows it.
fn out_of_loop_hoist(
    f: &mut Function,
    lp: &NaturalLoop,
    dom: &DomTree,
    preds: &PredecessorMap,
    effects: &EffectSummary,
    symbols: CheckSymbols,
) -> Result<(), OptError> {
    let dominating = lp.blocks_dominating_all_exits(f, dom);
    for d in f.blocks().collect::<Vec<_>>() {
        if !dominating.contains(&d) {
            continue;
        }
        let out_preds: Vec<Block> = preds
            .get(&d)
            .map(|ps| ps.iter().copied().filter(|p| !lp.contains(*p)).collect())
            .unwrap_or_default();
        if out_preds.is_empty() {
            continue;
        }
        let Some(guard) = loop_guard(f, lp, d) else {
            continue;
        };

        for site in scan_block_checks(f, d, symbols) {
            let kinds = classify(f, lp, effects, &site);
            if !kinds.any() {
                continue;
            }
            hoist_site(f, lp, dom, symbols, &guard, &out_preds, &site, kinds)?;
        }
    }
    Ok(())
}

struct LoopGuard {
    /// Comparison as seen on the edge that stays in the loop.
    pred: CmpPred,
    lhs: Value,
    rhs: Value,
}

/// The conditional branch at `d` whose taken side stays inside the loop.
fn loop_guard(f: &Function, lp: &NaturalLoop, d: Block) -> Option<LoopGuard> {
    let term = f.terminator(d)?;
    let info = f.inst(term);
    if *info.opcode() != Opcode::CondBr {
        return None;
    }
    let cond = f.defining_inst(info.operands()[0])?;
    let Opcode::Icmp(pred) = *f.inst(cond).opcode() else {
        return None;
    };
    let lhs = f.inst(cond).operands()[0];
    let rhs = f.inst(cond).operands()[1];
    let (then_b, else_b) = (info.successors()[0], info.successors()[1]);
    match (lp.contains(then_b), lp.contains(else_b)) {
        (true, false) => Some(LoopGuard { pred, lhs, rhs }),
        (false, true) => Some(LoopGuard {
            pred: pred.negated(),
            lhs,
            rhs,
        }),
        _ => None,
    }
}

/// The subscript variable's initial value along the `p → d` entry edge:
/// a `Phi` incoming value when the comparison operand is one, otherwise
/// the last store to the scrutinized cell in `p`.
fn initial_value(f: &Function, d: Block, p: Block, v: Value) -> SubscriptExpr {
    if let Some(def) = f.defining_inst(v) {
        let info = f.inst(def);
        if *info.opcode() == Opcode::Phi && info.parent() == d {
            if let Some(position) = info.incoming().iter().position(|&b| b == p) {
                return SubscriptExpr::evaluate_within(f, p, info.operands()[position]);
            }
        }
    }
    let expr = SubscriptExpr::evaluate(f, v);
    resolve_at_block_end(f, p, &expr)
}

/// Decide a comparison between two initial values when they are
/// comparable (both constant, or sharing an identity).
fn decide(pred: CmpPred, l: &SubscriptExpr, r: &SubscriptExpr) -> Option<bool> {
    let comparable = (l.is_constant() && r.is_constant()) || l.identity() == r.identity();
    comparable.then(|| pred.evaluate(l.b, r.b))
}

#[allow(clippy::too_many_arguments)]
fn hoist_site(
    f: &mut Function,
    lp: &NaturalLoop,
    dom: &DomTree,
    symbols: CheckSymbols,
    guard: &LoopGuard,
    out_preds: &[Block],
    site: &CheckSite,
    kinds: CandidateKinds,
) -> Result<(), OptError> {
    let parts = *site.parts();
    let Some(index_base) = parts.index.base else {
        return Ok(());
    };

    // orient the guard so the subscript variable sits on the left
    let lhs_e = SubscriptExpr::evaluate(f, guard.lhs);
    let rhs_e = SubscriptExpr::evaluate(f, guard.rhs);
    let (pred, var_side, boundary_src) = if lhs_e.a == 1 && lhs_e.base == Some(index_base) {
        (guard.pred, lhs_e, rhs_e)
    } else if rhs_e.a == 1 && rhs_e.base == Some(index_base) {
        (guard.pred.swapped(), rhs_e, lhs_e)
    } else {
        return Ok(());
    };
    if !expr_loop_invariant(f, lp, &boundary_src) {
        return Ok(());
    }

    // `x + c ⋈ rhs` bounds `x` by `rhs − c`, adjusted for strictness
    let (boundary_kind, boundary) = match pred {
        CmpPred::Slt => (Boundary::Max, boundary_src - var_side.b - 1),
        CmpPred::Sle => (Boundary::Max, boundary_src - var_side.b),
        CmpPred::Sgt => (Boundary::Min, boundary_src - var_side.b + 1),
        CmpPred::Sge => (Boundary::Min, boundary_src - var_side.b),
        CmpPred::Eq | CmpPred::Ne => return Ok(()),
    };

    // the loop must not be provably skipped: no decidable initial pair
    // may refute the entry comparison
    for &p in out_preds {
        let l0 = initial_value(f, site.block, p, guard.lhs);
        let r0 = initial_value(f, site.block, p, guard.rhs);
        if decide(guard.pred, &l0, &r0) == Some(false) {
            return Ok(());
        }
    }

    let index_operand = f.inst(site.inst).operands()[1];
    let phi_index = f
        .defining_inst(index_operand)
        .is_some_and(|def| *f.inst(def).opcode() == Opcode::Phi);

    let substituted = PredicateParts {
        bound: parts.bound,
        index: parts.index.substitute(&boundary),
    };
    let hoisted = match (boundary_kind, site.kind) {
        (Boundary::Max, PredicateKind::Upper) => {
            if kinds.increasing || kinds.invariant || kinds.unit_stride {
                Some(substituted)
            } else if kinds.decreasing {
                Some(parts)
            } else {
                None
            }
        }
        (Boundary::Min, PredicateKind::Lower) => {
            if kinds.decreasing || kinds.invariant || kinds.unit_stride {
                Some(substituted)
            } else if kinds.increasing {
                Some(parts)
            } else {
                None
            }
        }
        (Boundary::Max, PredicateKind::Lower) => {
            ((kinds.increasing || kinds.invariant) && !phi_index).then_some(parts)
        }
        (Boundary::Min, PredicateKind::Upper) => {
            ((kinds.decreasing || kinds.invariant) && !phi_index).then_some(parts)
        }
    };
    let Some(hoisted) = hoisted else {
        return Ok(());
    };

    // bounds move above the loop, so they must be invariant too
    if !expr_loop_invariant(f, lp, &hoisted.bound) {
        return Ok(());
    }

    let predicate = match site.kind {
        PredicateKind::Lower => BoundPredicate::Lower(hoisted),
        PredicateKind::Upper => BoundPredicate::Upper(hoisted),
    };

    // plan every insertion before touching the IR; a single unavailable
    // operand leaves the check where it is
    let mut plan: Vec<(Block, bool)> = Vec::with_capacity(out_preds.len());
    for &p in out_preds {
        let resolved = PredicateParts {
            bound: resolve_at_block_end(f, p, &hoisted.bound),
            index: resolve_at_block_end(f, p, &hoisted.index),
        };
        let resolved_predicate = match site.kind {
            PredicateKind::Lower => BoundPredicate::Lower(resolved),
            PredicateKind::Upper => BoundPredicate::Upper(resolved),
        };
        if resolved_predicate.always_true() {
            plan.push((p, false));
            continue;
        }
        if !expr_available(dom, f, &hoisted.bound, p) || !expr_available(dom, f, &hoisted.index, p)
        {
            return Ok(());
        }
        plan.push((p, true));
    }

    let file = f.inst(site.inst).operands().get(2).copied();
    let Some(file) = file else {
        return Ok(());
    };
    for (p, insert) in plan {
        if insert {
            insert_check_before_terminator(f, p, site.kind, predicate.parts(), symbols, file);
        }
    }
    f.erase_with_operands(site.inst);
    Ok(())
}
