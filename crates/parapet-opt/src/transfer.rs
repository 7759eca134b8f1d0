use crate::dataflow::Direction;
use crate::effect::{EffectKind, EffectOnSubscript};
use crate::error::OptError;
use crate::predicate::PredicateKind;
use crate::set::BoundPredicateSet;

/// The backward monotonicity table: whether a fact about the variable's
/// exit value may be carried to its entry value across the block's effect.
///
/// Indexes are normalized, so their shape is `A·x`; the rows split on the
/// sign of `A`. The lower/decreasing/Decrement corner is resolved
/// conservatively to drop.
pub fn keep_backward(kind: PredicateKind, index_a: i64, effect: &EffectOnSubscript) -> bool {
    use EffectKind::*;
    match (kind, index_a > 0) {
        (PredicateKind::Lower, true) => matches!(effect.kind, Unchanged | Decrement),
        (PredicateKind::Lower, false) => matches!(effect.kind, Unchanged | Increment),
        (PredicateKind::Upper, true) => matches!(effect.kind, Unchanged | Increment | Multiply),
        (PredicateKind::Upper, false) => matches!(effect.kind, Unchanged | Decrement),
    }
}

/// The forward table is the reflection of the backward one: a fact about
/// the entry value survives to the exit value exactly when the subscript
/// moved in the direction the inequality tolerates.
pub fn keep_forward(kind: PredicateKind, index_a: i64, effect: &EffectOnSubscript) -> bool {
    use EffectKind::*;
    match (kind, index_a > 0) {
        (PredicateKind::Lower, true) => matches!(effect.kind, Unchanged | Increment | Multiply),
        (PredicateKind::Lower, false) => matches!(effect.kind, Unchanged | Decrement),
        (PredicateKind::Upper, true) => matches!(effect.kind, Unchanged | Decrement),
        (PredicateKind::Upper, false) => matches!(effect.kind, Unchanged | Increment),
    }
}

pub fn keeps(
    direction: Direction,
    kind: PredicateKind,
    index_a: i64,
    effect: &EffectOnSubscript,
) -> bool {
    match direction {
        Direction::Backward => keep_backward(kind, index_a, effect),
        Direction::Forward => keep_forward(kind, index_a, effect),
    }
}

/// Filter a whole set through one of the tables.
pub fn filter_set(
    set: &BoundPredicateSet,
    direction: Direction,
    effect: &EffectOnSubscript,
) -> Result<BoundPredicateSet, OptError> {
    let mut filtered = BoundPredicateSet::new();
    for p in set.lowers() {
        if keeps(direction, PredicateKind::Lower, p.index.a, effect) {
            filtered.add_lower(*p)?;
        }
    }
    for p in set.uppers() {
        if keeps(direction, PredicateKind::Upper, p.index.a, effect) {
            filtered.add_upper(*p)?;
        }
    }
    Ok(filtered)
}

/// A fact also dies when the block stores to the cell its *bound* reads;
/// the monotonicity tables only cover the index side.
pub fn bound_intact(
    bound: &crate::subscript::SubscriptExpr,
    effects: &crate::effect::EffectSummary,
    block: parapet_ir::Block,
) -> bool {
    use crate::subscript::SubscriptBase;
    match bound.base {
        Some(SubscriptBase::Slot(q)) if !bound.is_constant() => !effects.has_store(q, block),
        _ => true,
    }
}

/// Drop every predicate whose bound reads a cell the block overwrites.
pub fn drop_stored_bounds(
    set: &BoundPredicateSet,
    effects: &crate::effect::EffectSummary,
    block: parapet_ir::Block,
) -> Result<BoundPredicateSet, OptError> {
    let mut kept = BoundPredicateSet::new();
    for p in set.lowers() {
        if bound_intact(&p.bound, effects, block) {
            kept.add_lower(*p)?;
        }
    }
    for p in set.uppers() {
        if bound_intact(&p.bound, effects, block) {
            kept.add_upper(*p)?;
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::BoundPredicate;
    use crate::subscript::SubscriptExpr;
    use parapet_ir::{FunctionBuilder, Module, Value};

    fn slot_pair() -> (Module, Value, Value) {
        let mut module = Module::new("t.c");
        let index = module.add_function("f", 0);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        b.switch_to(entry);
        let i = b.alloca(1);
        let n = b.alloca(1);
        b.ret(None);
        (module, i, n)
    }

    fn effect(kind: EffectKind) -> EffectOnSubscript {
        EffectOnSubscript { kind, amount: None }
    }

    fn identity_set(i: Value, n: Value) -> BoundPredicateSet {
        let mut set = BoundPredicateSet::new();
        set.add_lower(
            *BoundPredicate::lower(SubscriptExpr::constant(0), SubscriptExpr::slot(i)).parts(),
        )
        .unwrap();
        set.add_upper(
            *BoundPredicate::upper(SubscriptExpr::slot(n) - 1, SubscriptExpr::slot(i)).parts(),
        )
        .unwrap();
        set
    }

    #[test]
    fn backward_identity_rows() {
        let (_m, i, n) = slot_pair();
        let set = identity_set(i, n);
        let kept = |k: EffectKind| {
            let out = filter_set(&set, Direction::Backward, &effect(k)).unwrap();
            (out.lowers().len(), out.uppers().len())
        };
        assert_eq!(kept(EffectKind::Unchanged), (1, 1));
        assert_eq!(kept(EffectKind::Increment), (0, 1));
        assert_eq!(kept(EffectKind::Decrement), (1, 0));
        assert_eq!(kept(EffectKind::Multiply), (0, 1));
        assert_eq!(kept(EffectKind::UnknownChanged), (0, 0));
    }

    #[test]
    fn forward_identity_rows_mirror_backward() {
        let (_m, i, n) = slot_pair();
        let set = identity_set(i, n);
        let kept = |k: EffectKind| {
            let out = filter_set(&set, Direction::Forward, &effect(k)).unwrap();
            (out.lowers().len(), out.uppers().len())
        };
        // a lower bound survives growth, an upper bound survives shrinking
        assert_eq!(kept(EffectKind::Unchanged), (1, 1));
        assert_eq!(kept(EffectKind::Increment), (1, 0));
        assert_eq!(kept(EffectKind::Decrement), (0, 1));
        assert_eq!(kept(EffectKind::Multiply), (1, 0));
        assert_eq!(kept(EffectKind::UnknownChanged), (0, 0));
    }

    #[test]
    fn overwritten_bound_kills_the_fact() {
        use crate::effect::EffectSummary;
        use parapet_ir::{FunctionBuilder, Module};

        let mut module = Module::new("t.c");
        let index = module.add_function("f", 1);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        let quiet = b.add_block();
        b.switch_to(entry);
        let i = b.alloca(1);
        let n = b.alloca(1);
        b.store(b.param(0), n);
        b.br(quiet);
        b.switch_to(quiet);
        b.ret(None);

        let effects = EffectSummary::compute(f, &[i, n]);
        let set = identity_set(i, n);
        let kept = drop_stored_bounds(&set, &effects, entry).unwrap();
        // the n-relative upper dies with the store to n, the constant
        // lower survives
        assert_eq!(kept.lowers().len(), 1);
        assert_eq!(kept.uppers().len(), 0);
        let kept = drop_stored_bounds(&set, &effects, quiet).unwrap();
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn negated_rows_flip_increment_and_decrement() {
        let (_m, i, _n) = slot_pair();
        let negated = SubscriptExpr::slot(i) * -1;
        let mut set = BoundPredicateSet::new();
        set.add_lower(*BoundPredicate::lower(SubscriptExpr::constant(0), negated).parts())
            .unwrap();
        set.add_upper(*BoundPredicate::upper(SubscriptExpr::constant(9), negated).parts())
            .unwrap();
        let kept = |k: EffectKind| {
            let out = filter_set(&set, Direction::Backward, &effect(k)).unwrap();
            (out.lowers().len(), out.uppers().len())
        };
        assert_eq!(kept(EffectKind::Unchanged), (1, 1));
        // a lower bound on -x survives an increment of x, an upper does not
        assert_eq!(kept(EffectKind::Increment), (1, 0));
        assert_eq!(kept(EffectKind::Decrement), (0, 1));
        assert_eq!(kept(EffectKind::Multiply), (0, 0));
        assert_eq!(kept(EffectKind::UnknownChanged), (0, 0));
    }
}
