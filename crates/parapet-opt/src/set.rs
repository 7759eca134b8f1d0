use smallvec::SmallVec;

use crate::error::OptError;
use crate::predicate::{BoundPredicate, PredicateParts};
use crate::subscript::SubscriptIdentity;

/// The per-block aggregate of lower and upper bound predicates for one
/// subscript identity.
///
/// Invariants: every member is normalized; all members share the set's
/// subscript identity; within one direction no two members share a bound
/// identity (insertion fuses them toward the tighter constant).
#[derive(Clone, Debug, Default)]
pub struct BoundPredicateSet {
    lowers: SmallVec<[PredicateParts; 2]>,
    uppers: SmallVec<[PredicateParts; 2]>,
}

impl BoundPredicateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.lowers.is_empty() && self.uppers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lowers.len() + self.uppers.len()
    }

    pub fn lowers(&self) -> &[PredicateParts] {
        &self.lowers
    }

    pub fn uppers(&self) -> &[PredicateParts] {
        &self.uppers
    }

    /// The subscript identity shared by every member, when not empty.
    pub fn identity(&self) -> Option<SubscriptIdentity> {
        self.lowers
            .first()
            .or_else(|| self.uppers.first())
            .map(|p| p.index.identity())
    }

    pub fn is_identity_check(&self) -> bool {
        self.lowers.iter().chain(&self.uppers).all(PredicateParts::is_identity_check)
    }

    fn check_identity(&self, parts: &PredicateParts) -> Result<(), OptError> {
        match self.identity() {
            Some(identity) if identity != parts.index.identity() => {
                Err(OptError::IdentityMismatch {
                    predicate: format!("{}", BoundPredicate::Lower(*parts)),
                })
            }
            _ => Ok(()),
        }
    }

    /// Insert a lower bound, fusing with a same-bound-identity member by
    /// keeping the tighter (larger) constant.
    pub fn add_lower(&mut self, parts: PredicateParts) -> Result<(), OptError> {
        let parts = parts.normalized();
        self.check_identity(&parts)?;
        match self
            .lowers
            .iter_mut()
            .find(|p| p.bound.identity() == parts.bound.identity())
        {
            Some(existing) => existing.bound.b = existing.bound.b.max(parts.bound.b),
            None => self.lowers.push(parts),
        }
        Ok(())
    }

    /// Insert an upper bound, fusing with a same-bound-identity member by
    /// keeping the tighter (smaller) constant.
    pub fn add_upper(&mut self, parts: PredicateParts) -> Result<(), OptError> {
        let parts = parts.normalized();
        self.check_identity(&parts)?;
        match self
            .uppers
            .iter_mut()
            .find(|p| p.bound.identity() == parts.bound.identity())
        {
            Some(existing) => existing.bound.b = existing.bound.b.min(parts.bound.b),
            None => self.uppers.push(parts),
        }
        Ok(())
    }

    pub fn add_predicate(&mut self, predicate: &BoundPredicate) -> Result<(), OptError> {
        match predicate {
            BoundPredicate::Lower(p) => self.add_lower(*p),
            BoundPredicate::Upper(p) => self.add_upper(*p),
        }
    }

    pub fn add_set(&mut self, other: &BoundPredicateSet) -> Result<(), OptError> {
        for p in &other.lowers {
            self.add_lower(*p)?;
        }
        for p in &other.uppers {
            self.add_upper(*p)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = BoundPredicate> + '_ {
        self.lowers
            .iter()
            .map(|p| BoundPredicate::Lower(*p))
            .chain(self.uppers.iter().map(|p| BoundPredicate::Upper(*p)))
    }

    /// Whether some member subsumes `predicate`.
    pub fn subsumes(&self, predicate: &BoundPredicate) -> bool {
        self.iter().any(|p| p.subsumes(predicate))
    }

    /// Union of facts: a predicate survives when it appears in at least one
    /// operand; members sharing both identities fuse toward the *weaker*
    /// constant (min for lowers, max for uppers), the only direction that
    /// is true under either operand.
    pub fn or_all(sets: &[BoundPredicateSet]) -> Result<BoundPredicateSet, OptError> {
        let mut result = BoundPredicateSet::new();
        for set in sets {
            for p in &set.lowers {
                result.check_identity(p)?;
                match result
                    .lowers
                    .iter_mut()
                    .find(|q| q.bound.identity() == p.bound.identity())
                {
                    Some(existing) => existing.bound.b = existing.bound.b.min(p.bound.b),
                    None => result.lowers.push(*p),
                }
            }
            for p in &set.uppers {
                result.check_identity(p)?;
                match result
                    .uppers
                    .iter_mut()
                    .find(|q| q.bound.identity() == p.bound.identity())
                {
                    Some(existing) => existing.bound.b = existing.bound.b.max(p.bound.b),
                    None => result.uppers.push(*p),
                }
            }
        }
        Ok(result)
    }

    /// Intersection of facts: a predicate survives only when every operand
    /// carries a same-bound-identity predicate of the same direction, fused
    /// toward the weaker constant. An operand lacking a direction empties
    /// that direction.
    pub fn and_all(sets: &[BoundPredicateSet]) -> Result<BoundPredicateSet, OptError> {
        let mut result = BoundPredicateSet::new();
        let Some((first, rest)) = sets.split_first() else {
            return Ok(result);
        };
        'lowers: for p in &first.lowers {
            let mut fused = *p;
            for set in rest {
                match set
                    .lowers
                    .iter()
                    .find(|q| q.bound.identity() == p.bound.identity())
                {
                    Some(q) => fused.bound.b = fused.bound.b.min(q.bound.b),
                    None => continue 'lowers,
                }
            }
            result.check_identity(&fused)?;
            result.lowers.push(fused);
        }
        'uppers: for p in &first.uppers {
            let mut fused = *p;
            for set in rest {
                match set
                    .uppers
                    .iter()
                    .find(|q| q.bound.identity() == p.bound.identity())
                {
                    Some(q) => fused.bound.b = fused.bound.b.max(q.bound.b),
                    None => continue 'uppers,
                }
            }
            result.check_identity(&fused)?;
            result.uppers.push(fused);
        }
        Ok(result)
    }
}

impl PartialEq for BoundPredicateSet {
    fn eq(&self, other: &Self) -> bool {
        self.lowers.len() == other.lowers.len()
            && self.uppers.len() == other.uppers.len()
            && self.lowers.iter().all(|p| other.lowers.contains(p))
            && self.uppers.iter().all(|p| other.uppers.contains(p))
    }
}

impl Eq for BoundPredicateSet {}

impl std::fmt::Display for BoundPredicateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, p) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscript::SubscriptExpr;
    use parapet_ir::{FunctionBuilder, Module, Value};

    fn slots() -> (Value, Value, Value) {
        let mut module = Module::new("t.c");
        let index = module.add_function("f", 0);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        b.switch_to(entry);
        let i = b.alloca(1);
        let n = b.alloca(1);
        let m = b.alloca(1);
        b.ret(None);
        (i, n, m)
    }

    fn parts(bound: SubscriptExpr, index: SubscriptExpr) -> PredicateParts {
        PredicateParts::new(bound, index)
    }

    #[test]
    fn insertion_fuses_same_bound_identity() {
        let (i, n, _) = slots();
        let idx = SubscriptExpr::slot(i);
        let mut set = BoundPredicateSet::new();
        set.add_upper(parts(SubscriptExpr::slot(n) - 1, idx)).unwrap();
        set.add_upper(parts(SubscriptExpr::slot(n) - 3, idx)).unwrap();
        assert_eq!(set.uppers().len(), 1);
        assert_eq!(set.uppers()[0].bound.b, -3);

        set.add_lower(parts(SubscriptExpr::constant(0), idx)).unwrap();
        set.add_lower(parts(SubscriptExpr::constant(2), idx)).unwrap();
        assert_eq!(set.lowers().len(), 1);
        assert_eq!(set.lowers()[0].bound.b, 2);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn insertion_normalizes() {
        let (i, _, _) = slots();
        let mut set = BoundPredicateSet::new();
        set.add_lower(parts(SubscriptExpr::constant(0), SubscriptExpr::slot(i) - 1))
            .unwrap();
        assert_eq!(set.lowers()[0].bound, SubscriptExpr::constant(1));
        assert_eq!(set.lowers()[0].index, SubscriptExpr::slot(i));
    }

    #[test]
    fn mismatched_identity_is_rejected() {
        let (i, n, _) = slots();
        let mut set = BoundPredicateSet::new();
        set.add_lower(parts(SubscriptExpr::constant(0), SubscriptExpr::slot(i)))
            .unwrap();
        let err = set.add_lower(parts(SubscriptExpr::constant(0), SubscriptExpr::slot(n)));
        assert!(matches!(err, Err(OptError::IdentityMismatch { .. })));
    }

    #[test]
    fn or_keeps_any_and_weakens_shared() {
        let (i, n, m) = slots();
        let idx = SubscriptExpr::slot(i);
        let mut s1 = BoundPredicateSet::new();
        s1.add_upper(parts(SubscriptExpr::slot(n) - 1, idx)).unwrap();
        s1.add_lower(parts(SubscriptExpr::constant(2), idx)).unwrap();
        let mut s2 = BoundPredicateSet::new();
        s2.add_upper(parts(SubscriptExpr::slot(n) - 3, idx)).unwrap();
        s2.add_upper(parts(SubscriptExpr::slot(m), idx)).unwrap();

        let or = BoundPredicateSet::or_all(&[s1.clone(), s2.clone()]).unwrap();
        // shared (n) bound weakened to -1, unshared members kept
        assert_eq!(or.uppers().len(), 2);
        let shared = or
            .uppers()
            .iter()
            .find(|p| p.bound.identity() == (SubscriptExpr::slot(n) - 1).identity())
            .unwrap();
        assert_eq!(shared.bound.b, -1);
        assert_eq!(or.lowers().len(), 1);
    }

    #[test]
    fn and_keeps_only_common_and_weakens() {
        let (i, n, m) = slots();
        let idx = SubscriptExpr::slot(i);
        let mut s1 = BoundPredicateSet::new();
        s1.add_upper(parts(SubscriptExpr::slot(n) - 1, idx)).unwrap();
        s1.add_upper(parts(SubscriptExpr::slot(m), idx)).unwrap();
        s1.add_lower(parts(SubscriptExpr::constant(2), idx)).unwrap();
        let mut s2 = BoundPredicateSet::new();
        s2.add_upper(parts(SubscriptExpr::slot(n) - 3, idx)).unwrap();

        let and = BoundPredicateSet::and_all(&[s1.clone(), s2.clone()]).unwrap();
        // m-bound and the lower are missing from s2, so they drop
        assert_eq!(and.uppers().len(), 1);
        assert_eq!(and.uppers()[0].bound.b, -1);
        assert!(and.lowers().is_empty());
    }

    #[test]
    fn empty_operand_lists_have_no_facts() {
        assert!(BoundPredicateSet::or_all(&[]).unwrap().is_empty());
        assert!(BoundPredicateSet::and_all(&[]).unwrap().is_empty());
    }

    #[test]
    fn singleton_or_and_are_identity() {
        let (i, n, _) = slots();
        let idx = SubscriptExpr::slot(i);
        let mut s = BoundPredicateSet::new();
        s.add_upper(parts(SubscriptExpr::slot(n) - 1, idx)).unwrap();
        s.add_lower(parts(SubscriptExpr::constant(0), idx)).unwrap();
        assert_eq!(BoundPredicateSet::or_all(std::slice::from_ref(&s)).unwrap(), s);
        assert_eq!(BoundPredicateSet::and_all(std::slice::from_ref(&s)).unwrap(), s);
    }
}
