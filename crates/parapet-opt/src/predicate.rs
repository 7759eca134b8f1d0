use crate::subscript::{SubscriptExpr, SubscriptIdentity};

/// The `bound` / `index` pair both predicate kinds carry.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct PredicateParts {
    pub bound: SubscriptExpr,
    pub index: SubscriptExpr,
}

impl PredicateParts {
    pub fn new(bound: SubscriptExpr, index: SubscriptExpr) -> Self {
        Self { bound, index }
    }

    /// Shift the index constant into the bound so that `index.B = 0`.
    pub fn normalized(mut self) -> Self {
        self.bound.b -= self.index.b;
        self.index.b = 0;
        self
    }

    pub fn is_normalized(&self) -> bool {
        self.index.b == 0
    }

    /// An identity check guards the bare variable `1·x + 0`.
    pub fn is_identity_check(&self) -> bool {
        self.index.a == 1 && self.index.b == 0
    }

    pub fn identity(&self) -> PredicateIdentity {
        PredicateIdentity {
            bound: self.bound.identity(),
            index: self.index.identity(),
        }
    }
}

/// The pair of projections subsumption and fusing key on.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct PredicateIdentity {
    pub bound: SubscriptIdentity,
    pub index: SubscriptIdentity,
}

/// A single directional inequality over two subscript expressions:
/// `bound ≤ index` (lower) or `index ≤ bound` (upper).
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum BoundPredicate {
    Lower(PredicateParts),
    Upper(PredicateParts),
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum PredicateKind {
    Lower,
    Upper,
}

impl BoundPredicate {
    pub fn lower(bound: SubscriptExpr, index: SubscriptExpr) -> Self {
        BoundPredicate::Lower(PredicateParts::new(bound, index))
    }

    pub fn upper(bound: SubscriptExpr, index: SubscriptExpr) -> Self {
        BoundPredicate::Upper(PredicateParts::new(bound, index))
    }

    pub fn kind(&self) -> PredicateKind {
        match self {
            BoundPredicate::Lower(_) => PredicateKind::Lower,
            BoundPredicate::Upper(_) => PredicateKind::Upper,
        }
    }

    pub fn parts(&self) -> &PredicateParts {
        match self {
            BoundPredicate::Lower(p) | BoundPredicate::Upper(p) => p,
        }
    }

    pub fn normalized(self) -> Self {
        match self {
            BoundPredicate::Lower(p) => BoundPredicate::Lower(p.normalized()),
            BoundPredicate::Upper(p) => BoundPredicate::Upper(p.normalized()),
        }
    }

    pub fn is_identity_check(&self) -> bool {
        self.parts().is_identity_check()
    }

    /// `self ⇒ other`: at least as strong, comparable only across matching
    /// kinds and identities. Anything incomparable is simply not subsumed.
    pub fn subsumes(&self, other: &BoundPredicate) -> bool {
        match (self, other) {
            (BoundPredicate::Upper(p), BoundPredicate::Upper(q)) => {
                let (p, q) = (p.normalized(), q.normalized());
                p.index == q.index
                    && p.bound.identity() == q.bound.identity()
                    && p.bound.b <= q.bound.b
            }
            (BoundPredicate::Lower(p), BoundPredicate::Lower(q)) => {
                let (p, q) = (p.normalized(), q.normalized());
                p.index == q.index
                    && p.bound.identity() == q.bound.identity()
                    && p.bound.b >= q.bound.b
            }
            // an upper never subsumes a lower, and vice versa
            _ => false,
        }
    }

    /// Whether the inequality holds no matter what the variable is: both
    /// sides share an identity (or are constants) and the constant terms
    /// decide it.
    pub fn always_true(&self) -> bool {
        let normalized = self.normalized();
        let parts = normalized.parts();
        if parts.bound.identity() != parts.index.identity() {
            return false;
        }
        match normalized {
            BoundPredicate::Upper(p) => p.index.b <= p.bound.b,
            BoundPredicate::Lower(p) => p.bound.b <= p.index.b,
        }
    }
}

impl std::fmt::Display for BoundPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundPredicate::Lower(p) => write!(f, "{} ≤ {}", p.bound, p.index),
            BoundPredicate::Upper(p) => write!(f, "{} ≤ {}", p.index, p.bound),
        }
    }
}
