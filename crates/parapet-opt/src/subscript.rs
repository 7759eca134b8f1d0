use parapet_ir::{Block, Function, Inst, Opcode, Value, ValueKind};

/// What the symbolic variable of an affine subscript stands for.
///
/// `Slot(p)` is the content of the memory cell `p`: the expression reads
/// `A·(load p) + B` and stores to `p` change its value. `Direct(v)` is the
/// SSA value `v` itself, used when evaluation bottoms out on a form it does
/// not understand; it never changes, but it is only available where `v`
/// dominates.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubscriptBase {
    Slot(Value),
    Direct(Value),
}

impl SubscriptBase {
    pub fn value(self) -> Value {
        match self {
            SubscriptBase::Slot(v) | SubscriptBase::Direct(v) => v,
        }
    }
}

/// The affine term `A·x + B`, where `x` is [`SubscriptBase`] content.
/// Constants canonicalize to `A = 0`, no base.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct SubscriptExpr {
    pub a: i64,
    pub base: Option<SubscriptBase>,
    pub b: i64,
}

/// The projection `(A, x)`; two expressions are comparable exactly when
/// their identities match.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct SubscriptIdentity {
    pub a: i64,
    pub base: Option<SubscriptBase>,
}

impl SubscriptExpr {
    pub fn constant(b: i64) -> Self {
        Self { a: 0, base: None, b }
    }

    pub fn slot(p: Value) -> Self {
        Self {
            a: 1,
            base: Some(SubscriptBase::Slot(p)),
            b: 0,
        }
    }

    pub fn direct(v: Value) -> Self {
        Self {
            a: 1,
            base: Some(SubscriptBase::Direct(v)),
            b: 0,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.base.is_none() || self.a == 0
    }

    pub fn identity(&self) -> SubscriptIdentity {
        if self.is_constant() {
            SubscriptIdentity { a: 0, base: None }
        } else {
            SubscriptIdentity {
                a: self.a,
                base: self.base,
            }
        }
    }

    pub fn increases_with_base(&self) -> bool {
        !self.is_constant() && self.a > 0
    }

    pub fn decreases_with_base(&self) -> bool {
        !self.is_constant() && self.a < 0
    }

    /// Componentwise sum, defined when a side is constant or both share a
    /// base. `None` signals incompatible identities.
    pub fn try_add(&self, other: &Self) -> Option<Self> {
        self.combine(other, 1)
    }

    pub fn try_sub(&self, other: &Self) -> Option<Self> {
        self.combine(other, -1)
    }

    fn combine(&self, other: &Self, sign: i64) -> Option<Self> {
        let base = match (self.is_constant(), other.is_constant()) {
            (true, true) => None,
            (false, true) => self.base,
            (true, false) => other.base,
            (false, false) => {
                if self.base != other.base {
                    return None;
                }
                self.base
            }
        };
        let a = self.effective_a() + sign * other.effective_a();
        let b = self.b + sign * other.b;
        Some(if a == 0 || base.is_none() {
            Self::constant(b)
        } else {
            Self { a, base, b }
        })
    }

    fn effective_a(&self) -> i64 {
        if self.is_constant() { 0 } else { self.a }
    }

    /// `B₁ − B₂` when the identities match; undefined otherwise.
    pub fn constant_difference(&self, other: &Self) -> Option<i64> {
        (self.identity() == other.identity()).then(|| self.b - other.b)
    }

    /// Substitute `replacement` for the base: `A·replacement + B`.
    pub fn substitute(&self, replacement: &Self) -> Self {
        if self.is_constant() {
            return *self;
        }
        (*replacement * self.a) + self.b
    }

    /// Symbolic evaluation of an IR operand into affine form. Falls back
    /// to an opaque `1·v + 0` whenever the shape is not recognized.
    pub fn evaluate(f: &Function, v: Value) -> Self {
        Self::evaluate_impl(f, v, None)
    }

    /// Like [`evaluate`](Self::evaluate), but a load from a cell that was
    /// stored to earlier in `block` resolves to the stored value. This is
    /// what decides whether a check is trivially true at a hoist point.
    pub fn evaluate_within(f: &Function, block: Block, v: Value) -> Self {
        Self::evaluate_impl(f, v, Some(block))
    }

    fn evaluate_impl(f: &Function, v: Value, within: Option<Block>) -> Self {
        match f.value_kind(v) {
            ValueKind::Const(c) => Self::constant(*c),
            ValueKind::Argument(_) | ValueKind::Global(_) => Self::direct(v),
            ValueKind::Inst(inst) => Self::evaluate_inst(f, v, *inst, within),
        }
    }

    fn evaluate_inst(f: &Function, v: Value, inst: Inst, within: Option<Block>) -> Self {
        let info = f.inst(inst);
        match info.opcode() {
            Opcode::SExt | Opcode::ZExt => Self::evaluate_impl(f, info.operands()[0], within),
            Opcode::Load => {
                let ptr = info.operands()[0];
                if let Some(block) = within {
                    if info.parent() == block {
                        if let Some(stored) = last_store_before(f, block, ptr, inst) {
                            return Self::evaluate_impl(f, stored, within);
                        }
                    }
                }
                Self::slot(ptr)
            }
            Opcode::Add | Opcode::Sub => {
                let s1 = Self::evaluate_impl(f, info.operands()[0], within);
                let s2 = Self::evaluate_impl(f, info.operands()[1], within);
                let combined = if *info.opcode() == Opcode::Add {
                    s1.try_add(&s2)
                } else {
                    s1.try_sub(&s2)
                };
                combined.unwrap_or_else(|| Self::direct(v))
            }
            Opcode::Mul => {
                let s1 = Self::evaluate_impl(f, info.operands()[0], within);
                let s2 = Self::evaluate_impl(f, info.operands()[1], within);
                if s1.is_constant() && s2.is_constant() {
                    Self::constant(s1.b * s2.b)
                } else if s1.is_constant() {
                    s2 * s1.b
                } else if s2.is_constant() {
                    s1 * s2.b
                } else {
                    Self::direct(v)
                }
            }
            _ => Self::direct(v),
        }
    }
}

/// The value stored to `ptr` by the last store preceding `before` in
/// `block`, if any.
fn last_store_before(f: &Function, block: Block, ptr: Value, before: Inst) -> Option<Value> {
    let mut found = None;
    for inst in f.insts(block) {
        if inst == before {
            break;
        }
        let info = f.inst(inst);
        if *info.opcode() == Opcode::Store && info.operands()[1] == ptr {
            found = Some(info.operands()[0]);
        }
    }
    found
}

/// The value of `A·(cell) + B` as observed at the end of `block`: the cell
/// part resolves through the last store to it inside `block`, when there is
/// one. Used to fold hoisted predicates at their insertion point.
pub fn resolve_at_block_end(f: &Function, block: Block, expr: &SubscriptExpr) -> SubscriptExpr {
    let Some(SubscriptBase::Slot(ptr)) = expr.base else {
        return *expr;
    };
    if expr.is_constant() {
        return *expr;
    }
    let mut stored = None;
    for inst in f.insts(block) {
        let info = f.inst(inst);
        if *info.opcode() == Opcode::Store && info.operands()[1] == ptr {
            stored = Some(info.operands()[0]);
        }
    }
    match stored {
        Some(value) => {
            let inner = SubscriptExpr::evaluate_within(f, block, value);
            expr.substitute(&inner)
        }
        None => *expr,
    }
}

impl std::ops::Add<i64> for SubscriptExpr {
    type Output = Self;
    fn add(mut self, c: i64) -> Self {
        self.b += c;
        self
    }
}

impl std::ops::Sub<i64> for SubscriptExpr {
    type Output = Self;
    fn sub(mut self, c: i64) -> Self {
        self.b -= c;
        self
    }
}

impl std::ops::Mul<i64> for SubscriptExpr {
    type Output = Self;
    fn mul(mut self, c: i64) -> Self {
        if c == 0 {
            return Self::constant(0);
        }
        if self.is_constant() {
            return Self::constant(self.b * c);
        }
        self.a *= c;
        self.b *= c;
        self
    }
}

impl std::fmt::Display for SubscriptExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<")?;
        if self.is_constant() {
            write!(f, "{}", self.b)?;
        } else {
            if self.a != 1 {
                write!(f, "{} * ", self.a)?;
            }
            match self.base {
                Some(SubscriptBase::Slot(p)) => write!(f, "(load {p})")?,
                Some(SubscriptBase::Direct(v)) => write!(f, "{v}")?,
                None => {}
            }
            if self.b != 0 {
                if self.b < 0 {
                    write!(f, " - {}", -self.b)?;
                } else {
                    write!(f, " + {}", self.b)?;
                }
            }
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parapet_ir::{CmpPred, FunctionBuilder, Module};

    #[test]
    fn constant_arithmetic_canonicalizes() {
        let c = SubscriptExpr::constant(5);
        assert!(c.is_constant());
        assert_eq!(c * 3, SubscriptExpr::constant(15));
        assert_eq!((c + 2).b, 7);
        assert_eq!(c.identity(), SubscriptExpr::constant(-9).identity());
    }

    #[test]
    fn add_and_sub_respect_identity() {
        let mut module = Module::new("t.c");
        let index = module.add_function("f", 0);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        b.switch_to(entry);
        let p = b.alloca(1);
        let q = b.alloca(1);
        b.ret(None);

        let x = SubscriptExpr::slot(p);
        let y = SubscriptExpr::slot(q);
        assert_eq!(x.try_add(&x), Some(SubscriptExpr { a: 2, ..x }));
        assert_eq!(x.try_add(&y), None);
        assert_eq!(x.try_sub(&x), Some(SubscriptExpr::constant(0)));
        assert_eq!(x.constant_difference(&(x + 3)), Some(-3));
        assert_eq!(x.constant_difference(&y), None);
    }

    #[test]
    fn evaluate_loads_and_affine_chains() {
        let mut module = Module::new("t.c");
        let index = module.add_function("f", 0);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        b.switch_to(entry);
        let i_slot = b.alloca(1);
        let i = b.load(i_slot);
        let two = b.constant(2);
        let doubled = b.mul(i, two);
        let one = b.constant(1);
        let shifted = b.sub(doubled, one);
        let widened = b.sext(shifted);
        b.ret(None);

        let expr = SubscriptExpr::evaluate(f, widened);
        assert_eq!(
            expr,
            SubscriptExpr {
                a: 2,
                base: Some(SubscriptBase::Slot(i_slot)),
                b: -1
            }
        );
    }

    #[test]
    fn mixed_bases_fall_back_to_opaque() {
        let mut module = Module::new("t.c");
        let index = module.add_function("f", 0);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        b.switch_to(entry);
        let p = b.alloca(1);
        let q = b.alloca(1);
        let x = b.load(p);
        let y = b.load(q);
        let sum = b.add(x, y);
        b.ret(None);

        let expr = SubscriptExpr::evaluate(f, sum);
        assert_eq!(expr, SubscriptExpr::direct(sum));
    }

    #[test]
    fn constant_minus_variable_negates() {
        let mut module = Module::new("t.c");
        let index = module.add_function("f", 0);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        b.switch_to(entry);
        let p = b.alloca(1);
        let x = b.load(p);
        let ten = b.constant(10);
        let flipped = b.sub(ten, x);
        b.ret(None);

        let expr = SubscriptExpr::evaluate(f, flipped);
        assert_eq!(
            expr,
            SubscriptExpr {
                a: -1,
                base: Some(SubscriptBase::Slot(p)),
                b: 10
            }
        );
    }

    #[test]
    fn within_block_resolution_sees_last_store() {
        let mut module = Module::new("t.c");
        let index = module.add_function("f", 1);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        b.switch_to(entry);
        let n_slot = b.alloca(1);
        b.store(b.param(0), n_slot);
        let i_slot = b.alloca(1);
        let zero = b.constant(0);
        b.store(zero, i_slot);
        b.ret(None);

        let i = SubscriptExpr::slot(i_slot);
        let folded = resolve_at_block_end(f, entry, &i);
        assert_eq!(folded, SubscriptExpr::constant(0));

        // the n slot resolves to the (opaque) argument value
        let n = SubscriptExpr::slot(n_slot);
        let folded = resolve_at_block_end(f, entry, &n);
        assert_eq!(folded, SubscriptExpr::direct(f.param(0)));
    }

    #[test]
    fn comparison_operands_evaluate_for_guard_analysis() {
        let mut module = Module::new("t.c");
        let index = module.add_function("f", 1);
        let f = module.function_mut(index);
        let mut b = FunctionBuilder::new(f);
        let entry = b.add_block();
        b.switch_to(entry);
        let n_slot = b.alloca(1);
        b.store(b.param(0), n_slot);
        let i_slot = b.alloca(1);
        let i = b.load(i_slot);
        let n = b.load(n_slot);
        let one = b.constant(1);
        let limit = b.sub(n, one);
        let _cmp = b.icmp(CmpPred::Sle, i, limit);
        b.ret(None);

        assert_eq!(SubscriptExpr::evaluate(f, i), SubscriptExpr::slot(i_slot));
        assert_eq!(
            SubscriptExpr::evaluate(f, limit),
            SubscriptExpr::slot(n_slot) - 1
        );
    }
}
