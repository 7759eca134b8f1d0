use rustc_hash::FxHashMap;

use parapet_ir::{Block, Function, Opcode, Value};

use crate::subscript::{SubscriptBase, SubscriptExpr};

/// The shape of a block's net mutation of one scalar subscript variable,
/// derived from the last affine store to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectKind {
    Unchanged,
    Increment,
    Decrement,
    Multiply,
    UnknownChanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectOnSubscript {
    pub kind: EffectKind,
    pub amount: Option<u64>,
}

impl EffectOnSubscript {
    pub fn unchanged() -> Self {
        Self {
            kind: EffectKind::Unchanged,
            amount: None,
        }
    }

    pub fn unknown() -> Self {
        Self {
            kind: EffectKind::UnknownChanged,
            amount: None,
        }
    }
}

/// Per-(variable, block) record of the affine shapes of every store that
/// targets the variable, in block order. `None` marks a store whose value
/// is not affine in the variable itself.
#[derive(Clone, Debug, Default)]
pub struct EffectSummary {
    shapes: FxHashMap<(Value, Block), Vec<Option<SubscriptExpr>>>,
}

impl EffectSummary {
    /// Walk the whole procedure once. Pure: never mutates the IR.
    pub fn compute(f: &Function, tracked: &[Value]) -> Self {
        let mut shapes: FxHashMap<(Value, Block), Vec<Option<SubscriptExpr>>> =
            FxHashMap::default();
        for block in f.blocks() {
            for inst in f.insts(block) {
                let info = f.inst(inst);
                if *info.opcode() != Opcode::Store {
                    continue;
                }
                let slot = info.operands()[1];
                if !tracked.contains(&slot) {
                    continue;
                }
                let stored = SubscriptExpr::evaluate(f, info.operands()[0]);
                let shape = match stored.base {
                    Some(SubscriptBase::Slot(p)) if p == slot && !stored.is_constant() => {
                        Some(stored)
                    }
                    _ => None,
                };
                shapes.entry((slot, block)).or_default().push(shape);
            }
        }
        Self { shapes }
    }

    /// The §3 effect table over the last recorded store.
    pub fn effect(&self, variable: Value, block: Block) -> EffectOnSubscript {
        let Some(stores) = self.shapes.get(&(variable, block)) else {
            return EffectOnSubscript::unchanged();
        };
        let Some(last) = stores.last() else {
            return EffectOnSubscript::unchanged();
        };
        let Some(expr) = last else {
            return EffectOnSubscript::unknown();
        };
        match (expr.a, expr.b) {
            (1, 0) => EffectOnSubscript::unchanged(),
            (1, b) if b > 0 => EffectOnSubscript {
                kind: EffectKind::Increment,
                amount: Some(b as u64),
            },
            (1, b) if b < 0 => EffectOnSubscript {
                kind: EffectKind::Decrement,
                amount: Some(-b as u64),
            },
            (a, 0) if a > 1 => EffectOnSubscript {
                kind: EffectKind::Multiply,
                amount: Some(a as u64),
            },
            _ => EffectOnSubscript::unknown(),
        }
    }

    /// Whether the variable is stored to at all inside `block`.
    pub fn has_store(&self, variable: Value, block: Block) -> bool {
        self.shapes
            .get(&(variable, block))
            .is_some_and(|stores| !stores.is_empty())
    }

    /// Every recorded store shape for the variable in `block`, in block
    /// order. `None` entries are non-affine stores.
    pub fn store_shapes(&self, variable: Value, block: Block) -> &[Option<SubscriptExpr>] {
        self.shapes
            .get(&(variable, block))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
