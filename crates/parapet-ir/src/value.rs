use rustc_hash::FxHashSet;

use crate::Symbol;
use crate::identifier;
use crate::inst::Inst;

identifier! {
    /// A reference to a value in a function's value arena: a constant,
    /// an argument, a global reference, or an instruction result.
    struct Value
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0.raw())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// An integer constant, interned per function.
    Const(i64),
    /// The n-th function argument.
    Argument(usize),
    /// A reference to a module-level global (by interned name).
    Global(Symbol),
    /// The result of an instruction.
    Inst(Inst),
}

/// One use of a value: the instruction and the operand slot it occupies.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct Use {
    pub inst: Inst,
    pub index: usize,
}

#[derive(Clone, Debug)]
pub struct ValueInfo {
    pub(crate) kind: ValueKind,
    pub(crate) uses: FxHashSet<Use>,
}

impl ValueInfo {
    pub(crate) fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            uses: FxHashSet::default(),
        }
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn uses(&self) -> &FxHashSet<Use> {
        &self.uses
    }
}
