use smallvec::SmallVec;

use crate::Symbol;
use crate::block::Block;
use crate::identifier;
use crate::linked_list::LinkedListNode;
use crate::metadata::ArrayAccess;
use crate::value::Value;

identifier! {
    /// A reference to an instruction in a function's instruction arena.
    struct Inst
}

impl std::fmt::Display for Inst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.0.raw())
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum CmpPred {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl CmpPred {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CmpPred::Eq => "eq",
            CmpPred::Ne => "ne",
            CmpPred::Slt => "slt",
            CmpPred::Sle => "sle",
            CmpPred::Sgt => "sgt",
            CmpPred::Sge => "sge",
        }
    }

    /// The predicate with its operands exchanged (`a < b` ⇔ `b > a`).
    pub fn swapped(self) -> Self {
        match self {
            CmpPred::Eq => CmpPred::Eq,
            CmpPred::Ne => CmpPred::Ne,
            CmpPred::Slt => CmpPred::Sgt,
            CmpPred::Sle => CmpPred::Sge,
            CmpPred::Sgt => CmpPred::Slt,
            CmpPred::Sge => CmpPred::Sle,
        }
    }

    /// The logical complement (`a < b` ⇔ `!(a ≥ b)`).
    pub fn negated(self) -> Self {
        match self {
            CmpPred::Eq => CmpPred::Ne,
            CmpPred::Ne => CmpPred::Eq,
            CmpPred::Slt => CmpPred::Sge,
            CmpPred::Sle => CmpPred::Sgt,
            CmpPred::Sgt => CmpPred::Sle,
            CmpPred::Sge => CmpPred::Slt,
        }
    }

    pub fn evaluate(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpPred::Eq => lhs == rhs,
            CmpPred::Ne => lhs != rhs,
            CmpPred::Slt => lhs < rhs,
            CmpPred::Sle => lhs <= rhs,
            CmpPred::Sgt => lhs > rhs,
            CmpPred::Sge => lhs >= rhs,
        }
    }
}

/// The one concrete instruction language of this IR: the integer
/// load/store/arithmetic subset instrumented programs are made of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// Reserve `slots` consecutive cells; produces the cell address.
    Alloca { slots: u64 },
    /// operands: `[ptr]`
    Load,
    /// operands: `[value, ptr]`
    Store,
    Add,
    Sub,
    Mul,
    SExt,
    ZExt,
    /// operands: `[base, index]`; may carry an [`ArrayAccess`] annotation.
    Gep,
    Icmp(CmpPred),
    /// successors: `[dest]`
    Br,
    /// operands: `[cond]`, successors: `[then, else]`
    CondBr,
    /// operands parallel to `incoming` blocks.
    Phi,
    Call(Symbol),
    /// operands: `[]` or `[value]`
    Ret,
}

impl Opcode {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Opcode::Br | Opcode::CondBr | Opcode::Ret)
    }

    /// Whether erasing an unused instance of this opcode changes program
    /// behavior. Calls and stores stay even when their result is unused.
    pub fn has_side_effects(&self) -> bool {
        matches!(self, Opcode::Store | Opcode::Call(_)) || self.is_terminator()
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::Alloca { .. } => "alloca",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::SExt => "sext",
            Opcode::ZExt => "zext",
            Opcode::Gep => "gep",
            Opcode::Icmp(_) => "icmp",
            Opcode::Br => "br",
            Opcode::CondBr => "condbr",
            Opcode::Phi => "phi",
            Opcode::Call(_) => "call",
            Opcode::Ret => "ret",
        }
    }
}

#[derive(Clone, Debug)]
pub struct InstInfo {
    pub(crate) node: LinkedListNode<Inst>,
    pub(crate) parent: Block,
    pub(crate) opcode: Opcode,
    pub(crate) operands: SmallVec<[Value; 4]>,
    pub(crate) successors: SmallVec<[Block; 2]>,
    /// `Phi` only: incoming blocks, parallel to `operands`.
    pub(crate) incoming: SmallVec<[Block; 2]>,
    pub(crate) result: Option<Value>,
    /// Source line; 0 when absent.
    pub(crate) line: u32,
    pub(crate) access: Option<ArrayAccess>,
}

impl InstInfo {
    pub fn opcode(&self) -> &Opcode {
        &self.opcode
    }

    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    pub fn successors(&self) -> &[Block] {
        &self.successors
    }

    pub fn incoming(&self) -> &[Block] {
        &self.incoming
    }

    pub fn result(&self) -> Option<Value> {
        self.result
    }

    pub fn parent(&self) -> Block {
        self.parent
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn access(&self) -> Option<&ArrayAccess> {
        self.access.as_ref()
    }

    pub fn prev(&self) -> Option<Inst> {
        self.node.prev
    }

    pub fn next(&self) -> Option<Inst> {
        self.node.next
    }
}
