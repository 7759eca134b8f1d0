use crate::block::Block;
use crate::function::Function;
use crate::inst::{Inst, Opcode};
use crate::value::Use;

/// A structural invariant violation found by [`verify_function`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// A block does not end in a terminator.
    MissingTerminator(Block),
    /// A terminator occurs before the end of its block.
    TerminatorNotLast(Inst),
    /// Operand count does not match the opcode.
    OperandCount {
        inst: Inst,
        expected: usize,
        got: usize,
    },
    /// Successor count does not match the opcode.
    SuccessorCount {
        inst: Inst,
        expected: usize,
        got: usize,
    },
    /// A phi's incoming-block list is not parallel to its operands.
    PhiShape(Inst),
    /// An instruction references a tombstoned value.
    ErasedOperand { inst: Inst, index: usize },
    /// An operand is missing from its value's use list.
    MissingUse { inst: Inst, index: usize },
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::MissingTerminator(b) => write!(f, "block {b} has no terminator"),
            VerifyError::TerminatorNotLast(i) => {
                write!(f, "terminator {i} is not the last instruction of its block")
            }
            VerifyError::OperandCount {
                inst,
                expected,
                got,
            } => write!(f, "{inst} expects {expected} operands, has {got}"),
            VerifyError::SuccessorCount {
                inst,
                expected,
                got,
            } => write!(f, "{inst} expects {expected} successors, has {got}"),
            VerifyError::PhiShape(i) => write!(f, "phi {i} incoming blocks not parallel to operands"),
            VerifyError::ErasedOperand { inst, index } => {
                write!(f, "{inst} operand {index} references an erased value")
            }
            VerifyError::MissingUse { inst, index } => {
                write!(f, "{inst} operand {index} missing from the value's use list")
            }
        }
    }
}

impl std::error::Error for VerifyError {}

fn expected_operands(op: &Opcode) -> Option<usize> {
    match op {
        Opcode::Alloca { .. } => Some(0),
        Opcode::Load | Opcode::SExt | Opcode::ZExt | Opcode::CondBr => Some(1),
        Opcode::Store
        | Opcode::Add
        | Opcode::Sub
        | Opcode::Mul
        | Opcode::Gep
        | Opcode::Icmp(_) => Some(2),
        Opcode::Br => Some(0),
        // phis, calls and returns are variadic
        Opcode::Phi | Opcode::Call(_) | Opcode::Ret => None,
    }
}

/// Check the structural invariants every pass must preserve: block
/// termination, operand and successor arities, phi shape, and use-list
/// consistency. All violations are collected so a broken transformation
/// shows its whole damage at once.
pub fn verify_function(f: &Function) -> Result<(), Vec<VerifyError>> {
    let mut errors = Vec::new();
    for block in f.blocks() {
        if f.terminator(block).is_none() {
            errors.push(VerifyError::MissingTerminator(block));
        }
        let last = f.block(block).last();
        for inst in f.insts(block) {
            let info = f.inst(inst);
            if info.opcode().is_terminator() && Some(inst) != last {
                errors.push(VerifyError::TerminatorNotLast(inst));
            }
            if let Some(expected) = expected_operands(info.opcode()) {
                if info.operands().len() != expected {
                    errors.push(VerifyError::OperandCount {
                        inst,
                        expected,
                        got: info.operands().len(),
                    });
                }
            }
            if *info.opcode() == Opcode::Ret && info.operands().len() > 1 {
                errors.push(VerifyError::OperandCount {
                    inst,
                    expected: 1,
                    got: info.operands().len(),
                });
            }
            let expected_succs = match info.opcode() {
                Opcode::Br => 1,
                Opcode::CondBr => 2,
                _ => 0,
            };
            if info.successors().len() != expected_succs {
                errors.push(VerifyError::SuccessorCount {
                    inst,
                    expected: expected_succs,
                    got: info.successors().len(),
                });
            }
            if *info.opcode() == Opcode::Phi && info.incoming().len() != info.operands().len() {
                errors.push(VerifyError::PhiShape(inst));
            }
            for (index, &operand) in info.operands().iter().enumerate() {
                let Some(item) = f.values.get(operand) else {
                    errors.push(VerifyError::ErasedOperand { inst, index });
                    continue;
                };
                if item.deleted() {
                    errors.push(VerifyError::ErasedOperand { inst, index });
                } else if !item.uses().contains(&Use { inst, index }) {
                    errors.push(VerifyError::MissingUse { inst, index });
                }
            }
        }
    }
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
