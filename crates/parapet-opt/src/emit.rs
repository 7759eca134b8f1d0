use parapet_ir::{Block, DomTree, Function, Inst, InstData, Opcode, Value};

use crate::cgen::CheckSymbols;
use crate::predicate::{PredicateKind, PredicateParts};
use crate::subscript::{SubscriptBase, SubscriptExpr};

/// Whether every value an expression references is defined at `block`'s
/// terminator.
pub fn expr_available(dom: &DomTree, f: &Function, expr: &SubscriptExpr, block: Block) -> bool {
    if expr.is_constant() {
        return true;
    }
    match expr.base {
        None => true,
        Some(base) => dom.value_available_at(f, base.value(), block),
    }
}

/// Build `A·x + B` just before `block`'s terminator and return the value.
/// A `Slot` base loads the cell; a `Direct` base is used as is. The caller
/// is responsible for the availability check.
pub fn materialize_expr(
    f: &mut Function,
    block: Block,
    expr: &SubscriptExpr,
    line: u32,
) -> Value {
    if expr.is_constant() {
        return f.constant(expr.b);
    }
    let mut value = match expr.base {
        Some(SubscriptBase::Slot(ptr)) => {
            let load = f.insert_before_terminator(
                block,
                InstData::new(Opcode::Load)
                    .with_operands([ptr])
                    .with_line(line),
            );
            result_of(f, load)
        }
        Some(SubscriptBase::Direct(v)) => v,
        None => unreachable!("non-constant expression always has a base"),
    };
    if expr.a != 1 {
        let factor = f.constant(expr.a);
        let mul = f.insert_before_terminator(
            block,
            InstData::new(Opcode::Mul)
                .with_operands([value, factor])
                .with_line(line),
        );
        value = result_of(f, mul);
    }
    if expr.b != 0 {
        let offset = f.constant(expr.b);
        let add = f.insert_before_terminator(
            block,
            InstData::new(Opcode::Add)
                .with_operands([value, offset])
                .with_line(line),
        );
        value = result_of(f, add);
    }
    value
}

fn result_of(f: &Function, inst: Inst) -> Value {
    f.inst(inst)
        .result()
        .expect("arithmetic instruction always produces a value")
}

/// Insert one check call just before `block`'s terminator, with the line
/// taken from the insertion point (0 when absent).
pub fn insert_check_before_terminator(
    f: &mut Function,
    block: Block,
    kind: PredicateKind,
    parts: &PredicateParts,
    symbols: CheckSymbols,
    file: Value,
) -> Inst {
    let line = f.terminator(block).map_or(0, |t| f.inst(t).line());
    let bound = materialize_expr(f, block, &parts.bound, line);
    let index = materialize_expr(f, block, &parts.index, line);
    let line_const = f.constant(line as i64);
    let callee = match kind {
        PredicateKind::Lower => symbols.lower,
        PredicateKind::Upper => symbols.upper,
    };
    f.insert_before_terminator(
        block,
        InstData::new(Opcode::Call(callee))
            .with_operands([bound, index, file, line_const])
            .with_line(line),
    )
}

/// Shift a check's bound operand by a constant, reusing the existing
/// bound value: constants are replaced outright, anything else gets an
/// `add` planted before the check.
pub fn adjust_bound_operand(f: &mut Function, check: Inst, diff: i64) {
    if diff == 0 {
        return;
    }
    let bound = f.inst(check).operands()[0];
    match f.const_value(bound) {
        Some(c) => {
            let tightened = f.constant(c + diff);
            f.set_operand(check, 0, tightened);
        }
        None => {
            let line = f.inst(check).line();
            let offset = f.constant(diff);
            let add = f.insert_before(
                check,
                InstData::new(Opcode::Add)
                    .with_operands([bound, offset])
                    .with_line(line),
            );
            let adjusted = result_of(f, add);
            f.set_operand(check, 0, adjusted);
        }
    }
}
