use std::fmt;

use crate::function::Function;
use crate::inst::{Inst, Opcode};
use crate::metadata::ArrayAccess;
use crate::module::Module;
use crate::value::{Value, ValueKind};

/// Textual rendering of a function, stable enough for snapshot tests.
/// This is a one-way printer; nothing parses it back.
pub struct DisplayFunction<'a> {
    module: &'a Module,
    function: &'a Function,
}

pub struct DisplayModule<'a> {
    module: &'a Module,
}

impl Module {
    pub fn display_function(&self, index: usize) -> DisplayFunction<'_> {
        DisplayFunction {
            module: self,
            function: self.function(index),
        }
    }

    pub fn display(&self) -> DisplayModule<'_> {
        DisplayModule { module: self }
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, m: &Module, func: &Function, v: Value) -> fmt::Result {
    match func.value_kind(v) {
        ValueKind::Const(c) => write!(f, "{c}"),
        ValueKind::Global(sym) => write!(f, "@\"{}\"", m.resolve(*sym)),
        ValueKind::Argument(_) | ValueKind::Inst(_) => write!(f, "{v}"),
    }
}

fn write_operands(
    f: &mut fmt::Formatter<'_>,
    m: &Module,
    func: &Function,
    operands: &[Value],
) -> fmt::Result {
    for (i, &op) in operands.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write_value(f, m, func, op)?;
    }
    Ok(())
}

fn write_inst(f: &mut fmt::Formatter<'_>, m: &Module, func: &Function, inst: Inst) -> fmt::Result {
    let info = func.inst(inst);
    write!(f, "  ")?;
    if let Some(result) = info.result() {
        write!(f, "{result} = ")?;
    }
    match info.opcode() {
        Opcode::Alloca { slots } => write!(f, "alloca {slots}")?,
        Opcode::Icmp(pred) => {
            write!(f, "icmp {} ", pred.mnemonic())?;
            write_operands(f, m, func, info.operands())?;
        }
        Opcode::Br => write!(f, "br {}", info.successors()[0])?,
        Opcode::CondBr => {
            write!(f, "condbr ")?;
            write_value(f, m, func, info.operands()[0])?;
            write!(f, ", {}, {}", info.successors()[0], info.successors()[1])?;
        }
        Opcode::Phi => {
            write!(f, "phi ")?;
            for (i, (&op, &from)) in info
                .operands()
                .iter()
                .zip(info.incoming().iter())
                .enumerate()
            {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "[")?;
                write_value(f, m, func, op)?;
                write!(f, ", {from}]")?;
            }
        }
        Opcode::Call(callee) => {
            write!(f, "call @{}(", m.resolve(*callee))?;
            write_operands(f, m, func, info.operands())?;
            write!(f, ")")?;
        }
        op => {
            write!(f, "{}", op.mnemonic())?;
            if !info.operands().is_empty() {
                write!(f, " ")?;
                write_operands(f, m, func, info.operands())?;
            }
        }
    }
    match info.access() {
        Some(ArrayAccess::Static { count }) => write!(f, " !array({count})")?,
        Some(ArrayAccess::Dynamic { bound, .. }) => {
            write!(f, " !array(dyn ")?;
            write_value(f, m, func, *bound)?;
            write!(f, ")")?;
        }
        None => {}
    }
    writeln!(f)
}

impl fmt::Display for DisplayFunction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let func = self.function;
        write!(f, "func @{}(", self.module.resolve(func.name()))?;
        for (i, &p) in func.params().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        writeln!(f, ") {{")?;
        for b in func.blocks() {
            writeln!(f, "{b}:")?;
            for inst in func.insts(b) {
                write_inst(f, self.module, func, inst)?;
            }
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for DisplayModule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "module \"{}\" {{",
            self.module.resolve(self.module.source_file())
        )?;
        for index in 0..self.module.function_count() {
            write!(f, "{}", self.module.display_function(index))?;
        }
        writeln!(f, "}}")
    }
}
