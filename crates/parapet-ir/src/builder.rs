use crate::Symbol;
use crate::block::Block;
use crate::function::{Function, InstData};
use crate::inst::{CmpPred, Inst, Opcode};
use crate::value::Value;

/// Insertion-point builder over one function.
///
/// Appends to the current block; the caller positions it with
/// [`switch_to`](Self::switch_to). Panics on use without a current block;
/// that is a construction bug, not a recoverable condition.
pub struct FunctionBuilder<'a> {
    f: &'a mut Function,
    block: Option<Block>,
    line: u32,
}

impl<'a> FunctionBuilder<'a> {
    pub fn new(f: &'a mut Function) -> Self {
        Self {
            f,
            block: None,
            line: 0,
        }
    }

    pub fn func(&mut self) -> &mut Function {
        self.f
    }

    /// Source line attached to subsequently built instructions.
    pub fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    pub fn add_block(&mut self) -> Block {
        self.f.add_block()
    }

    pub fn switch_to(&mut self, block: Block) {
        self.block = Some(block);
    }

    pub fn current(&self) -> Block {
        self.block.expect("builder has no current block")
    }

    pub fn constant(&mut self, c: i64) -> Value {
        self.f.constant(c)
    }

    pub fn param(&self, index: usize) -> Value {
        self.f.param(index)
    }

    fn push(&mut self, data: InstData) -> Inst {
        let block = self.current();
        let line = self.line;
        self.f.push_inst(block, data.with_line(line))
    }

    fn push_result(&mut self, data: InstData) -> Value {
        let inst = self.push(data);
        self.f
            .inst(inst)
            .result()
            .expect("instruction unexpectedly produced no result")
    }

    pub fn alloca(&mut self, slots: u64) -> Value {
        self.push_result(InstData::new(Opcode::Alloca { slots }))
    }

    pub fn load(&mut self, ptr: Value) -> Value {
        self.push_result(InstData::new(Opcode::Load).with_operands([ptr]))
    }

    pub fn store(&mut self, value: Value, ptr: Value) -> Inst {
        self.push(InstData::new(Opcode::Store).with_operands([value, ptr]))
    }

    pub fn add(&mut self, lhs: Value, rhs: Value) -> Value {
        self.push_result(InstData::new(Opcode::Add).with_operands([lhs, rhs]))
    }

    pub fn sub(&mut self, lhs: Value, rhs: Value) -> Value {
        self.push_result(InstData::new(Opcode::Sub).with_operands([lhs, rhs]))
    }

    pub fn mul(&mut self, lhs: Value, rhs: Value) -> Value {
        self.push_result(InstData::new(Opcode::Mul).with_operands([lhs, rhs]))
    }

    pub fn sext(&mut self, v: Value) -> Value {
        self.push_result(InstData::new(Opcode::SExt).with_operands([v]))
    }

    pub fn zext(&mut self, v: Value) -> Value {
        self.push_result(InstData::new(Opcode::ZExt).with_operands([v]))
    }

    pub fn gep(&mut self, base: Value, index: Value) -> Value {
        self.push_result(InstData::new(Opcode::Gep).with_operands([base, index]))
    }

    pub fn icmp(&mut self, pred: CmpPred, lhs: Value, rhs: Value) -> Value {
        self.push_result(InstData::new(Opcode::Icmp(pred)).with_operands([lhs, rhs]))
    }

    pub fn br(&mut self, dest: Block) -> Inst {
        self.push(InstData::new(Opcode::Br).with_successors([dest]))
    }

    pub fn cond_br(&mut self, cond: Value, then_block: Block, else_block: Block) -> Inst {
        self.push(
            InstData::new(Opcode::CondBr)
                .with_operands([cond])
                .with_successors([then_block, else_block]),
        )
    }

    pub fn phi(&mut self, incoming: &[(Value, Block)]) -> Value {
        self.push_result(
            InstData::new(Opcode::Phi)
                .with_operands(incoming.iter().map(|&(v, _)| v))
                .with_incoming(incoming.iter().map(|&(_, b)| b)),
        )
    }

    /// Call returning a value.
    pub fn call(&mut self, callee: Symbol, args: impl IntoIterator<Item = Value>) -> Value {
        self.push_result(
            InstData::new(Opcode::Call(callee))
                .with_operands(args)
                .with_result(true),
        )
    }

    /// Call with no result.
    pub fn call_void(&mut self, callee: Symbol, args: impl IntoIterator<Item = Value>) -> Inst {
        self.push(InstData::new(Opcode::Call(callee)).with_operands(args))
    }

    pub fn ret(&mut self, value: Option<Value>) -> Inst {
        match value {
            Some(v) => self.push(InstData::new(Opcode::Ret).with_operands([v])),
            None => self.push(InstData::new(Opcode::Ret)),
        }
    }
}
