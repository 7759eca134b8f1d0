use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::Symbol;
use crate::arena::Arena;
use crate::block::{Block, BlockInfo};
use crate::inst::{Inst, InstInfo, Opcode};
use crate::linked_list::LinkedListNode;
use crate::metadata::ArrayAccess;
use crate::value::{Use, Value, ValueInfo, ValueKind};

/// Everything needed to materialize one instruction.
///
/// `produces` defaults from the opcode (arithmetic, loads, allocas, geps,
/// compares and phis produce a value; stores, branches and calls do not) and
/// can be overridden for calls that return a value.
#[derive(Clone, Debug)]
pub struct InstData {
    pub opcode: Opcode,
    pub operands: SmallVec<[Value; 4]>,
    pub successors: SmallVec<[Block; 2]>,
    pub incoming: SmallVec<[Block; 2]>,
    pub produces: bool,
    pub line: u32,
}

impl InstData {
    pub fn new(opcode: Opcode) -> Self {
        let produces = matches!(
            opcode,
            Opcode::Alloca { .. }
                | Opcode::Load
                | Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::SExt
                | Opcode::ZExt
                | Opcode::Gep
                | Opcode::Icmp(_)
                | Opcode::Phi
        );
        Self {
            opcode,
            operands: SmallVec::new(),
            successors: SmallVec::new(),
            incoming: SmallVec::new(),
            produces,
            line: 0,
        }
    }

    pub fn with_operands(mut self, operands: impl IntoIterator<Item = Value>) -> Self {
        self.operands = operands.into_iter().collect();
        self
    }

    pub fn with_successors(mut self, successors: impl IntoIterator<Item = Block>) -> Self {
        self.successors = successors.into_iter().collect();
        self
    }

    pub fn with_incoming(mut self, incoming: impl IntoIterator<Item = Block>) -> Self {
        self.incoming = incoming.into_iter().collect();
        self
    }

    pub fn with_result(mut self, produces: bool) -> Self {
        self.produces = produces;
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }
}

/// A procedure: three arenas plus block layout order. The function is the
/// only mint for its ids, and every IR mutation goes through it so that use
/// lists and block lists stay consistent.
#[derive(Clone, Debug)]
pub struct Function {
    pub(crate) name: Symbol,
    pub(crate) params: Vec<Value>,
    pub(crate) block_order: Vec<Block>,
    pub(crate) values: Arena<Value, ValueInfo>,
    pub(crate) insts: Arena<Inst, InstInfo>,
    pub(crate) blocks: Arena<Block, BlockInfo>,
    consts: FxHashMap<i64, Value>,
    globals: FxHashMap<Symbol, Value>,
}

impl Function {
    pub(crate) fn new(name: Symbol, param_count: usize) -> Self {
        let mut f = Self {
            name,
            params: Vec::new(),
            block_order: Vec::new(),
            values: Arena::default(),
            insts: Arena::default(),
            blocks: Arena::default(),
            consts: FxHashMap::default(),
            globals: FxHashMap::default(),
        };
        for index in 0..param_count {
            let v = f.values.alloc(ValueInfo::new(ValueKind::Argument(index)));
            f.params.push(v);
        }
        f
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn param(&self, index: usize) -> Value {
        self.params[index]
    }

    // -- blocks -------------------------------------------------------------

    pub fn add_block(&mut self) -> Block {
        let b = self.blocks.alloc(BlockInfo::default());
        self.block_order.push(b);
        b
    }

    /// The entry block. Functions under construction may not have one yet.
    pub fn entry(&self) -> Option<Block> {
        self.block_order.first().copied()
    }

    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.block_order.iter().copied()
    }

    pub fn block(&self, b: Block) -> &BlockInfo {
        &self.blocks[b]
    }

    /// The block's terminator, when its last instruction is one.
    pub fn terminator(&self, b: Block) -> Option<Inst> {
        let last = self.blocks[b].insts.tail()?;
        self.insts[last].opcode.is_terminator().then_some(last)
    }

    pub fn successors(&self, b: Block) -> &[Block] {
        match self.terminator(b) {
            Some(term) => &self.insts[term].successors,
            None => &[],
        }
    }

    // -- values -------------------------------------------------------------

    pub fn constant(&mut self, c: i64) -> Value {
        if let Some(&v) = self.consts.get(&c) {
            return v;
        }
        let v = self.values.alloc(ValueInfo::new(ValueKind::Const(c)));
        self.consts.insert(c, v);
        v
    }

    pub fn global_ref(&mut self, name: Symbol) -> Value {
        if let Some(&v) = self.globals.get(&name) {
            return v;
        }
        let v = self.values.alloc(ValueInfo::new(ValueKind::Global(name)));
        self.globals.insert(name, v);
        v
    }

    pub fn value(&self, v: Value) -> &ValueInfo {
        &self.values[v]
    }

    pub fn value_kind(&self, v: Value) -> &ValueKind {
        &self.values[v].kind
    }

    pub fn const_value(&self, v: Value) -> Option<i64> {
        match self.values[v].kind {
            ValueKind::Const(c) => Some(c),
            _ => None,
        }
    }

    pub fn defining_inst(&self, v: Value) -> Option<Inst> {
        match self.values[v].kind {
            ValueKind::Inst(inst) => Some(inst),
            _ => None,
        }
    }

    // -- instructions -------------------------------------------------------

    pub fn inst(&self, inst: Inst) -> &InstInfo {
        &self.insts[inst]
    }

    pub fn is_erased(&self, inst: Inst) -> bool {
        self.insts[inst].deleted()
    }

    pub fn insts(&self, b: Block) -> InstIter<'_> {
        InstIter {
            function: self,
            current: self.blocks[b].insts.head(),
        }
    }

    pub fn set_access(&mut self, inst: Inst, access: ArrayAccess) {
        self.insts[inst].access = Some(access);
    }

    pub fn clear_access(&mut self, inst: Inst) -> Option<ArrayAccess> {
        self.insts[inst].access.take()
    }

    /// Append at the end of `block`.
    pub fn push_inst(&mut self, block: Block, data: InstData) -> Inst {
        let inst = self.materialize(block, data);
        let tail = self.blocks[block].insts.tail;
        self.link(block, inst, tail, None);
        inst
    }

    /// Insert immediately before `point`.
    pub fn insert_before(&mut self, point: Inst, data: InstData) -> Inst {
        let block = self.insts[point].parent;
        let prev = self.insts[point].node.prev;
        let inst = self.materialize(block, data);
        self.link(block, inst, prev, Some(point));
        inst
    }

    /// Insert just before the block terminator, or append when the block
    /// has none yet.
    pub fn insert_before_terminator(&mut self, block: Block, data: InstData) -> Inst {
        match self.terminator(block) {
            Some(term) => self.insert_before(term, data),
            None => self.push_inst(block, data),
        }
    }

    fn materialize(&mut self, block: Block, data: InstData) -> Inst {
        let inst = self.insts.next_id();
        let result = data
            .produces
            .then(|| self.values.alloc(ValueInfo::new(ValueKind::Inst(inst))));
        for (index, &operand) in data.operands.iter().enumerate() {
            self.values[operand].uses.insert(Use { inst, index });
        }
        self.insts.alloc(InstInfo {
            node: LinkedListNode::new(inst),
            parent: block,
            opcode: data.opcode,
            operands: data.operands,
            successors: data.successors,
            incoming: data.incoming,
            result,
            line: data.line,
            access: None,
        })
    }

    fn link(&mut self, block: Block, inst: Inst, prev: Option<Inst>, next: Option<Inst>) {
        self.insts[inst].node.prev = prev;
        self.insts[inst].node.next = next;
        match prev {
            Some(p) => self.insts[p].node.next = Some(inst),
            None => self.blocks[block].insts.head = Some(inst),
        }
        match next {
            Some(n) => self.insts[n].node.prev = Some(inst),
            None => self.blocks[block].insts.tail = Some(inst),
        }
        self.blocks[block].insts.len += 1;
    }

    fn unlink(&mut self, inst: Inst) {
        let block = self.insts[inst].parent;
        let prev = self.insts[inst].node.prev;
        let next = self.insts[inst].node.next;
        match prev {
            Some(p) => self.insts[p].node.next = next,
            None => self.blocks[block].insts.head = next,
        }
        match next {
            Some(n) => self.insts[n].node.prev = prev,
            None => self.blocks[block].insts.tail = prev,
        }
        self.insts[inst].node.prev = None;
        self.insts[inst].node.next = None;
        self.blocks[block].insts.len -= 1;
    }

    /// Rewrite one operand slot, keeping use lists consistent.
    pub fn set_operand(&mut self, inst: Inst, index: usize, value: Value) {
        let old = self.insts[inst].operands[index];
        if old == value {
            return;
        }
        self.values[old].uses.remove(&Use { inst, index });
        self.values[value].uses.insert(Use { inst, index });
        self.insts[inst].operands[index] = value;
    }

    /// Erase one instruction. Its result must be unused.
    pub fn erase_inst(&mut self, inst: Inst) {
        debug_assert!(!self.insts[inst].deleted(), "double erase of {inst}");
        if let Some(result) = self.insts[inst].result {
            debug_assert!(
                self.values[result].uses.is_empty(),
                "erasing {inst} whose result {result} still has uses"
            );
            self.values.delete(result);
        }
        let operands: SmallVec<[Value; 4]> = self.insts[inst].operands.clone();
        for (index, operand) in operands.into_iter().enumerate() {
            self.values[operand].uses.remove(&Use { inst, index });
        }
        self.unlink(inst);
        self.insts.delete(inst);
    }

    /// Erase `inst`, then iteratively erase operand-defining instructions
    /// that became unused and have no side effects. Worklist-driven; each
    /// instruction is visited at most once.
    pub fn erase_with_operands(&mut self, inst: Inst) {
        let mut worklist: SmallVec<[Value; 8]> =
            SmallVec::from_iter(self.insts[inst].operands.iter().copied());
        self.erase_inst(inst);
        while let Some(v) = worklist.pop() {
            let Some(def) = self.defining_inst(v) else {
                continue;
            };
            if self.insts[def].deleted() || !self.values[v].uses.is_empty() {
                continue;
            }
            if self.insts[def].opcode.has_side_effects() {
                continue;
            }
            worklist.extend(self.insts[def].operands.iter().copied());
            self.erase_inst(def);
        }
    }
}

pub struct InstIter<'a> {
    function: &'a Function,
    current: Option<Inst>,
}

impl Iterator for InstIter<'_> {
    type Item = Inst;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = self.function.insts[current].node.next;
        Some(current)
    }
}
