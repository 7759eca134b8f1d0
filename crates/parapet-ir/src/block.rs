use crate::identifier;
use crate::inst::Inst;
use crate::linked_list::LinkedList;

identifier! {
    /// A reference to a basic block in a function's block arena.
    struct Block
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "^{}", self.0.raw())
    }
}

#[derive(Clone, Debug, Default)]
pub struct BlockInfo {
    pub(crate) insts: LinkedList<Inst>,
}

impl BlockInfo {
    pub fn first(&self) -> Option<Inst> {
        self.insts.head()
    }

    pub fn last(&self) -> Option<Inst> {
        self.insts.tail()
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }
}
