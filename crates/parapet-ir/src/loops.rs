use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::block::Block;
use crate::cfg::PredecessorMap;
use crate::dom::DomTree;
use crate::function::Function;

/// A natural loop: single header dominating every member, discovered from
/// back edges `latch → header`. Loops sharing a header are merged.
#[derive(Clone, Debug)]
pub struct NaturalLoop {
    pub header: Block,
    pub blocks: FxHashSet<Block>,
    pub latches: SmallVec<[Block; 2]>,
}

impl NaturalLoop {
    pub fn contains(&self, b: Block) -> bool {
        self.blocks.contains(&b)
    }

    /// Out-of-loop blocks with at least one in-loop predecessor, in block
    /// layout order.
    pub fn exit_blocks(&self, f: &Function) -> Vec<Block> {
        let mut exits = Vec::new();
        let mut seen = FxHashSet::default();
        for b in f.blocks() {
            if !self.contains(b) {
                continue;
            }
            for &s in f.successors(b) {
                if !self.contains(s) && seen.insert(s) {
                    exits.push(s);
                }
            }
        }
        exits
    }

    /// Out-of-loop predecessors of the header: the edges through which the
    /// loop is entered.
    pub fn entry_preds(&self, preds: &PredecessorMap) -> Vec<Block> {
        preds
            .get(&self.header)
            .map(|ps| {
                ps.iter()
                    .copied()
                    .filter(|p| !self.contains(*p))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The in-loop blocks that dominate every exit block of the loop.
    pub fn blocks_dominating_all_exits(&self, f: &Function, dom: &DomTree) -> FxHashSet<Block> {
        let exits = self.exit_blocks(f);
        self.blocks
            .iter()
            .copied()
            .filter(|&b| exits.iter().all(|&e| dom.dominates(b, e)))
            .collect()
    }
}

/// Discover every natural loop of `f`, innermost (smallest) first.
pub fn find_loops(f: &Function, dom: &DomTree, preds: &PredecessorMap) -> Vec<NaturalLoop> {
    let mut loops: Vec<NaturalLoop> = Vec::new();
    for b in f.blocks() {
        for &s in f.successors(b) {
            if !dom.dominates(s, b) {
                continue;
            }
            // back edge b -> s
            if let Some(l) = loops.iter_mut().find(|l| l.header == s) {
                l.latches.push(b);
                collect_body(s, b, preds, &mut l.blocks);
            } else {
                let mut blocks = FxHashSet::default();
                blocks.insert(s);
                collect_body(s, b, preds, &mut blocks);
                loops.push(NaturalLoop {
                    header: s,
                    blocks,
                    latches: SmallVec::from_iter([b]),
                });
            }
        }
    }
    loops.sort_by_key(|l| l.blocks.len());
    loops
}

fn collect_body(header: Block, latch: Block, preds: &PredecessorMap, blocks: &mut FxHashSet<Block>) {
    let mut worklist = vec![latch];
    while let Some(b) = worklist.pop() {
        if b == header || !blocks.insert(b) {
            continue;
        }
        if let Some(ps) = preds.get(&b) {
            worklist.extend(ps.iter().copied());
        }
    }
}
