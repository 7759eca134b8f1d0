use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::block::Block;
use crate::function::Function;

pub type PredecessorMap = FxHashMap<Block, SmallVec<[Block; 2]>>;

/// Predecessor lists for every block, including unreachable ones.
pub fn predecessors(f: &Function) -> PredecessorMap {
    let mut preds: PredecessorMap = FxHashMap::default();
    for b in f.blocks() {
        preds.entry(b).or_default();
    }
    for b in f.blocks() {
        for &s in f.successors(b) {
            preds.entry(s).or_default().push(b);
        }
    }
    preds
}

/// Blocks reachable from the entry, in reverse post-order.
pub fn reverse_post_order(f: &Function) -> Vec<Block> {
    let Some(entry) = f.entry() else {
        return Vec::new();
    };
    let mut post = Vec::new();
    let mut seen: FxHashSet<Block> = FxHashSet::default();
    // iterative DFS with an explicit phase marker instead of recursion
    let mut stack: Vec<(Block, usize)> = vec![(entry, 0)];
    seen.insert(entry);
    while let Some(frame) = stack.last_mut() {
        let (b, next_child) = *frame;
        let succs = f.successors(b);
        if next_child < succs.len() {
            frame.1 += 1;
            let s = succs[next_child];
            if seen.insert(s) {
                stack.push((s, 0));
            }
        } else {
            post.push(b);
            stack.pop();
        }
    }
    post.reverse();
    post
}
