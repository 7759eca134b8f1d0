use petgraph::algo::dominators::simple_fast;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

use crate::block::Block;
use crate::function::Function;
use crate::value::{Value, ValueKind};

/// Dominator tree over a function's block graph.
///
/// Unreachable blocks have no entry; they dominate only themselves.
#[derive(Clone, Debug)]
pub struct DomTree {
    idom: FxHashMap<Block, Block>,
}

impl DomTree {
    pub fn new(f: &Function) -> Self {
        let mut idom = FxHashMap::default();
        let Some(entry) = f.entry() else {
            return Self { idom };
        };
        let mut graph: DiGraph<Block, ()> = DiGraph::new();
        let mut nodes: FxHashMap<Block, NodeIndex> = FxHashMap::default();
        for b in f.blocks() {
            nodes.insert(b, graph.add_node(b));
        }
        for b in f.blocks() {
            for &s in f.successors(b) {
                graph.add_edge(nodes[&b], nodes[&s], ());
            }
        }
        let doms = simple_fast(&graph, nodes[&entry]);
        for b in f.blocks() {
            if let Some(parent) = doms.immediate_dominator(nodes[&b]) {
                idom.insert(b, graph[parent]);
            }
        }
        Self { idom }
    }

    pub fn idom(&self, b: Block) -> Option<Block> {
        self.idom.get(&b).copied()
    }

    /// Reflexive dominance query.
    pub fn dominates(&self, a: Block, b: Block) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.idom.get(&current) {
                Some(&parent) if parent != current => current = parent,
                _ => return false,
            }
        }
    }

    /// Whether `v` is defined at every point of `at` (in particular at its
    /// terminator). Constants, arguments and globals are available
    /// everywhere; an instruction result must be defined in a dominating
    /// block or in `at` itself.
    pub fn value_available_at(&self, f: &Function, v: Value, at: Block) -> bool {
        match f.value_kind(v) {
            ValueKind::Const(_) | ValueKind::Argument(_) | ValueKind::Global(_) => true,
            ValueKind::Inst(inst) => {
                let def = f.inst(*inst).parent();
                self.dominates(def, at)
            }
        }
    }
}
