use rustc_hash::FxHashMap;

use parapet_ir::{Block, Function, PredecessorMap};

use crate::error::OptError;
use crate::set::BoundPredicateSet;

/// Which way facts flow. The two passes share everything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Clone, Debug)]
pub struct DataflowResult {
    pub c_in: FxHashMap<Block, BoundPredicateSet>,
    pub c_out: FxHashMap<Block, BoundPredicateSet>,
    /// Rounds until stabilization; tests assert the convergence bound.
    pub rounds: usize,
}

/// Round-based fixpoint over the reverse post-order, shared by the
/// backward modification analysis and the forward elimination analysis.
///
/// Backward:
///   `C_IN[B]  = OR(C_GEN[B], transfer(C_OUT[B], B))`
///   `C_OUT[B] = AND(C_IN[S] for S in successors(B))`
/// Forward:
///   `C_OUT[B] = OR(C_GEN[B], transfer(C_IN[B], B))`
///   `C_IN[B]  = AND(C_OUT[P] for P in predecessors(B))`
pub fn run_fixpoint(
    f: &Function,
    preds: &PredecessorMap,
    rpo: &[Block],
    cgen: &FxHashMap<Block, BoundPredicateSet>,
    direction: Direction,
    transfer: impl Fn(&BoundPredicateSet, Block) -> Result<BoundPredicateSet, OptError>,
) -> Result<DataflowResult, OptError> {
    let mut c_in: FxHashMap<Block, BoundPredicateSet> = FxHashMap::default();
    let mut c_out: FxHashMap<Block, BoundPredicateSet> = FxHashMap::default();
    for &b in rpo {
        c_in.insert(b, BoundPredicateSet::new());
        c_out.insert(b, BoundPredicateSet::new());
    }

    let empty = BoundPredicateSet::new();
    let round_cap = 2 * rpo.len() + 8;
    let mut rounds = 0;
    let mut changed = true;
    while changed && rounds < round_cap {
        changed = false;
        rounds += 1;
        for &b in rpo {
            let local = cgen.get(&b).unwrap_or(&empty);
            match direction {
                Direction::Backward => {
                    let succ_ins: Vec<BoundPredicateSet> = f
                        .successors(b)
                        .iter()
                        .map(|s| c_in.get(s).cloned().unwrap_or_default())
                        .collect();
                    let new_out = BoundPredicateSet::and_all(&succ_ins)?;
                    let new_in =
                        BoundPredicateSet::or_all(&[local.clone(), transfer(&new_out, b)?])?;
                    if c_out[&b] != new_out {
                        c_out.insert(b, new_out);
                        changed = true;
                    }
                    if c_in[&b] != new_in {
                        c_in.insert(b, new_in);
                        changed = true;
                    }
                }
                Direction::Forward => {
                    let pred_outs: Vec<BoundPredicateSet> = preds
                        .get(&b)
                        .map(|ps| {
                            ps.iter()
                                .map(|p| c_out.get(p).cloned().unwrap_or_default())
                                .collect()
                        })
                        .unwrap_or_default();
                    let new_in = BoundPredicateSet::and_all(&pred_outs)?;
                    let new_out =
                        BoundPredicateSet::or_all(&[local.clone(), transfer(&new_in, b)?])?;
                    if c_in[&b] != new_in {
                        c_in.insert(b, new_in);
                        changed = true;
                    }
                    if c_out[&b] != new_out {
                        c_out.insert(b, new_out);
                        changed = true;
                    }
                }
            }
        }
    }
    Ok(DataflowResult {
        c_in,
        c_out,
        rounds,
    })
}
