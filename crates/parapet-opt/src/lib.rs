//! Redundant bounds-check elimination over the parapet IR.
//!
//! The instrumenter plants a `checkLowerBound` / `checkUpperBound` pair at
//! every annotated array access; this crate removes every pair it can
//! prove redundant, tightens the bounds of survivors, and hoists loop
//! candidates above their loops. Three per-procedure stages share one
//! symbolic algebra over affine subscripts:
//!
//! - a backward *modification* analysis that rewrites surviving checks
//!   with the tightest bound every successor path justifies;
//! - a forward *elimination* analysis that deletes checks already implied
//!   at their block's entry;
//! - a *loop-check propagation* step that moves invariant and monotone
//!   checks above their loops, substituting extremal values.
//!
//! A check is never deleted on the strength of a weakened analysis
//! result: imprecision (opaque subscripts, unknown effects) only forfeits
//! optimization opportunities.

pub mod cgen;
pub mod cleanup;
pub mod config;
pub mod dataflow;
pub mod effect;
pub mod elimination;
pub mod emit;
pub mod error;
pub mod loop_prop;
pub mod modification;
pub mod pass;
pub mod predicate;
pub mod set;
pub mod stats;
pub mod subscript;
pub mod transfer;

pub use cgen::{CheckSite, CheckSymbols, CheckUniverse, collect_checks};
pub use cleanup::clean_block_duplicates;
pub use config::OptConfig;
pub use effect::{EffectKind, EffectOnSubscript, EffectSummary};
pub use error::OptError;
pub use pass::BoundCheckOptimization;
pub use predicate::{BoundPredicate, PredicateKind, PredicateParts};
pub use set::BoundPredicateSet;
pub use stats::{CheckCount, count_checks};
pub use subscript::{SubscriptBase, SubscriptExpr, SubscriptIdentity};
