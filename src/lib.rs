//! Parapet: array-bounds-check instrumentation and optimization over a
//! small procedural IR.
//!
//! The pipeline has three stations. [`instrument`] attaches array-bound
//! metadata to address computations and plants a `checkLowerBound` /
//! `checkUpperBound` pair in front of each. [`opt`] removes every check
//! it can prove redundant, tightens the survivors, and hoists loop
//! candidates above their loops. [`interp`] executes the IR with the
//! check calls intercepted into a trace, standing in for the runtime
//! stubs.
//!
//! ```
//! use parapet::ir::Module;
//! use parapet::opt::{BoundCheckOptimization, OptConfig};
//!
//! let mut module = Module::new("empty.c");
//! BoundCheckOptimization::new(OptConfig::quiet()).run(&mut module);
//! ```

pub use parapet_instrument as instrument;
pub use parapet_interp as interp;
pub use parapet_ir as ir;
pub use parapet_opt as opt;
