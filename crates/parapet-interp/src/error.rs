use parapet_ir::{Block, Value};

/// Error type for interpreter failures.
#[derive(Debug, thiserror::Error)]
pub enum InterpError {
    /// A value was read before anything defined it.
    #[error("unbound value: {0:?}")]
    UnboundValue(Value),
    /// A load or store hit an address outside every allocation.
    #[error("bad address: {0}")]
    BadAddress(i64),
    /// Step fuel has been exhausted.
    #[error("step fuel exhausted")]
    FuelExhausted,
    /// A block fell off its end without a terminator.
    #[error("block {0} has no terminator")]
    NoTerminator(Block),
    /// A phi was entered from a block it has no incoming edge for.
    #[error("phi in {0} has no edge for the executed predecessor")]
    MissingPhiEdge(Block),
    /// The named callee exists neither in the module nor in the
    /// registered extern handler, and its result is needed.
    #[error("unknown external function: {0}")]
    UnknownExtern(String),
    /// Call of a function the module does not define.
    #[error("no function named {0}")]
    MissingFunction(String),
    /// Argument count does not match the callee's parameter count.
    #[error("arity mismatch calling {callee}: expected {expected}, got {got}")]
    ArityMismatch {
        callee: String,
        expected: usize,
        got: usize,
    },
}
