//! Arena-based procedural IR for the bounds-check toolkit.
//!
//! A [`Module`] owns functions; a [`Function`] owns three arenas (values,
//! instructions, blocks) and is the only mint for its ids. References
//! between instructions are opaque ids, never pointers, so no ownership
//! cycles arise. Analysis results (CFG, dominators, loops) are computed on
//! demand and hold ids only.

pub mod arena;
pub mod block;
pub mod builder;
pub mod cfg;
pub mod dom;
pub mod function;
pub mod inst;
pub mod intern;
pub mod linked_list;
pub mod loops;
pub mod metadata;
pub mod module;
pub mod print;
pub mod value;
pub mod verify;

pub use arena::{Arena, Id, Identifier, Item};
pub use block::{Block, BlockInfo};
pub use builder::FunctionBuilder;
pub use cfg::{PredecessorMap, predecessors, reverse_post_order};
pub use dom::DomTree;
pub use function::{Function, InstData};
pub use inst::{CmpPred, Inst, InstInfo, Opcode};
pub use intern::{InternTable, Symbol};
pub use loops::{NaturalLoop, find_loops};
pub use metadata::ArrayAccess;
pub use module::Module;
pub use value::{Use, Value, ValueInfo, ValueKind};
pub use verify::{VerifyError, verify_function};

/// Reserved callee names of the check ABI. The instrumenter plants these;
/// the optimizer recognizes, rewrites, moves and erases them; the
/// interpreter intercepts them.
pub const CHECK_LOWER_BOUND: &str = "checkLowerBound";
pub const CHECK_UPPER_BOUND: &str = "checkUpperBound";

/// Allocator callee recognized by the access-detection pass.
pub const MALLOC: &str = "malloc";

/// Procedures of the host standard library are never instrumented or
/// optimized; recognize them by demangled prefix.
pub fn is_host_library(name: &str) -> bool {
    const PREFIXES: [&str; 4] = ["std::", "__gnu", "core::", "llvm."];
    PREFIXES.iter().any(|p| name.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_library_filter() {
        assert!(is_host_library("std::vector::push_back"));
        assert!(is_host_library("__gnu_cxx::advance"));
        assert!(!is_host_library("main"));
        assert!(!is_host_library("jacobi_1d"));
    }
}
