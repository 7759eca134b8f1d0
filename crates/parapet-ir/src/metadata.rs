use crate::inst::Inst;
use crate::value::Value;

/// The `array-access` annotation a detection pass attaches to a `Gep`.
///
/// Consumers read this and never write it; the bound is an element count,
/// not a byte size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayAccess {
    /// A fixed-size stack array; the bound is the element count of the
    /// alloca's type.
    Static { count: u64 },
    /// A heap array; `bound` is the element-count value recovered from the
    /// allocation size, `allocator` the originating allocation call.
    Dynamic { bound: Value, allocator: Inst },
}

impl ArrayAccess {
    pub fn is_static(&self) -> bool {
        matches!(self, ArrayAccess::Static { .. })
    }
}
