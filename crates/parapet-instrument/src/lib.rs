//! Collaborator passes of the bounds-check pipeline.
//!
//! [`detect_array_accesses`] recovers an array bound for every address
//! computation it can and records it as `Gep` metadata; the optimizer
//! trusts this annotation and never second-guesses it.
//! [`insert_bound_checks`] plants the reserved check calls in front of
//! each annotated access, and [`remove_access_metadata`] strips the
//! annotations once everything downstream has consumed them. No pass
//! here does any analysis beyond a single scan.

mod access;
mod insertion;
mod removal;

pub use access::detect_array_accesses;
pub use insertion::insert_bound_checks;
pub use removal::remove_access_metadata;

use parapet_ir::Module;

/// Run detection then insertion over every function of the module.
pub fn instrument_module(module: &mut Module) {
    for index in 0..module.function_count() {
        detect_array_accesses(module, index);
        insert_bound_checks(module, index);
    }
}
