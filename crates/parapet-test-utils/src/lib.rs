//! Shared test helpers: algebra-law assertions and the canonical
//! instrumented program shapes the scenario tests exercise.

pub mod laws;
pub mod programs;

pub use laws::{assert_set_algebra_laws, assert_subsumption_order};
pub use programs::Scenario;
