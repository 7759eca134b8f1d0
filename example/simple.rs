//! End-to-end demo: instrument a unit-stride loop, optimize it, and show
//! the check counts before and after.
//!
//! Run with `cargo run --example simple`.

use parapet::interp::Machine;
use parapet::opt::{BoundCheckOptimization, OptConfig};
use parapet_test_utils::programs::unit_stride_loop;

fn main() {
    let scenario = unit_stride_loop();
    let mut module = scenario.module.clone();

    println!("=== instrumented ===");
    print!("{}", module.display_function(scenario.function));
    let before = Machine::new(&module)
        .run(scenario.function, &[8])
        .expect("instrumented program runs");
    println!("checks executed for n = 8: {}", before.check_count());

    BoundCheckOptimization::new(OptConfig::quiet()).run(&mut module);

    println!();
    println!("=== optimized ===");
    print!("{}", module.display_function(scenario.function));
    let after = Machine::new(&module)
        .run(scenario.function, &[8])
        .expect("optimized program runs");
    println!("checks executed for n = 8: {}", after.check_count());
}
