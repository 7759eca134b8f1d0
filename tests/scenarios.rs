//! The six canonical scenarios, checked two ways: statically (which
//! checks survive the pipeline) and dynamically (traces of the original
//! and transformed programs agree on failures, and the transformed trace
//! never executes more checks).

use parapet::interp::Machine;
use parapet::ir::{Module, verify_function};
use parapet::opt::{BoundCheckOptimization, OptConfig};
use parapet_test_utils::Scenario;
use parapet_test_utils::programs;

fn optimized(scenario: &Scenario) -> Module {
    let mut module = scenario.module.clone();
    BoundCheckOptimization::new(OptConfig::quiet()).run(&mut module);
    let function = module.function(scenario.function);
    if let Err(errors) = verify_function(function) {
        panic!("transformed IR is malformed: {errors:?}");
    }
    module
}

fn optimized_counts(scenario: &Scenario) -> (usize, usize) {
    let module = optimized(scenario);
    Scenario {
        module,
        function: scenario.function,
    }
    .check_counts()
}

#[test]
fn s1_constant_index_loses_both_checks() {
    let scenario = programs::constant_index();
    assert_eq!(scenario.check_counts(), (1, 1));
    assert_eq!(optimized_counts(&scenario), (0, 0));
}

#[test]
fn s2_unit_stride_loop_ends_with_no_checks() {
    let scenario = programs::unit_stride_loop();
    assert_eq!(scenario.check_counts(), (1, 1));
    assert_eq!(optimized_counts(&scenario), (0, 0));
}

#[test]
fn s2_transformed_loop_still_runs_clean() {
    let scenario = programs::unit_stride_loop();
    let module = optimized(&scenario);
    for n in [0, 1, 5, 9] {
        let before = Machine::new(&scenario.module)
            .run(scenario.function, &[n])
            .unwrap();
        let after = Machine::new(&module).run(scenario.function, &[n]).unwrap();
        assert_eq!(before.failure_count(), 0);
        assert_eq!(after.failure_count(), 0);
        assert!(after.check_count() <= before.check_count());
    }
}

#[test]
fn s3_strict_less_shift_loses_both_pairs() {
    let scenario = programs::strict_less_shift();
    assert_eq!(scenario.check_counts(), (2, 2));
    assert_eq!(optimized_counts(&scenario), (0, 0));
}

#[test]
fn s4_decreasing_loop_ends_with_no_checks() {
    let scenario = programs::decreasing_loop();
    assert_eq!(scenario.check_counts(), (1, 1));
    assert_eq!(optimized_counts(&scenario), (0, 0));

    let module = optimized(&scenario);
    for n in [1, 4, 7] {
        let before = Machine::new(&scenario.module)
            .run(scenario.function, &[n])
            .unwrap();
        let after = Machine::new(&module).run(scenario.function, &[n]).unwrap();
        assert_eq!(before.failure_count(), 0);
        assert_eq!(after.failure_count(), 0);
        assert!(after.check_count() <= before.check_count());
    }
}

#[test]
fn s5_same_block_duplicates_collapse_to_one_pair() {
    let scenario = programs::same_block_duplicates();
    assert_eq!(scenario.check_counts(), (3, 3));
    assert_eq!(optimized_counts(&scenario), (1, 1));
}

#[test]
fn s5_surviving_pair_still_catches_the_overflow() {
    let scenario = programs::same_block_duplicates();
    let module = optimized(&scenario);

    let ok = Machine::new(&module).run(scenario.function, &[3]).unwrap();
    assert_eq!(ok.check_count(), 2);
    assert_eq!(ok.failure_count(), 0);

    let before = Machine::new(&scenario.module)
        .run(scenario.function, &[10])
        .unwrap();
    let after = Machine::new(&module).run(scenario.function, &[10]).unwrap();
    assert!(before.failed());
    assert!(after.failed());
    assert!(after.check_count() <= before.check_count());
}

#[test]
fn s6_unknown_update_keeps_checks_in_place() {
    let scenario = programs::unknown_update_loop();
    assert_eq!(scenario.check_counts(), (1, 1));
    // nothing is hoisted and nothing deleted beyond same-block duplicates,
    // of which there are none
    assert_eq!(optimized_counts(&scenario), (1, 1));
}

#[test]
fn jacobi_step_loses_every_check() {
    let scenario = programs::jacobi_1d_step();
    assert_eq!(scenario.check_counts(), (4, 4));
    assert_eq!(optimized_counts(&scenario), (0, 0));

    let module = optimized(&scenario);
    for n in [3, 6, 10] {
        let before = Machine::new(&scenario.module)
            .run(scenario.function, &[n])
            .unwrap();
        let after = Machine::new(&module).run(scenario.function, &[n]).unwrap();
        assert_eq!(before.failure_count(), 0);
        assert_eq!(after.failure_count(), 0);
        assert!(after.check_count() <= before.check_count());
    }
}

#[test]
fn s6_traces_agree_under_an_opaque_counter() {
    let scenario = programs::unknown_update_loop();
    let module = optimized(&scenario);

    let run = |m: &Module, updates: Vec<i64>| {
        let mut feed = updates.into_iter();
        Machine::new(m)
            .with_extern_handler(Box::new(move |name, _| {
                (name == "f").then(|| feed.next().unwrap_or(100))
            }))
            .run(scenario.function, &[5])
            .unwrap()
    };

    // in-bounds wandering counter: both traces stay clean and equal
    let before = run(&scenario.module, vec![2, 1, 4, 100]);
    let after = run(&module, vec![2, 1, 4, 100]);
    assert_eq!(before.failure_count(), 0);
    assert_eq!(after.check_count(), before.check_count());

    // a negative index must still be reported after the transformation
    let before = run(&scenario.module, vec![-1, 100]);
    let after = run(&module, vec![-1, 100]);
    assert!(before.failed());
    assert!(after.failed());
}
