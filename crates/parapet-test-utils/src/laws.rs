//! Assertion helpers for the predicate-set algebra laws.
//!
//! These check properties over a given slice of sample sets and collect
//! all violations into a single report, so every failing law shows up at
//! once instead of one panic at a time.

use std::fmt::Write;

use parapet_opt::BoundPredicateSet;

fn report(violations: Vec<String>) {
    if violations.is_empty() {
        return;
    }
    let mut msg = format!("{} algebra law violation(s):\n", violations.len());
    for (i, v) in violations.iter().enumerate() {
        let _ = writeln!(msg, "  {}. {}", i + 1, v);
    }
    panic!("{msg}");
}

fn or2(a: &BoundPredicateSet, b: &BoundPredicateSet) -> BoundPredicateSet {
    BoundPredicateSet::or_all(&[a.clone(), b.clone()]).expect("sample sets share an identity")
}

fn and2(a: &BoundPredicateSet, b: &BoundPredicateSet) -> BoundPredicateSet {
    BoundPredicateSet::and_all(&[a.clone(), b.clone()]).expect("sample sets share an identity")
}

/// `OR` and `AND` must be commutative and associative over the samples,
/// identity on singletons, and fact-free on the empty operand list.
pub fn assert_set_algebra_laws(sets: &[BoundPredicateSet]) {
    let mut violations = Vec::new();

    for a in sets {
        for b in sets {
            if or2(a, b) != or2(b, a) {
                violations.push(format!("OR not commutative: {a} ∨ {b}"));
            }
            if and2(a, b) != and2(b, a) {
                violations.push(format!("AND not commutative: {a} ∧ {b}"));
            }
            for c in sets {
                if or2(&or2(a, b), c) != or2(a, &or2(b, c)) {
                    violations.push(format!("OR not associative: {a}, {b}, {c}"));
                }
                if and2(&and2(a, b), c) != and2(a, &and2(b, c)) {
                    violations.push(format!("AND not associative: {a}, {b}, {c}"));
                }
            }
        }
    }

    for s in sets {
        let singleton = std::slice::from_ref(s);
        if BoundPredicateSet::or_all(singleton).expect("singleton") != *s {
            violations.push(format!("OR({s}) is not {s}"));
        }
        if BoundPredicateSet::and_all(singleton).expect("singleton") != *s {
            violations.push(format!("AND({s}) is not {s}"));
        }
    }

    if !BoundPredicateSet::or_all(&[]).expect("empty").is_empty() {
        violations.push("OR() has facts".to_string());
    }
    if !BoundPredicateSet::and_all(&[]).expect("empty").is_empty() {
        violations.push("AND() has facts".to_string());
    }

    report(violations);
}

/// Subsumption must order same-identity predicates by their constant
/// terms, antisymmetrically up to equality.
pub fn assert_subsumption_order(predicates: &[parapet_opt::BoundPredicate]) {
    let mut violations = Vec::new();
    for p in predicates {
        if !p.subsumes(p) {
            violations.push(format!("subsumption not reflexive: {p}"));
        }
        for q in predicates {
            for r in predicates {
                if p.subsumes(q) && q.subsumes(r) && !p.subsumes(r) {
                    violations.push(format!("subsumption not transitive: {p} ⇒ {q} ⇒ {r}"));
                }
            }
        }
    }
    report(violations);
}
