//! Fuzz target for E-test inputs.
//!
//! Any combination of counts, exposures, difference and truncation must
//! either be rejected as a precondition error or produce p in [0, 1].

#![no_main]

use arbitrary::Arbitrary;
use etest_core::etest::{EtestInput, Sidedness};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Case {
    k1: u16,
    k2: u16,
    n1: f64,
    n2: f64,
    difference: f64,
    right_tail: bool,
    truncation: f64,
}

fuzz_target!(|case: Case| {
    // Keep the lattice small enough for the fuzzer to stay fast.
    let k1 = u64::from(case.k1 % 200);
    let k2 = u64::from(case.k2 % 200);
    let bounded = |x: f64| x.abs() < 1e3;
    if !(bounded(case.n1) && bounded(case.n2) && bounded(case.difference)) {
        return;
    }
    if case.n1.abs() < 1e-3 || case.n2.abs() < 1e-3 {
        return;
    }
    let sidedness = if case.right_tail {
        Sidedness::RightTail
    } else {
        Sidedness::TwoTail
    };
    let input = EtestInput::new(k1, k2)
        .with_exposures(case.n1, case.n2)
        .with_difference(case.difference)
        .with_sidedness(sidedness)
        .with_truncation(case.truncation.abs().max(1e-9));

    match input.p_value() {
        Ok(p) => assert!((0.0..=1.0).contains(&p), "p = {p} for {case:?}"),
        Err(e) => assert!(e.is_precondition(), "{e} for {case:?}"),
    }
});
