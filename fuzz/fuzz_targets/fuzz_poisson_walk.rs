//! Fuzz target for the mode-centered Poisson walk.
//!
//! Every retained term must be a probability at or above the floor.

#![no_main]

use etest_math::ModeCenteredWalk;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (f64, f64)| {
    let (lambda, floor) = input;
    if !(lambda.abs() < 1e5) {
        return;
    }
    if let Some(walk) = ModeCenteredWalk::with_truncation(lambda, floor) {
        for term in walk {
            assert!(term.probability >= floor);
            assert!(term.probability <= 1.0);
        }
    }
});
