//! Fuzz target for calibrate.toml parsing.
//!
//! Parsing and validation of arbitrary text must return an error, never
//! panic, and a config that validates must yield a non-empty rate grid
//! within the candidate-rate cap.

#![no_main]

use etest_core::config::{parse_config, MAX_CANDIDATE_RATES};
use libfuzzer_sys::fuzz_target;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = parse_config(text, Path::new("fuzz.toml")) {
        let rates = config.candidate_rates();
        assert!(!rates.is_empty());
        assert!(rates.len() as u64 <= MAX_CANDIDATE_RATES);
    }
});
