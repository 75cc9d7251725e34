//! Two-sample Poisson E-test.
//!
//! - [`etest`]: p-value by mode-centered summation over the count lattice
//! - [`calibrate`]: empirical false-positive rate by simulation
//! - [`config`]: calibration run parameters and their TOML loading
//! - [`logging`]: tracing setup shared by the CLI

pub mod calibrate;
pub mod config;
pub mod etest;
pub mod exit_codes;
pub mod logging;
pub mod output;

pub use etest::{compute_p_value, EtestError, EtestInput, EtestReport, Sidedness};
pub use exit_codes::ExitCode;
