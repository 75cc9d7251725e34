//! Unconditional two-sample Poisson E-test.
//!
//! Computes the p-value of the test of Krishnamoorthy & Thomson (2004),
//! "A more powerful test for comparing two Poisson means", by exact summation
//! over the lattice of possible counts rather than an asymptotic approximation.
//!
//! # Usage
//!
//! ```
//! use etest_core::etest::{compute_p_value, EtestInput, Sidedness};
//!
//! let p = compute_p_value(5, 1, 1.0, 1.0, 0.0, Sidedness::TwoTail).unwrap();
//! assert!((p - 0.129452).abs() < 1e-6);
//!
//! let report = EtestInput::new(20, 10)
//!     .with_sidedness(Sidedness::RightTail)
//!     .evaluate()
//!     .unwrap();
//! assert!(report.is_significant(0.05));
//! ```

pub mod engine;
pub mod error;
pub mod statistic;

pub use engine::{compute_p_value, EtestInput, EtestReport};
pub use error::EtestError;
pub use statistic::{
    grid_statistic, is_as_extreme, standardized_difference, NullHypothesis, NullRateEstimate,
    Observation, Sidedness,
};
