//! Numerical primitives for the Poisson E-test.

pub mod math;

pub use math::poisson::*;
pub use math::stable::*;
