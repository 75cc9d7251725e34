//! Binomial confidence bounds for empirical false-positive rates.
//!
//! A false-positive rate is a binomial proportion (positives out of trials).
//! The Wilson score interval stays inside [0, 1] and behaves at 0 or all
//! successes, where the Wald interval collapses.

use serde::{Deserialize, Serialize};

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.959_963_984_540_054;

/// A confidence interval for a proportion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProportionInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ProportionInterval {
    pub fn contains(&self, p: f64) -> bool {
        self.lower <= p && p <= self.upper
    }
}

/// Wilson score interval for `successes` out of `trials` at normal quantile `z`.
///
/// Zero trials carry no information and give [0, 1].
pub fn wilson_interval(successes: u64, trials: u64, z: f64) -> ProportionInterval {
    if trials == 0 {
        return ProportionInterval {
            lower: 0.0,
            upper: 1.0,
        };
    }
    let n = trials as f64;
    let p = successes.min(trials) as f64 / n;
    let z2 = z * z;
    let denom = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denom;
    let half = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denom;
    ProportionInterval {
        lower: (center - half).max(0.0),
        upper: (center + half).min(1.0),
    }
}

/// Standard error of a proportion `p` estimated from `trials` draws.
pub fn proportion_std_error(p: f64, trials: u64) -> f64 {
    if trials == 0 {
        return f64::INFINITY;
    }
    (p * (1.0 - p) / trials as f64).sqrt()
}
