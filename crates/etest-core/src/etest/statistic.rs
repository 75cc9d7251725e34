//! Null-rate estimation and the standardized difference statistic.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which tail(s) of the statistic count as "at least as extreme".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sidedness {
    /// H1: population-1 rate minus d exceeds population-2 rate.
    #[value(name = "right", alias = "one", alias = "1")]
    RightTail,
    /// H1: the rates differ by something other than d.
    #[default]
    #[value(name = "two", alias = "both", alias = "2")]
    TwoTail,
}

impl std::fmt::Display for Sidedness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sidedness::RightTail => write!(f, "right"),
            Sidedness::TwoTail => write!(f, "two"),
        }
    }
}

/// A Poisson count observed over a known exposure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub count: u64,
    pub exposure: f64,
}

impl Observation {
    pub fn new(count: u64, exposure: f64) -> Self {
        Observation { count, exposure }
    }

    /// Observed rate k / n.
    pub fn rate(&self) -> f64 {
        self.count as f64 / self.exposure
    }
}

/// Null hypothesis: rate1 - difference = rate2.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NullHypothesis {
    pub difference: f64,
    pub sidedness: Sidedness,
}

/// Rates implied by the null hypothesis, derived from the observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NullRateEstimate {
    /// Pooled per-unit rate λ̂K.
    pub pooled: f64,
    /// Expected count for sample 1, n1·(λ̂K + d).
    pub lambda1: f64,
    /// Expected count for sample 2, n2·λ̂K.
    pub lambda2: f64,
}

impl NullRateEstimate {
    pub fn estimate(sample1: &Observation, sample2: &Observation, difference: f64) -> Self {
        let (k1, n1) = (sample1.count as f64, sample1.exposure);
        let (k2, n2) = (sample2.count as f64, sample2.exposure);
        let total_exposure = n1 + n2;
        let pooled = (k1 + k2) / total_exposure - difference * n1 / total_exposure;
        NullRateEstimate {
            pooled,
            lambda1: n1 * (pooled + difference),
            lambda2: n2 * pooled,
        }
    }
}

/// Standardized difference `(i1/n1 - i2/n2 - d) / sqrt(i1/n1² + i2/n2²)`.
///
/// Defined as 0 when the variance estimate is zero (both counts zero), which
/// carries no evidence either way.
pub fn standardized_difference(i1: u64, i2: u64, n1: f64, n2: f64, difference: f64) -> f64 {
    let rate1 = i1 as f64 / n1;
    let rate2 = i2 as f64 / n2;
    let variance = rate1 / n1 + rate2 / n2;
    if variance <= 0.0 {
        return 0.0;
    }
    (rate1 - rate2 - difference) / variance.sqrt()
}

/// Statistic at lattice point (i1, i2), with the forced-zero region applied.
///
/// Right tail forces 0 when `i1/n1 - i2/n2 <= d`; two tail when
/// `|i1/n1 - i2/n2| <= d`.
pub fn grid_statistic(
    i1: u64,
    i2: u64,
    n1: f64,
    n2: f64,
    hypothesis: &NullHypothesis,
) -> f64 {
    let raw_diff = i1 as f64 / n1 - i2 as f64 / n2;
    let forced_zero = match hypothesis.sidedness {
        Sidedness::RightTail => raw_diff <= hypothesis.difference,
        Sidedness::TwoTail => raw_diff.abs() <= hypothesis.difference,
    };
    if forced_zero {
        0.0
    } else {
        standardized_difference(i1, i2, n1, n2, hypothesis.difference)
    }
}

/// Whether a lattice statistic is at least as extreme as the observed one.
pub fn is_as_extreme(grid: f64, observed: f64, sidedness: Sidedness) -> bool {
    match sidedness {
        Sidedness::RightTail => grid >= observed,
        Sidedness::TwoTail => grid.abs() >= observed.abs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn pooled_rate_without_difference() {
        let s1 = Observation::new(5, 1.0);
        let s2 = Observation::new(1, 1.0);
        let est = NullRateEstimate::estimate(&s1, &s2, 0.0);
        assert!(approx_eq(est.pooled, 3.0, 1e-12));
        assert!(approx_eq(est.lambda1, 3.0, 1e-12));
        assert!(approx_eq(est.lambda2, 3.0, 1e-12));
    }

    #[test]
    fn pooled_rate_with_exposures_and_difference() {
        // λK = 12/4 - 1*1/4 = 2.75; λ1 = 1*(2.75+1) = 3.75; λ2 = 3*2.75 = 8.25
        let s1 = Observation::new(4, 1.0);
        let s2 = Observation::new(8, 3.0);
        let est = NullRateEstimate::estimate(&s1, &s2, 1.0);
        assert!(approx_eq(est.pooled, 2.75, 1e-12));
        assert!(approx_eq(est.lambda1, 3.75, 1e-12));
        assert!(approx_eq(est.lambda2, 8.25, 1e-12));
        // Expected counts add up to the observed total.
        assert!(approx_eq(est.lambda1 + est.lambda2, 12.0, 1e-12));
    }

    #[test]
    fn standardized_difference_known_value() {
        // (5 - 1) / sqrt(6)
        let t = standardized_difference(5, 1, 1.0, 1.0, 0.0);
        assert!(approx_eq(t, 4.0 / 6.0f64.sqrt(), 1e-12));
    }

    #[test]
    fn standardized_difference_zero_variance_is_zero() {
        assert_eq!(standardized_difference(0, 0, 1.0, 1.0, 0.0), 0.0);
        assert_eq!(standardized_difference(0, 0, 2.0, 0.5, 3.0), 0.0);
    }

    #[test]
    fn standardized_difference_is_antisymmetric() {
        let a = standardized_difference(7, 2, 1.5, 2.0, 0.0);
        let b = standardized_difference(2, 7, 2.0, 1.5, 0.0);
        assert!(approx_eq(a, -b, 1e-12));
    }

    #[test]
    fn right_tail_forces_zero_below_difference() {
        let h = NullHypothesis {
            difference: 0.0,
            sidedness: Sidedness::RightTail,
        };
        assert_eq!(grid_statistic(1, 4, 1.0, 1.0, &h), 0.0);
        assert_eq!(grid_statistic(3, 3, 1.0, 1.0, &h), 0.0);
        assert!(grid_statistic(4, 1, 1.0, 1.0, &h) > 0.0);
    }

    #[test]
    fn two_tail_keeps_sign_outside_band() {
        let h = NullHypothesis {
            difference: 0.0,
            sidedness: Sidedness::TwoTail,
        };
        assert!(grid_statistic(1, 4, 1.0, 1.0, &h) < 0.0);
        assert_eq!(grid_statistic(2, 2, 1.0, 1.0, &h), 0.0);
    }

    #[test]
    fn two_tail_band_widens_with_difference() {
        let h = NullHypothesis {
            difference: 2.0,
            sidedness: Sidedness::TwoTail,
        };
        // |3 - 1| = 2 <= d
        assert_eq!(grid_statistic(3, 1, 1.0, 1.0, &h), 0.0);
        assert!(grid_statistic(6, 1, 1.0, 1.0, &h) > 0.0);
    }

    #[test]
    fn extremeness_by_sidedness() {
        assert!(is_as_extreme(2.0, 1.5, Sidedness::RightTail));
        assert!(!is_as_extreme(-2.0, 1.5, Sidedness::RightTail));
        assert!(is_as_extreme(-2.0, 1.5, Sidedness::TwoTail));
        assert!(is_as_extreme(0.0, -0.5, Sidedness::RightTail));
        assert!(is_as_extreme(1.5, 1.5, Sidedness::TwoTail));
    }

    #[test]
    fn sidedness_display_and_default() {
        assert_eq!(Sidedness::default(), Sidedness::TwoTail);
        assert_eq!(Sidedness::RightTail.to_string(), "right");
        assert_eq!(
            serde_json::to_string(&Sidedness::TwoTail).unwrap(),
            r#""two_tail""#
        );
    }
}
