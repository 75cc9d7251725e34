//! E-test p-value by exact summation over the count lattice.
//!
//! Under H0 the two counts are independent `Poisson(λ̂1)` and `Poisson(λ̂2)`.
//! The p-value is the probability of every lattice point `(i1, i2)` whose
//! statistic is at least as extreme as the observed one. Both marginals are
//! enumerated with a mode-centered walk truncated at the probability floor;
//! the inner walk is built once and cloned for every outer term.

use etest_math::{is_valid_truncation, ModeCenteredWalk, DEFAULT_TRUNCATION};
use serde::{Deserialize, Serialize};

use super::error::EtestError;
use super::statistic::{
    grid_statistic, is_as_extreme, standardized_difference, NullHypothesis, NullRateEstimate,
    Observation, Sidedness,
};
use crate::logging::event_names;

/// Hypothesized rates within this distance below zero are rounding noise
/// from the pooled-rate subtraction and are treated as exactly zero.
const RATE_ROUNDING_TOLERANCE: f64 = 1e-12;

/// How far outside [0, 1] the raw mass may drift before it is reported.
const RANGE_TOLERANCE: f64 = 1e-9;

/// Inputs to one E-test evaluation.
///
/// `EtestInput::new(k1, k2)` carries the defaults: unit exposures, zero
/// hypothesized difference, two-tail test, truncation floor 1e-7.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EtestInput {
    pub sample1: Observation,
    pub sample2: Observation,
    pub hypothesis: NullHypothesis,
    pub truncation: f64,
    /// Fail instead of clamping when the accumulated mass leaves [0, 1].
    #[serde(default)]
    pub strict: bool,
}

impl EtestInput {
    pub fn new(k1: u64, k2: u64) -> Self {
        EtestInput {
            sample1: Observation::new(k1, 1.0),
            sample2: Observation::new(k2, 1.0),
            hypothesis: NullHypothesis::default(),
            truncation: DEFAULT_TRUNCATION,
            strict: false,
        }
    }

    pub fn with_exposures(mut self, n1: f64, n2: f64) -> Self {
        self.sample1.exposure = n1;
        self.sample2.exposure = n2;
        self
    }

    pub fn with_difference(mut self, difference: f64) -> Self {
        self.hypothesis.difference = difference;
        self
    }

    pub fn with_sidedness(mut self, sidedness: Sidedness) -> Self {
        self.hypothesis.sidedness = sidedness;
        self
    }

    pub fn with_truncation(mut self, floor: f64) -> Self {
        self.truncation = floor;
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// The same test with the two samples exchanged.
    ///
    /// Only meaningful as an identical test when d = 0 and the test is two-tailed.
    pub fn swapped(mut self) -> Self {
        std::mem::swap(&mut self.sample1, &mut self.sample2);
        self
    }

    /// Check preconditions and derive the null rates.
    pub fn validate(&self) -> Result<NullRateEstimate, EtestError> {
        for (sample, obs) in [(1u8, &self.sample1), (2u8, &self.sample2)] {
            if !obs.exposure.is_finite() || obs.exposure <= 0.0 {
                return Err(EtestError::NonPositiveExposure {
                    sample,
                    value: obs.exposure,
                });
            }
        }
        if !self.hypothesis.difference.is_finite() {
            return Err(EtestError::NonFiniteDifference(self.hypothesis.difference));
        }
        if !is_valid_truncation(self.truncation) {
            return Err(EtestError::InvalidTruncation(self.truncation));
        }

        let mut rates =
            NullRateEstimate::estimate(&self.sample1, &self.sample2, self.hypothesis.difference);
        rates.lambda1 = checked_rate(1, rates.lambda1)?;
        rates.lambda2 = checked_rate(2, rates.lambda2)?;
        Ok(rates)
    }

    /// p-value only.
    pub fn p_value(&self) -> Result<f64, EtestError> {
        Ok(self.evaluate()?.p_value)
    }

    /// Run the test and keep the intermediate quantities.
    pub fn evaluate(&self) -> Result<EtestReport, EtestError> {
        let rates = self.validate()?;
        let (n1, n2) = (self.sample1.exposure, self.sample2.exposure);
        let hypothesis = self.hypothesis;
        let observed = standardized_difference(
            self.sample1.count,
            self.sample2.count,
            n1,
            n2,
            hypothesis.difference,
        );

        tracing::debug!(
            pooled = rates.pooled,
            lambda1 = rates.lambda1,
            lambda2 = rates.lambda2,
            observed_statistic = observed,
            sidedness = %hypothesis.sidedness,
            "null rates estimated"
        );

        let outer = marginal_walk(1, rates.lambda1, self.truncation)?;
        let inner = marginal_walk(2, rates.lambda2, self.truncation)?;

        let tally = outer.fold(LatticeTally::default(), |tally, t1| {
            inner.clone().fold(tally, |mut tally, t2| {
                tally.cells_visited += 1;
                let grid = grid_statistic(t1.index, t2.index, n1, n2, &hypothesis);
                if is_as_extreme(grid, observed, hypothesis.sidedness) {
                    tally.cells_qualifying += 1;
                    tally.mass += t1.probability * t2.probability;
                }
                tally
            })
        });

        tracing::trace!(
            cells_visited = tally.cells_visited,
            cells_qualifying = tally.cells_qualifying,
            raw_mass = tally.mass,
            "lattice summation finished"
        );

        let raw = tally.mass;
        if !raw.is_finite() || raw < -RANGE_TOLERANCE || raw > 1.0 + RANGE_TOLERANCE {
            if self.strict {
                return Err(EtestError::ResultOutOfRange { raw });
            }
            tracing::warn!(
                target: event_names::PVALUE_CLAMPED,
                raw_mass = raw,
                "E-test mass outside [0, 1]; clamping"
            );
        }
        let p_value = if raw.is_nan() { 1.0 } else { raw.clamp(0.0, 1.0) };

        Ok(EtestReport {
            k1: self.sample1.count,
            k2: self.sample2.count,
            n1,
            n2,
            difference: hypothesis.difference,
            sidedness: hypothesis.sidedness,
            null_rates: rates,
            observed_statistic: observed,
            raw_mass: raw,
            p_value,
            cells_visited: tally.cells_visited,
            cells_qualifying: tally.cells_qualifying,
            truncation: self.truncation,
        })
    }
}

/// Walk over one marginal. A mode probability already under the floor would
/// give an empty walk and a spurious p = 0, so it is an error instead.
fn marginal_walk(sample: u8, rate: f64, floor: f64) -> Result<ModeCenteredWalk, EtestError> {
    let walk = ModeCenteredWalk::with_truncation(rate, floor)
        .ok_or(EtestError::InvalidNullRate { sample, rate })?;
    if !(walk.mode_pmf() >= floor) {
        return Err(EtestError::RateTooLargeForFloor {
            sample,
            rate,
            mode_pmf: walk.mode_pmf(),
            floor,
        });
    }
    Ok(walk)
}

fn checked_rate(sample: u8, rate: f64) -> Result<f64, EtestError> {
    if rate.is_finite() && rate >= 0.0 {
        Ok(rate)
    } else if rate.is_finite() && rate >= -RATE_ROUNDING_TOLERANCE {
        Ok(0.0)
    } else {
        Err(EtestError::InvalidNullRate { sample, rate })
    }
}

#[derive(Debug, Default)]
struct LatticeTally {
    mass: f64,
    cells_visited: u64,
    cells_qualifying: u64,
}

/// Result of one E-test evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtestReport {
    pub k1: u64,
    pub k2: u64,
    pub n1: f64,
    pub n2: f64,
    pub difference: f64,
    pub sidedness: Sidedness,
    pub null_rates: NullRateEstimate,
    pub observed_statistic: f64,
    /// Qualifying mass before clamping to [0, 1].
    pub raw_mass: f64,
    pub p_value: f64,
    pub cells_visited: u64,
    pub cells_qualifying: u64,
    pub truncation: f64,
}

impl EtestReport {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Two-sample E-test p-value.
///
/// `d` is the hypothesized difference (population-1 rate minus d equals
/// population-2 rate).
pub fn compute_p_value(
    k1: u64,
    k2: u64,
    n1: f64,
    n2: f64,
    d: f64,
    sidedness: Sidedness,
) -> Result<f64, EtestError> {
    EtestInput::new(k1, k2)
        .with_exposures(n1, n2)
        .with_difference(d)
        .with_sidedness(sidedness)
        .p_value()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    // ==================== Reference values ====================

    #[test]
    fn reference_two_tail_five_vs_one() {
        let p = compute_p_value(5, 1, 1.0, 1.0, 0.0, Sidedness::TwoTail).unwrap();
        assert!(approx_eq(p, 0.129_452_011, 1e-6), "p = {}", p);
    }

    #[test]
    fn reference_right_tail_five_vs_one() {
        let p = compute_p_value(5, 1, 1.0, 1.0, 0.0, Sidedness::RightTail).unwrap();
        assert!(approx_eq(p, 0.064_726_006, 1e-6), "p = {}", p);
    }

    #[test]
    fn reference_unequal_exposures() {
        let p = EtestInput::new(2, 10)
            .with_exposures(2.0, 1.0)
            .p_value()
            .unwrap();
        assert!(approx_eq(p, 0.012_862_701, 1e-6), "p = {}", p);
    }

    #[test]
    fn reference_larger_counts() {
        let p = EtestInput::new(20, 10)
            .with_sidedness(Sidedness::RightTail)
            .p_value()
            .unwrap();
        assert!(approx_eq(p, 0.034_415_826, 1e-6), "p = {}", p);

        let p = EtestInput::new(10, 2).p_value().unwrap();
        assert!(approx_eq(p, 0.022_596_369, 1e-6), "p = {}", p);
    }

    // ==================== Edge cases ====================

    #[test]
    fn both_counts_zero_gives_one() {
        let report = EtestInput::new(0, 0).strict().evaluate().unwrap();
        assert_eq!(report.null_rates.lambda1, 0.0);
        assert_eq!(report.null_rates.lambda2, 0.0);
        assert_eq!(report.cells_visited, 1);
        assert!(approx_eq(report.p_value, 1.0, 1e-12));
    }

    #[test]
    fn equal_counts_give_p_near_one() {
        let p = EtestInput::new(3, 3).p_value().unwrap();
        assert!(p > 0.9999, "p = {}", p);
    }

    #[test]
    fn right_tail_against_direction_is_near_one() {
        let p = EtestInput::new(1, 5)
            .with_sidedness(Sidedness::RightTail)
            .p_value()
            .unwrap();
        assert!(p > 0.999, "p = {}", p);
    }

    #[test]
    fn one_sided_is_half_of_two_sided_for_symmetric_null() {
        let two = EtestInput::new(5, 1).p_value().unwrap();
        let right = EtestInput::new(5, 1)
            .with_sidedness(Sidedness::RightTail)
            .p_value()
            .unwrap();
        assert!(approx_eq(2.0 * right, two, 1e-9));
    }

    #[test]
    fn swapping_samples_preserves_two_tail_p() {
        let input = EtestInput::new(5, 1).with_exposures(2.0, 3.5);
        let a = input.p_value().unwrap();
        let b = input.swapped().p_value().unwrap();
        assert!(approx_eq(a, b, 1e-12));
        assert!(approx_eq(a, 0.075_478_903, 1e-6), "p = {}", a);
    }

    #[test]
    fn coarser_truncation_changes_little() {
        let fine = EtestInput::new(8, 2).p_value().unwrap();
        let coarse = EtestInput::new(8, 2)
            .with_truncation(1e-5)
            .p_value()
            .unwrap();
        assert!(coarse <= fine + 1e-12);
        assert!(fine - coarse < 1e-3);
    }

    #[test]
    fn report_counts_cells() {
        let report = EtestInput::new(5, 1).evaluate().unwrap();
        assert!(report.cells_visited > 0);
        assert!(report.cells_qualifying <= report.cells_visited);
        assert!(report.cells_qualifying > 0);
        assert!(report.is_significant(0.2));
        assert!(!report.is_significant(0.1));
        assert_eq!(report.raw_mass, report.p_value);
    }

    // ==================== Preconditions ====================

    #[test]
    fn rejects_non_positive_exposure() {
        let err = EtestInput::new(1, 1).with_exposures(0.0, 1.0).p_value();
        assert_eq!(
            err,
            Err(EtestError::NonPositiveExposure {
                sample: 1,
                value: 0.0
            })
        );
        let err = EtestInput::new(1, 1).with_exposures(1.0, -2.0).p_value();
        assert!(matches!(
            err,
            Err(EtestError::NonPositiveExposure { sample: 2, .. })
        ));
        let err = EtestInput::new(1, 1)
            .with_exposures(f64::NAN, 1.0)
            .p_value();
        assert!(matches!(err, Err(EtestError::NonPositiveExposure { .. })));
    }

    #[test]
    fn rejects_non_finite_difference() {
        let err = EtestInput::new(1, 1).with_difference(f64::INFINITY).p_value();
        assert!(matches!(err, Err(EtestError::NonFiniteDifference(_))));
    }

    #[test]
    fn rejects_invalid_truncation() {
        let err = EtestInput::new(1, 1).with_truncation(0.0).p_value();
        assert_eq!(err, Err(EtestError::InvalidTruncation(0.0)));
    }

    #[test]
    fn rejects_negative_null_rate() {
        // λK = 2/2 - 5*1/2 = -1.5
        let err = EtestInput::new(1, 1).with_difference(5.0).p_value();
        assert!(matches!(
            err,
            Err(EtestError::InvalidNullRate { sample: 2, .. })
        ));

        // λ1 = 1*(λK + d) with λK = 2/2 + 5/2 = 3.5, d = -5 -> -1.5
        let err = EtestInput::new(1, 1).with_difference(-5.0).p_value();
        assert!(matches!(
            err,
            Err(EtestError::InvalidNullRate { sample: 1, .. })
        ));
    }

    #[test]
    fn huge_rate_is_not_reported_as_zero_p() {
        // mode pmf of Poisson(2e13) is about 8.9e-8, under the 1e-7 floor
        let err = EtestInput::new(20_000_000_000_000, 20_000_000_000_000).evaluate();
        match err {
            Err(EtestError::RateTooLargeForFloor {
                sample,
                mode_pmf,
                floor,
                ..
            }) => {
                assert_eq!(sample, 1);
                assert!(mode_pmf > 0.0 && mode_pmf < floor);
                assert_eq!(floor, DEFAULT_TRUNCATION);
            }
            other => panic!("expected RateTooLargeForFloor, got {:?}", other),
        }
    }

    #[test]
    fn coarse_floor_above_mode_pmf_is_rejected() {
        // pmf(100 | 100) is about 0.0399
        let err = EtestInput::new(100, 100).with_truncation(0.05).p_value();
        assert!(matches!(
            err,
            Err(EtestError::RateTooLargeForFloor { sample: 1, .. })
        ));
        assert!(EtestInput::new(100, 100)
            .with_truncation(0.03)
            .p_value()
            .is_ok());
    }

    #[test]
    fn zero_null_rate_from_difference_is_valid() {
        // λK = 4/2 - 4/2 = 0, λ1 = 4, λ2 = 0
        let report = EtestInput::new(4, 0).with_difference(4.0).evaluate().unwrap();
        assert_eq!(report.null_rates.lambda2, 0.0);
        assert!((0.0..=1.0).contains(&report.p_value));
    }

    #[test]
    fn input_serde_roundtrip() {
        let input = EtestInput::new(7, 3)
            .with_exposures(1.5, 2.0)
            .with_sidedness(Sidedness::RightTail);
        let json = serde_json::to_string(&input).unwrap();
        let back: EtestInput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, input);
    }
}
