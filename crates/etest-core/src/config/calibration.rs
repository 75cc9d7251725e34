//! Calibration run parameters.
//!
//! Defaults reproduce the reference simulation: rates 1..=5 in unit steps,
//! 100 trials per rate, alpha = 0.1, unit exposures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest number of candidate rates a single run may evaluate.
pub const MAX_CANDIDATE_RATES: u64 = 100_000;

/// Semantic validation failures for a calibration config.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("mu_lower must be positive and finite, got {0}")]
    InvalidLowerRate(f64),

    #[error("mu_upper ({upper}) must be finite and not below mu_lower ({lower})")]
    InvalidRateRange { lower: f64, upper: f64 },

    #[error("step must be positive and finite, got {0}")]
    InvalidStep(f64),

    #[error("rate grid from {lower} to {upper} in steps of {step} exceeds {max} candidate rates")]
    TooManyRates {
        lower: f64,
        upper: f64,
        step: f64,
        max: u64,
    },

    #[error("trials must be at least 1")]
    ZeroTrials,

    #[error("alpha must lie strictly between 0 and 1, got {0}")]
    InvalidAlpha(f64),

    #[error("exposure {field} must be positive and finite, got {value}")]
    InvalidExposure { field: &'static str, value: f64 },
}

/// Parameters of a false-positive calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationConfig {
    /// Smallest candidate true rate.
    pub mu_lower: f64,
    /// Largest candidate true rate (inclusive).
    pub mu_upper: f64,
    /// Spacing between candidate rates.
    pub step: f64,
    /// Simulated experiments per candidate rate.
    pub trials: u64,
    /// Significance level a p-value is compared against.
    pub alpha: f64,
    /// Exposure of sample 1.
    pub n1: f64,
    /// Exposure of sample 2.
    pub n2: f64,
    /// Base RNG seed; drawn from OS entropy when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Evaluate candidate rates on the rayon pool.
    pub parallel: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            mu_lower: 1.0,
            mu_upper: 5.0,
            step: 1.0,
            trials: 100,
            alpha: 0.1,
            n1: 1.0,
            n2: 1.0,
            seed: None,
            parallel: true,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.mu_lower.is_finite() || self.mu_lower <= 0.0 {
            return Err(ValidationError::InvalidLowerRate(self.mu_lower));
        }
        if !self.mu_upper.is_finite() || self.mu_upper < self.mu_lower {
            return Err(ValidationError::InvalidRateRange {
                lower: self.mu_lower,
                upper: self.mu_upper,
            });
        }
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(ValidationError::InvalidStep(self.step));
        }
        let span = (self.mu_upper - self.mu_lower) / self.step;
        if !span.is_finite() || span + 1.0 > MAX_CANDIDATE_RATES as f64 {
            return Err(ValidationError::TooManyRates {
                lower: self.mu_lower,
                upper: self.mu_upper,
                step: self.step,
                max: MAX_CANDIDATE_RATES,
            });
        }
        if self.trials == 0 {
            return Err(ValidationError::ZeroTrials);
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ValidationError::InvalidAlpha(self.alpha));
        }
        for (field, value) in [("n1", self.n1), ("n2", self.n2)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ValidationError::InvalidExposure { field, value });
            }
        }
        Ok(())
    }

    /// Candidate rates from mu_lower to mu_upper inclusive.
    ///
    /// Computed as `mu_lower + i * step` so long grids do not accumulate
    /// rounding; the upper end is kept when it lies within rounding of a step.
    pub fn candidate_rates(&self) -> Vec<f64> {
        if self.validate().is_err() {
            return Vec::new();
        }
        let span = (self.mu_upper - self.mu_lower) / self.step;
        let count = (span + 1e-9).floor() as u64 + 1;
        (0..count)
            .map(|i| self.mu_lower + i as f64 * self.step)
            .collect()
    }

    /// Total number of simulated experiments.
    pub fn total_trials(&self) -> u64 {
        self.trials
            .saturating_mul(self.candidate_rates().len() as u64)
    }
}
