//! Input validation errors for the E-test.

use thiserror::Error;

/// Precondition violations detected before the summation starts.
///
/// None of these are retried or corrected; the caller decides whether to skip
/// the input, abort, or report it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EtestError {
    #[error("exposure n{sample} must be positive and finite, got {value}")]
    NonPositiveExposure { sample: u8, value: f64 },

    #[error("hypothesized difference must be finite, got {0}")]
    NonFiniteDifference(f64),

    #[error("truncation floor must lie strictly between 0 and 1, got {0}")]
    InvalidTruncation(f64),

    #[error("hypothesized rate for sample {sample} is {rate}; the null hypothesis requires a non-negative finite rate")]
    InvalidNullRate { sample: u8, rate: f64 },

    #[error("hypothesized rate {rate} for sample {sample} has mode probability {mode_pmf:e}, below the truncation floor {floor:e}")]
    RateTooLargeForFloor {
        sample: u8,
        rate: f64,
        mode_pmf: f64,
        floor: f64,
    },

    #[error("accumulated probability {raw} fell outside [0, 1]")]
    ResultOutOfRange { raw: f64 },
}

impl EtestError {
    /// Stable code name for machine-readable output.
    pub fn code_name(&self) -> &'static str {
        match self {
            EtestError::NonPositiveExposure { .. } => "non_positive_exposure",
            EtestError::NonFiniteDifference(_) => "non_finite_difference",
            EtestError::InvalidTruncation(_) => "invalid_truncation",
            EtestError::InvalidNullRate { .. } => "invalid_null_rate",
            EtestError::RateTooLargeForFloor { .. } => "rate_too_large_for_floor",
            EtestError::ResultOutOfRange { .. } => "result_out_of_range",
        }
    }

    /// True for errors caused by the caller's inputs rather than by the
    /// numerical accumulation itself.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, EtestError::ResultOutOfRange { .. })
    }
}
