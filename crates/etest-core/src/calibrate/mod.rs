//! False-positive calibration of the E-test by simulation.
//!
//! For each candidate true rate μ, both samples are drawn from the same
//! `Poisson(μ·n)` distribution, so H0 holds and every rejection is a false
//! positive. The fraction of trials with p < α estimates the test's actual
//! size at that rate.
//!
//! # Usage
//!
//! ```
//! use etest_core::calibrate::run_calibration;
//! use etest_core::config::CalibrationConfig;
//!
//! let config = CalibrationConfig { trials: 50, seed: Some(1), ..Default::default() };
//! let report = run_calibration(&config).unwrap();
//! assert_eq!(report.experiments, 5);
//! println!("{}", report.ascii_plot(40, 10));
//! ```
//!
//! Candidate rates are independent; each gets its own RNG stream derived
//! from the base seed and its index, so serial and parallel runs agree.

pub mod bounds;
pub mod curve;

pub use bounds::{proportion_std_error, wilson_interval, ProportionInterval, Z_95};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{CalibrationConfig, ConfigSource, ValidationError};
use crate::etest::{EtestError, EtestInput};
use crate::logging::event_names;

/// Odd constant spreading per-rate seeds across the u64 range.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Errors from a calibration run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("invalid calibration config: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("cannot sample Poisson counts with mean {mean}")]
    InvalidSamplingMean { mean: f64 },

    #[error("E-test failed for k1={k1}, k2={k2} at mu={mu}: {source}")]
    Etest {
        mu: f64,
        k1: u64,
        k2: u64,
        #[source]
        source: EtestError,
    },
}

/// Empirical false-positive rate at one candidate true rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FalsePositivePoint {
    pub mu: f64,
    pub trials: u64,
    pub positives: u64,
    pub rate: f64,
    /// 95% Wilson interval for the rate.
    pub interval: ProportionInterval,
}

impl FalsePositivePoint {
    fn from_counts(mu: f64, positives: u64, trials: u64) -> Self {
        FalsePositivePoint {
            mu,
            trials,
            positives,
            rate: positives as f64 / trials as f64,
            interval: wilson_interval(positives, trials, Z_95),
        }
    }

    /// Whether the observed rate is consistent with a nominal level, i.e. the
    /// nominal level falls inside the point's confidence interval.
    pub fn consistent_with(&self, alpha: f64) -> bool {
        self.interval.contains(alpha)
    }
}

/// Result of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub alpha: f64,
    pub n1: f64,
    pub n2: f64,
    /// Base seed actually used, so entropy-seeded runs can be replayed.
    pub seed: u64,
    pub points: Vec<FalsePositivePoint>,
    /// Mean of the per-rate false-positive rates.
    pub overall_rate: f64,
    /// Number of candidate rates.
    pub experiments: usize,
    pub total_trials: u64,
    #[serde(default)]
    pub config_source: ConfigSource,
}

impl CalibrationReport {
    /// Rates whose interval lies entirely above alpha (anti-conservative).
    pub fn exceeding_alpha(&self) -> impl Iterator<Item = &FalsePositivePoint> {
        self.points
            .iter()
            .filter(move |p| p.interval.lower > self.alpha)
    }

    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.config_source = source;
        self
    }
}

/// Run the simulation described by `config`.
pub fn run_calibration(config: &CalibrationConfig) -> Result<CalibrationReport, CalibrationError> {
    config.validate()?;
    let seed = config.seed.unwrap_or_else(|| rand::rng().random());
    let rates = config.candidate_rates();

    tracing::info!(
        target: event_names::CALIBRATE_STARTED,
        experiments = rates.len(),
        trials = config.trials,
        alpha = config.alpha,
        seed,
        parallel = config.parallel,
        "starting calibration"
    );

    let points: Vec<FalsePositivePoint> = if config.parallel {
        rates
            .par_iter()
            .enumerate()
            .map(|(index, &mu)| simulate_rate(config, mu, rate_seed(seed, index)))
            .collect::<Result<_, _>>()?
    } else {
        rates
            .iter()
            .enumerate()
            .map(|(index, &mu)| simulate_rate(config, mu, rate_seed(seed, index)))
            .collect::<Result<_, _>>()?
    };

    let experiments = points.len();
    let overall_rate = points.iter().map(|p| p.rate).sum::<f64>() / experiments as f64;
    let total_trials = points.iter().map(|p| p.trials).sum();

    tracing::info!(
        target: event_names::CALIBRATE_FINISHED,
        overall_rate,
        experiments,
        total_trials,
        "calibration finished"
    );

    Ok(CalibrationReport {
        alpha: config.alpha,
        n1: config.n1,
        n2: config.n2,
        seed,
        points,
        overall_rate,
        experiments,
        total_trials,
        config_source: ConfigSource::default(),
    })
}

fn rate_seed(base: u64, index: usize) -> u64 {
    base.wrapping_add((index as u64).wrapping_mul(SEED_STRIDE))
}

fn count_sampler(mean: f64) -> Result<Poisson<f64>, CalibrationError> {
    Poisson::new(mean).map_err(|_| CalibrationError::InvalidSamplingMean { mean })
}

/// Poisson<f64> yields whole numbers as floats.
fn draw_count<R: Rng + ?Sized>(sampler: &Poisson<f64>, rng: &mut R) -> u64 {
    let draw: f64 = sampler.sample(rng);
    draw as u64
}

/// Count false positives over `config.trials` experiments at true rate `mu`.
pub fn simulate_rate(
    config: &CalibrationConfig,
    mu: f64,
    seed: u64,
) -> Result<FalsePositivePoint, CalibrationError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mean1 = mu * config.n1;
    let mean2 = mu * config.n2;
    let sampler1 = count_sampler(mean1)?;
    let sampler2 = count_sampler(mean2)?;

    let mut positives = 0u64;
    for _ in 0..config.trials {
        let k1 = draw_count(&sampler1, &mut rng);
        let k2 = draw_count(&sampler2, &mut rng);
        let p = EtestInput::new(k1, k2)
            .with_exposures(config.n1, config.n2)
            .p_value()
            .map_err(|source| CalibrationError::Etest {
                mu,
                k1,
                k2,
                source,
            })?;
        if p < config.alpha {
            positives += 1;
        }
    }

    let point = FalsePositivePoint::from_counts(mu, positives, config.trials);
    tracing::info!(
        target: event_names::CALIBRATE_POINT,
        mu,
        positives,
        trials = config.trials,
        rate = point.rate,
        "false-positive rate estimated"
    );
    Ok(point)
}
