//! Poisson probabilities and the mode-centered recursive walk.
//!
//! The E-test needs Poisson probabilities at every lattice point it visits.
//! Instead of evaluating the pmf from scratch at each index, the walk starts
//! at the mode `floor(λ)`, evaluates the pmf there once in the log domain, and
//! then moves outward using the exact ratio identities
//!
//! - ascending:  `pmf(i+1) = λ · pmf(i) / (i+1)`
//! - descending: `pmf(i-1) = i · pmf(i) / λ`
//!
//! Each direction stops as soon as the running probability falls below the
//! truncation floor, which bounds the otherwise infinite support.
//!
//! # Zero rate
//!
//! `Poisson(0)` is a point mass at zero. The walk yields `(0, 1.0)` once; the
//! ascending ratio drives the next term to zero and the descending walk from a
//! mode of zero has no steps, so no division by λ ever happens.

use serde::{Deserialize, Serialize};

use super::stable::log_factorial;

/// Probability below which a directional walk stops.
pub const DEFAULT_TRUNCATION: f64 = 1e-7;

/// Log of the Poisson pmf `P(X = k)` for `X ~ Poisson(lambda)`.
///
/// Returns NaN for a negative, NaN or infinite rate.
pub fn poisson_log_pmf(k: u64, lambda: f64) -> f64 {
    if !lambda.is_finite() || lambda < 0.0 {
        return f64::NAN;
    }
    if lambda == 0.0 {
        return if k == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    k as f64 * lambda.ln() - lambda - log_factorial(k)
}

/// Poisson pmf `P(X = k)`.
pub fn poisson_pmf(k: u64, lambda: f64) -> f64 {
    let log_p = poisson_log_pmf(k, lambda);
    if log_p.is_nan() {
        return f64::NAN;
    }
    log_p.exp()
}

/// Mode of `Poisson(lambda)`, taken as `floor(lambda)`.
///
/// For integer λ both λ-1 and λ are modes; the walk starts at the upper one.
pub fn poisson_mode(lambda: f64) -> u64 {
    if !lambda.is_finite() || lambda <= 0.0 {
        return 0;
    }
    lambda.floor() as u64
}

/// Check that a truncation floor is usable: finite and strictly inside (0, 1).
pub fn is_valid_truncation(floor: f64) -> bool {
    floor.is_finite() && floor > 0.0 && floor < 1.0
}

/// One retained point of a Poisson walk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoissonTerm {
    pub index: u64,
    pub probability: f64,
}

/// Direction of a walk away from the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// mode, mode+1, mode+2, ...
    Ascending,
    /// mode-1, mode-2, ..., 0
    Descending,
}

/// A single-direction walk from the mode, truncated at a probability floor.
#[derive(Debug, Clone)]
pub struct DirectionalWalk {
    lambda: f64,
    floor: f64,
    direction: Direction,
    next: Option<PoissonTerm>,
}

impl DirectionalWalk {
    fn new(lambda: f64, floor: f64, direction: Direction, mode: u64, mode_pmf: f64) -> Self {
        let next = match direction {
            Direction::Ascending => Some(PoissonTerm {
                index: mode,
                probability: mode_pmf,
            }),
            // Empty when the mode is zero. A positive mode implies λ >= 1.
            Direction::Descending if mode > 0 => Some(PoissonTerm {
                index: mode - 1,
                probability: mode as f64 * mode_pmf / lambda,
            }),
            Direction::Descending => None,
        };
        DirectionalWalk {
            lambda,
            floor,
            direction,
            next,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl Iterator for DirectionalWalk {
    type Item = PoissonTerm;

    fn next(&mut self) -> Option<PoissonTerm> {
        let term = self.next.take()?;
        // Negated comparison so a NaN probability also ends the walk.
        if !(term.probability >= self.floor) {
            return None;
        }

        self.next = match self.direction {
            Direction::Ascending => {
                let index = term.index + 1;
                Some(PoissonTerm {
                    index,
                    probability: self.lambda * term.probability / index as f64,
                })
            }
            Direction::Descending if term.index > 0 => Some(PoissonTerm {
                index: term.index - 1,
                probability: term.index as f64 * term.probability / self.lambda,
            }),
            Direction::Descending => None,
        };

        Some(term)
    }
}

impl std::iter::FusedIterator for DirectionalWalk {}

/// Mode-centered walk over the retained support of `Poisson(lambda)`.
///
/// Yields the mode first, the ascending branch, then the descending branch
/// down to zero. Every yielded probability is at least the truncation floor.
#[derive(Debug, Clone)]
pub struct ModeCenteredWalk {
    lambda: f64,
    mode: u64,
    mode_pmf: f64,
    ascending: DirectionalWalk,
    descending: DirectionalWalk,
}

impl ModeCenteredWalk {
    /// Walk with the default truncation floor.
    ///
    /// Returns None if lambda is negative, NaN or infinite.
    pub fn new(lambda: f64) -> Option<Self> {
        Self::with_truncation(lambda, DEFAULT_TRUNCATION)
    }

    /// Walk with an explicit truncation floor in (0, 1).
    pub fn with_truncation(lambda: f64, floor: f64) -> Option<Self> {
        if !lambda.is_finite() || lambda < 0.0 || !is_valid_truncation(floor) {
            return None;
        }
        let mode = poisson_mode(lambda);
        let mode_pmf = poisson_pmf(mode, lambda);
        Some(ModeCenteredWalk {
            lambda,
            mode,
            mode_pmf,
            ascending: DirectionalWalk::new(lambda, floor, Direction::Ascending, mode, mode_pmf),
            descending: DirectionalWalk::new(lambda, floor, Direction::Descending, mode, mode_pmf),
        })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn mode(&self) -> u64 {
        self.mode
    }

    /// pmf at the mode, the only directly evaluated probability.
    pub fn mode_pmf(&self) -> f64 {
        self.mode_pmf
    }

    /// Total probability retained by the truncated walk.
    pub fn retained_mass(self) -> f64 {
        self.map(|t| t.probability).sum()
    }
}

impl Iterator for ModeCenteredWalk {
    type Item = PoissonTerm;

    fn next(&mut self) -> Option<PoissonTerm> {
        self.ascending.next().or_else(|| self.descending.next())
    }
}

impl std::iter::FusedIterator for ModeCenteredWalk {}
