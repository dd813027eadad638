//! Discrete probability distributions
//!
//! [`Distribution`] is the probability mass used everywhere the simulator is
//! uncertain: an agent's belief over another agent's models, a selection
//! policy over actions, and the projected outcome of a round of play over
//! state vectors.
//!
//! Outcomes are kept in insertion order so expectation, sampling and
//! serialization are reproducible. A normalized distribution is never edited
//! in place; every operation returns a new instance.

use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance on the total mass of a normalized distribution
pub const MASS_TOLERANCE: f64 = 1e-9;

/// Errors raised by distribution operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DistributionError {
    #[error("Invalid probability mass: {0}")]
    Domain(String),

    #[error("Every outcome received zero likelihood; posterior is undefined")]
    BeliefCollapse,
}

/// Probability mass over a finite set of outcomes
///
/// # Example
///
/// ```rust
/// use tom_simulator_core_rs::models::Distribution;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let prior = Distribution::new(vec![("left", 1.0), ("right", 3.0)])?;
/// assert!((prior.prob(&"right") - 0.75).abs() < 1e-12);
///
/// let posterior = prior.bayes_update(|o| if *o == "left" { 0.9 } else { 0.1 })?;
/// assert!(posterior.prob(&"left") > prior.prob(&"left"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution<T> {
    entries: Vec<(T, f64)>,
}

impl<T: Clone + PartialEq> Distribution<T> {
    /// Collect raw (possibly unnormalized) mass, merging duplicate outcomes
    pub fn from_mass<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (T, f64)>,
    {
        let mut dist = Self {
            entries: Vec::new(),
        };
        for (outcome, mass) in entries {
            dist.add_mass(outcome, mass);
        }
        dist
    }

    /// Build a normalized distribution from raw mass
    pub fn new<I>(entries: I) -> Result<Self, DistributionError>
    where
        I: IntoIterator<Item = (T, f64)>,
    {
        Self::from_mass(entries).normalize()
    }

    /// All mass on a single outcome
    pub fn point(outcome: T) -> Self {
        Self {
            entries: vec![(outcome, 1.0)],
        }
    }

    /// Equal mass on every (distinct) outcome
    pub fn uniform<I>(outcomes: I) -> Result<Self, DistributionError>
    where
        I: IntoIterator<Item = T>,
    {
        Self::new(outcomes.into_iter().map(|o| (o, 1.0)))
    }

    fn add_mass(&mut self, outcome: T, mass: f64) {
        match self.entries.iter_mut().find(|(o, _)| *o == outcome) {
            Some((_, m)) => *m += mass,
            None => self.entries.push((outcome, mass)),
        }
    }

    /// Rescale so the mass sums to one
    ///
    /// Outcomes with zero mass are dropped. Fails on negative or non-finite
    /// mass, and when the total is (numerically) zero.
    pub fn normalize(&self) -> Result<Self, DistributionError> {
        if let Some((_, bad)) = self.entries.iter().find(|(_, m)| !m.is_finite() || *m < 0.0) {
            return Err(DistributionError::Domain(format!(
                "mass {} is negative or not finite",
                bad
            )));
        }

        let total = self.total_mass();
        if total <= f64::MIN_POSITIVE {
            return Err(DistributionError::Domain(format!(
                "total mass {} is zero",
                total
            )));
        }

        Ok(Self {
            entries: self
                .entries
                .iter()
                .filter(|(_, m)| *m > 0.0)
                .map(|(o, m)| (o.clone(), m / total))
                .collect(),
        })
    }

    pub fn total_mass(&self) -> f64 {
        self.entries.iter().map(|(_, m)| m).sum()
    }

    pub fn is_normalized(&self) -> bool {
        (self.total_mass() - 1.0).abs() <= MASS_TOLERANCE
            && self.entries.iter().all(|(_, m)| *m >= 0.0)
    }

    /// Probability of an outcome (0 if absent)
    pub fn prob(&self, outcome: &T) -> f64 {
        self.entries
            .iter()
            .find(|(o, _)| o == outcome)
            .map_or(0.0, |(_, m)| *m)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, f64)> {
        self.entries.iter().map(|(o, m)| (o, *m))
    }

    /// Outcomes with positive mass, in insertion order
    pub fn support(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter(|(_, m)| *m > 0.0).map(|(o, _)| o)
    }

    /// Most likely outcome (earliest on ties)
    pub fn mode(&self) -> Option<&T> {
        let mut best: Option<(&T, f64)> = None;
        for (o, m) in &self.entries {
            if best.map_or(true, |(_, bm)| *m > bm) {
                best = Some((o, *m));
            }
        }
        best.map(|(o, _)| o)
    }

    /// Σ p(o) · valuation(o)
    pub fn expectation<F>(&self, mut valuation: F) -> f64
    where
        F: FnMut(&T) -> f64,
    {
        self.entries
            .iter()
            .filter(|(_, m)| *m > 0.0)
            .map(|(o, m)| m * valuation(o))
            .sum()
    }

    /// Draw an outcome; deterministic given the RNG state
    pub fn sample(&self, rng: &mut RngManager) -> Option<&T> {
        let weights: Vec<f64> = self.entries.iter().map(|(_, m)| *m).collect();
        rng.choose_weighted(&weights).map(|i| &self.entries[i].0)
    }

    /// posterior(o) ∝ prior(o) · likelihood(o)
    ///
    /// Fails with [`DistributionError::BeliefCollapse`] when every outcome
    /// ends up with zero mass, and with [`DistributionError::Domain`] on a
    /// negative or non-finite likelihood.
    pub fn bayes_update<F>(&self, mut likelihood: F) -> Result<Self, DistributionError>
    where
        F: FnMut(&T) -> f64,
    {
        let mut posterior = Vec::with_capacity(self.entries.len());
        for (o, m) in &self.entries {
            let l = likelihood(o);
            if !l.is_finite() || l < 0.0 {
                return Err(DistributionError::Domain(format!(
                    "likelihood {} is negative or not finite",
                    l
                )));
            }
            posterior.push((o.clone(), m * l));
        }

        let unnormalized = Self { entries: posterior };
        if unnormalized.total_mass() <= f64::MIN_POSITIVE {
            return Err(DistributionError::BeliefCollapse);
        }
        unnormalized.normalize()
    }

    /// Independent joint distribution over pairs of outcomes
    pub fn merge<U: Clone + PartialEq>(&self, other: &Distribution<U>) -> Distribution<(T, U)> {
        let mut entries = Vec::with_capacity(self.entries.len() * other.entries.len());
        for (a, pa) in &self.entries {
            for (b, pb) in &other.entries {
                entries.push(((a.clone(), b.clone()), pa * pb));
            }
        }
        Distribution { entries }
    }

    /// Push the mass through `f`, merging outcomes that map to the same value
    pub fn map<U, F>(&self, mut f: F) -> Distribution<U>
    where
        U: Clone + PartialEq,
        F: FnMut(&T) -> U,
    {
        Distribution::from_mass(self.entries.iter().map(|(o, m)| (f(o), *m)))
    }
}
