//! Action selection
//!
//! Turns a list of action values into a policy (a distribution over the
//! actions). `best` and `random` spread the mass uniformly over the
//! maximizers, `distribution` is a softmax scaled by rationality. Values that
//! are not finite never receive mass while any finite value exists.

use crate::models::{ActionId, Distribution, DistributionError, Selection};
use serde::{Deserialize, Serialize};

/// Relative tolerance under which two values count as tied
pub const TIE_TOLERANCE: f64 = 1e-9;

/// How `best` selection picks among tied maximizers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    /// Earliest declared action
    #[default]
    First,
    /// Uniformly at random, using the world RNG
    Random,
}

/// Whether `v` ties with the maximum `max`
pub fn is_tied(v: f64, max: f64) -> bool {
    (v - max).abs() <= TIE_TOLERANCE * max.abs().max(1.0)
}

/// Policy implied by `values` under `selection`
///
/// Returns the policy and whether it is degenerate (no finite value, in
/// which case the mass is spread uniformly over every action).
pub fn select_policy(
    values: &[(ActionId, f64)],
    selection: Selection,
    rationality: f64,
) -> Result<(Distribution<ActionId>, bool), DistributionError> {
    let finite: Vec<&(ActionId, f64)> = values.iter().filter(|(_, v)| v.is_finite()).collect();

    if finite.is_empty() {
        let policy = Distribution::uniform(values.iter().map(|(a, _)| a.clone()))?;
        return Ok((policy, true));
    }

    let max = finite
        .iter()
        .map(|(_, v)| *v)
        .fold(f64::NEG_INFINITY, f64::max);

    let policy = match selection {
        Selection::Best | Selection::Random => Distribution::uniform(
            finite
                .iter()
                .filter(|(_, v)| is_tied(*v, max))
                .map(|(a, _)| a.clone()),
        )?,
        Selection::Distribution => Distribution::new(
            finite
                .iter()
                .map(|(a, v)| (a.clone(), (rationality * (v - max)).exp())),
        )?,
    };

    Ok((policy, false))
}

/// Maximizers of `values` in declaration order
pub fn maximizers(values: &[(ActionId, f64)]) -> Vec<&ActionId> {
    let max = values
        .iter()
        .map(|(_, v)| *v)
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    if !max.is_finite() {
        return values.iter().map(|(a, _)| a).collect();
    }
    values
        .iter()
        .filter(|(_, v)| v.is_finite() && is_tied(*v, max))
        .map(|(a, _)| a)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionDescriptor;

    fn action(verb: &str) -> ActionId {
        ActionId::new("a", ActionDescriptor::new(verb))
    }

    #[test]
    fn test_best_is_uniform_over_maximizers() {
        let values = vec![(action("x"), 1.0), (action("y"), 3.0), (action("z"), 3.0)];
        let (policy, degenerate) = select_policy(&values, Selection::Best, 1.0).unwrap();
        assert!(!degenerate);
        assert_eq!(policy.prob(&action("x")), 0.0);
        assert!((policy.prob(&action("y")) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_is_stable_for_large_values() {
        let values = vec![(action("x"), 1000.0), (action("y"), 999.0)];
        let (policy, _) = select_policy(&values, Selection::Distribution, 1.0).unwrap();
        let expected = 1.0 / (1.0 + (-1.0_f64).exp());
        assert!((policy.prob(&action("x")) - expected).abs() < 1e-12);
        assert!(policy.is_normalized());
    }

    #[test]
    fn test_non_finite_never_wins() {
        let values = vec![(action("x"), f64::NAN), (action("y"), -5.0), (action("z"), f64::INFINITY)];
        let (policy, degenerate) = select_policy(&values, Selection::Best, 1.0).unwrap();
        assert!(!degenerate);
        assert_eq!(policy.prob(&action("y")), 1.0);
    }

    #[test]
    fn test_all_invalid_is_degenerate() {
        let values = vec![(action("x"), f64::NEG_INFINITY), (action("y"), f64::NAN)];
        let (policy, degenerate) = select_policy(&values, Selection::Distribution, 1.0).unwrap();
        assert!(degenerate);
        assert!((policy.prob(&action("x")) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_tie_tolerance_is_relative() {
        assert!(is_tied(-10000.0 + 1e-7, -10000.0));
        assert!(!is_tied(0.5, 0.0));
    }

    #[test]
    fn test_maximizers_in_declaration_order() {
        let values = vec![(action("b"), 2.0), (action("a"), 2.0), (action("c"), 1.0)];
        let best = maximizers(&values);
        assert_eq!(best, vec![&action("b"), &action("a")]);
    }
}
