// Distribution tests
//
// Finite discrete distributions back both beliefs (over model names) and
// policies (over actions). Mass must stay normalized through every
// operation; a Bayes update that leaves nothing is a collapse, not a
// silent renormalization.

use proptest::prelude::*;
use tom_simulator_core_rs::{Distribution, DistributionError, RngManager};

fn models() -> Distribution<String> {
    Distribution::new([
        ("prefer_positive".to_string(), 1.0),
        ("prefer_negative".to_string(), 2.0),
        ("prefer_nothing".to_string(), 1.0),
    ])
    .unwrap()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_normalizes() {
    let d = models();
    assert!((d.prob(&"prefer_negative".to_string()) - 0.5).abs() < 1e-12);
    assert!((d.prob(&"prefer_positive".to_string()) - 0.25).abs() < 1e-12);
    assert!(d.is_normalized());
}

#[test]
fn test_duplicate_outcomes_merge() {
    let d = Distribution::new([("a", 1.0), ("b", 1.0), ("a", 2.0)]).unwrap();
    assert_eq!(d.len(), 2);
    assert!((d.prob(&"a") - 0.75).abs() < 1e-12);
}

#[test]
fn test_zero_mass_outcomes_dropped() {
    let d = Distribution::new([("a", 0.0), ("b", 4.0)]).unwrap();
    assert_eq!(d.support().collect::<Vec<_>>(), vec![&"b"]);
    assert_eq!(d.prob(&"a"), 0.0);
}

#[test]
fn test_invalid_mass_rejected() {
    assert!(matches!(
        Distribution::new([("a", -1.0), ("b", 2.0)]),
        Err(DistributionError::Domain(_))
    ));
    assert!(matches!(
        Distribution::new([("a", f64::NAN)]),
        Err(DistributionError::Domain(_))
    ));
    assert!(matches!(
        Distribution::<&str>::new([]),
        Err(DistributionError::Domain(_))
    ));
}

#[test]
fn test_uniform_and_point() {
    let u = Distribution::uniform(["x", "y", "z", "w"]).unwrap();
    assert!((u.prob(&"z") - 0.25).abs() < 1e-12);

    let p = Distribution::point("x");
    assert_eq!(p.prob(&"x"), 1.0);
    assert_eq!(p.mode(), Some(&"x"));
}

// ============================================================================
// Queries and transformations
// ============================================================================

#[test]
fn test_expectation_and_mode() {
    let d = Distribution::new([(1.0_f64, 1.0), (4.0, 3.0)]).unwrap();
    assert!((d.expectation(|v| *v) - 3.25).abs() < 1e-12);
    assert_eq!(d.mode(), Some(&4.0));
}

#[test]
fn test_mode_prefers_earliest_on_ties() {
    let d = Distribution::uniform(["left", "right"]).unwrap();
    assert_eq!(d.mode(), Some(&"left"));
}

#[test]
fn test_merge_is_independent_product() {
    let a = Distribution::new([("C", 1.0), ("D", 3.0)]).unwrap();
    let b = Distribution::uniform(["C", "D"]).unwrap();
    let joint = a.merge(&b);

    assert_eq!(joint.len(), 4);
    assert!((joint.prob(&("D", "C")) - 0.375).abs() < 1e-12);
    assert!(joint.is_normalized());
}

#[test]
fn test_map_merges_images() {
    let d = Distribution::uniform([1, 2, 3, 4]).unwrap();
    let parity = d.map(|n| n % 2 == 0);

    assert_eq!(parity.len(), 2);
    assert!((parity.prob(&true) - 0.5).abs() < 1e-12);
}

#[test]
fn test_json_shape() {
    let d = Distribution::point("actor20".to_string());
    let json = serde_json::to_value(&d).unwrap();
    let back: Distribution<String> = serde_json::from_value(json).unwrap();
    assert_eq!(back, d);
}

// ============================================================================
// Bayes update
// ============================================================================

#[test]
fn test_bayes_update_reweights() {
    let prior = Distribution::uniform(["pos", "neg", "none"]).unwrap();
    let posterior = prior
        .bayes_update(|m| match *m {
            "pos" => 0.1,
            "neg" => 0.9,
            _ => 0.5,
        })
        .unwrap();

    assert!((posterior.prob(&"neg") - 0.9 / 1.5).abs() < 1e-12);
    assert!((posterior.prob(&"pos") - 0.1 / 1.5).abs() < 1e-12);
    assert!(posterior.is_normalized());
}

#[test]
fn test_bayes_update_drops_impossible_models() {
    let prior = Distribution::uniform(["a", "b"]).unwrap();
    let posterior = prior.bayes_update(|m| if *m == "a" { 0.0 } else { 0.3 }).unwrap();

    assert_eq!(posterior.prob(&"b"), 1.0);
    assert_eq!(posterior.support().count(), 1);
}

#[test]
fn test_bayes_update_collapse() {
    let prior = models();
    assert_eq!(
        prior.bayes_update(|_| 0.0),
        Err(DistributionError::BeliefCollapse)
    );
}

#[test]
fn test_bayes_update_rejects_bad_likelihood() {
    let prior = models();
    assert!(matches!(
        prior.bayes_update(|_| -0.5),
        Err(DistributionError::Domain(_))
    ));
}

#[test]
fn test_sampling_matches_mass() {
    let d = Distribution::new([("rare", 1.0), ("common", 9.0)]).unwrap();
    let mut rng = RngManager::new(31337);

    let common = (0..2000)
        .filter(|_| *d.sample(&mut rng).unwrap() == "common")
        .count();
    let share = common as f64 / 2000.0;
    assert!((share - 0.9).abs() < 0.03, "share was {}", share);
}

proptest! {
    #[test]
    fn prop_new_is_normalized(masses in prop::collection::vec(0.001f64..1000.0, 1..12)) {
        let d = Distribution::new(masses.iter().copied().enumerate()).unwrap();

        let total: f64 = d.iter().map(|(_, p)| p).sum();
        prop_assert!((total - 1.0).abs() < 1e-9);
        prop_assert!(d.iter().all(|(_, p)| p >= 0.0));
        prop_assert_eq!(d.len(), masses.len());
    }

    #[test]
    fn prop_bayes_update_stays_normalized(
        masses in prop::collection::vec(0.001f64..10.0, 1..8),
        likelihoods in prop::collection::vec(0.001f64..1.0, 8),
    ) {
        let prior = Distribution::new(masses.iter().copied().enumerate()).unwrap();
        let posterior = prior.bayes_update(|i| likelihoods[*i]).unwrap();

        prop_assert!(posterior.is_normalized());
        for (i, p) in posterior.iter() {
            let expected = prior.prob(i) * likelihoods[*i];
            let norm: f64 = prior.iter().map(|(j, q)| q * likelihoods[*j]).sum();
            prop_assert!((p - expected / norm).abs() < 1e-9);
        }
    }
}
