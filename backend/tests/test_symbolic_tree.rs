// Symbolic tree tests
//
// Trees arrive as JSON, are checked against the declared key universe
// (collecting every problem, not just the first) and are evaluated by a
// pure interpreter.

use proptest::prelude::*;
use tom_simulator_core_rs::models::{reward_key, Domain, Key, StateVector, Universe, Value};
use tom_simulator_core_rs::tree::{
    build, build_dynamics, build_legality, build_reward, evaluate, evaluate_legality,
    evaluate_predicate, evaluate_reward, evaluate_transform, minimize_difference, MalformedTreeError,
    Operand, Outcome, Predicate, TreeError, TreeSpec, MAX_TREE_DEPTH,
};

const MINE: &str = "Agent 1's decision";
const OTHER: &str = "Agent 2's decision";

fn dilemma_universe() -> Universe {
    let mut universe = Universe::new();
    for key in [MINE, OTHER] {
        universe.insert(
            Key::from(key),
            Domain::enumerated(["none", "defected", "cooperated"]),
        );
    }
    universe.insert(reward_key("Agent 1"), Domain::numeric());
    universe.insert(Key::from("x"), Domain::range(-100.0, 100.0));
    universe.insert(Key::from("y"), Domain::range(-100.0, 100.0));
    universe
}

fn dilemma_state(mine: &str, other: &str) -> StateVector {
    let mut state = StateVector::new();
    state.insert(Key::from(MINE), Value::from(mine));
    state.insert(Key::from(OTHER), Value::from(other));
    state.insert(reward_key("Agent 1"), Value::from(0.0));
    state.insert(Key::from("x"), Value::from(0.0));
    state.insert(Key::from("y"), Value::from(0.0));
    state
}

fn malformed(result: Result<impl std::fmt::Debug, TreeError>) -> Vec<MalformedTreeError> {
    match result {
        Err(TreeError::Malformed(errors)) => errors,
        other => panic!("Expected malformed tree, got {:?}", other),
    }
}

// ============================================================================
// JSON trees
// ============================================================================

const PAYOFF_JSON: &str = r#"{
    "type": "condition",
    "description": "both decided?",
    "condition": {"op": "or", "conditions": [
        {"op": "==", "left": {"key": "Agent 1's decision"}, "right": {"value": "none"}},
        {"op": "==", "left": {"key": "Agent 2's decision"}, "right": {"value": "none"}}
    ]},
    "on_true": {"type": "scalar", "value": -10000.0},
    "on_false": {
        "type": "condition",
        "condition": {"op": "==", "left": {"key": "Agent 2's decision"}, "right": {"value": "cooperated"}},
        "on_true": {"type": "transform", "transform": {"op": "set_constant", "key": "Agent 1's __REWARD__", "value": -1.0}},
        "on_false": {"type": "transform", "transform": {"op": "set_constant", "key": "Agent 1's __REWARD__", "value": -3.0}}
    }
}"#;

#[test]
fn test_payoff_tree_from_json() {
    let universe = dilemma_universe();
    let spec = TreeSpec::from_json(PAYOFF_JSON).unwrap();
    let tree = build_reward(&spec, &universe, &reward_key("Agent 1")).unwrap();

    assert_eq!(tree.depth(), 3);
    assert_eq!(
        evaluate_reward(&tree, &dilemma_state("none", "cooperated")).unwrap(),
        -10000.0
    );
    assert_eq!(
        evaluate_reward(&tree, &dilemma_state("cooperated", "cooperated")).unwrap(),
        -1.0
    );
    assert_eq!(
        evaluate_reward(&tree, &dilemma_state("cooperated", "defected")).unwrap(),
        -3.0
    );
}

#[test]
fn test_json_survives_serialization() {
    let spec = TreeSpec::from_json(PAYOFF_JSON).unwrap();
    let again = TreeSpec::from_json(&spec.to_json().unwrap()).unwrap();
    assert_eq!(spec, again);
}

#[test]
fn test_unknown_op_is_a_parse_error() {
    let json = r#"{"type": "transform", "transform": {"op": "teleport", "key": "x"}}"#;
    assert!(TreeSpec::from_json(json).is_err());
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_all_unknown_keys_reported() {
    let universe = dilemma_universe();
    let spec = TreeSpec::branch(
        Predicate::equals(Key::from("ghost"), 1.0),
        TreeSpec::increment(Key::from("phantom"), 1.0),
        TreeSpec::increment(Key::from("x"), 1.0),
    );

    let errors = malformed(build(&spec, &universe));
    let unknown: Vec<&Key> = errors
        .iter()
        .filter_map(|e| match e {
            MalformedTreeError::UnknownKey { key, .. } => Some(key),
            _ => None,
        })
        .collect();
    assert_eq!(unknown, vec![&Key::from("ghost"), &Key::from("phantom")]);
}

#[test]
fn test_missing_branch_reports_path() {
    let universe = dilemma_universe();
    let spec = TreeSpec::Condition {
        description: String::new(),
        condition: Predicate::equals(Key::from("x"), 0.0),
        on_true: Some(Box::new(TreeSpec::Condition {
            description: String::new(),
            condition: Predicate::equals(Key::from("y"), 0.0),
            on_true: Some(Box::new(TreeSpec::boolean(true))),
            on_false: None,
        })),
        on_false: Some(Box::new(TreeSpec::boolean(false))),
    };

    let errors = malformed(build_legality(&spec, &universe));
    assert_eq!(
        errors,
        vec![MalformedTreeError::MissingBranch {
            path: "root.on_true".to_string(),
            branch: "on_false",
        }]
    );
}

#[test]
fn test_excessive_depth_rejected() {
    let universe = dilemma_universe();
    let mut spec = TreeSpec::boolean(true);
    for _ in 0..MAX_TREE_DEPTH {
        spec = TreeSpec::branch(
            Predicate::equals(Key::from("x"), 0.0),
            spec,
            TreeSpec::boolean(false),
        );
    }
    assert_eq!(spec.depth(), MAX_TREE_DEPTH + 1);

    let errors = malformed(build_legality(&spec, &universe));
    assert_eq!(
        errors,
        vec![MalformedTreeError::ExcessiveDepth {
            actual: MAX_TREE_DEPTH + 1,
            max: MAX_TREE_DEPTH,
        }]
    );
}

#[test]
fn test_type_mismatch_and_bad_constant() {
    let universe = dilemma_universe();

    // Numeric key against a symbol
    let spec = TreeSpec::branch(
        Predicate::equals(Key::from("x"), "cooperated"),
        TreeSpec::boolean(true),
        TreeSpec::boolean(false),
    );
    let errors = malformed(build_legality(&spec, &universe));
    assert!(matches!(errors[0], MalformedTreeError::TypeMismatch { .. }));

    // Symbol outside the enumerated domain
    let spec = TreeSpec::branch(
        Predicate::equals(Key::from(MINE), "betrayed"),
        TreeSpec::boolean(true),
        TreeSpec::boolean(false),
    );
    let errors = malformed(build_legality(&spec, &universe));
    assert!(matches!(
        &errors[0],
        MalformedTreeError::InvalidConstant { key, .. } if key.as_str() == MINE
    ));

    // Ordering on symbols
    let spec = TreeSpec::branch(
        Predicate::greater(Key::from(MINE), Key::from(OTHER)),
        TreeSpec::boolean(true),
        TreeSpec::boolean(false),
    );
    let errors = malformed(build_legality(&spec, &universe));
    assert!(matches!(errors[0], MalformedTreeError::TypeMismatch { .. }));
}

#[test]
fn test_leaf_kinds_checked_per_role() {
    let universe = dilemma_universe();
    let x = Key::from("x");

    let errors = malformed(build_legality(&TreeSpec::increment(x.clone(), 1.0), &universe));
    assert!(matches!(errors[0], MalformedTreeError::UnexpectedLeaf { .. }));

    let errors = malformed(build_dynamics(&TreeSpec::scalar(1.0), &universe, &x));
    assert!(matches!(errors[0], MalformedTreeError::UnexpectedLeaf { .. }));

    let errors = malformed(build_dynamics(
        &TreeSpec::increment(Key::from("y"), 1.0),
        &universe,
        &x,
    ));
    assert!(matches!(errors[0], MalformedTreeError::WrongTarget { .. }));

    let errors = malformed(build_reward(
        &TreeSpec::boolean(true),
        &universe,
        &reward_key("Agent 1"),
    ));
    assert!(matches!(errors[0], MalformedTreeError::UnexpectedLeaf { .. }));
}

#[test]
fn test_non_finite_scalar_rejected() {
    let universe = dilemma_universe();
    let errors = malformed(build(&TreeSpec::scalar(f64::NAN), &universe));
    assert!(matches!(errors[0], MalformedTreeError::NonFinite { .. }));
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn test_transforms_read_the_given_state() {
    let universe = dilemma_universe();
    let mut state = dilemma_state("none", "none");
    state.insert(Key::from("x"), Value::from(2.0));
    state.insert(Key::from("y"), Value::from(5.0));

    let spec = TreeSpec::linear(
        Key::from("x"),
        [(Key::from("x"), 3.0), (Key::from("y"), -1.0)],
        0.5,
    );
    let tree = build_dynamics(&spec, &universe, &Key::from("x")).unwrap();

    let result = evaluate_transform(&tree, &state).unwrap();
    assert_eq!(result.key, Key::from("x"));
    assert_eq!(result.value, Value::from(1.5));

    // Input untouched
    assert_eq!(state.number(&Key::from("x")).unwrap(), 2.0);
}

#[test]
fn test_symbol_copy_between_keys() {
    let universe = dilemma_universe();
    let spec = TreeSpec::set_from_key(Key::from(MINE), Key::from(OTHER), 1.0);
    let tree = build_dynamics(&spec, &universe, &Key::from(MINE)).unwrap();

    let result = evaluate_transform(&tree, &dilemma_state("none", "defected")).unwrap();
    assert_eq!(result.value, Value::from("defected"));
}

#[test]
fn test_legality_scalar_leaf_counts_as_truth() {
    let universe = dilemma_universe();
    let spec = TreeSpec::branch(
        Predicate::LessThan {
            left: Operand::key("x"),
            right: Operand::constant(0.0),
        },
        TreeSpec::scalar(0.0),
        TreeSpec::scalar(2.0),
    );
    let tree = build_legality(&spec, &universe).unwrap();

    assert!(evaluate_legality(&tree, &dilemma_state("none", "none")).unwrap());

    let mut state = dilemma_state("none", "none");
    state.insert(Key::from("x"), Value::from(-1.0));
    assert!(!evaluate_legality(&tree, &state).unwrap());
}

#[test]
fn test_conjunction_short_circuits() {
    // The second operand would be a type error if it were evaluated
    let state = dilemma_state("none", "none");
    let p = Predicate::And {
        conditions: vec![
            Predicate::equals(Key::from(MINE), "cooperated"),
            Predicate::equals(Key::from(OTHER), 1.0),
        ],
    };
    assert!(!evaluate_predicate(&p, &state).unwrap());
}

#[test]
fn test_missing_state_key_is_an_eval_error() {
    let universe = dilemma_universe();
    let tree = build(&TreeSpec::increment(Key::from("x"), 1.0), &universe).unwrap();
    assert!(evaluate(&tree, &StateVector::new()).is_err());
}

proptest! {
    #[test]
    fn prop_minimize_difference_is_negative_distance(a in -100.0f64..100.0, b in -100.0f64..100.0) {
        let universe = dilemma_universe();
        let spec = minimize_difference(&Key::from("x"), &Key::from("y"), "Agent 1");
        let tree = build_reward(&spec, &universe, &reward_key("Agent 1")).unwrap();

        let mut state = dilemma_state("none", "none");
        state.insert(Key::from("x"), Value::from(a));
        state.insert(Key::from("y"), Value::from(b));

        let reward = evaluate_reward(&tree, &state).unwrap();
        prop_assert!((reward + (a - b).abs()).abs() < 1e-9);
    }

    #[test]
    fn prop_evaluation_is_pure(x in -100.0f64..100.0) {
        let universe = dilemma_universe();
        let tree = build(&TreeSpec::increment(Key::from("x"), 1.0), &universe).unwrap();

        let mut state = dilemma_state("none", "none");
        state.insert(Key::from("x"), Value::from(x));
        let before = state.clone();

        let first = evaluate(&tree, &state).unwrap();
        let second = evaluate(&tree, &state).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&state, &before);
        match first {
            Outcome::Transform(result) => prop_assert!((result.value.as_number().unwrap() - (x + 1.0)).abs() < 1e-12),
            other => prop_assert!(false, "unexpected outcome {:?}", other),
        }
    }
}
