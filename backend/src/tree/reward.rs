//! Common reward tree shapes
//!
//! Each helper returns a [`TreeSpec`] writing the agent's reward slot, ready
//! for `World::set_reward`.

use crate::models::key::{reward_key, Key, Value};
use crate::tree::types::{Operand, Predicate, TreeSpec};

/// Reward equals the feature's value
pub fn maximize_feature(key: &Key, agent: &str) -> TreeSpec {
    TreeSpec::set_from_key(reward_key(agent), key.clone(), 1.0)
}

/// Reward equals the negated feature value
pub fn minimize_feature(key: &Key, agent: &str) -> TreeSpec {
    TreeSpec::set_from_key(reward_key(agent), key.clone(), -1.0)
}

/// 1 when the feature equals `value`, 0 otherwise
pub fn achieve_feature_value(key: &Key, value: impl Into<Value>, agent: &str) -> TreeSpec {
    TreeSpec::branch(
        Predicate::equals(key.clone(), value),
        TreeSpec::set_constant(reward_key(agent), 1.0),
        TreeSpec::set_constant(reward_key(agent), 0.0),
    )
}

/// 1 when a boolean feature holds (or, inverted, when it does not)
pub fn achieve_goal(key: &Key, agent: &str, invert: bool) -> TreeSpec {
    let target = if invert { 0.0 } else { 1.0 };
    achieve_feature_value(key, target, agent)
}

/// Negated absolute difference between two numeric features
pub fn minimize_difference(key1: &Key, key2: &Key, agent: &str) -> TreeSpec {
    TreeSpec::branch(
        Predicate::GreaterThan {
            left: Operand::Key { key: key1.clone() },
            right: Operand::Key { key: key2.clone() },
        },
        TreeSpec::linear(
            reward_key(agent),
            [(key1.clone(), -1.0), (key2.clone(), 1.0)],
            0.0,
        ),
        TreeSpec::linear(
            reward_key(agent),
            [(key1.clone(), 1.0), (key2.clone(), -1.0)],
            0.0,
        ),
    )
}

/// Constant zero reward
pub fn null_reward(agent: &str) -> TreeSpec {
    TreeSpec::set_constant(reward_key(agent), 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::key::{state_key, Domain, Universe};
    use crate::models::state::StateVector;
    use crate::tree::interpreter::evaluate_reward;
    use crate::tree::validation::build_reward;

    fn fixture() -> (Universe, StateVector) {
        let mut universe = Universe::new();
        universe.insert(state_key("a", "x"), Domain::numeric());
        universe.insert(state_key("a", "y"), Domain::numeric());
        universe.insert(state_key("a", "done"), Domain::Boolean);
        universe.insert(reward_key("a"), Domain::numeric());

        let state = [
            (state_key("a", "x"), Value::Number(3.0)),
            (state_key("a", "y"), Value::Number(7.0)),
            (state_key("a", "done"), Value::Number(1.0)),
            (reward_key("a"), Value::Number(0.0)),
        ]
        .into_iter()
        .collect();
        (universe, state)
    }

    fn reward_of(spec: &TreeSpec) -> f64 {
        let (universe, state) = fixture();
        let tree = build_reward(spec, &universe, &reward_key("a")).unwrap();
        evaluate_reward(&tree, &state).unwrap()
    }

    #[test]
    fn test_maximize_and_minimize() {
        let x = state_key("a", "x");
        assert_eq!(reward_of(&maximize_feature(&x, "a")), 3.0);
        assert_eq!(reward_of(&minimize_feature(&x, "a")), -3.0);
    }

    #[test]
    fn test_achieve_goal() {
        let done = state_key("a", "done");
        assert_eq!(reward_of(&achieve_goal(&done, "a", false)), 1.0);
        assert_eq!(reward_of(&achieve_goal(&done, "a", true)), 0.0);
    }

    #[test]
    fn test_minimize_difference_is_symmetric() {
        let x = state_key("a", "x");
        let y = state_key("a", "y");
        assert_eq!(reward_of(&minimize_difference(&x, &y, "a")), -4.0);
        assert_eq!(reward_of(&minimize_difference(&y, &x, "a")), -4.0);
    }

    #[test]
    fn test_null_reward() {
        assert_eq!(reward_of(&null_reward("a")), 0.0);
    }
}
