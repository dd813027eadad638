//! Action effects
//!
//! Each action maps the keys it affects to a dynamics tree computing the
//! key's next value. Written values are brought back into the key's domain:
//! numbers are clamped, symbols outside an enumerated domain are rejected.

use crate::models::{ActionId, Domain, Key, StateVector, Universe, Value};
use crate::tree::{evaluate_transform, EvalError, SymbolicTree};
use std::collections::BTreeMap;

/// Dynamics trees indexed by action, then by affected key
#[derive(Debug, Clone, Default)]
pub struct DynamicsTable {
    trees: BTreeMap<ActionId, BTreeMap<Key, SymbolicTree>>,
}

impl DynamicsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the tree computing `key` after `action`
    pub fn insert(&mut self, action: ActionId, key: Key, tree: SymbolicTree) {
        self.trees.entry(action).or_default().insert(key, tree);
    }

    /// Values `action` writes, all computed against `state`
    pub fn effects(
        &self,
        action: &ActionId,
        state: &StateVector,
        universe: &Universe,
    ) -> Result<Vec<(Key, Value)>, EvalError> {
        let Some(keys) = self.trees.get(action) else {
            return Ok(Vec::new());
        };

        let mut effects = Vec::with_capacity(keys.len());
        for (key, tree) in keys {
            let result = evaluate_transform(tree, state)?;
            let value = fit_domain(key, result.value, universe.get(key))?;
            effects.push((key.clone(), value));
        }
        Ok(effects)
    }

    /// State after a single action
    pub fn apply(
        &self,
        state: &StateVector,
        action: &ActionId,
        universe: &Universe,
    ) -> Result<StateVector, EvalError> {
        let mut next = state.clone();
        for (key, value) in self.effects(action, state, universe)? {
            next.insert(key, value);
        }
        Ok(next)
    }

    /// State after a group of actions
    ///
    /// Actions are applied in lexical order of their subject; each one reads
    /// the state left by the ones before it. Nothing is written to `state`.
    pub fn apply_joint(
        &self,
        state: &StateVector,
        actions: &[ActionId],
        universe: &Universe,
    ) -> Result<StateVector, EvalError> {
        let mut ordered: Vec<&ActionId> = actions.iter().collect();
        ordered.sort_by(|a, b| a.subject.cmp(&b.subject));

        let mut next = state.clone();
        for action in ordered {
            next = self.apply(&next, action, universe)?;
        }
        Ok(next)
    }
}

fn fit_domain(key: &Key, value: Value, domain: Option<&Domain>) -> Result<Value, EvalError> {
    let Some(domain) = domain else {
        return Ok(value);
    };

    match (&value, domain.is_numeric()) {
        (Value::Number(n), true) if n.is_finite() => Ok(Value::Number(domain.clamp(*n))),
        (Value::Symbol(_), false) if domain.contains(&value) => Ok(value),
        _ => Err(EvalError::OutOfDomain {
            key: key.clone(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionDescriptor;
    use crate::tree::{build_dynamics, TreeSpec};

    fn loc() -> Key {
        Key::from("loc")
    }

    fn fixture() -> (Universe, StateVector, DynamicsTable, ActionId, ActionId) {
        let mut universe = Universe::new();
        universe.insert(loc(), Domain::range(-2.0, 2.0));
        universe.insert(Key::from("mode"), Domain::enumerated(["idle", "busy"]));

        let mut state = StateVector::new();
        state.insert(loc(), Value::from(0.0));
        state.insert(Key::from("mode"), Value::from("idle"));

        let left = ActionId::new("b", ActionDescriptor::new("move").with_object("left"));
        let double = ActionId::new("a", ActionDescriptor::new("double"));

        let mut table = DynamicsTable::new();
        table.insert(
            left.clone(),
            loc(),
            build_dynamics(&TreeSpec::increment(loc(), -1.0), &universe, &loc()).unwrap(),
        );
        table.insert(
            double.clone(),
            loc(),
            build_dynamics(&TreeSpec::set_from_key(loc(), loc(), 2.0), &universe, &loc()).unwrap(),
        );
        (universe, state, table, left, double)
    }

    #[test]
    fn test_apply_does_not_touch_input() {
        let (universe, state, table, left, _) = fixture();
        let next = table.apply(&state, &left, &universe).unwrap();
        assert_eq!(next.number(&loc()).unwrap(), -1.0);
        assert_eq!(state.number(&loc()).unwrap(), 0.0);
    }

    #[test]
    fn test_joint_application_is_lexical() {
        let (universe, state, table, left, double) = fixture();
        // "a" doubles 0 first, then "b" moves left
        let next = table
            .apply_joint(&state, &[left.clone(), double.clone()], &universe)
            .unwrap();
        assert_eq!(next.number(&loc()).unwrap(), -1.0);

        let mut start = state.clone();
        start.insert(loc(), Value::from(1.0));
        let next = table.apply_joint(&start, &[left, double], &universe).unwrap();
        assert_eq!(next.number(&loc()).unwrap(), 1.0);
    }

    #[test]
    fn test_numbers_are_clamped() {
        let (universe, mut state, table, _, double) = fixture();
        state.insert(loc(), Value::from(1.5));
        let next = table.apply(&state, &double, &universe).unwrap();
        assert_eq!(next.number(&loc()).unwrap(), 2.0);
    }

    #[test]
    fn test_symbol_outside_domain_rejected() {
        let (universe, state, mut table, _, double) = fixture();
        let mode = Key::from("mode");
        let mut loose = universe.clone();
        loose.insert(mode.clone(), Domain::enumerated(["idle", "busy", "gone"]));
        table.insert(
            double.clone(),
            mode.clone(),
            build_dynamics(&TreeSpec::set_constant(mode.clone(), "gone"), &loose, &mode).unwrap(),
        );

        let err = table.apply(&state, &double, &universe).unwrap_err();
        assert!(matches!(err, EvalError::OutOfDomain { .. }));
    }

    #[test]
    fn test_action_without_dynamics_is_noop() {
        let (universe, state, table, _, _) = fixture();
        let wait = ActionId::new("a", ActionDescriptor::new("wait"));
        assert_eq!(table.apply(&state, &wait, &universe).unwrap(), state);
    }
}
