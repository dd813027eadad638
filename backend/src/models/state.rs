//! State Vector
//!
//! The single source of truth for "what is currently true" in a world: an
//! ordered mapping from [`Key`] to [`Value`].
//!
//! # Critical Invariants
//!
//! 1. **Declared keys only**: the world inserts a key when it is declared and
//!    never removes it, so every key a registered tree references is present
//!    before any evaluation.
//! 2. **Projection, not mutation**: planning works on clones. Only the world's
//!    batched commit replaces the live vector.
//! 3. **Deterministic order**: entries iterate in key order, which makes state
//!    vectors usable as memo keys and keeps logs reproducible.

use crate::models::key::{Key, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Errors raised when reading features from a state vector
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Unknown key '{0}' in state vector")]
    UnknownKey(Key),

    #[error("Feature '{key}' holds non-numeric value '{value}'")]
    NonNumeric { key: Key, value: Value },
}

/// Assignment of values to all declared keys
///
/// # Example
///
/// ```rust
/// use tom_simulator_core_rs::models::{Key, StateVector, Value};
///
/// let mut state = StateVector::new();
/// state.insert(Key::from("actor1's location"), Value::Number(0.0));
///
/// assert_eq!(state.number(&Key::from("actor1's location")).unwrap(), 0.0);
/// assert!(state.get(&Key::from("missing")).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateVector {
    values: BTreeMap<Key, Value>,
}

impl StateVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a feature value
    pub fn insert(&mut self, key: Key, value: Value) {
        self.values.insert(key, value);
    }

    /// Look up a feature value
    pub fn get(&self, key: &Key) -> Result<&Value, StateError> {
        self.values
            .get(key)
            .ok_or_else(|| StateError::UnknownKey(key.clone()))
    }

    /// Look up a numeric feature value
    pub fn number(&self, key: &Key) -> Result<f64, StateError> {
        let value = self.get(key)?;
        value.as_number().ok_or_else(|| StateError::NonNumeric {
            key: key.clone(),
            value: value.clone(),
        })
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.values.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.values.iter()
    }

    /// Keys whose values differ between `self` and `other`
    ///
    /// Keys present in only one of the two vectors count as changed.
    pub fn diff(&self, other: &StateVector) -> Vec<(Key, Value)> {
        other
            .values
            .iter()
            .filter(|(k, v)| self.values.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl fmt::Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

impl FromIterator<(Key, Value)> for StateVector {
    fn from_iter<I: IntoIterator<Item = (Key, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
