// Symbolic Trees - Type Definitions
//
// Trees-as-data: JSON-describable conditional trees whose leaves are state
// transforms (dynamics, rewards), scalars (rewards) or booleans (legality).
// Everything here deserializes from JSON; `validation::build` turns a
// `TreeSpec` into a checked `SymbolicTree`.

use crate::models::key::{Key, Value};
use serde::{Deserialize, Serialize};

// ============================================================================
// TREE NODES
// ============================================================================

/// Unvalidated tree description
///
/// # Example
///
/// ```rust
/// use tom_simulator_core_rs::tree::TreeSpec;
///
/// let json = r#"{
///   "type": "condition",
///   "condition": {"op": "==", "left": {"key": "Agent 1's decision"}, "right": {"value": "none"}},
///   "on_true":  {"type": "scalar", "value": -10000.0},
///   "on_false": {"type": "scalar", "value": 0.0}
/// }"#;
/// let spec: TreeSpec = serde_json::from_str(json).unwrap();
/// assert!(spec.is_condition());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeSpec {
    /// Predicate branch
    Condition {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        description: String,

        condition: Predicate,

        /// Missing children are rejected by validation, not by serde
        #[serde(default)]
        on_true: Option<Box<TreeSpec>>,

        #[serde(default)]
        on_false: Option<Box<TreeSpec>>,
    },

    /// Terminal state transform
    Transform { transform: Transform },

    /// Terminal truth value (legality trees)
    Bool { value: bool },

    /// Terminal number (reward trees)
    Scalar { value: f64 },
}

// ============================================================================
// OPERANDS AND PREDICATES
// ============================================================================

/// Operand of a comparison: either a state key or a constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Key { key: Key },
    Constant { value: Value },
}

/// Boolean test on a state vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Predicate {
    /// Equal (numbers within epsilon, symbols exactly)
    #[serde(rename = "==")]
    Equal { left: Operand, right: Operand },

    #[serde(rename = "!=")]
    NotEqual { left: Operand, right: Operand },

    #[serde(rename = "<")]
    LessThan { left: Operand, right: Operand },

    #[serde(rename = "<=")]
    LessOrEqual { left: Operand, right: Operand },

    #[serde(rename = ">")]
    GreaterThan { left: Operand, right: Operand },

    #[serde(rename = ">=")]
    GreaterOrEqual { left: Operand, right: Operand },

    /// Short-circuit conjunction
    #[serde(rename = "and")]
    And { conditions: Vec<Predicate> },

    /// Short-circuit disjunction
    #[serde(rename = "or")]
    Or { conditions: Vec<Predicate> },

    #[serde(rename = "not")]
    Not { condition: Box<Predicate> },
}

// ============================================================================
// TRANSFORMS
// ============================================================================

/// One weighted key in a linear transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub key: Key,
    pub weight: f64,
}

fn unit_weight() -> f64 {
    1.0
}

/// New value for a single key
///
/// `key` is the key being written. All reads happen against the state the
/// tree is evaluated on, never against partially applied results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Transform {
    /// key := value
    SetConstant { key: Key, value: Value },

    /// key := weight × source (a symbolic source is copied when weight is 1)
    SetFromKey {
        key: Key,
        source: Key,
        #[serde(default = "unit_weight")]
        weight: f64,
    },

    /// key := key + delta
    Increment { key: Key, delta: f64 },

    /// key := constant + Σ weight × term
    Linear {
        key: Key,
        terms: Vec<Term>,
        #[serde(default)]
        constant: f64,
    },
}

impl Transform {
    /// Key written by this transform
    pub fn target(&self) -> &Key {
        match self {
            Transform::SetConstant { key, .. }
            | Transform::SetFromKey { key, .. }
            | Transform::Increment { key, .. }
            | Transform::Linear { key, .. } => key,
        }
    }
}

// ============================================================================
// HELPER METHODS
// ============================================================================

impl TreeSpec {
    /// Parse a tree description from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn is_condition(&self) -> bool {
        matches!(self, TreeSpec::Condition { .. })
    }

    pub fn is_leaf(&self) -> bool {
        !self.is_condition()
    }

    /// Branch node with both children present
    pub fn branch(condition: Predicate, on_true: TreeSpec, on_false: TreeSpec) -> Self {
        TreeSpec::Condition {
            description: String::new(),
            condition,
            on_true: Some(Box::new(on_true)),
            on_false: Some(Box::new(on_false)),
        }
    }

    pub fn transform(transform: Transform) -> Self {
        TreeSpec::Transform { transform }
    }

    pub fn scalar(value: f64) -> Self {
        TreeSpec::Scalar { value }
    }

    pub fn boolean(value: bool) -> Self {
        TreeSpec::Bool { value }
    }

    /// Leaf setting `key` to a constant
    pub fn set_constant(key: Key, value: impl Into<Value>) -> Self {
        TreeSpec::transform(Transform::SetConstant {
            key,
            value: value.into(),
        })
    }

    /// Leaf adding `delta` to `key`
    pub fn increment(key: Key, delta: f64) -> Self {
        TreeSpec::transform(Transform::Increment { key, delta })
    }

    /// Leaf copying `weight × source` into `key`
    pub fn set_from_key(key: Key, source: Key, weight: f64) -> Self {
        TreeSpec::transform(Transform::SetFromKey {
            key,
            source,
            weight,
        })
    }

    /// Leaf writing a linear combination of keys into `key`
    pub fn linear<I>(key: Key, terms: I, constant: f64) -> Self
    where
        I: IntoIterator<Item = (Key, f64)>,
    {
        TreeSpec::transform(Transform::Linear {
            key,
            terms: terms
                .into_iter()
                .map(|(key, weight)| Term { key, weight })
                .collect(),
            constant,
        })
    }

    /// Number of nodes on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        match self {
            TreeSpec::Condition {
                on_true, on_false, ..
            } => {
                let t = on_true.as_ref().map_or(0, |n| n.depth());
                let f = on_false.as_ref().map_or(0, |n| n.depth());
                1 + t.max(f)
            }
            _ => 1,
        }
    }
}

impl Operand {
    pub fn key(key: impl Into<Key>) -> Self {
        Operand::Key { key: key.into() }
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Operand::Constant {
            value: value.into(),
        }
    }
}

impl Predicate {
    /// `key == value`
    pub fn equals(key: Key, value: impl Into<Value>) -> Self {
        Predicate::Equal {
            left: Operand::Key { key },
            right: Operand::constant(value),
        }
    }

    /// `left > right` between two keys
    pub fn greater(left: Key, right: Key) -> Self {
        Predicate::GreaterThan {
            left: Operand::Key { key: left },
            right: Operand::Key { key: right },
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not {
            condition: Box::new(self),
        }
    }
}
