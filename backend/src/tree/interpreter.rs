// Symbolic Trees - Interpreter
//
// Pure evaluation of validated trees against a state vector: one
// root-to-leaf pass, no side effects. Typed accessors convert the reached
// leaf into what each caller needs (a transform result for dynamics, a
// number for rewards, a truth value for legality).

use crate::models::key::{Key, Value};
use crate::models::state::{StateError, StateVector};
use crate::tree::types::{Operand, Predicate, Transform, TreeSpec};
use crate::tree::validation::{SymbolicTree, MAX_TREE_DEPTH};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during tree evaluation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("Cannot compare '{left}' with '{right}'")]
    TypeMismatch { left: Value, right: Value },

    #[error("Cannot scale symbolic value '{value}' of '{key}' by {weight}")]
    SymbolicArithmetic { key: Key, value: Value, weight: f64 },

    #[error("Expected a {expected} leaf, reached a {found} leaf")]
    UnexpectedLeaf {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Value '{value}' is outside the domain of '{key}'")]
    OutOfDomain { key: Key, value: Value },

    #[error("Branch without child reached during traversal")]
    MissingBranch,

    #[error("Tree traversal exceeded maximum depth ({0})")]
    MaxDepthExceeded(usize),
}

/// Tolerance for numeric equality
const FLOAT_EPSILON: f64 = 1e-9;

/// New value computed for a key by a transform leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformResult {
    pub key: Key,
    pub value: Value,
}

/// Result of evaluating a tree
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Transform(TransformResult),
    Scalar(f64),
    Bool(bool),
}

impl Outcome {
    fn kind(&self) -> &'static str {
        match self {
            Outcome::Transform(_) => "transform",
            Outcome::Scalar(_) => "scalar",
            Outcome::Bool(_) => "bool",
        }
    }
}

// ============================================================================
// OPERANDS AND PREDICATES
// ============================================================================

fn resolve<'a>(operand: &'a Operand, state: &'a StateVector) -> Result<&'a Value, EvalError> {
    match operand {
        Operand::Key { key } => Ok(state.get(key)?),
        Operand::Constant { value } => Ok(value),
    }
}

fn equal(left: &Value, right: &Value) -> Result<bool, EvalError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((a - b).abs() < FLOAT_EPSILON),
        (Value::Symbol(a), Value::Symbol(b)) => Ok(a == b),
        _ => Err(EvalError::TypeMismatch {
            left: left.clone(),
            right: right.clone(),
        }),
    }
}

fn numbers(left: &Value, right: &Value) -> Result<(f64, f64), EvalError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(EvalError::TypeMismatch {
            left: left.clone(),
            right: right.clone(),
        }),
    }
}

/// Evaluate a predicate against a state
///
/// # Example
///
/// ```rust
/// use tom_simulator_core_rs::models::{Key, StateVector, Value};
/// use tom_simulator_core_rs::tree::{evaluate_predicate, Predicate};
///
/// let mut state = StateVector::new();
/// state.insert(Key::from("dec"), Value::from("cooperated"));
///
/// let p = Predicate::equals(Key::from("dec"), "cooperated");
/// assert!(evaluate_predicate(&p, &state).unwrap());
/// assert!(!evaluate_predicate(&p.negate(), &state).unwrap());
/// ```
pub fn evaluate_predicate(predicate: &Predicate, state: &StateVector) -> Result<bool, EvalError> {
    match predicate {
        Predicate::Equal { left, right } => equal(resolve(left, state)?, resolve(right, state)?),

        Predicate::NotEqual { left, right } => {
            Ok(!equal(resolve(left, state)?, resolve(right, state)?)?)
        }

        Predicate::LessThan { left, right } => {
            let (a, b) = numbers(resolve(left, state)?, resolve(right, state)?)?;
            Ok(a < b)
        }

        Predicate::LessOrEqual { left, right } => {
            let (a, b) = numbers(resolve(left, state)?, resolve(right, state)?)?;
            Ok(a <= b || (a - b).abs() < FLOAT_EPSILON)
        }

        Predicate::GreaterThan { left, right } => {
            let (a, b) = numbers(resolve(left, state)?, resolve(right, state)?)?;
            Ok(a > b)
        }

        Predicate::GreaterOrEqual { left, right } => {
            let (a, b) = numbers(resolve(left, state)?, resolve(right, state)?)?;
            Ok(a >= b || (a - b).abs() < FLOAT_EPSILON)
        }

        Predicate::And { conditions } => {
            for condition in conditions {
                if !evaluate_predicate(condition, state)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }

        Predicate::Or { conditions } => {
            for condition in conditions {
                if evaluate_predicate(condition, state)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }

        Predicate::Not { condition } => Ok(!evaluate_predicate(condition, state)?),
    }
}

// ============================================================================
// TRANSFORMS
// ============================================================================

/// Compute the value a transform writes, reading only from `state`
pub fn apply_transform(
    transform: &Transform,
    state: &StateVector,
) -> Result<TransformResult, EvalError> {
    let value = match transform {
        Transform::SetConstant { value, .. } => value.clone(),

        Transform::SetFromKey { source, weight, .. } => match state.get(source)? {
            Value::Number(n) => Value::Number(n * weight),
            symbol @ Value::Symbol(_) if *weight == 1.0 => symbol.clone(),
            symbol => {
                return Err(EvalError::SymbolicArithmetic {
                    key: source.clone(),
                    value: symbol.clone(),
                    weight: *weight,
                })
            }
        },

        Transform::Increment { key, delta } => Value::Number(state.number(key)? + delta),

        Transform::Linear {
            terms, constant, ..
        } => {
            let mut total = *constant;
            for term in terms {
                total += term.weight * state.number(&term.key)?;
            }
            Value::Number(total)
        }
    };

    Ok(TransformResult {
        key: transform.target().clone(),
        value,
    })
}

// ============================================================================
// TREE TRAVERSAL
// ============================================================================

/// Evaluate a tree against a state
pub fn evaluate(tree: &SymbolicTree, state: &StateVector) -> Result<Outcome, EvalError> {
    evaluate_node(tree.root(), state, 0)
}

fn evaluate_node(node: &TreeSpec, state: &StateVector, depth: usize) -> Result<Outcome, EvalError> {
    if depth > MAX_TREE_DEPTH {
        return Err(EvalError::MaxDepthExceeded(MAX_TREE_DEPTH));
    }

    match node {
        TreeSpec::Condition {
            condition,
            on_true,
            on_false,
            ..
        } => {
            let next = if evaluate_predicate(condition, state)? {
                on_true
            } else {
                on_false
            };
            let next = next.as_deref().ok_or(EvalError::MissingBranch)?;
            evaluate_node(next, state, depth + 1)
        }

        TreeSpec::Transform { transform } => {
            Ok(Outcome::Transform(apply_transform(transform, state)?))
        }

        TreeSpec::Bool { value } => Ok(Outcome::Bool(*value)),

        TreeSpec::Scalar { value } => Ok(Outcome::Scalar(*value)),
    }
}

/// Evaluate a dynamics tree
pub fn evaluate_transform(
    tree: &SymbolicTree,
    state: &StateVector,
) -> Result<TransformResult, EvalError> {
    match evaluate(tree, state)? {
        Outcome::Transform(result) => Ok(result),
        other => Err(EvalError::UnexpectedLeaf {
            expected: "transform",
            found: other.kind(),
        }),
    }
}

/// Evaluate a reward tree; a transform leaf contributes the value it computes
pub fn evaluate_reward(tree: &SymbolicTree, state: &StateVector) -> Result<f64, EvalError> {
    match evaluate(tree, state)? {
        Outcome::Scalar(value) => Ok(value),
        Outcome::Transform(result) => match result.value {
            Value::Number(n) => Ok(n),
            value => Err(StateError::NonNumeric {
                key: result.key,
                value,
            }
            .into()),
        },
        Outcome::Bool(_) => Err(EvalError::UnexpectedLeaf {
            expected: "scalar",
            found: "bool",
        }),
    }
}

/// Evaluate a legality tree; a scalar leaf is legal iff non-zero
pub fn evaluate_legality(tree: &SymbolicTree, state: &StateVector) -> Result<bool, EvalError> {
    match evaluate(tree, state)? {
        Outcome::Bool(value) => Ok(value),
        Outcome::Scalar(value) => Ok(value != 0.0),
        Outcome::Transform(_) => Err(EvalError::UnexpectedLeaf {
            expected: "bool",
            found: "transform",
        }),
    }
}
