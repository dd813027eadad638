// Symbolic Trees - Construction and Validation
//
// Checks performed before a tree is accepted into a world:
// - Every referenced key is declared
// - Every branch has both children
// - Depth stays within MAX_TREE_DEPTH
// - Constants lie in the domain of the key they are compared with or written to
// - Comparisons and arithmetic only mix compatible domains
// - Leaves fit the tree's role (dynamics, reward, legality)
//
// All problems found are reported at once, not just the first.

use crate::models::key::{Domain, Key, Universe, Value};
use crate::tree::types::{Operand, Predicate, Transform, TreeSpec};
use crate::tree::TreeError;
use serde::Serialize;
use thiserror::Error;

/// Maximum allowed tree depth
pub const MAX_TREE_DEPTH: usize = 100;

/// A single validation problem
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MalformedTreeError {
    #[error("Unknown key '{key}' at {path}")]
    UnknownKey { key: Key, path: String },

    #[error("Branch at {path} is missing its {branch} child")]
    MissingBranch { path: String, branch: &'static str },

    #[error("Tree depth {actual} exceeds maximum {max}")]
    ExcessiveDepth { actual: usize, max: usize },

    #[error("Constant '{value}' is outside the domain of '{key}' at {path}")]
    InvalidConstant { key: Key, value: Value, path: String },

    #[error("Non-finite number {value} at {path}")]
    NonFinite { value: f64, path: String },

    #[error("Type mismatch on '{key}' at {path}: {reason}")]
    TypeMismatch {
        key: Key,
        path: String,
        reason: String,
    },

    #[error("Transform at {path} writes '{found}' but this tree must write '{expected}'")]
    WrongTarget {
        expected: Key,
        found: Key,
        path: String,
    },

    #[error("Leaf at {path} is a {found} leaf; {role} trees need {expected}")]
    UnexpectedLeaf {
        path: String,
        role: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// What a tree is used for; decides which leaves are acceptable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TreeRole<'a> {
    /// Any leaf kind
    Any,
    /// Transform leaves writing exactly this key
    Dynamics(&'a Key),
    /// Scalar leaves, or transform leaves writing this (reward) key
    Reward(&'a Key),
    /// Boolean or scalar leaves
    Legality,
}

impl TreeRole<'_> {
    fn name(&self) -> &'static str {
        match self {
            TreeRole::Any => "generic",
            TreeRole::Dynamics(_) => "dynamics",
            TreeRole::Reward(_) => "reward",
            TreeRole::Legality => "legality",
        }
    }
}

/// A validated tree, ready for evaluation
///
/// Only obtainable through [`build`] and its role-specific variants, so every
/// key it references is known to exist in the universe it was built against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolicTree {
    root: TreeSpec,
    depth: usize,
}

impl SymbolicTree {
    pub fn root(&self) -> &TreeSpec {
        &self.root
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Validate a tree description without building it
pub fn validate(
    spec: &TreeSpec,
    universe: &Universe,
    role: TreeRole<'_>,
) -> Result<(), Vec<MalformedTreeError>> {
    let mut validator = Validator {
        universe,
        role,
        errors: Vec::new(),
    };

    let depth = spec.depth();
    if depth > MAX_TREE_DEPTH {
        validator.errors.push(MalformedTreeError::ExcessiveDepth {
            actual: depth,
            max: MAX_TREE_DEPTH,
        });
    } else {
        validator.visit(spec, "root".to_string());
    }

    if validator.errors.is_empty() {
        Ok(())
    } else {
        Err(validator.errors)
    }
}

/// Build a tree usable in any role
///
/// # Example
///
/// ```rust
/// use tom_simulator_core_rs::models::{Domain, Key, Universe};
/// use tom_simulator_core_rs::tree::{build, TreeSpec};
///
/// let mut universe = Universe::new();
/// universe.insert(Key::from("loc"), Domain::range(-10.0, 10.0));
///
/// assert!(build(&TreeSpec::increment(Key::from("loc"), 1.0), &universe).is_ok());
/// assert!(build(&TreeSpec::increment(Key::from("nope"), 1.0), &universe).is_err());
/// ```
pub fn build(spec: &TreeSpec, universe: &Universe) -> Result<SymbolicTree, TreeError> {
    build_with_role(spec, universe, TreeRole::Any)
}

/// Build a dynamics tree for `target`
pub fn build_dynamics(
    spec: &TreeSpec,
    universe: &Universe,
    target: &Key,
) -> Result<SymbolicTree, TreeError> {
    build_with_role(spec, universe, TreeRole::Dynamics(target))
}

/// Build a reward tree writing `reward_key`
pub fn build_reward(
    spec: &TreeSpec,
    universe: &Universe,
    reward_key: &Key,
) -> Result<SymbolicTree, TreeError> {
    build_with_role(spec, universe, TreeRole::Reward(reward_key))
}

/// Build a legality tree
pub fn build_legality(spec: &TreeSpec, universe: &Universe) -> Result<SymbolicTree, TreeError> {
    build_with_role(spec, universe, TreeRole::Legality)
}

fn build_with_role(
    spec: &TreeSpec,
    universe: &Universe,
    role: TreeRole<'_>,
) -> Result<SymbolicTree, TreeError> {
    validate(spec, universe, role).map_err(TreeError::Malformed)?;
    Ok(SymbolicTree {
        root: spec.clone(),
        depth: spec.depth(),
    })
}

// ============================================================================
// VALIDATOR
// ============================================================================

/// Kind of value an operand produces
#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Numeric,
    Symbolic,
}

struct Validator<'a> {
    universe: &'a Universe,
    role: TreeRole<'a>,
    errors: Vec<MalformedTreeError>,
}

impl<'a> Validator<'a> {
    fn visit(&mut self, node: &TreeSpec, path: String) {
        match node {
            TreeSpec::Condition {
                condition,
                on_true,
                on_false,
                ..
            } => {
                self.check_predicate(condition, &path);

                match on_true {
                    Some(child) => self.visit(child, format!("{}.on_true", path)),
                    None => self.errors.push(MalformedTreeError::MissingBranch {
                        path: path.clone(),
                        branch: "on_true",
                    }),
                }
                match on_false {
                    Some(child) => self.visit(child, format!("{}.on_false", path)),
                    None => self.errors.push(MalformedTreeError::MissingBranch {
                        path,
                        branch: "on_false",
                    }),
                }
            }

            TreeSpec::Transform { transform } => {
                match self.role {
                    TreeRole::Dynamics(expected) | TreeRole::Reward(expected) => {
                        if transform.target() != expected {
                            self.errors.push(MalformedTreeError::WrongTarget {
                                expected: expected.clone(),
                                found: transform.target().clone(),
                                path: path.clone(),
                            });
                        }
                    }
                    TreeRole::Legality => self.unexpected_leaf(&path, "transform"),
                    TreeRole::Any => {}
                }
                self.check_transform(transform, &path);
            }

            TreeSpec::Bool { .. } => match self.role {
                TreeRole::Legality | TreeRole::Any => {}
                _ => self.unexpected_leaf(&path, "bool"),
            },

            TreeSpec::Scalar { value } => {
                if matches!(self.role, TreeRole::Dynamics(_)) {
                    self.unexpected_leaf(&path, "scalar");
                }
                self.check_finite(*value, &path);
            }
        }
    }

    fn unexpected_leaf(&mut self, path: &str, found: &'static str) {
        let expected = match self.role {
            TreeRole::Dynamics(_) => "transform leaves",
            TreeRole::Reward(_) => "scalar or transform leaves",
            TreeRole::Legality => "bool or scalar leaves",
            TreeRole::Any => "any leaf",
        };
        self.errors.push(MalformedTreeError::UnexpectedLeaf {
            path: path.to_string(),
            role: self.role.name(),
            expected,
            found,
        });
    }

    fn check_finite(&mut self, value: f64, path: &str) {
        if !value.is_finite() {
            self.errors.push(MalformedTreeError::NonFinite {
                value,
                path: path.to_string(),
            });
        }
    }

    fn domain(&mut self, key: &Key, path: &str) -> Option<&'a Domain> {
        let domain = self.universe.get(key);
        if domain.is_none() {
            self.errors.push(MalformedTreeError::UnknownKey {
                key: key.clone(),
                path: path.to_string(),
            });
        }
        domain
    }

    fn require_numeric(&mut self, key: &Key, path: &str, reason: &str) {
        if let Some(domain) = self.domain(key, path) {
            if !domain.is_numeric() {
                self.errors.push(MalformedTreeError::TypeMismatch {
                    key: key.clone(),
                    path: path.to_string(),
                    reason: reason.to_string(),
                });
            }
        }
    }

    // ------------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------------

    fn check_predicate(&mut self, predicate: &Predicate, path: &str) {
        match predicate {
            Predicate::Equal { left, right } | Predicate::NotEqual { left, right } => {
                self.check_comparison(left, right, path, false)
            }
            Predicate::LessThan { left, right }
            | Predicate::LessOrEqual { left, right }
            | Predicate::GreaterThan { left, right }
            | Predicate::GreaterOrEqual { left, right } => {
                self.check_comparison(left, right, path, true)
            }
            Predicate::And { conditions } | Predicate::Or { conditions } => {
                for condition in conditions {
                    self.check_predicate(condition, path);
                }
            }
            Predicate::Not { condition } => self.check_predicate(condition, path),
        }
    }

    fn operand_kind(&mut self, operand: &Operand, path: &str) -> Option<Kind> {
        match operand {
            Operand::Key { key } => self.domain(key, path).map(|d| {
                if d.is_numeric() {
                    Kind::Numeric
                } else {
                    Kind::Symbolic
                }
            }),
            Operand::Constant { value } => match value {
                Value::Number(n) => {
                    self.check_finite(*n, path);
                    Some(Kind::Numeric)
                }
                Value::Symbol(_) => Some(Kind::Symbolic),
            },
        }
    }

    fn check_comparison(&mut self, left: &Operand, right: &Operand, path: &str, ordered: bool) {
        let lk = self.operand_kind(left, path);
        let rk = self.operand_kind(right, path);
        let (Some(lk), Some(rk)) = (lk, rk) else {
            return;
        };

        let key = match (left, right) {
            (Operand::Key { key }, _) | (_, Operand::Key { key }) => key.clone(),
            _ => Key::from("<constant>"),
        };

        if lk != rk {
            self.errors.push(MalformedTreeError::TypeMismatch {
                key,
                path: path.to_string(),
                reason: "comparison mixes numeric and symbolic operands".to_string(),
            });
            return;
        }
        if ordered && lk == Kind::Symbolic {
            self.errors.push(MalformedTreeError::TypeMismatch {
                key,
                path: path.to_string(),
                reason: "ordering comparison on symbolic values".to_string(),
            });
            return;
        }

        // Symbol constants compared with an enumerated key must be in its domain
        for (a, b) in [(left, right), (right, left)] {
            if let (Operand::Key { key }, Operand::Constant { value }) = (a, b) {
                if let Some(domain) = self.universe.get(key) {
                    if !domain.is_numeric() && !domain.contains(value) {
                        self.errors.push(MalformedTreeError::InvalidConstant {
                            key: key.clone(),
                            value: value.clone(),
                            path: path.to_string(),
                        });
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------------

    fn check_transform(&mut self, transform: &Transform, path: &str) {
        match transform {
            Transform::SetConstant { key, value } => {
                let Some(domain) = self.domain(key, path) else {
                    return;
                };
                match (domain.is_numeric(), value) {
                    (true, Value::Number(n)) => self.check_finite(*n, path),
                    (false, Value::Symbol(_)) => {
                        if !domain.contains(value) {
                            self.errors.push(MalformedTreeError::InvalidConstant {
                                key: key.clone(),
                                value: value.clone(),
                                path: path.to_string(),
                            });
                        }
                    }
                    _ => self.errors.push(MalformedTreeError::TypeMismatch {
                        key: key.clone(),
                        path: path.to_string(),
                        reason: format!("constant '{}' does not match the key's domain", value),
                    }),
                }
            }

            Transform::SetFromKey {
                key,
                source,
                weight,
            } => {
                self.check_finite(*weight, path);
                let target = self.domain(key, path);
                let from = self.domain(source, path);
                if let (Some(target), Some(from)) = (target, from) {
                    let symbolic_copy = !target.is_numeric() && !from.is_numeric();
                    if target.is_numeric() != from.is_numeric()
                        || (symbolic_copy && *weight != 1.0)
                    {
                        self.errors.push(MalformedTreeError::TypeMismatch {
                            key: key.clone(),
                            path: path.to_string(),
                            reason: format!("cannot write {} × '{}'", weight, source),
                        });
                    }
                }
            }

            Transform::Increment { key, delta } => {
                self.check_finite(*delta, path);
                self.require_numeric(key, path, "increment needs a numeric key");
            }

            Transform::Linear {
                key,
                terms,
                constant,
            } => {
                self.check_finite(*constant, path);
                self.require_numeric(key, path, "linear transform needs a numeric key");
                for term in terms {
                    self.check_finite(term.weight, path);
                    self.require_numeric(&term.key, path, "linear term needs a numeric key");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn universe() -> Universe {
        let mut u = Universe::new();
        u.insert(
            Key::from("me"),
            Domain::enumerated(["none", "defected", "cooperated"]),
        );
        u.insert(Key::from("loc"), Domain::range(-1000.0, 1000.0));
        u.insert(Key::from("me's __REWARD__"), Domain::numeric());
        u
    }

    #[test]
    fn test_valid_reward_tree() {
        let spec: TreeSpec = serde_json::from_value(json!({
            "type": "condition",
            "condition": {"op": "==", "left": {"key": "me"}, "right": {"value": "cooperated"}},
            "on_true": {"type": "scalar", "value": -1.0},
            "on_false": {"type": "transform",
                         "transform": {"op": "set_from_key", "key": "me's __REWARD__", "source": "loc"}}
        }))
        .unwrap();

        let reward = Key::from("me's __REWARD__");
        let tree = build_reward(&spec, &universe(), &reward).unwrap();
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_unknown_key_reports_path() {
        let spec = TreeSpec::branch(
            Predicate::equals(Key::from("me"), "none"),
            TreeSpec::scalar(0.0),
            TreeSpec::increment(Key::from("ghost"), 1.0),
        );

        let errors = validate(&spec, &universe(), TreeRole::Any).unwrap_err();
        assert_eq!(
            errors,
            vec![MalformedTreeError::UnknownKey {
                key: Key::from("ghost"),
                path: "root.on_false".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_branch() {
        let spec = TreeSpec::Condition {
            description: String::new(),
            condition: Predicate::equals(Key::from("me"), "none"),
            on_true: Some(Box::new(TreeSpec::boolean(true))),
            on_false: None,
        };

        let errors = validate(&spec, &universe(), TreeRole::Legality).unwrap_err();
        assert!(matches!(
            errors[0],
            MalformedTreeError::MissingBranch { branch: "on_false", .. }
        ));
    }

    #[test]
    fn test_symbol_outside_domain() {
        let spec = TreeSpec::set_constant(Key::from("me"), "maybe");
        let errors = validate(&spec, &universe(), TreeRole::Any).unwrap_err();
        assert!(matches!(errors[0], MalformedTreeError::InvalidConstant { .. }));

        let cmp = TreeSpec::branch(
            Predicate::equals(Key::from("me"), "maybe"),
            TreeSpec::boolean(true),
            TreeSpec::boolean(false),
        );
        assert!(validate(&cmp, &universe(), TreeRole::Legality).is_err());
    }

    #[test]
    fn test_ordering_on_symbols_rejected() {
        let spec = TreeSpec::branch(
            Predicate::LessThan {
                left: Operand::key("me"),
                right: Operand::constant("none"),
            },
            TreeSpec::boolean(true),
            TreeSpec::boolean(false),
        );
        let errors = validate(&spec, &universe(), TreeRole::Legality).unwrap_err();
        assert!(matches!(errors[0], MalformedTreeError::TypeMismatch { .. }));
    }

    #[test]
    fn test_dynamics_wrong_target() {
        let spec = TreeSpec::increment(Key::from("loc"), 1.0);
        let err = build_dynamics(&spec, &universe(), &Key::from("me")).unwrap_err();
        match err {
            TreeError::Malformed(errors) => {
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, MalformedTreeError::WrongTarget { .. })));
                assert_eq!(errors.len(), 1);
            }
            other => panic!("Expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_dynamics_rejects_scalar_leaf() {
        let err = validate(&TreeSpec::scalar(1.0), &universe(), TreeRole::Dynamics(&Key::from("loc")))
            .unwrap_err();
        assert!(matches!(err[0], MalformedTreeError::UnexpectedLeaf { .. }));
    }

    #[test]
    fn test_excessive_depth() {
        let mut spec = TreeSpec::boolean(true);
        for _ in 0..MAX_TREE_DEPTH {
            spec = TreeSpec::branch(
                Predicate::equals(Key::from("loc"), 0.0),
                spec,
                TreeSpec::boolean(false),
            );
        }
        let errors = validate(&spec, &universe(), TreeRole::Legality).unwrap_err();
        assert_eq!(
            errors,
            vec![MalformedTreeError::ExcessiveDepth {
                actual: MAX_TREE_DEPTH + 1,
                max: MAX_TREE_DEPTH
            }]
        );
    }

    #[test]
    fn test_collects_all_errors() {
        let spec = TreeSpec::branch(
            Predicate::equals(Key::from("a"), 1.0),
            TreeSpec::increment(Key::from("b"), 1.0),
            TreeSpec::scalar(f64::NAN),
        );
        let errors = validate(&spec, &universe(), TreeRole::Any).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
