//! Symbolic conditional trees
//!
//! Dynamics, rewards and legality are all expressed as trees: predicate
//! branches over state keys ending in a transform, scalar or boolean leaf.
//! Trees are plain data (JSON-describable via [`TreeSpec`]), checked once
//! against the world's declared keys by [`build`], then evaluated by a pure
//! interpreter.

pub mod interpreter;
pub mod reward;
pub mod types;
pub mod validation;

use thiserror::Error;

pub use interpreter::{
    apply_transform, evaluate, evaluate_legality, evaluate_predicate, evaluate_reward,
    evaluate_transform, EvalError, Outcome, TransformResult,
};
pub use reward::{
    achieve_feature_value, achieve_goal, maximize_feature, minimize_difference, minimize_feature,
    null_reward,
};
pub use types::{Operand, Predicate, Term, Transform, TreeSpec};
pub use validation::{
    build, build_dynamics, build_legality, build_reward, validate, MalformedTreeError,
    SymbolicTree, TreeRole, MAX_TREE_DEPTH,
};

/// Errors from building or evaluating trees
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TreeError {
    #[error("Malformed tree: {}", summarize(.0))]
    Malformed(Vec<MalformedTreeError>),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

fn summarize(errors: &[MalformedTreeError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
