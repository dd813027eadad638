//! Decision models
//!
//! A [`Model`] is a named decision policy for one agent. Every agent owns a
//! fully specified true model (`"<agent>0"`); additional models name a parent
//! and override only the attributes they set explicitly. [`ResolvedModel`]
//! is the flattened view the planner works with.

use crate::models::state::StateVector;
use crate::tree::{evaluate_reward, EvalError, SymbolicTree};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_HORIZON: u32 = 2;
pub const DEFAULT_RATIONALITY: f64 = 1.0;
pub const DEFAULT_DISCOUNT: f64 = 1.0;

/// How a decision turns action values into a choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// Highest value; ties broken by the world's tie-break setting
    Best,
    /// Uniformly random among the highest-valued actions
    Random,
    /// Softmax over values, scaled by rationality
    Distribution,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Selection::Best => "best",
            Selection::Random => "random",
            Selection::Distribution => "distribution",
        };
        f.write_str(s)
    }
}

/// One weighted term of a model's reward
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardComponent {
    pub tree: SymbolicTree,
    pub weight: f64,
}

/// Attribute override for a model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "attribute", content = "value", rename_all = "snake_case")]
pub enum Attribute {
    Horizon(u32),
    Rationality(f64),
    Discount(f64),
    Selection(Selection),
    Beliefs(bool),
}

impl Attribute {
    /// Check the value is admissible
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Attribute::Rationality(r) if !(r.is_finite() && *r > 0.0) => {
                Err(format!("rationality must be finite and > 0, got {}", r))
            }
            Attribute::Discount(d) if !(d.is_finite() && *d >= 0.0) => {
                Err(format!("discount must be finite and >= 0, got {}", d))
            }
            _ => Ok(()),
        }
    }
}

/// A named decision policy
///
/// `None` fields are inherited from the parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    pub name: String,
    pub parent: Option<String>,
    pub reward: Option<Vec<RewardComponent>>,
    pub horizon: Option<u32>,
    pub rationality: Option<f64>,
    pub discount: Option<f64>,
    pub selection: Option<Selection>,
    pub beliefs: Option<bool>,
}

impl Model {
    /// Fully specified root model with default attributes and zero reward
    pub fn true_model(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            reward: Some(Vec::new()),
            horizon: Some(DEFAULT_HORIZON),
            rationality: Some(DEFAULT_RATIONALITY),
            discount: Some(DEFAULT_DISCOUNT),
            selection: Some(Selection::Best),
            beliefs: Some(true),
        }
    }

    /// Model that inherits everything from `parent`
    pub fn child(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
            reward: None,
            horizon: None,
            rationality: None,
            discount: None,
            selection: None,
            beliefs: None,
        }
    }

    pub fn apply(&mut self, attribute: Attribute) {
        match attribute {
            Attribute::Horizon(h) => self.horizon = Some(h),
            Attribute::Rationality(r) => self.rationality = Some(r),
            Attribute::Discount(d) => self.discount = Some(d),
            Attribute::Selection(s) => self.selection = Some(s),
            Attribute::Beliefs(b) => self.beliefs = Some(b),
        }
    }

    /// Add a reward term
    ///
    /// A model that was inheriting its reward starts a fresh reward of its
    /// own; the parent's terms are not copied.
    pub fn add_reward(&mut self, tree: SymbolicTree, weight: f64) {
        self.reward
            .get_or_insert_with(Vec::new)
            .push(RewardComponent { tree, weight });
    }
}

/// Model with every attribute filled in from the parent chain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedModel {
    pub name: String,
    pub reward: Vec<RewardComponent>,
    pub horizon: u32,
    pub rationality: f64,
    pub discount: f64,
    pub selection: Selection,
    pub beliefs: bool,
}

impl ResolvedModel {
    /// Resolve `chain`, ordered from the model itself up to its root
    pub(crate) fn from_chain(chain: &[&Model]) -> Self {
        fn pick<T>(chain: &[&Model], f: impl Fn(&Model) -> Option<T>, default: T) -> T {
            chain.iter().find_map(|m| f(m)).unwrap_or(default)
        }

        Self {
            name: chain.first().map(|m| m.name.clone()).unwrap_or_default(),
            reward: pick(chain, |m| m.reward.clone(), Vec::new()),
            horizon: pick(chain, |m| m.horizon, DEFAULT_HORIZON),
            rationality: pick(chain, |m| m.rationality, DEFAULT_RATIONALITY),
            discount: pick(chain, |m| m.discount, DEFAULT_DISCOUNT),
            selection: pick(chain, |m| m.selection, Selection::Best),
            beliefs: pick(chain, |m| m.beliefs, true),
        }
    }

    /// Σ weight × reward tree at `state` (0 for an empty reward)
    pub fn reward(&self, state: &StateVector) -> Result<f64, EvalError> {
        let mut total = 0.0;
        for component in &self.reward {
            total += component.weight * evaluate_reward(&component.tree, state)?;
        }
        Ok(total)
    }
}
