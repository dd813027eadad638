//! Agent model
//!
//! An agent owns:
//! - Its ordered list of actions (with optional legality trees)
//! - A registry of named decision models, always including the true model
//!   `"<name>0"`, created here and never reassigned
//! - Mental models: for each other agent it reasons about, a distribution
//!   over that agent's model names
//!
//! Agents never hold references to each other; everything is looked up by
//! name through the world.

use crate::models::action::{ActionDef, ActionDescriptor, ActionId};
use crate::models::distribution::Distribution;
use crate::models::model::{Attribute, Model, ResolvedModel};
use crate::models::state::StateVector;
use crate::tree::{evaluate_legality, EvalError, SymbolicTree};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors that can occur during agent operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AgentError {
    #[error("Agent '{agent}' already has action '{action}'")]
    DuplicateAction { agent: String, action: String },

    #[error("Agent '{agent}' already has model '{model}'")]
    DuplicateModel { agent: String, model: String },

    #[error("Agent '{agent}' has no model '{model}'")]
    UnknownModel { agent: String, model: String },

    #[error("Model '{model}' of agent '{agent}' names unknown parent '{parent}'")]
    UnknownParent {
        agent: String,
        model: String,
        parent: String,
    },

    #[error("Parent chain of model '{model}' of agent '{agent}' is cyclic")]
    ParentCycle { agent: String, model: String },

    #[error("Invalid attribute for model '{model}' of agent '{agent}': {reason}")]
    InvalidAttribute {
        agent: String,
        model: String,
        reason: String,
    },
}

/// A decision maker in the world
///
/// # Example
/// ```
/// use tom_simulator_core_rs::models::{ActionDescriptor, Agent, Attribute};
///
/// let mut agent = Agent::new("actor2");
/// agent.add_action(ActionDescriptor::new("move").with_object("left"), None).unwrap();
/// agent.add_model("actor2_random", None).unwrap();
/// agent.set_attribute(Attribute::Horizon(1), Some("actor2_random")).unwrap();
///
/// assert_eq!(agent.true_model(), "actor20");
/// assert_eq!(agent.resolve("actor2_random").unwrap().horizon, 1);
/// assert_eq!(agent.resolve("actor20").unwrap().horizon, 2);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    name: String,

    /// Declaration order is the tie-break order
    actions: Vec<ActionDef>,

    models: BTreeMap<String, Model>,

    true_model: String,

    /// Other agent name → belief over that agent's model names
    mental_models: BTreeMap<String, Distribution<String>>,
}

impl Agent {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let true_model = format!("{}0", name);

        let mut models = BTreeMap::new();
        models.insert(true_model.clone(), Model::true_model(true_model.clone()));

        Self {
            name,
            actions: Vec::new(),
            models,
            true_model,
            mental_models: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the true model
    pub fn true_model(&self) -> &str {
        &self.true_model
    }

    // ========================================================================
    // Actions
    // ========================================================================

    pub fn add_action(
        &mut self,
        descriptor: ActionDescriptor,
        legality: Option<SymbolicTree>,
    ) -> Result<ActionId, AgentError> {
        let id = ActionId::new(self.name.clone(), descriptor);
        if self.actions.iter().any(|a| a.id == id) {
            return Err(AgentError::DuplicateAction {
                agent: self.name.clone(),
                action: id.to_string(),
            });
        }
        self.actions.push(ActionDef {
            id: id.clone(),
            legality,
        });
        Ok(id)
    }

    pub fn actions(&self) -> &[ActionDef] {
        &self.actions
    }

    pub fn has_action(&self, id: &ActionId) -> bool {
        self.actions.iter().any(|a| &a.id == id)
    }

    /// Actions whose legality tree holds at `state`, in declaration order
    pub fn legal_actions(&self, state: &StateVector) -> Result<Vec<&ActionId>, EvalError> {
        let mut legal = Vec::with_capacity(self.actions.len());
        for action in &self.actions {
            let ok = match &action.legality {
                Some(tree) => evaluate_legality(tree, state)?,
                None => true,
            };
            if ok {
                legal.push(&action.id);
            }
        }
        Ok(legal)
    }

    // ========================================================================
    // Models
    // ========================================================================

    /// Register a model; the parent defaults to the true model
    pub fn add_model(&mut self, name: &str, parent: Option<&str>) -> Result<(), AgentError> {
        if self.models.contains_key(name) {
            return Err(AgentError::DuplicateModel {
                agent: self.name.clone(),
                model: name.to_string(),
            });
        }

        let parent = parent.unwrap_or(self.true_model.as_str()).to_string();
        if !self.models.contains_key(&parent) {
            return Err(AgentError::UnknownParent {
                agent: self.name.clone(),
                model: name.to_string(),
                parent,
            });
        }

        self.models
            .insert(name.to_string(), Model::child(name, parent));
        Ok(())
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn model(&self, name: &str) -> Result<&Model, AgentError> {
        self.models.get(name).ok_or_else(|| self.unknown_model(name))
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    fn model_mut(&mut self, name: Option<&str>) -> Result<&mut Model, AgentError> {
        let name = name.unwrap_or(self.true_model.as_str()).to_string();
        let err = self.unknown_model(&name);
        self.models.get_mut(&name).ok_or(err)
    }

    fn unknown_model(&self, name: &str) -> AgentError {
        AgentError::UnknownModel {
            agent: self.name.clone(),
            model: name.to_string(),
        }
    }

    /// Add a weighted reward tree to a model (true model when `None`)
    pub fn set_reward(
        &mut self,
        tree: SymbolicTree,
        weight: f64,
        model: Option<&str>,
    ) -> Result<(), AgentError> {
        if !weight.is_finite() {
            return Err(AgentError::InvalidAttribute {
                agent: self.name.clone(),
                model: model.unwrap_or(self.true_model.as_str()).to_string(),
                reason: format!("reward weight must be finite, got {}", weight),
            });
        }
        self.model_mut(model)?.add_reward(tree, weight);
        Ok(())
    }

    /// Override an attribute on a model (true model when `None`)
    pub fn set_attribute(
        &mut self,
        attribute: Attribute,
        model: Option<&str>,
    ) -> Result<(), AgentError> {
        if let Err(reason) = attribute.validate() {
            return Err(AgentError::InvalidAttribute {
                agent: self.name.clone(),
                model: model.unwrap_or(self.true_model.as_str()).to_string(),
                reason,
            });
        }
        self.model_mut(model)?.apply(attribute);
        Ok(())
    }

    /// Set the horizon on every model of this agent
    pub fn set_horizon(&mut self, horizon: u32) {
        for model in self.models.values_mut() {
            model.apply(Attribute::Horizon(horizon));
        }
    }

    /// Flatten a model's parent chain
    pub fn resolve(&self, name: &str) -> Result<ResolvedModel, AgentError> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = Some(name);

        while let Some(model_name) = current {
            if !seen.insert(model_name) {
                return Err(AgentError::ParentCycle {
                    agent: self.name.clone(),
                    model: name.to_string(),
                });
            }
            let model = self.model(model_name)?;
            chain.push(model);
            current = model.parent.as_deref();
        }

        Ok(ResolvedModel::from_chain(&chain))
    }

    // ========================================================================
    // Mental models
    // ========================================================================

    /// Replace the belief about `target`'s model
    pub fn set_mental_model(&mut self, target: &str, belief: Distribution<String>) {
        self.mental_models.insert(target.to_string(), belief);
    }

    pub fn mental_model(&self, target: &str) -> Option<&Distribution<String>> {
        self.mental_models.get(target)
    }

    /// Agents this agent holds beliefs about
    pub fn modelled_agents(&self) -> impl Iterator<Item = &str> {
        self.mental_models.keys().map(String::as_str)
    }
}
