//! Actions
//!
//! An action is identified by its subject (the acting agent), a verb, an
//! optional object and any extra parameters. Legality is a boolean tree over
//! the state; dynamics live in the world's dynamics table, keyed by
//! [`ActionId`].

use crate::models::key::Value;
use crate::tree::SymbolicTree;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Caller-side description of an action, before it is bound to an agent
///
/// # Example
/// ```
/// use tom_simulator_core_rs::models::ActionDescriptor;
///
/// let left = ActionDescriptor::new("move").with_object("left");
/// assert_eq!(left.verb, "move");
/// assert_eq!(left.object.as_deref(), Some("left"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub verb: String,

    #[serde(default)]
    pub object: Option<String>,

    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl ActionDescriptor {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            object: None,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// Identity of an action bound to its subject
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId {
    pub subject: String,
    pub verb: String,
    pub object: Option<String>,
    pub parameters: BTreeMap<String, Value>,
}

impl ActionId {
    pub fn new(subject: impl Into<String>, descriptor: ActionDescriptor) -> Self {
        Self {
            subject: subject.into(),
            verb: descriptor.verb,
            object: descriptor.object,
            parameters: descriptor.parameters,
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.subject, self.verb)?;
        if let Some(object) = &self.object {
            write!(f, "-{}", object)?;
        }
        for (name, value) in &self.parameters {
            write!(f, "[{}={}]", name, value)?;
        }
        Ok(())
    }
}

/// An action registered on an agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionDef {
    pub id: ActionId,

    /// Absent means always legal
    pub legality: Option<SymbolicTree>,
}
