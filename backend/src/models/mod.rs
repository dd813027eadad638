//! Domain models for the simulator

pub mod action;
pub mod agent;
pub mod distribution;
pub mod event;
pub mod key;
pub mod model;
pub mod state;

// Re-exports
pub use action::{ActionDef, ActionDescriptor, ActionId};
pub use agent::{Agent, AgentError};
pub use distribution::{Distribution, DistributionError};
pub use event::{Event, EventLog};
pub use key::{model_key, reward_key, state_key, Domain, Key, Universe, Value, MODEL, REWARD};
pub use model::{Attribute, Model, ResolvedModel, RewardComponent, Selection};
pub use state::{StateError, StateVector};
