//! World - state, agents, turn order and the step loop
//!
//! See `engine.rs` for the step protocol.

pub mod config;
pub mod dynamics;
pub mod engine;

pub use config::{CollapsePolicy, StepOptions, WorldConfig, DEFAULT_SEED};
pub use dynamics::DynamicsTable;
pub use engine::{
    BeliefRevision, DecisionStatus, StepEntry, StepRecord, World, WorldError,
};
