//! Theory-of-Mind Simulator Core - Rust Engine
//!
//! Multiagent simulator in which agents plan by recursive expectimax over
//! symbolic world dynamics, predict each other through beliefs over other
//! agents' decision models, and revise those beliefs from observed actions.
//!
//! # Architecture
//!
//! - **models**: Domain types (keys, state, distributions, actions, agents,
//!   decision models, events)
//! - **tree**: Symbolic conditional trees for dynamics, rewards and legality
//! - **planner**: Expectimax search, action selection, belief revision
//! - **world**: State, turn order and the step loop
//! - **scenarios**: Ready-made worlds
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. Planning never mutates the world; only a committed step does
//! 2. All randomness is deterministic (seeded RNG)
//! 3. Every key a tree references is declared before the tree is accepted

// Module declarations
pub mod models;
pub mod planner;
pub mod rng;
pub mod scenarios;
pub mod tree;
pub mod world;

// Re-exports for convenience
pub use models::{
    agent::{Agent, AgentError},
    distribution::{Distribution, DistributionError},
    event::{Event, EventLog},
    key::{Domain, Key, Value},
    state::StateVector,
};
pub use planner::{BeliefUpdater, Decision, Planner, PlanningBudget, PlanningError, TieBreak};
pub use rng::RngManager;
pub use tree::{SymbolicTree, TreeError, TreeSpec};
pub use world::{CollapsePolicy, StepOptions, StepRecord, World, WorldConfig, WorldError};
