//! Ready-made worlds
//!
//! - [`prisoners_dilemma`]: horizon-dependent cooperation between two agents
//!   reasoning about each other
//! - [`model_inference`]: one agent learning which reward model explains
//!   another agent's moves

pub mod model_inference;
pub mod prisoners_dilemma;
