//! Decision making
//!
//! - [`search`]: recursive expectimax over joint rounds of play
//! - [`selection`]: turning action values into a policy
//! - [`belief`]: Bayesian revision of mental models from observed actions

pub mod belief;
pub mod search;
pub mod selection;

pub use belief::BeliefUpdater;
pub use search::{Choice, Decision, Planner, PlanningBudget, PlanningError};
pub use selection::{is_tied, maximizers, select_policy, TieBreak, TIE_TOLERANCE};
