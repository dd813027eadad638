//! World configuration
//!
//! Everything a run depends on besides the scenario itself: the RNG seed,
//! how ties and collapsed beliefs are handled, and the planning limits.
//! Loadable from TOML or JSON through serde; every field has a default.

use crate::planner::{PlanningBudget, TieBreak};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SEED: u64 = 12345;

/// What to do when an observed action has zero likelihood under every model
/// an observer considers possible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapsePolicy {
    /// Keep the prior and flag the update as collapsed
    #[default]
    RetainPrior,
    /// Spread the belief uniformly over the prior's models
    ResetUniform,
    /// Fail the step once the group's effects are committed
    Error,
}

/// Complete world configuration
///
/// # Example
///
/// ```rust
/// use tom_simulator_core_rs::world::{CollapsePolicy, WorldConfig};
///
/// let config: WorldConfig = serde_json::from_str(
///     r#"{"rng_seed": 17, "belief_collapse": "reset_uniform", "budget": {"max_nodes": 5000}}"#,
/// ).unwrap();
///
/// assert_eq!(config.rng_seed, 17);
/// assert_eq!(config.belief_collapse, CollapsePolicy::ResetUniform);
/// assert_eq!(config.budget.max_nodes, Some(5000));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Seed for every random choice made during steps
    pub rng_seed: u64,

    /// Tie-break among equally valued actions under `best` selection
    pub tiebreak: TieBreak,

    pub belief_collapse: CollapsePolicy,

    /// Default planning limits for each step
    pub budget: PlanningBudget,

    /// Extra cap on theory-of-mind nesting (the horizon is always a cap)
    pub max_recursion: Option<u32>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            rng_seed: DEFAULT_SEED,
            tiebreak: TieBreak::default(),
            belief_collapse: CollapsePolicy::default(),
            budget: PlanningBudget::default(),
            max_recursion: None,
        }
    }
}

impl WorldConfig {
    pub fn with_seed(rng_seed: u64) -> Self {
        Self {
            rng_seed,
            ..Self::default()
        }
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), String> {
        if self.budget.max_nodes == Some(0) {
            return Err("budget.max_nodes must be positive".to_string());
        }
        if self.budget.time_limit_ms == Some(0) {
            return Err("budget.time_limit_ms must be positive".to_string());
        }
        Ok(())
    }

    /// Theory-of-mind budget for a top-level decision at `horizon`
    pub fn recursion_budget(&self, horizon: u32) -> u32 {
        self.max_recursion.map_or(horizon, |cap| horizon.min(cap))
    }
}

/// Per-step overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepOptions {
    /// Horizon used by every acting agent instead of its true model's
    pub horizon: Option<u32>,

    /// Planning limits instead of the configured ones
    pub budget: Option<PlanningBudget>,

    /// Revise observers' beliefs from the realized actions
    pub update_beliefs: bool,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            horizon: None,
            budget: None,
            update_beliefs: true,
        }
    }
}

impl StepOptions {
    pub fn with_horizon(horizon: u32) -> Self {
        Self {
            horizon: Some(horizon),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WorldConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tiebreak, TieBreak::First);
        assert_eq!(config.belief_collapse, CollapsePolicy::RetainPrior);
    }

    #[test]
    fn test_zero_node_budget_rejected() {
        let mut config = WorldConfig::default();
        config.budget.max_nodes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_recursion_budget() {
        let mut config = WorldConfig::default();
        assert_eq!(config.recursion_budget(4), 4);
        config.max_recursion = Some(1);
        assert_eq!(config.recursion_budget(4), 1);
        assert_eq!(config.recursion_budget(0), 0);
    }

    #[test]
    fn test_step_options_default_updates_beliefs() {
        assert!(StepOptions::default().update_beliefs);
        let parsed: StepOptions = serde_json::from_str(r#"{"horizon": 3}"#).unwrap();
        assert!(parsed.update_beliefs);
        assert_eq!(parsed.horizon, Some(3));
    }
}
