//! Recursive expectimax search
//!
//! [`Planner::decide`] values every legal action of an agent under one of
//! its models:
//!
//! - horizon 0: the reward after applying only the agent's own action
//! - horizon h > 0: the agent's action is projected together with the actions
//!   of everyone who moves before its next turn (its own group against the
//!   same pre-group state, then later groups in turn order). Other agents are
//!   predicted through the believer's distribution over their models, one
//!   theory-of-mind level down. The value is the expected reward of the
//!   round plus the discounted value of the agent's own decision at h - 1.
//!
//! Planning never mutates the world: projections are copies. Decisions are
//! memoized per (agent, model, state, horizon, depth) for the lifetime of
//! the planner.
//!
//! Only the decision asked for is required to have a legal action. An agent
//! with no legal action in a projected state stands still in that branch.

use crate::models::{
    ActionId, AgentError, Distribution, DistributionError, ResolvedModel, Selection, StateVector,
};
use crate::planner::selection::{maximizers, select_policy, TieBreak};
use crate::rng::RngManager;
use crate::tree::EvalError;
use crate::world::World;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Errors that can occur while planning
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanningError {
    #[error("Agent '{agent}' has no legal action under model '{model}'")]
    IllegalAction { agent: String, model: String },

    #[error("Unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("Agent '{observer}' holds no belief about agent '{target}'")]
    NoBelief { observer: String, target: String },

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

/// Caller-imposed limits on a search
///
/// Once either limit is reached, remaining action values fall back to the
/// immediate reward and the affected decisions are flagged `truncated`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningBudget {
    /// Maximum number of action evaluations
    #[serde(default)]
    pub max_nodes: Option<usize>,

    /// Wall-clock limit in milliseconds
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
}

impl PlanningBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_nodes.is_none() && self.time_limit_ms.is_none()
    }
}

/// What a decision amounts to once selection is applied
#[derive(Debug, Clone, PartialEq)]
pub enum Choice {
    /// `best` / `random`: a single action
    Action(ActionId),
    /// `distribution`: the softmax policy itself
    Distribution(Distribution<ActionId>),
}

/// Outcome of planning for one agent under one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub agent: String,
    pub model: String,
    pub horizon: u32,
    pub selection: Selection,

    /// Legal actions with their values, in declaration order
    pub values: Vec<(ActionId, f64)>,

    /// Probability of each action under the model's selection
    pub policy: Distribution<ActionId>,

    /// Some value behind this decision fell back to immediate reward
    pub truncated: bool,

    /// No legal action had a finite value
    pub degenerate: bool,
}

impl Decision {
    pub fn value(&self, action: &ActionId) -> Option<f64> {
        self.values
            .iter()
            .find(|(a, _)| a == action)
            .map(|(_, v)| *v)
    }

    /// Probability mass the policy puts on `action`
    pub fn likelihood(&self, action: &ActionId) -> f64 {
        self.policy.prob(action)
    }

    /// Expected value of following the policy
    pub fn expected_value(&self) -> f64 {
        self.policy
            .expectation(|a| self.value(a).unwrap_or(f64::NEG_INFINITY))
    }

    /// Apply the selection rule
    ///
    /// Draws from `rng` only when a random tie-break among several
    /// maximizers is needed.
    pub fn choice(&self, tiebreak: TieBreak, rng: &mut RngManager) -> Option<Choice> {
        if self.selection == Selection::Distribution {
            return Some(Choice::Distribution(self.policy.clone()));
        }

        let best = maximizers(&self.values);
        let pick = match (self.selection, tiebreak) {
            (Selection::Best, TieBreak::First) => best.first().copied(),
            _ => rng
                .choose_weighted(&vec![1.0; best.len()])
                .map(|i| best[i]),
        };
        pick.map(|a| Choice::Action(a.clone()))
    }

    /// Apply the selection rule and sample a distribution choice
    pub fn realize(&self, tiebreak: TieBreak, rng: &mut RngManager) -> Option<ActionId> {
        match self.choice(tiebreak, rng)? {
            Choice::Action(action) => Some(action),
            Choice::Distribution(policy) => policy.sample(rng).cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoKey {
    agent: String,
    model: String,
    state: StateVector,
    horizon: u32,
    depth: u32,
}

/// Read-only planner over a world
///
/// # Example
///
/// ```rust
/// use tom_simulator_core_rs::planner::Planner;
/// use tom_simulator_core_rs::scenarios::prisoners_dilemma;
/// use tom_simulator_core_rs::world::WorldConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let world = prisoners_dilemma::build(WorldConfig::default(), 1)?;
/// let mut planner = Planner::new(&world);
/// let decision = planner.decide("Agent 1", "Agent 10", world.state(), 1)?;
///
/// let defect = decision.policy.mode().unwrap();
/// assert_eq!(defect.verb, "defect");
/// # Ok(())
/// # }
/// ```
pub struct Planner<'w> {
    world: &'w World,
    budget: PlanningBudget,
    memo: HashMap<MemoKey, Decision>,
    nodes: usize,
    /// Node count when the current budget started
    budget_base: usize,
    started: Instant,
    exhausted: bool,
    /// Valuations that fell back to immediate reward, plus reuses of
    /// truncated decisions
    degraded: usize,
}

impl<'w> Planner<'w> {
    /// Planner using the world's configured budget
    pub fn new(world: &'w World) -> Self {
        Self::with_budget(world, world.config().budget)
    }

    pub fn with_budget(world: &'w World, budget: PlanningBudget) -> Self {
        Self {
            world,
            budget,
            memo: HashMap::new(),
            nodes: 0,
            budget_base: 0,
            started: Instant::now(),
            exhausted: false,
            degraded: 0,
        }
    }

    /// Grant a fresh budget, keeping the memo table
    pub fn restart_budget(&mut self) {
        self.budget_base = self.nodes;
        self.started = Instant::now();
        self.exhausted = false;
    }

    pub fn world(&self) -> &'w World {
        self.world
    }

    /// Number of action evaluations performed so far
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// Whether the budget has been exhausted
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Plan for `agent` under `model` with the full theory-of-mind budget
    pub fn decide(
        &mut self,
        agent: &str,
        model: &str,
        state: &StateVector,
        horizon: u32,
    ) -> Result<Decision, PlanningError> {
        let depth = self.world.config().recursion_budget(horizon);
        let decision = self.decide_at_depth(agent, model, state, horizon, depth)?;
        debug!(
            agent,
            model,
            horizon,
            depth,
            nodes = self.nodes,
            truncated = decision.truncated,
            "decision computed"
        );
        Ok(decision)
    }

    /// Plan with an explicit theory-of-mind budget
    ///
    /// At depth 0 (or for models without beliefs) every other agent is
    /// treated as frozen: only the deciding agent's actions change the state.
    pub fn decide_at_depth(
        &mut self,
        agent: &str,
        model: &str,
        state: &StateVector,
        horizon: u32,
        depth: u32,
    ) -> Result<Decision, PlanningError> {
        self.plan(agent, model, state, horizon, depth)?
            .ok_or_else(|| PlanningError::IllegalAction {
                agent: agent.to_string(),
                model: model.to_string(),
            })
    }

    /// `None` when the agent has no legal action at `state`
    fn plan(
        &mut self,
        agent: &str,
        model: &str,
        state: &StateVector,
        horizon: u32,
        depth: u32,
    ) -> Result<Option<Decision>, PlanningError> {
        let key = MemoKey {
            agent: agent.to_string(),
            model: model.to_string(),
            state: state.clone(),
            horizon,
            depth,
        };
        if let Some(decision) = self.memo.get(&key) {
            if decision.truncated {
                self.degraded += 1;
            }
            return Ok(Some(decision.clone()));
        }

        let world = self.world;
        let subject = world
            .agent(agent)
            .ok_or_else(|| PlanningError::UnknownAgent(agent.to_string()))?;
        let resolved = subject.resolve(model)?;

        let legal: Vec<ActionId> = subject
            .legal_actions(state)?
            .into_iter()
            .cloned()
            .collect();
        if legal.is_empty() {
            return Ok(None);
        }

        let degraded = self.degraded;
        let mut values = Vec::with_capacity(legal.len());
        for action in legal {
            let value = self.q_value(agent, &resolved, Some(&action), state, horizon, depth)?;
            values.push((action, value));
        }
        // Fallbacks in own lookahead or in predicted others both count
        let truncated = self.degraded > degraded;

        let (policy, degenerate) =
            select_policy(&values, resolved.selection, resolved.rationality)?;
        if degenerate {
            warn!(agent, model, horizon, "no legal action has a finite value");
        }
        trace!(agent, model, horizon, depth, ?values, "actions valued");

        let decision = Decision {
            agent: agent.to_string(),
            model: model.to_string(),
            horizon,
            selection: resolved.selection,
            values,
            policy,
            truncated,
            degenerate,
        };
        self.memo.insert(key, decision.clone());
        Ok(Some(decision))
    }

    // ========================================================================
    // Valuation
    // ========================================================================

    /// Value of taking `action` (or standing still when `None`) at `state`
    fn q_value(
        &mut self,
        agent: &str,
        model: &ResolvedModel,
        action: Option<&ActionId>,
        state: &StateVector,
        horizon: u32,
        depth: u32,
    ) -> Result<f64, PlanningError> {
        self.nodes += 1;

        let own: Vec<ActionId> = action.into_iter().cloned().collect();
        if horizon == 0 {
            return Ok(model.reward(&self.world.apply_actions(state, &own)?)?);
        }
        if self.check_budget() {
            self.degraded += 1;
            return Ok(model.reward(&self.world.apply_actions(state, &own)?)?);
        }

        let outcomes = self.project(agent, model, action, state, horizon, depth)?;

        let mut total = 0.0;
        for (next, p) in outcomes.iter() {
            let reward = model.reward(next)?;
            let future = self.future_value(agent, model, next, horizon - 1, depth)?;
            total += p * (reward + model.discount * future);
        }
        Ok(total)
    }

    /// Expected value of the agent's own policy at `state`
    fn future_value(
        &mut self,
        agent: &str,
        model: &ResolvedModel,
        state: &StateVector,
        horizon: u32,
        depth: u32,
    ) -> Result<f64, PlanningError> {
        match self.plan(agent, &model.name, state, horizon, depth)? {
            Some(decision) => Ok(decision.expected_value()),
            None => {
                trace!(agent, horizon, "no legal action in projection; standing still");
                self.q_value(agent, model, None, state, horizon, depth)
            }
        }
    }

    fn check_budget(&mut self) -> bool {
        if self.exhausted || self.budget.is_unlimited() {
            return self.exhausted;
        }

        let used = self.nodes - self.budget_base;
        let over_nodes = self.budget.max_nodes.map_or(false, |max| used > max);
        let over_time = self
            .budget
            .time_limit_ms
            .map_or(false, |ms| self.started.elapsed() >= Duration::from_millis(ms));

        if over_nodes || over_time {
            self.exhausted = true;
            warn!(
                nodes = self.nodes,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "planning budget exhausted; falling back to immediate rewards"
            );
        }
        self.exhausted
    }

    // ========================================================================
    // Projection
    // ========================================================================

    /// Distribution over states at the agent's next turn
    fn project(
        &mut self,
        agent: &str,
        model: &ResolvedModel,
        action: Option<&ActionId>,
        state: &StateVector,
        horizon: u32,
        depth: u32,
    ) -> Result<Distribution<StateVector>, PlanningError> {
        let world = self.world;
        let order = world.turn_order();
        let mine = order.iter().position(|group| group.contains(agent));
        let others_act = model.beliefs && depth > 0;

        let peers: Vec<&str> = match (mine, others_act) {
            (Some(g), true) => order[g]
                .iter()
                .map(String::as_str)
                .filter(|m| *m != agent)
                .collect(),
            _ => Vec::new(),
        };
        let mut outcomes = self.resolve_group(agent, state, &peers, action, horizon, depth)?;

        if !others_act {
            return Ok(outcomes);
        }

        let later: Vec<&BTreeSet<String>> = match mine {
            Some(g) => order[g + 1..].iter().chain(order[..g].iter()).collect(),
            None => order.iter().collect(),
        };
        for group in later {
            if group.contains(agent) {
                break;
            }
            let members: Vec<&str> = group.iter().map(String::as_str).collect();

            let mut mass = Vec::new();
            for (current, p) in outcomes.iter() {
                let next = self.resolve_group(agent, current, &members, None, horizon, depth)?;
                mass.extend(next.iter().map(|(s, q)| (s.clone(), p * q)));
            }
            outcomes = Distribution::from_mass(mass);
        }

        Ok(outcomes)
    }

    /// States reachable when `members` act together (plus `own`, if given)
    fn resolve_group(
        &mut self,
        believer: &str,
        state: &StateVector,
        members: &[&str],
        own: Option<&ActionId>,
        horizon: u32,
        depth: u32,
    ) -> Result<Distribution<StateVector>, PlanningError> {
        let mut profiles: Distribution<Vec<ActionId>> =
            Distribution::point(own.into_iter().cloned().collect());

        for member in members {
            let Some(prediction) =
                self.predict(believer, member, state, horizon, depth.saturating_sub(1))?
            else {
                continue;
            };
            profiles = profiles.merge(&prediction).map(|(profile, action)| {
                let mut joint = profile.clone();
                joint.push(action.clone());
                joint
            });
        }

        let mut mass = Vec::with_capacity(profiles.len());
        for (profile, p) in profiles.iter() {
            mass.push((self.world.apply_actions(state, profile)?, p));
        }
        Ok(Distribution::from_mass(mass))
    }

    /// Believer's prediction of `target`'s action at `state`
    ///
    /// Each believed model plans with the smaller of its own horizon and the
    /// believer's. Without an explicit belief the target's true model is
    /// assumed. `None` when the target has no legal action at `state`.
    fn predict(
        &mut self,
        believer: &str,
        target: &str,
        state: &StateVector,
        horizon: u32,
        depth: u32,
    ) -> Result<Option<Distribution<ActionId>>, PlanningError> {
        let world = self.world;
        let observer = world
            .agent(believer)
            .ok_or_else(|| PlanningError::UnknownAgent(believer.to_string()))?;
        let subject = world
            .agent(target)
            .ok_or_else(|| PlanningError::UnknownAgent(target.to_string()))?;

        let assumed;
        let belief = match observer.mental_model(target) {
            Some(belief) => belief,
            None => {
                assumed = Distribution::point(subject.true_model().to_string());
                &assumed
            }
        };

        let mut mass = Vec::new();
        for (model, p) in belief.iter() {
            let model_horizon = subject.resolve(model)?.horizon.min(horizon);
            let Some(decision) = self.plan(target, model, state, model_horizon, depth)? else {
                trace!(believer, target, "no legal action in projection; target stands still");
                return Ok(None);
            };
            mass.extend(decision.policy.iter().map(|(a, q)| (a.clone(), p * q)));
        }
        Ok(Some(Distribution::from_mass(mass)))
    }
}
