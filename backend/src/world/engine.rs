//! World engine
//!
//! The world owns the global state vector, the declared key universe, the
//! agent registry, the turn order and the dynamics table. It is the only
//! thing that mutates state.
//!
//! # Step protocol
//!
//! ```text
//! For each turn-order group:
//! 1. Every member plans (lexical order) against the same pre-group state
//! 2. Realized actions are drawn with the world RNG
//! 3. The group's effects are computed (members in lexical order)
//! 4. Observers holding a belief about an actor revise it from the realized
//!    action, evaluated against the pre-group state
//! 5. Effects and revised beliefs are committed together
//! ```
//!
//! Any error before step 5 leaves the group uncommitted. A step that fails
//! after some group was committed is closed as aborted.
//!
//! # Example
//!
//! ```rust
//! use tom_simulator_core_rs::models::{ActionDescriptor, Domain};
//! use tom_simulator_core_rs::tree::{maximize_feature, TreeSpec};
//! use tom_simulator_core_rs::world::{StepOptions, World, WorldConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut world = World::new(WorldConfig::default())?;
//! world.add_agent("mover")?;
//! let pos = world.define_state(Some("mover"), "position", Domain::range(-5.0, 5.0))?;
//!
//! let right = world.add_action("mover", ActionDescriptor::new("move").with_object("right"), None)?;
//! let left = world.add_action("mover", ActionDescriptor::new("move").with_object("left"), None)?;
//! world.set_dynamics(&pos, &right, &TreeSpec::increment(pos.clone(), 1.0))?;
//! world.set_dynamics(&pos, &left, &TreeSpec::increment(pos.clone(), -1.0))?;
//! world.set_reward("mover", &maximize_feature(&pos, "mover"), 1.0, None)?;
//!
//! let record = world.step(&StepOptions::default())?;
//! assert_eq!(record.action_of("mover"), Some(&right));
//! assert_eq!(world.get_feature(&pos)?.as_number(), Some(1.0));
//! # Ok(())
//! # }
//! ```

use crate::models::{
    model_key, reward_key, state_key, ActionDescriptor, ActionId, Agent, AgentError, Attribute,
    Distribution, DistributionError, Domain, Event, EventLog, Key, Selection, StateVector,
    Universe, Value,
};
use crate::planner::{BeliefUpdater, Decision, Planner, PlanningBudget, PlanningError};
use crate::rng::RngManager;
use crate::tree::{build_dynamics, build_legality, build_reward, EvalError, TreeError, TreeSpec};
use crate::world::config::{CollapsePolicy, StepOptions, WorldConfig};
use crate::world::dynamics::DynamicsTable;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Errors
// ============================================================================

/// World error types
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorldError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Agent not found: {0}")]
    UnknownAgent(String),

    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),

    #[error("Key not declared: {0}")]
    UnknownKey(Key),

    #[error("Key already declared: {0}")]
    DuplicateKey(Key),

    #[error("Key is reserved: {0}")]
    ReservedKey(Key),

    #[error("Agent '{agent}' has no action '{action}'")]
    UnknownAction { agent: String, action: String },

    #[error("Value '{value}' is outside the domain of '{key}'")]
    InvalidValue { key: Key, value: Value },

    #[error("Invalid turn order: {0}")]
    InvalidOrder(String),

    #[error("Invalid belief of '{observer}' about '{target}': {reason}")]
    InvalidBelief {
        observer: String,
        target: String,
        reason: String,
    },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

// ============================================================================
// Step results
// ============================================================================

/// Where an agent is in the current round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecisionStatus {
    NotDecided,
    Decided,
}

/// One agent's decision within a step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepEntry {
    pub agent: String,
    pub model: String,
    pub action: ActionId,
    pub policy: Distribution<ActionId>,
    pub values: Vec<(ActionId, f64)>,
    pub selection: Selection,
    pub truncated: bool,
    pub degenerate: bool,
}

/// One observer's revised belief about an actor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeliefRevision {
    pub observer: String,
    pub target: String,
    pub action: ActionId,
    pub prior: Distribution<String>,
    pub posterior: Distribution<String>,

    /// Every candidate model gave the action zero likelihood
    pub collapsed: bool,
}

/// Result of a single step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: usize,

    /// Decisions in the order they were committed
    pub entries: Vec<StepEntry>,

    pub belief_updates: Vec<BeliefRevision>,
}

impl StepRecord {
    pub fn entry(&self, agent: &str) -> Option<&StepEntry> {
        self.entries.iter().find(|e| e.agent == agent)
    }

    pub fn action_of(&self, agent: &str) -> Option<&ActionId> {
        self.entry(agent).map(|e| &e.action)
    }

    pub fn belief_update(&self, observer: &str, target: &str) -> Option<&BeliefRevision> {
        self.belief_updates
            .iter()
            .find(|u| u.observer == observer && u.target == target)
    }
}

/// Everything a group's step produces before anything is committed
struct GroupOutcome {
    decisions: Vec<Decision>,
    chosen: Vec<ActionId>,
    next: StateVector,
    revisions: Vec<BeliefRevision>,
    collapsed: Option<(String, String)>,
    nodes: usize,
}

// ============================================================================
// World
// ============================================================================

/// Multiagent world
///
/// # Determinism
///
/// All randomness goes through the seeded RNG; agents, keys and models live
/// in ordered maps. Same seed + same construction = identical runs.
pub struct World {
    config: WorldConfig,

    state: StateVector,
    universe: Universe,

    agents: BTreeMap<String, Agent>,

    /// Registration order, used for the default turn order
    registration: Vec<String>,

    order: Vec<BTreeSet<String>>,
    explicit_order: bool,

    dynamics: DynamicsTable,

    status: BTreeMap<String, DecisionStatus>,

    step: usize,
    rng: RngManager,
    event_log: EventLog,
}

impl World {
    /// Create an empty world
    ///
    /// # Errors
    ///
    /// * `WorldError::InvalidConfig` - the configuration failed validation
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        config.validate().map_err(WorldError::InvalidConfig)?;

        let rng = RngManager::new(config.rng_seed);
        Ok(Self {
            config,
            state: StateVector::new(),
            universe: Universe::new(),
            agents: BTreeMap::new(),
            registration: Vec::new(),
            order: Vec::new(),
            explicit_order: false,
            dynamics: DynamicsTable::new(),
            status: BTreeMap::new(),
            step: 0,
            rng,
            event_log: EventLog::new(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn state(&self) -> &StateVector {
        &self.state
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.get(name)
    }

    /// Agents in registration order
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.registration
            .iter()
            .filter_map(|name| self.agents.get(name))
    }

    pub fn turn_order(&self) -> &[BTreeSet<String>] {
        &self.order
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn status(&self, agent: &str) -> Option<DecisionStatus> {
        self.status.get(agent).copied()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    pub fn rng_state(&self) -> u64 {
        self.rng.get_state()
    }

    fn require_agent(&self, name: &str) -> Result<&Agent, WorldError> {
        self.agents
            .get(name)
            .ok_or_else(|| WorldError::UnknownAgent(name.to_string()))
    }

    fn require_agent_mut(&mut self, name: &str) -> Result<&mut Agent, WorldError> {
        self.agents
            .get_mut(name)
            .ok_or_else(|| WorldError::UnknownAgent(name.to_string()))
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Declare a feature, owned by an agent or world-level
    ///
    /// The feature starts at its domain's initial value. An agent's reward
    /// slot and model pointer cannot be declared as features.
    pub fn define_state(
        &mut self,
        owner: Option<&str>,
        feature: &str,
        domain: Domain,
    ) -> Result<Key, WorldError> {
        let key = match owner {
            Some(agent) => {
                self.require_agent(agent)?;
                let key = state_key(agent, feature);
                if key == reward_key(agent) || key == model_key(agent) {
                    return Err(WorldError::ReservedKey(key));
                }
                key
            }
            None => Key::new(feature),
        };
        self.declare(key.clone(), domain)?;
        Ok(key)
    }

    fn declare(&mut self, key: Key, domain: Domain) -> Result<(), WorldError> {
        if self.universe.contains_key(&key) {
            return Err(WorldError::DuplicateKey(key));
        }
        self.state.insert(key.clone(), domain.initial_value());
        self.universe.insert(key, domain);
        Ok(())
    }

    /// Overwrite a feature between steps
    pub fn set_feature(&mut self, key: &Key, value: impl Into<Value>) -> Result<(), WorldError> {
        let value = value.into();
        let domain = self
            .universe
            .get(key)
            .ok_or_else(|| WorldError::UnknownKey(key.clone()))?;
        if !domain.contains(&value) {
            return Err(WorldError::InvalidValue {
                key: key.clone(),
                value,
            });
        }

        self.state.insert(key.clone(), value.clone());
        self.event_log.log(Event::FeatureSet {
            step: self.step,
            key: key.clone(),
            value,
        });
        Ok(())
    }

    pub fn get_feature(&self, key: &Key) -> Result<&Value, WorldError> {
        self.state
            .get(key)
            .map_err(|_| WorldError::UnknownKey(key.clone()))
    }

    // ========================================================================
    // Agents and actions
    // ========================================================================

    /// Register an agent together with its reward slot
    ///
    /// Unless an explicit turn order was set, the agent acts in its own group
    /// after every agent registered before it.
    pub fn add_agent(&mut self, name: &str) -> Result<(), WorldError> {
        if name.is_empty() {
            return Err(WorldError::InvalidConfig(
                "agent name must not be empty".to_string(),
            ));
        }
        if self.agents.contains_key(name) {
            return Err(WorldError::DuplicateAgent(name.to_string()));
        }

        self.declare(reward_key(name), Domain::numeric())?;
        self.agents.insert(name.to_string(), Agent::new(name));
        self.registration.push(name.to_string());
        self.status
            .insert(name.to_string(), DecisionStatus::NotDecided);
        if !self.explicit_order {
            self.order.push(BTreeSet::from([name.to_string()]));
        }
        Ok(())
    }

    /// Give an agent an action, with an optional legality tree
    pub fn add_action(
        &mut self,
        agent: &str,
        descriptor: ActionDescriptor,
        legality: Option<&TreeSpec>,
    ) -> Result<ActionId, WorldError> {
        let legality = legality
            .map(|spec| build_legality(spec, &self.universe))
            .transpose()?;
        Ok(self.require_agent_mut(agent)?.add_action(descriptor, legality)?)
    }

    /// Set the tree computing `key` after `action`
    pub fn set_dynamics(
        &mut self,
        key: &Key,
        action: &ActionId,
        spec: &TreeSpec,
    ) -> Result<(), WorldError> {
        if !self.universe.contains_key(key) {
            return Err(WorldError::UnknownKey(key.clone()));
        }
        if !self.require_agent(&action.subject)?.has_action(action) {
            return Err(WorldError::UnknownAction {
                agent: action.subject.clone(),
                action: action.to_string(),
            });
        }

        let tree = build_dynamics(spec, &self.universe, key)?;
        self.dynamics.insert(action.clone(), key.clone(), tree);
        Ok(())
    }

    /// State after `actions`, leaving the world untouched
    pub fn apply_actions(
        &self,
        state: &StateVector,
        actions: &[ActionId],
    ) -> Result<StateVector, EvalError> {
        self.dynamics.apply_joint(state, actions, &self.universe)
    }

    // ========================================================================
    // Models
    // ========================================================================

    /// Add a weighted reward tree to a model (true model when `None`)
    pub fn set_reward(
        &mut self,
        agent: &str,
        spec: &TreeSpec,
        weight: f64,
        model: Option<&str>,
    ) -> Result<(), WorldError> {
        let tree = build_reward(spec, &self.universe, &reward_key(agent))?;
        self.require_agent_mut(agent)?.set_reward(tree, weight, model)?;
        Ok(())
    }

    pub fn add_model(
        &mut self,
        agent: &str,
        name: &str,
        parent: Option<&str>,
    ) -> Result<(), WorldError> {
        self.require_agent_mut(agent)?.add_model(name, parent)?;
        Ok(())
    }

    pub fn set_attribute(
        &mut self,
        agent: &str,
        attribute: Attribute,
        model: Option<&str>,
    ) -> Result<(), WorldError> {
        self.require_agent_mut(agent)?
            .set_attribute(attribute, model)?;
        Ok(())
    }

    /// Set the horizon on every model of an agent
    pub fn set_horizon(&mut self, agent: &str, horizon: u32) -> Result<(), WorldError> {
        self.require_agent_mut(agent)?.set_horizon(horizon);
        Ok(())
    }

    /// Evaluate an agent's reward (true model when `None`) at `state`
    pub fn reward(
        &self,
        agent: &str,
        model: Option<&str>,
        state: &StateVector,
    ) -> Result<f64, WorldError> {
        let subject = self.require_agent(agent)?;
        let resolved = subject.resolve(model.unwrap_or(subject.true_model()))?;
        Ok(resolved.reward(state)?)
    }

    // ========================================================================
    // Beliefs and turn order
    // ========================================================================

    /// Replace `observer`'s belief about `target`'s model
    pub fn set_mental_model(
        &mut self,
        observer: &str,
        target: &str,
        belief: Distribution<String>,
    ) -> Result<(), WorldError> {
        if observer == target {
            return Err(WorldError::InvalidBelief {
                observer: observer.to_string(),
                target: target.to_string(),
                reason: "an agent cannot hold a belief about itself".to_string(),
            });
        }
        let subject = self.require_agent(target)?;
        for model in belief.support() {
            subject.model(model)?;
        }
        let belief = belief.normalize()?;

        self.require_agent_mut(observer)?
            .set_mental_model(target, belief);
        Ok(())
    }

    pub fn get_mental_model(
        &self,
        observer: &str,
        target: &str,
    ) -> Result<Option<&Distribution<String>>, WorldError> {
        self.require_agent(target)?;
        Ok(self.require_agent(observer)?.mental_model(target))
    }

    /// Replace the turn order
    ///
    /// Groups must be non-empty and name registered agents, each at most
    /// once. Agents left out never act.
    pub fn set_order(&mut self, order: Vec<BTreeSet<String>>) -> Result<(), WorldError> {
        let mut seen = BTreeSet::new();
        for group in &order {
            if group.is_empty() {
                return Err(WorldError::InvalidOrder("empty group".to_string()));
            }
            for name in group {
                self.require_agent(name)?;
                if !seen.insert(name) {
                    return Err(WorldError::InvalidOrder(format!(
                        "agent '{}' appears in more than one group",
                        name
                    )));
                }
            }
        }

        self.order = order;
        self.explicit_order = true;
        Ok(())
    }

    // ========================================================================
    // Decisions
    // ========================================================================

    /// Plan for an agent's true model at the current state without acting
    pub fn decide(&self, agent: &str, horizon: Option<u32>) -> Result<Decision, WorldError> {
        let subject = self.require_agent(agent)?;
        let model = subject.true_model();
        let horizon = match horizon {
            Some(h) => h,
            None => subject.resolve(model)?.horizon,
        };

        let mut planner = Planner::new(self);
        Ok(planner.decide(agent, model, &self.state, horizon)?)
    }

    /// Return every agent to `NotDecided`
    pub fn reset_round(&mut self) {
        for status in self.status.values_mut() {
            *status = DecisionStatus::NotDecided;
        }
    }

    /// Advance the world by one round of the turn order
    ///
    /// # Errors
    ///
    /// * `PlanningError::IllegalAction` - an acting agent had no legal action;
    ///   the group is not committed
    /// * `DistributionError::BeliefCollapse` - only under
    ///   [`CollapsePolicy::Error`], after the group's effects were committed
    ///
    /// If any group of the step was committed before the error, the step is
    /// closed with [`Event::StepAborted`] and the step counter advances.
    /// Otherwise the world is untouched.
    pub fn step(&mut self, options: &StepOptions) -> Result<StepRecord, WorldError> {
        let step = self.step;
        let budget = options.budget.unwrap_or(self.config.budget);
        self.reset_round();

        let mut record = StepRecord {
            step,
            entries: Vec::new(),
            belief_updates: Vec::new(),
        };

        let order = self.order.clone();
        let mut committed = 0;
        for (index, group) in order.iter().enumerate() {
            let mut rng = self.rng.clone();
            let outcome = match self.plan_group(group, options, budget, &mut rng) {
                Ok(outcome) => outcome,
                Err(err) => return Err(self.abort_step(step, index, committed, err)),
            };
            self.rng = rng;

            // Effects are applied even when the commit reports a collapse
            let result = self.commit_group(step, outcome, &mut record);
            committed += 1;
            if let Err(err) = result {
                return Err(self.abort_step(step, index, committed, err));
            }
        }

        self.event_log.log(Event::StepCompleted {
            step,
            groups: order.len(),
        });
        self.step += 1;

        info!(
            step,
            groups = order.len(),
            actions = record.entries.len(),
            belief_updates = record.belief_updates.len(),
            "step completed"
        );
        Ok(record)
    }

    /// Close a step that failed in group `group`
    ///
    /// With nothing committed the world is as it was and the step can be
    /// retried. Otherwise the step counter moves on so a retry never reuses
    /// the step index of effects already in the log.
    fn abort_step(
        &mut self,
        step: usize,
        group: usize,
        committed: usize,
        err: WorldError,
    ) -> WorldError {
        if committed == 0 {
            return err;
        }

        warn!(
            step,
            group,
            committed_groups = committed,
            error = %err,
            "step aborted after partial commit"
        );
        self.event_log.log(Event::StepAborted {
            step,
            group,
            committed_groups: committed,
            reason: err.to_string(),
        });
        self.step += 1;
        err
    }

    /// Decide, realize and project one group without mutating the world
    fn plan_group(
        &self,
        group: &BTreeSet<String>,
        options: &StepOptions,
        budget: PlanningBudget,
        rng: &mut RngManager,
    ) -> Result<GroupOutcome, WorldError> {
        let before = &self.state;
        let mut planner = Planner::with_budget(self, budget);

        let mut decisions = Vec::with_capacity(group.len());
        for name in group {
            let agent = self.require_agent(name)?;
            let model = agent.true_model();
            let horizon = match options.horizon {
                Some(h) => h,
                None => agent.resolve(model)?.horizon,
            };
            planner.restart_budget();
            decisions.push(planner.decide(name, model, before, horizon)?);
        }

        let mut chosen = Vec::with_capacity(decisions.len());
        for decision in &decisions {
            let action = decision
                .realize(self.config.tiebreak, rng)
                .ok_or_else(|| PlanningError::IllegalAction {
                    agent: decision.agent.clone(),
                    model: decision.model.clone(),
                })?;
            chosen.push(action);
        }
        let next = self.apply_actions(before, &chosen)?;

        let mut updater = BeliefUpdater::with_planner(planner);
        let mut revisions = Vec::new();
        let mut collapsed = None;

        if options.update_beliefs {
            for action in &chosen {
                let target = action.subject.as_str();
                for (observer, agent) in &self.agents {
                    let Some(prior) = agent.mental_model(target) else {
                        continue;
                    };
                    if observer == target {
                        continue;
                    }

                    let (posterior, was_collapsed) =
                        match updater.update(observer, target, action, before) {
                            Ok(posterior) => (posterior, false),
                            Err(PlanningError::Distribution(DistributionError::BeliefCollapse)) => {
                                warn!(
                                    observer = observer.as_str(),
                                    target,
                                    action = %action,
                                    policy = ?self.config.belief_collapse,
                                    "belief collapsed"
                                );
                                match self.config.belief_collapse {
                                    CollapsePolicy::RetainPrior => (prior.clone(), true),
                                    CollapsePolicy::ResetUniform => {
                                        (Distribution::uniform(prior.support().cloned())?, true)
                                    }
                                    CollapsePolicy::Error => {
                                        if collapsed.is_none() {
                                            collapsed = Some((observer.clone(), target.to_string()));
                                        }
                                        continue;
                                    }
                                }
                            }
                            Err(err) => return Err(err.into()),
                        };

                    revisions.push(BeliefRevision {
                        observer: observer.clone(),
                        target: target.to_string(),
                        action: action.clone(),
                        prior: prior.clone(),
                        posterior,
                        collapsed: was_collapsed,
                    });
                }
            }
        }

        let nodes = updater.into_planner().nodes();
        Ok(GroupOutcome {
            decisions,
            chosen,
            next,
            revisions,
            collapsed,
            nodes,
        })
    }

    fn commit_group(
        &mut self,
        step: usize,
        outcome: GroupOutcome,
        record: &mut StepRecord,
    ) -> Result<(), WorldError> {
        let GroupOutcome {
            decisions,
            chosen,
            next,
            revisions,
            collapsed,
            nodes,
        } = outcome;

        let changes = self.state.diff(&next);
        self.state = next;

        let mut agents = Vec::with_capacity(decisions.len());
        for (decision, action) in decisions.into_iter().zip(chosen) {
            let name = decision.agent.clone();
            debug!(
                step,
                agent = name.as_str(),
                action = %action,
                selection = %decision.selection,
                "action chosen"
            );

            self.event_log.log(Event::ActionChosen {
                step,
                agent: name.clone(),
                action: action.clone(),
                selection: decision.selection,
                value: decision.value(&action).unwrap_or(f64::NAN),
            });
            if decision.truncated {
                self.event_log.log(Event::PlanningTruncated {
                    step,
                    agent: name.clone(),
                    nodes,
                });
            }
            if decision.degenerate {
                self.event_log.log(Event::DegenerateDecision {
                    step,
                    agent: name.clone(),
                });
            }
            self.status.insert(name.clone(), DecisionStatus::Decided);

            record.entries.push(StepEntry {
                agent: name.clone(),
                model: decision.model,
                action,
                policy: decision.policy,
                values: decision.values,
                selection: decision.selection,
                truncated: decision.truncated,
                degenerate: decision.degenerate,
            });
            agents.push(name);
        }

        self.event_log.log(Event::EffectsCommitted {
            step,
            agents,
            changes,
        });

        if let Some((observer, target)) = collapsed {
            warn!(
                step,
                observer = observer.as_str(),
                target = target.as_str(),
                "belief collapse aborts the step"
            );
            return Err(DistributionError::BeliefCollapse.into());
        }

        for revision in revisions {
            if let Some(agent) = self.agents.get_mut(&revision.observer) {
                agent.set_mental_model(&revision.target, revision.posterior.clone());
            }
            self.event_log.log(Event::BeliefUpdated {
                step,
                observer: revision.observer.clone(),
                target: revision.target.clone(),
                action: revision.action.clone(),
                collapsed: revision.collapsed,
            });
            record.belief_updates.push(revision);
        }
        Ok(())
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("step", &self.step)
            .field("agents", &self.registration)
            .field("order", &self.order)
            .field("state", &self.state)
            .finish()
    }
}
