//! Iterated prisoner's dilemma with theory of mind
//!
//! Two agents decide simultaneously whether to cooperate or defect. Their
//! actions follow a non-forgiving tit-for-tat rule: the first decision is
//! open, after that an agent may only defect once the other has defected.
//! Each agent holds a point belief on the other's true model.
//!
//! How far ahead the agents plan decides how they play:
//!
//! | horizon | first decision                                  |
//! |---------|-------------------------------------------------|
//! | 0       | random (every option is invalid on its own)     |
//! | 1       | defect                                          |
//! | 2       | random (cooperate and defect are worth the same)|
//! | ≥ 3     | cooperate, and keep cooperating                 |

use crate::models::{
    reward_key, state_key, ActionDescriptor, Attribute, Distribution, Domain, Key, Selection,
};
use crate::tree::{Predicate, TreeSpec};
use crate::world::{World, WorldConfig, WorldError};
use std::collections::BTreeSet;

pub const AGENTS: [&str; 2] = ["Agent 1", "Agent 2"];

pub const NOT_DECIDED: &str = "none";
pub const DEFECTED: &str = "defected";
pub const COOPERATED: &str = "cooperated";

pub const SUCKER: f64 = -3.0;
pub const TEMPTATION: f64 = 0.0;
pub const MUTUAL_COOP: f64 = -1.0;
pub const PUNISHMENT: f64 = -2.0;
pub const INVALID: f64 = -10000.0;

pub const MAX_HORIZON: u32 = 4;
pub const NUM_STEPS: usize = 4;

/// Key holding an agent's last decision
pub fn decision_key(agent: &str) -> Key {
    state_key(agent, "decision")
}

fn is(key: &Key, decision: &str) -> Predicate {
    Predicate::equals(key.clone(), decision)
}

/// Payoff of `agent` given both decisions; invalid until both have decided
pub fn payoff_tree(agent: &str, mine: &Key, other: &Key) -> TreeSpec {
    let pay = |value: f64| TreeSpec::set_constant(reward_key(agent), value);

    TreeSpec::branch(
        is(mine, NOT_DECIDED),
        pay(INVALID),
        TreeSpec::branch(
            is(other, NOT_DECIDED),
            pay(INVALID),
            TreeSpec::branch(
                is(mine, COOPERATED),
                TreeSpec::branch(is(other, COOPERATED), pay(MUTUAL_COOP), pay(SUCKER)),
                TreeSpec::branch(is(other, COOPERATED), pay(TEMPTATION), pay(PUNISHMENT)),
            ),
        ),
    )
}

/// Defect is off the table while the other keeps cooperating, unless this
/// agent already defected
fn defect_legality(mine: &Key, other: &Key) -> TreeSpec {
    TreeSpec::branch(
        is(other, COOPERATED),
        TreeSpec::branch(
            is(mine, DEFECTED),
            TreeSpec::boolean(true),
            TreeSpec::boolean(false),
        ),
        TreeSpec::boolean(true),
    )
}

/// No cooperation once either side has defected
fn cooperate_legality(mine: &Key, other: &Key) -> TreeSpec {
    TreeSpec::branch(
        is(other, DEFECTED),
        TreeSpec::boolean(false),
        TreeSpec::branch(
            is(mine, DEFECTED),
            TreeSpec::boolean(false),
            TreeSpec::boolean(true),
        ),
    )
}

/// Build the two-agent world with every model planning at `horizon`
///
/// # Example
///
/// ```rust
/// use tom_simulator_core_rs::scenarios::prisoners_dilemma::{self, COOPERATED};
/// use tom_simulator_core_rs::world::{StepOptions, WorldConfig};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut world = prisoners_dilemma::build(WorldConfig::default(), 3)?;
/// world.step(&StepOptions::default())?;
///
/// let key = prisoners_dilemma::decision_key("Agent 1");
/// assert_eq!(world.get_feature(&key)?.as_symbol(), Some(COOPERATED));
/// # Ok(())
/// # }
/// ```
pub fn build(config: WorldConfig, horizon: u32) -> Result<World, WorldError> {
    let mut world = World::new(config)?;

    let mut decisions = Vec::with_capacity(AGENTS.len());
    for agent in AGENTS {
        world.add_agent(agent)?;
        world.set_attribute(agent, Attribute::Discount(1.0), None)?;
        world.set_attribute(agent, Attribute::Selection(Selection::Random), None)?;

        let key = world.define_state(
            Some(agent),
            "decision",
            Domain::enumerated([NOT_DECIDED, DEFECTED, COOPERATED]),
        )?;
        world.set_feature(&key, NOT_DECIDED)?;
        decisions.push(key);
    }

    for (i, agent) in AGENTS.iter().enumerate() {
        let mine = &decisions[i];
        let other = &decisions[1 - i];

        let defect = world.add_action(
            agent,
            ActionDescriptor::new("defect"),
            Some(&defect_legality(mine, other)),
        )?;
        world.set_dynamics(mine, &defect, &TreeSpec::set_constant(mine.clone(), DEFECTED))?;

        let cooperate = world.add_action(
            agent,
            ActionDescriptor::new("cooperate"),
            Some(&cooperate_legality(mine, other)),
        )?;
        world.set_dynamics(
            mine,
            &cooperate,
            &TreeSpec::set_constant(mine.clone(), COOPERATED),
        )?;

        world.set_reward(agent, &payoff_tree(agent, mine, other), 1.0, None)?;
    }

    world.set_order(vec![AGENTS.iter().map(|a| a.to_string()).collect::<BTreeSet<_>>()])?;

    for (observer, target) in [(AGENTS[0], AGENTS[1]), (AGENTS[1], AGENTS[0])] {
        let true_model = world
            .agent(target)
            .ok_or_else(|| WorldError::UnknownAgent(target.to_string()))?
            .true_model()
            .to_string();
        world.set_mental_model(observer, target, Distribution::point(true_model))?;
    }

    restart(&mut world, horizon)?;
    Ok(world)
}

/// Start a new game: every model plans at `horizon`, nobody has decided
pub fn restart(world: &mut World, horizon: u32) -> Result<(), WorldError> {
    for agent in AGENTS {
        world.set_horizon(agent, horizon)?;
        world.set_feature(&decision_key(agent), NOT_DECIDED)?;
    }
    world.reset_round();
    Ok(())
}

/// Current decision of `agent`
pub fn decision_of(world: &World, agent: &str) -> Result<String, WorldError> {
    let key = decision_key(agent);
    let value = world.get_feature(&key)?;
    value
        .as_symbol()
        .map(str::to_string)
        .ok_or_else(|| WorldError::InvalidValue {
            key,
            value: value.clone(),
        })
}
