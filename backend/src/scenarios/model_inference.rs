//! Inferring another agent's reward from its behaviour
//!
//! Two actors move left or right along their own line. `actor1` wants a
//! high location, `actor2` a low one. `actor1` starts out unsure whether
//! `actor2` prefers positive locations, negative locations or nothing at
//! all, and revises that belief each time it sees `actor2` move.

use crate::models::{state_key, ActionDescriptor, Attribute, Distribution, Domain, Key, Selection};
use crate::tree::{maximize_feature, minimize_feature, null_reward, TreeSpec};
use crate::world::{StepOptions, World, WorldConfig, WorldError};
use std::collections::BTreeSet;

pub const LEARNER: &str = "actor1";
pub const ACTOR: &str = "actor2";

pub const PREFER_POSITIVE: &str = "actor2_prefer_positive_loc";
pub const PREFER_NEGATIVE: &str = "actor2_prefer_negative_loc";
pub const PREFER_NOTHING: &str = "actor2_prefer_nothing";

/// Models `actor1` considers for `actor2`
pub const CANDIDATE_MODELS: [&str; 3] = [PREFER_POSITIVE, PREFER_NEGATIVE, PREFER_NOTHING];

pub const HORIZON: u32 = 2;
pub const MODEL_RATIONALITY: f64 = 0.5;
pub const MAX_STEPS: usize = 5;
pub const SEED: u64 = 17;

const LOCATION_BOUND: f64 = 1000.0;

pub fn location_key(agent: &str) -> Key {
    state_key(agent, "location")
}

/// Options the scenario steps with
pub fn step_options() -> StepOptions {
    StepOptions::with_horizon(HORIZON)
}

/// Build the two-actor world with `actor1` holding a uniform belief over
/// `actor2`'s candidate models
///
/// # Example
///
/// ```rust
/// use tom_simulator_core_rs::scenarios::model_inference::{self, ACTOR, LEARNER, PREFER_NEGATIVE};
/// use tom_simulator_core_rs::world::WorldConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut world = model_inference::build(WorldConfig::with_seed(model_inference::SEED))?;
/// world.step(&model_inference::step_options())?;
///
/// let belief = world.get_mental_model(LEARNER, ACTOR)?.unwrap();
/// assert!(belief.prob(&PREFER_NEGATIVE.to_string()) > 1.0 / 3.0);
/// # Ok(())
/// # }
/// ```
pub fn build(config: WorldConfig) -> Result<World, WorldError> {
    let mut world = World::new(config)?;

    for agent in [LEARNER, ACTOR] {
        world.add_agent(agent)?;

        let loc = world.define_state(
            Some(agent),
            "location",
            Domain::range(-LOCATION_BOUND, LOCATION_BOUND),
        )?;
        world.set_feature(&loc, 0.0)?;

        let left = world.add_action(agent, ActionDescriptor::new("move").with_object("left"), None)?;
        world.set_dynamics(&loc, &left, &TreeSpec::increment(loc.clone(), -1.0))?;
        let right =
            world.add_action(agent, ActionDescriptor::new("move").with_object("right"), None)?;
        world.set_dynamics(&loc, &right, &TreeSpec::increment(loc.clone(), 1.0))?;

        let reward = if agent == LEARNER {
            maximize_feature(&loc, agent)
        } else {
            minimize_feature(&loc, agent)
        };
        world.set_reward(agent, &reward, 1.0, None)?;

        world.set_attribute(agent, Attribute::Rationality(MODEL_RATIONALITY), None)?;
        world.set_attribute(agent, Attribute::Selection(Selection::Random), None)?;
        world.set_attribute(agent, Attribute::Horizon(HORIZON), None)?;
        world.set_attribute(agent, Attribute::Beliefs(true), None)?;
    }

    world.set_order(vec![BTreeSet::from([
        LEARNER.to_string(),
        ACTOR.to_string(),
    ])])?;

    let loc = location_key(ACTOR);
    let candidates = [
        (PREFER_POSITIVE, maximize_feature(&loc, ACTOR)),
        (PREFER_NEGATIVE, minimize_feature(&loc, ACTOR)),
        (PREFER_NOTHING, null_reward(ACTOR)),
    ];
    for (model, reward) in candidates {
        world.add_model(ACTOR, model, None)?;
        world.set_reward(ACTOR, &reward, 1.0, Some(model))?;
        world.set_attribute(ACTOR, Attribute::Rationality(MODEL_RATIONALITY), Some(model))?;
        world.set_attribute(ACTOR, Attribute::Selection(Selection::Distribution), Some(model))?;
        world.set_attribute(ACTOR, Attribute::Horizon(HORIZON), Some(model))?;
        world.set_attribute(ACTOR, Attribute::Beliefs(true), Some(model))?;
    }

    let belief = Distribution::uniform(CANDIDATE_MODELS.map(String::from))?;
    world.set_mental_model(LEARNER, ACTOR, belief)?;

    Ok(world)
}
