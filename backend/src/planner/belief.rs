//! Bayesian revision of mental models
//!
//! After an actor acts, an observer holding a belief over the actor's models
//! reweights each candidate model by the probability that model would have
//! chosen the observed action from the state the actor faced.

use crate::models::{ActionId, Distribution, StateVector};
use crate::planner::search::{Planner, PlanningError};
use crate::world::World;
use tracing::debug;

/// Revises beliefs using a (memoizing) planner
pub struct BeliefUpdater<'w> {
    planner: Planner<'w>,
}

impl<'w> BeliefUpdater<'w> {
    pub fn new(world: &'w World) -> Self {
        Self::with_planner(Planner::new(world))
    }

    /// Share an existing planner (and its memo)
    pub fn with_planner(planner: Planner<'w>) -> Self {
        Self { planner }
    }

    pub fn into_planner(self) -> Planner<'w> {
        self.planner
    }

    /// P(observed | target acting under `model` at `state`)
    ///
    /// The candidate plans at its own horizon.
    pub fn likelihood(
        &mut self,
        target: &str,
        model: &str,
        observed: &ActionId,
        state: &StateVector,
    ) -> Result<f64, PlanningError> {
        let subject = self
            .planner
            .world()
            .agent(target)
            .ok_or_else(|| PlanningError::UnknownAgent(target.to_string()))?;
        let horizon = subject.resolve(model)?.horizon;

        self.planner.restart_budget();
        let decision = self.planner.decide(target, model, state, horizon)?;
        Ok(decision.likelihood(observed))
    }

    /// Posterior over `target`'s models held by `observer`
    ///
    /// Fails with `BeliefCollapse` (wrapped in [`PlanningError::Distribution`])
    /// when no candidate model could have produced the observed action.
    pub fn update(
        &mut self,
        observer: &str,
        target: &str,
        observed: &ActionId,
        state: &StateVector,
    ) -> Result<Distribution<String>, PlanningError> {
        let world = self.planner.world();
        let prior = world
            .agent(observer)
            .ok_or_else(|| PlanningError::UnknownAgent(observer.to_string()))?
            .mental_model(target)
            .ok_or_else(|| PlanningError::NoBelief {
                observer: observer.to_string(),
                target: target.to_string(),
            })?;

        let mut likelihoods = Vec::with_capacity(prior.len());
        for model in prior.support() {
            let l = self.likelihood(target, model, observed, state)?;
            likelihoods.push((model.clone(), l));
        }

        let posterior = prior.bayes_update(|model| {
            likelihoods
                .iter()
                .find(|(m, _)| m == model)
                .map_or(0.0, |(_, l)| *l)
        })?;

        debug!(
            observer,
            target,
            action = %observed,
            ?likelihoods,
            "belief updated"
        );
        Ok(posterior)
    }
}
