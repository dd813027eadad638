//! Event logging for replay and auditing.
//!
//! Every observable change a world makes is recorded as an [`Event`]:
//! features set by the caller, actions chosen, effects committed, beliefs
//! revised. Events carry the step they happened in and are logged in the
//! order they occur within a step.
//!
//! # Example
//!
//! ```rust
//! use tom_simulator_core_rs::models::{Event, EventLog, Key, Value};
//!
//! let mut log = EventLog::new();
//! log.log(Event::FeatureSet {
//!     step: 0,
//!     key: Key::from("Agent 1's decision"),
//!     value: Value::from("none"),
//! });
//!
//! assert_eq!(log.events_at_step(0).len(), 1);
//! assert_eq!(log.events()[0].event_type(), "FeatureSet");
//! ```

use crate::models::action::ActionId;
use crate::models::key::{Key, Value};
use crate::models::model::Selection;
use serde::{Deserialize, Serialize};

/// World event capturing a state or belief change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    /// Caller wrote a feature between steps
    FeatureSet { step: usize, key: Key, value: Value },

    /// An agent's realized action for this step
    ActionChosen {
        step: usize,
        agent: String,
        action: ActionId,
        selection: Selection,
        value: f64,
    },

    /// A turn-order group's effects were applied to the state
    EffectsCommitted {
        step: usize,
        agents: Vec<String>,
        changes: Vec<(Key, Value)>,
    },

    /// An observer's belief about a target's model was revised
    BeliefUpdated {
        step: usize,
        observer: String,
        target: String,
        action: ActionId,
        collapsed: bool,
    },

    /// Planning ran out of budget and fell back to immediate rewards
    PlanningTruncated {
        step: usize,
        agent: String,
        nodes: usize,
    },

    /// No legal action had a finite value
    DegenerateDecision { step: usize, agent: String },

    StepCompleted { step: usize, groups: usize },

    /// A group failed after earlier groups of the step were committed
    StepAborted {
        step: usize,
        /// Index of the failing group in the turn order
        group: usize,
        committed_groups: usize,
        reason: String,
    },
}

impl Event {
    /// Step during which this event occurred
    pub fn step(&self) -> usize {
        match self {
            Event::FeatureSet { step, .. }
            | Event::ActionChosen { step, .. }
            | Event::EffectsCommitted { step, .. }
            | Event::BeliefUpdated { step, .. }
            | Event::PlanningTruncated { step, .. }
            | Event::DegenerateDecision { step, .. }
            | Event::StepCompleted { step, .. }
            | Event::StepAborted { step, .. } => *step,
        }
    }

    /// Short name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::FeatureSet { .. } => "FeatureSet",
            Event::ActionChosen { .. } => "ActionChosen",
            Event::EffectsCommitted { .. } => "EffectsCommitted",
            Event::BeliefUpdated { .. } => "BeliefUpdated",
            Event::PlanningTruncated { .. } => "PlanningTruncated",
            Event::DegenerateDecision { .. } => "DegenerateDecision",
            Event::StepCompleted { .. } => "StepCompleted",
            Event::StepAborted { .. } => "StepAborted",
        }
    }

    /// Whether the event concerns `agent` (as actor, observer or target)
    pub fn involves(&self, agent: &str) -> bool {
        match self {
            Event::ActionChosen { agent: a, .. }
            | Event::PlanningTruncated { agent: a, .. }
            | Event::DegenerateDecision { agent: a, .. } => a == agent,
            Event::EffectsCommitted { agents, .. } => agents.iter().any(|a| a == agent),
            Event::BeliefUpdated {
                observer, target, ..
            } => observer == agent || target == agent,
            Event::FeatureSet { .. }
            | Event::StepCompleted { .. }
            | Event::StepAborted { .. } => false,
        }
    }
}

/// Append-only event store with simple queries
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn log(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_at_step(&self, step: usize) -> Vec<&Event> {
        self.events.iter().filter(|e| e.step() == step).collect()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    pub fn events_for_agent(&self, agent: &str) -> Vec<&Event> {
        self.events.iter().filter(|e| e.involves(agent)).collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::action::ActionDescriptor;

    fn chosen(step: usize, agent: &str) -> Event {
        Event::ActionChosen {
            step,
            agent: agent.to_string(),
            action: ActionId::new(agent, ActionDescriptor::new("wait")),
            selection: Selection::Best,
            value: 0.0,
        }
    }

    #[test]
    fn test_event_step_and_type() {
        let event = chosen(4, "a");
        assert_eq!(event.step(), 4);
        assert_eq!(event.event_type(), "ActionChosen");
    }

    #[test]
    fn test_belief_update_involves_both_sides() {
        let event = Event::BeliefUpdated {
            step: 0,
            observer: "actor1".to_string(),
            target: "actor2".to_string(),
            action: ActionId::new("actor2", ActionDescriptor::new("move").with_object("left")),
            collapsed: false,
        };
        assert!(event.involves("actor1"));
        assert!(event.involves("actor2"));
        assert!(!event.involves("actor3"));
    }

    #[test]
    fn test_event_log_queries() {
        let mut log = EventLog::new();
        log.log(chosen(0, "a"));
        log.log(chosen(0, "b"));
        log.log(Event::StepCompleted { step: 0, groups: 1 });
        log.log(chosen(1, "a"));

        assert_eq!(log.len(), 4);
        assert_eq!(log.events_at_step(0).len(), 3);
        assert_eq!(log.events_for_agent("a").len(), 2);
        assert_eq!(log.events_of_type("StepCompleted").len(), 1);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(Event::StepCompleted { step: 2, groups: 1 }).unwrap();
        assert_eq!(json["event"], "StepCompleted");
        assert_eq!(json["step"], 2);
    }
}
