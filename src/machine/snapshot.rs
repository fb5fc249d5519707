//! Serializable views of a state table.
//!
//! Snapshots copy out everything but the callbacks themselves, so they can be
//! compared, logged or written as JSON while the live table keeps changing.

use crate::domain::{Event, Result, State, StateKey};
use crate::machine::action::ActionId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSnapshot {
    pub default_state: Option<State>,
    pub current: Option<State>,
    pub states: Vec<ContextSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSnapshot {
    pub state: StateKey,
    pub rules: Vec<RuleSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSnapshot {
    pub event: Event,
    pub target: Option<State>,
    pub actions: Vec<ActionSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSnapshot {
    pub id: ActionId,
    pub name: String,
}

impl TableSnapshot {
    /// Finds the rule registered for (`state`, `event`) by exact key.
    #[must_use]
    pub fn rule(&self, state: &StateKey, event: &Event) -> Option<&RuleSnapshot> {
        self.states
            .iter()
            .find(|c| &c.state == state)?
            .rules
            .iter()
            .find(|r| &r.event == event)
    }

    /// Returns a copy without the entry for (`state`, `event`).
    #[must_use]
    pub fn without(&self, state: &StateKey, event: &Event) -> Self {
        let mut copy = self.clone();
        if let Some(context) = copy.states.iter_mut().find(|c| &c.state == state) {
            context.rules.retain(|r| &r.event != event);
        }
        copy
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StatewireError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
