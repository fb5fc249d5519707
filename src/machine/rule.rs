//! Transition rules.

use crate::domain::State;
use crate::machine::action::{Action, BoxError, Handler};

/// Target state and action associated with one (state, event) combination.
///
/// A `target` of `None` keeps whatever state is current when the rule commits.
/// Any-state bindings normally use it so they never move the machine.
pub struct Rule<P = (), R = (), E = BoxError> {
    pub target: Option<State>,
    pub action: Action<P, R, E>,
}

impl<P, R, E> Rule<P, R, E> {
    /// Moves to `target` after running `action`.
    pub fn to(target: impl Into<State>, action: impl Into<Action<P, R, E>>) -> Self {
        Self {
            target: Some(target.into()),
            action: action.into(),
        }
    }

    /// Runs `action` without changing state.
    pub fn stay(action: impl Into<Action<P, R, E>>) -> Self {
        Self {
            target: None,
            action: action.into(),
        }
    }

    /// Moves to `target` without running anything.
    pub fn transition(target: impl Into<State>) -> Self {
        Self {
            target: Some(target.into()),
            action: Action::none(),
        }
    }

    /// Shorthand for `Rule::to(target, Action::new(f))`.
    pub fn with<F>(target: impl Into<State>, f: F) -> Self
    where
        F: Fn(&P) -> Result<R, E> + 'static,
    {
        Self::to(target, Handler::new(f))
    }
}

impl<P, R, E> Clone for Rule<P, R, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            action: self.action.clone(),
        }
    }
}

impl<P, R, E> std::fmt::Debug for Rule<P, R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("target", &self.target)
            .field("action", &self.action)
            .finish()
    }
}
