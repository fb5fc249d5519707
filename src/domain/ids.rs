//! State and event identifiers.
//!
//! States and events are plain string tokens wrapped in newtypes so the two can
//! never be mixed up in a signature. [`StateKey`] adds the reserved any-state
//! pseudo-key used for bindings that fire regardless of the current state.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Named mode of a dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(String);

impl State {
    /// Creates a state identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Named trigger delivered to a dispatcher by its host.
///
/// Event keys stored in a table may contain shell-style wildcards
/// (`*`, `?`, `[...]`); events passed to `dispatch` are always matched literally
/// against them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(String);

impl Event {
    /// Creates an event identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_id_impls {
    ($ty:ident) => {
        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&$ty> for $ty {
            fn from(id: &$ty) -> Self {
                id.clone()
            }
        }

        impl Borrow<str> for $ty {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(&self.0)
            }
        }
    };
}

string_id_impls!(State);
string_id_impls!(Event);

/// Key of a state table entry.
///
/// `Any` is the reserved wildcard state. Rules registered under it fire from
/// every state, but only when the current state has no rule of its own for the
/// event. It serializes as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateKey {
    /// Matches whatever the current state is.
    Any,
    /// A concrete state.
    Named(State),
}

impl StateKey {
    /// Returns the concrete state, if any.
    #[must_use]
    pub const fn as_state(&self) -> Option<&State> {
        match self {
            Self::Any => None,
            Self::Named(state) => Some(state),
        }
    }

    #[must_use]
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl From<State> for StateKey {
    fn from(state: State) -> Self {
        Self::Named(state)
    }
}

impl From<&State> for StateKey {
    fn from(state: &State) -> Self {
        Self::Named(state.clone())
    }
}

impl From<&str> for StateKey {
    fn from(s: &str) -> Self {
        Self::Named(State::from(s))
    }
}

impl From<String> for StateKey {
    fn from(s: String) -> Self {
        Self::Named(State::from(s))
    }
}

impl From<Option<State>> for StateKey {
    fn from(state: Option<State>) -> Self {
        state.map_or(Self::Any, Self::Named)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.pad("*"),
            Self::Named(state) => fmt::Display::fmt(state, f),
        }
    }
}
