//! Verbosity levels for dispatcher debug hooks.
//!
//! Each level includes everything below it:
//!
//! | level | logged                                              |
//! |-------|-----------------------------------------------------|
//! | 0     | nothing beyond regular `trace!` events              |
//! | 1     | state transitions                                   |
//! | 2     | events that differ from the previous event          |
//! | 3     | actions executed from named states                  |
//! | 4     | actions executed from the any-state, unbound events |
//! | 5     | every dispatch                                      |
//!
//! Hooks are emitted at `info` level so they show up under the default filter.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebugLevel(u8);

impl DebugLevel {
    pub const OFF: Self = Self(0);
    pub const MAX: Self = Self(5);

    /// Levels above [`DebugLevel::MAX`] are clamped.
    #[must_use]
    pub const fn new(level: u8) -> Self {
        if level > Self::MAX.0 {
            Self::MAX
        } else {
            Self(level)
        }
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn transitions(self) -> bool {
        self.0 >= 1
    }

    #[must_use]
    pub const fn events(self) -> bool {
        self.0 >= 2
    }

    #[must_use]
    pub const fn actions(self) -> bool {
        self.0 >= 3
    }

    #[must_use]
    pub const fn any_state(self) -> bool {
        self.0 >= 4
    }

    #[must_use]
    pub const fn everything(self) -> bool {
        self.0 >= 5
    }
}

impl From<u8> for DebugLevel {
    fn from(level: u8) -> Self {
        Self::new(level)
    }
}
