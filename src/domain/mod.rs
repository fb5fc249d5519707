//! Domain layer for statewire.
//!
//! This module contains the identifier and error types shared by every other
//! layer, independent of how tables are stored or how actions run.
//!
//! # Organization
//!
//! - [`error`]: Error types and result aliases
//! - [`ids`]: State, event and table-key identifiers
//!
//! # Examples
//!
//! ```
//! use statewire::domain::{Event, State, StateKey};
//!
//! let locked = State::from("Locked");
//! let key: StateKey = locked.clone().into();
//! assert_eq!(key.as_state(), Some(&locked));
//! assert_eq!(Event::from("coin").as_str(), "coin");
//! ```

pub mod error;
pub mod ids;

pub use error::{Result, StatewireError};
pub use ids::{Event, State, StateKey};
