//! statewire: an embeddable finite-state-machine event dispatcher.
//!
//! statewire maps (state, event) pairs to (next state, action) rules and runs
//! them as events arrive from a host event loop:
//! - Declarative tables built from nested `(state, [(event, rule)])` mappings
//! - Single actions or ordered handler chains, last result wins
//! - Runtime rebinding (`bind`, `update`, `unbind`, `listen`, `hook`) for
//!   independently loaded plugins sharing one dispatcher
//! - Any-state bindings and shell-style wildcard event keys
//! - Unbound events are ignored, action errors are returned untouched
//! - Debug hooks and a failure dump built on `tracing`

#![allow(clippy::multiple_crate_versions)]

//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Gate-keeper demo (main.rs)                         │  ← Entry point
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  Machine Layer (machine/)                           │
//! │  - StateTable: rules, current/default state         │
//! │  - Dispatcher: lookup, invoke, commit               │
//! │  - Binder: runtime mutation                         │
//! └─────────────────────────────────────────────────────┘
//!         │                                   │
//! ┌───────────────────────┐   ┌─────────────────────────┐
//! │ Domain (domain/)      │   │ Observability           │
//! │ - State, Event ids    │   │ - tracing setup         │
//! │ - Error types         │   │ - debug levels          │
//! └───────────────────────┘   │ - failure dump          │
//!                             └─────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`machine`]: State table, dispatcher and binder
//! - [`domain`]: Identifiers and error types
//! - [`infrastructure`]: Filesystem paths
//! - [`observability`]: Tracing, debug hooks, failure dump
//!
//! # Configuration
//!
//! Dispatcher options come from [`Config`], either parsed from `key=value`
//! pairs or from a TOML file:
//!
//! ```toml
//! default_state = "Locked"
//! debug = 1
//! fallback_to_default = true
//! dump_file = "~/.local/share/statewire/dump.jsonl"
//! trace_level = "info"
//! ```
//!
//! # Examples
//!
//! ## Gate keeper
//!
//! ```rust
//! use statewire::{Dispatcher, Rule, State, StateTable};
//!
//! let gate: Dispatcher = Dispatcher::new(StateTable::new(
//!     [
//!         ("Locked", vec![
//!             ("coin", Rule::with("Unlocked", |_: &()| Ok(()))),
//!             ("pass", Rule::with("Locked", |_: &()| Ok(()))),
//!         ]),
//!         ("Unlocked", vec![
//!             ("coin", Rule::with("Unlocked", |_: &()| Ok(()))),
//!             ("pass", Rule::with("Locked", |_: &()| Ok(()))),
//!         ]),
//!     ],
//!     Some(State::from("Locked")),
//! )?);
//!
//! for event in ["pass", "coin", "coin", "pass"] {
//!     gate.fire(event)?;
//! }
//! assert_eq!(gate.current_state(), Some(State::from("Locked")));
//! # Ok::<(), statewire::BoxError>(())
//! ```
//!
//! ## Plugins sharing a dispatcher
//!
//! ```rust
//! use statewire::{Binder, Dispatcher, Handler, Rule};
//! use std::rc::Rc;
//!
//! fn attach(handler: &Dispatcher) {
//!     handler.bind_any("page_closed", Rule::stay(Handler::new(|_: &()| Ok(()))));
//! }
//!
//! let shared = Rc::new(Dispatcher::default());
//! attach(&shared);
//! shared.fire("page_closed")?;
//! # Ok::<(), statewire::BoxError>(())
//! ```
//!
//! # Key Design Decisions
//!
//! ## Permissive Lookup
//!
//! Interactive event streams deliver far more events than any table binds, so a
//! miss is `Ok(None)` rather than an error. Only action failures surface.
//!
//! ## Commit After Success
//!
//! State moves only once every handler of the rule returned `Ok`. Nested
//! dispatches commit first; the outer rule commits last and wins.
//!
//! ## Single-Threaded
//!
//! The table lives in a `RefCell` and handlers are `Rc` callbacks. Multi-threaded
//! hosts add their own synchronization.

pub mod domain;
pub mod infrastructure;
pub mod machine;

pub mod observability;

pub use domain::{Event, Result, State, StateKey, StatewireError};
pub use machine::{
    Action, ActionId, Binder, BoxError, Dispatcher, Handler, Rule, StateTable, TableSnapshot,
    TransitionRecord, ANY_EVENT,
};
pub use observability::DebugLevel;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Dispatcher configuration.
///
/// # Example
///
/// ```toml
/// default_state = "Locked"
/// debug = 2
/// dump_file = "~/.local/share/statewire/dump.jsonl"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Initial state; must be a state of the table. Defaults to the first
    /// inserted state.
    pub default_state: Option<String>,

    /// Debug hook verbosity, 0–5. Default: 0
    pub debug: DebugLevel,

    /// Consult the default state's rules when the current state has none for an
    /// event. Default: `true`
    pub fallback_to_default: bool,

    /// Where failed actions are recorded. `~` is expanded; an empty string
    /// selects [`infrastructure::default_dump_path`]. Default: no dump.
    pub dump_file: Option<String>,

    /// Tracing filter, e.g. `info` or `statewire=debug`. Default: `"info"`
    pub trace_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_state: None,
            debug: DebugLevel::OFF,
            fallback_to_default: true,
            dump_file: None,
            trace_level: None,
        }
    }
}

impl Config {
    /// Parses configuration from a string map.
    ///
    /// # Parsing Rules
    ///
    /// - `default_state`, `trace_level`: taken verbatim, empty values ignored
    /// - `dump_file`: taken verbatim, empty means the default dump location
    /// - `debug`: `u8`, clamped to 5
    /// - `fallback_to_default`: `true`/`false`/`1`/`0`
    ///
    /// # Errors
    ///
    /// Returns [`StatewireError::Config`] for unknown keys or values that do not
    /// parse.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::collections::BTreeMap;
    /// use statewire::Config;
    ///
    /// let mut map = BTreeMap::new();
    /// map.insert("default_state".to_string(), "Locked".to_string());
    /// map.insert("debug".to_string(), "2".to_string());
    ///
    /// let config = Config::from_map(&map)?;
    /// assert_eq!(config.default_state.as_deref(), Some("Locked"));
    /// assert_eq!(config.debug.get(), 2);
    /// # Ok::<(), statewire::StatewireError>(())
    /// ```
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        let mut config = Self::default();

        for (key, value) in map {
            let value = value.trim();
            let text = (!value.is_empty()).then(|| value.to_string());
            match key.as_str() {
                "default_state" => config.default_state = text,
                "dump_file" => config.dump_file = Some(value.to_string()),
                "trace_level" => config.trace_level = text,
                "debug" => {
                    let level = value
                        .parse::<u8>()
                        .map_err(|e| StatewireError::Config(format!("debug {value:?}: {e}")))?;
                    config.debug = DebugLevel::new(level);
                }
                "fallback_to_default" => {
                    config.fallback_to_default = match value {
                        "true" | "1" => true,
                        "false" | "0" => false,
                        other => {
                            return Err(StatewireError::Config(format!(
                                "fallback_to_default expects true or false, got {other:?}"
                            )))
                        }
                    };
                }
                other => return Err(StatewireError::Config(format!("unknown key {other:?}"))),
            }
        }

        Ok(config)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`StatewireError::ConfigParse`] on malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(text)?;
        config.debug = DebugLevel::new(config.debug.get());
        Ok(config)
    }

    /// Resolved failure dump location, if a dump is configured.
    #[must_use]
    pub fn dump_path(&self) -> Option<PathBuf> {
        self.dump_file.as_deref().map(|path| {
            if path.is_empty() {
                infrastructure::default_dump_path()
            } else {
                infrastructure::expand_tilde(path)
            }
        })
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`StatewireError::Io`] if the file cannot be read, or
    /// [`StatewireError::ConfigParse`] if it does not parse.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }
}

/// Installs tracing from `config` and builds a dispatcher over `table`.
///
/// # Errors
///
/// Same as [`Dispatcher::from_config`].
pub fn initialize<P, R, E, K, I, Ev>(
    table: impl IntoIterator<Item = (K, I)>,
    config: &Config,
) -> Result<Dispatcher<P, R, E>>
where
    K: Into<StateKey>,
    I: IntoIterator<Item = (Ev, Rule<P, R, E>)>,
    Ev: Into<Event>,
{
    observability::init_tracing(config);
    tracing::debug!(?config, "initializing dispatcher");
    Dispatcher::from_config(table, config)
}
