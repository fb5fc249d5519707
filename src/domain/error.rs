//! Error types for the statewire dispatcher.
//!
//! This module defines the centralized error type [`StatewireError`] and a type alias
//! [`Result`] for the fallible parts of the crate: table construction, configuration
//! loading and the failure dump. Errors raised by action callbacks are never wrapped
//! in this type; they reach the caller of `dispatch` unmodified.

use thiserror::Error;

/// The main error type for statewire operations.
///
/// Only construction and ambient concerns (configuration, dump file I/O, snapshot
/// serialization) fail with this type. An event with no matching rule is not an
/// error at all.
///
/// # Examples
///
/// ```
/// use statewire::{State, StateTable, StatewireError};
///
/// let table: Result<StateTable, _> =
///     StateTable::new(Vec::<(State, Vec<(&str, statewire::Rule)>)>::new(), Some(State::from("Locked")));
/// assert!(matches!(table, Err(StatewireError::Config(_))));
/// ```
#[derive(Debug, Error)]
pub enum StatewireError {
    /// Configuration is invalid.
    ///
    /// Raised at construction time when an explicitly declared default state is
    /// not a key of the supplied table, or when a configuration value is malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem or I/O operation failed.
    ///
    /// Wraps errors from reading configuration files or writing the failure dump.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A TOML configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A table snapshot or failure report could not be serialized.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized `Result` type for statewire operations.
pub type Result<T> = std::result::Result<T, StatewireError>;
