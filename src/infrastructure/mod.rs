//! Infrastructure layer for filesystem and environment interactions.
//!
//! Everything here is about where files live: the data directory used for the
//! failure dump and `~` expansion for paths coming from configuration.

pub mod paths;

pub use paths::{default_dump_path, expand_tilde, get_data_dir};
