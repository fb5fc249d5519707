//! Logging, debug hooks and the failure dump.
//!
//! All diagnostics go through `tracing`. The crate never installs a subscriber
//! on its own; hosts either bring theirs or call [`init_tracing`].
//!
//! # Features
//!
//! - **Structured spans**: every dispatch runs inside a `dispatch` span carrying
//!   the event and nesting depth
//! - **Debug hooks**: [`DebugLevel`] selects which transitions, events and
//!   actions are logged at `info`
//! - **Failure dump**: [`DumpWriter`] appends a JSON line per failed action,
//!   rotating at 10 MB with 3 backups
//!
//! # Configuration
//!
//! Filter level comes from `RUST_LOG`, then `trace_level` in [`crate::Config`],
//! then `"info"`.
//!
//! # Modules
//!
//! - `init`: subscriber setup
//! - `debug`: verbosity levels for debug hooks
//! - `dump`: rotating failure dump

mod debug;
mod dump;
mod init;

pub use debug::DebugLevel;
pub use dump::{DumpWriter, FailureReport};
pub use init::init_tracing;
