//! The state machine: table, dispatcher and binder.
//!
//! # Architecture
//!
//! ```text
//! Host event ──► Dispatcher::dispatch ──► StateTable::lookup ──► Rule
//!                      │                                          │
//!                      │◄──────────── Action::invoke ◄────────────┘
//!                      ▼
//!                commit target state
//!
//! Plugins ──► Binder (bind / update / unbind / listen / hook) ──► StateTable
//! ```
//!
//! # Modules
//!
//! - [`action`]: handlers and handler chains
//! - [`binder`]: runtime registration API
//! - [`dispatcher`]: the callable core
//! - [`pattern`]: wildcard event keys
//! - [`rule`]: transition rules
//! - [`snapshot`]: serializable table views
//! - [`table`]: the state table
//!
//! # Example
//!
//! ```rust
//! use statewire::machine::{Binder, Dispatcher, Rule};
//!
//! let d: Dispatcher = Dispatcher::default();
//! d.bind("Idle", "start", Rule::transition("Running"));
//! d.fire("start")?;
//! assert_eq!(d.current_state().unwrap().as_str(), "Running");
//! # Ok::<(), statewire::BoxError>(())
//! ```

pub mod action;
pub mod binder;
pub mod dispatcher;
pub mod pattern;
pub mod rule;
pub mod snapshot;
pub mod table;

pub use action::{Action, ActionId, BoxError, Handler};
pub use binder::Binder;
pub use dispatcher::{Dispatcher, TransitionRecord};
pub use pattern::{is_pattern, ANY_EVENT};
pub use rule::Rule;
pub use snapshot::{ActionSnapshot, ContextSnapshot, RuleSnapshot, TableSnapshot};
pub use table::{Context, StateTable};
