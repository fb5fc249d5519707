//! The dispatcher: event in, action run, state committed.
//!
//! [`Dispatcher::dispatch`] is the single entry point hosts call once per incoming
//! interaction (keypress, lifecycle notification, control change).
//!
//! # Dispatch Sequence
//!
//! 1. Snapshot the current state `s` and look up `(s, event)`
//! 2. On a miss, optionally try the default state, then the any-state
//! 3. On a miss everywhere, return `Ok(None)`; unbound events are normal
//! 4. Release the table and run the rule's action with the payload
//! 5. On success commit the rule's target; on failure commit nothing and hand
//!    the error back unmodified
//!
//! # Re-entrancy
//!
//! Actions get `&Dispatcher` and may call `dispatch` or any binder method. The
//! table is never borrowed while an action runs, so nested calls see every
//! commit made so far. The outer commit happens last and always applies the
//! outer rule's target, overwriting whatever a nested dispatch left behind:
//!
//! ```text
//! dispatch(A) from S0         rule (S0, A) → S1
//! └── action A
//!     └── dispatch(B)         rule (S0, B) → S2   commits S2
//! commit S1                   final state is S1, not S2
//! ```
//!
//! # Threading
//!
//! `Dispatcher` is single-threaded (`!Sync`). Hosts that share one across
//! threads must wrap it in their own lock.

use crate::domain::{Event, Result, State, StateKey};
use crate::machine::action::BoxError;
use crate::machine::rule::Rule;
use crate::machine::snapshot::TableSnapshot;
use crate::machine::table::StateTable;
use crate::observability::{DebugLevel, DumpWriter, FailureReport};
use crate::Config;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// A committed transition, as passed to [`Dispatcher::on_transition`] observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRecord {
    /// Event as delivered by the host.
    pub event: Event,
    /// Table key that matched; differs from `event` for wildcard keys.
    pub matched: Event,
    /// Table entry the rule came from.
    pub scope: StateKey,
    pub from: Option<State>,
    pub to: Option<State>,
    pub actions: Vec<String>,
}

type Observer = Rc<dyn Fn(&TransitionRecord)>;

struct Resolved<P, R, E> {
    scope: StateKey,
    matched: Event,
    rule: Rule<P, R, E>,
}

/// Finite-state-machine event dispatcher over a [`StateTable`].
///
/// `P` is the payload type handed to actions, `R` their result, `E` their error.
///
/// # Example
///
/// ```rust
/// use statewire::{Dispatcher, Rule, State, StateTable};
///
/// let table = StateTable::new(
///     [
///         ("Locked", vec![("coin", Rule::with("Unlocked", |_: &()| Ok("unlocked")))]),
///         ("Unlocked", vec![("pass", Rule::with("Locked", |_: &()| Ok("locked")))]),
///     ],
///     Some(State::from("Locked")),
/// )?;
/// let gate: Dispatcher<(), &str> = Dispatcher::new(table);
///
/// assert_eq!(gate.fire("coin")?, Some("unlocked"));
/// assert_eq!(gate.current_state(), Some(State::from("Unlocked")));
/// assert_eq!(gate.fire("kick")?, None);
/// # Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
/// ```
pub struct Dispatcher<P = (), R = (), E = BoxError> {
    table: RefCell<StateTable<P, R, E>>,
    debug: DebugLevel,
    fallback_to_default: bool,
    dump: Option<DumpWriter>,
    observer: Option<Observer>,
    depth: Cell<usize>,
}

impl<P, R, E> Dispatcher<P, R, E> {
    #[must_use]
    pub fn new(table: StateTable<P, R, E>) -> Self {
        Self {
            table: RefCell::new(table),
            debug: DebugLevel::OFF,
            fallback_to_default: true,
            dump: None,
            observer: None,
            depth: Cell::new(0),
        }
    }

    /// Builds the table and applies every dispatcher option from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StatewireError::Config`] when `config.default_state` is
    /// not a state of `table`.
    pub fn from_config<K, I, Ev>(table: impl IntoIterator<Item = (K, I)>, config: &Config) -> Result<Self>
    where
        K: Into<StateKey>,
        I: IntoIterator<Item = (Ev, Rule<P, R, E>)>,
        Ev: Into<Event>,
    {
        let table = StateTable::new(table, config.default_state.clone().map(State::from))?;
        let mut this = Self::new(table)
            .with_debug(config.debug)
            .with_default_fallback(config.fallback_to_default);
        if let Some(path) = config.dump_path() {
            this = this.with_dump(DumpWriter::new(path));
        }
        Ok(this)
    }

    #[must_use]
    pub fn with_debug(mut self, level: impl Into<DebugLevel>) -> Self {
        self.debug = level.into();
        self
    }

    /// Whether the default state's rules are consulted when the current state
    /// has no rule for an event (before the any-state). On by default.
    #[must_use]
    pub const fn with_default_fallback(mut self, enabled: bool) -> Self {
        self.fallback_to_default = enabled;
        self
    }

    #[must_use]
    pub fn with_dump(mut self, writer: DumpWriter) -> Self {
        self.dump = Some(writer);
        self
    }

    /// Registers a callback run after every committed transition.
    #[must_use]
    pub fn on_transition(mut self, observer: impl Fn(&TransitionRecord) + 'static) -> Self {
        self.observer = Some(Rc::new(observer));
        self
    }

    #[must_use]
    pub const fn debug_level(&self) -> DebugLevel {
        self.debug
    }

    #[must_use]
    pub fn current_state(&self) -> Option<State> {
        self.table.borrow().current().cloned()
    }

    #[must_use]
    pub fn previous_state(&self) -> Option<State> {
        self.table.borrow().previous().cloned()
    }

    #[must_use]
    pub fn current_event(&self) -> Option<Event> {
        self.table.borrow().current_event().cloned()
    }

    /// Forces the current state without running any action.
    pub fn set_current(&self, state: impl Into<State>) {
        self.table.borrow_mut().set_current(state);
    }

    /// Returns to the default state.
    pub fn reset(&self) {
        self.table.borrow_mut().reset();
    }

    /// Rule registered for (`state`, `event`), cloned out of the table.
    #[must_use]
    pub fn lookup(&self, state: &StateKey, event: &Event) -> Option<Rule<P, R, E>> {
        self.table.borrow().lookup(state, event).cloned()
    }

    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        self.table.borrow().snapshot()
    }

    /// Runs `f` with shared access to the table.
    ///
    /// # Panics
    ///
    /// Panics if `f` calls a binder method or `dispatch` on this dispatcher.
    pub fn with_table<T>(&self, f: impl FnOnce(&StateTable<P, R, E>) -> T) -> T {
        f(&self.table.borrow())
    }

    pub(crate) fn with_table_mut<T>(&self, f: impl FnOnce(&mut StateTable<P, R, E>) -> T) -> T {
        f(&mut self.table.borrow_mut())
    }

    fn resolve(&self, table: &StateTable<P, R, E>, from: Option<&State>, event: &Event) -> Option<Resolved<P, R, E>> {
        let mut scopes = Vec::with_capacity(3);
        if let Some(state) = from {
            scopes.push(StateKey::Named(state.clone()));
        }
        if self.fallback_to_default {
            if let Some(default) = table.default_state().filter(|d| Some(*d) != from) {
                scopes.push(StateKey::Named(default.clone()));
            }
        }
        scopes.push(StateKey::Any);

        scopes.into_iter().find_map(|scope| {
            let (matched, rule) = table
                .lookup_matched(&scope, event)
                .map(|(matched, rule)| (matched.clone(), rule.clone()))?;
            Some(Resolved { scope, matched, rule })
        })
    }

    fn log_transition(&self, record: &TransitionRecord, event_changed: bool) {
        let moved = record.from != record.to;
        let has_actions = !record.actions.is_empty();
        let visible = if record.scope.is_any() {
            self.debug.any_state() && (has_actions || self.debug.everything())
        } else {
            (self.debug.transitions() && moved)
                || (self.debug.events() && event_changed)
                || (self.debug.actions() && has_actions)
                || self.debug.any_state()
        };

        if visible {
            let marker = if moved { "*" } else { " " };
            tracing::info!(
                marker,
                from = ?record.from,
                to = ?record.to,
                event = %record.event,
                scope = %record.scope,
                actions = %record.actions.join(", "),
                "transition"
            );
        } else {
            tracing::trace!(from = ?record.from, to = ?record.to, event = %record.event, "transition");
        }
    }
}

impl<P, R, E: fmt::Display> Dispatcher<P, R, E> {
    /// Delivers `event` with `payload` and returns the action's result.
    ///
    /// Returns `Ok(None)` without touching the state when no rule matches, or
    /// when the matching rule has no handlers.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a handler, unmodified. The rule's
    /// transition is not committed in that case.
    ///
    /// # Panics
    ///
    /// Panics if called from inside [`Dispatcher::with_table`].
    pub fn dispatch(&self, event: impl Into<Event>, payload: &P) -> std::result::Result<Option<R>, E> {
        let event = event.into();
        let depth = self.depth.get();
        let _span = tracing::debug_span!("dispatch", event = %event, depth).entered();

        let (from, event_changed, resolved) = {
            let mut table = self.table.borrow_mut();
            let event_changed = table.current_event() != Some(&event);
            table.record_event(&event);
            let from = table.current().cloned();
            let resolved = self.resolve(&table, from.as_ref(), &event);
            (from, event_changed, resolved)
        };

        let Some(Resolved { scope, matched, rule }) = resolved else {
            if self.debug.any_state() {
                tracing::info!(event = %event, state = ?from, "unbound event ignored");
            } else {
                tracing::trace!(event = %event, state = ?from, "unbound event ignored");
            }
            return Ok(None);
        };

        self.depth.set(depth + 1);
        let outcome = rule.action.invoke(self, payload);
        self.depth.set(depth);

        match outcome {
            Ok(value) => {
                let to = {
                    let mut table = self.table.borrow_mut();
                    table.commit(from.clone(), rule.target.as_ref());
                    table.current().cloned()
                };
                let record = TransitionRecord {
                    event,
                    matched,
                    scope,
                    from,
                    to,
                    actions: rule.action.names(),
                };
                self.log_transition(&record, event_changed);
                if let Some(observer) = &self.observer {
                    observer(&record);
                }
                Ok(value)
            }
            Err(error) => {
                let state = self.current_state();
                tracing::warn!(
                    event = %event,
                    matched = %matched,
                    from = ?from,
                    state = ?state,
                    error = %error,
                    "action failed, transition not committed"
                );
                if let Some(dump) = &self.dump {
                    let report =
                        FailureReport::now(event, matched, from, state, rule.action.names(), error.to_string());
                    if let Err(e) = dump.write_report(&report) {
                        tracing::debug!(path = %dump.path().display(), error = %e, "failed to write failure dump");
                    }
                }
                Err(error)
            }
        }
    }
}

impl<R, E: fmt::Display> Dispatcher<(), R, E> {
    /// Dispatches an event that carries no payload.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::dispatch`].
    pub fn fire(&self, event: impl Into<Event>) -> std::result::Result<Option<R>, E> {
        self.dispatch(event, &())
    }
}

impl<P, R, E> Default for Dispatcher<P, R, E> {
    fn default() -> Self {
        Self::new(StateTable::empty())
    }
}

impl<P, R, E> fmt::Display for Dispatcher<P, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.table.borrow(), f)
    }
}

impl<P, R, E> fmt::Debug for Dispatcher<P, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("table", &self.table)
            .field("debug", &self.debug)
            .field("fallback_to_default", &self.fallback_to_default)
            .field("dump", &self.dump)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::action::{Action, Handler};
    use std::cell::RefCell;

    fn traced(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Handler<(), &'static str> {
        let log = Rc::clone(log);
        Handler::new(move |_: &()| {
            log.borrow_mut().push(name);
            Ok(name)
        })
        .named(name)
    }

    #[test]
    fn chain_returns_last_result() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let table = StateTable::new(
            [(
                "Idle",
                vec![("go", Rule::to("Idle", Action::chain([traced(&log, "a"), traced(&log, "b")])))],
            )],
            None,
        )
        .unwrap();
        let d: Dispatcher<(), &str> = Dispatcher::new(table);

        assert_eq!(d.fire("go").unwrap(), Some("b"));
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn chain_stops_at_first_error() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let failing: Handler<(), &str> = Handler::new(|_: &()| Err("jammed".into()));
        let table = StateTable::new(
            [(
                "Idle",
                vec![("go", Rule::to("Busy", Action::chain([traced(&log, "a"), failing, traced(&log, "c")])))],
            )],
            None,
        )
        .unwrap();
        let d: Dispatcher<(), &str> = Dispatcher::new(table);

        let err = d.fire("go").unwrap_err();
        assert_eq!(err.to_string(), "jammed");
        assert_eq!(*log.borrow(), vec!["a"]);
        assert_eq!(d.current_state(), Some(State::from("Idle")));
    }

    #[test]
    fn empty_chain_is_pure_transition() {
        let table: StateTable = StateTable::new([("A", vec![("go", Rule::transition("B"))])], None).unwrap();
        let d = Dispatcher::new(table);
        assert_eq!(d.fire("go").unwrap(), None);
        assert_eq!(d.current_state(), Some(State::from("B")));
        assert_eq!(d.previous_state(), Some(State::from("A")));
    }

    #[test]
    fn unmapped_events_fall_back_to_default_state() {
        let table = || -> StateTable {
            StateTable::new(
                [
                    ("Home", vec![("help", Rule::transition("Home"))]),
                    ("Away", vec![("back", Rule::transition("Home"))]),
                ],
                None,
            )
            .unwrap()
        };

        let lenient = Dispatcher::new(table());
        lenient.set_current("Away");
        lenient.fire("help").unwrap();
        assert_eq!(lenient.current_state(), Some(State::from("Home")));
        assert_eq!(lenient.previous_state(), Some(State::from("Away")));

        let strict = Dispatcher::new(table()).with_default_fallback(false);
        strict.set_current("Away");
        strict.fire("help").unwrap();
        assert_eq!(strict.current_state(), Some(State::from("Away")));
    }

    #[test]
    fn observer_sees_committed_transitions() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let table: StateTable =
            StateTable::new([("A", vec![("*", Rule::transition("B"))]), ("B", vec![])], None).unwrap();
        let d = Dispatcher::new(table).on_transition(move |r| sink.borrow_mut().push(r.clone()));

        d.fire("anything").unwrap();
        d.fire("ignored").unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].matched.as_str(), "*");
        assert_eq!(seen[0].event.as_str(), "anything");
        assert_eq!(seen[0].to, Some(State::from("B")));
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn named(name: &'static str) -> Handler {
        Handler::new(|_: &()| Ok(())).named(name)
    }

    /// Runs coin, pass, pass, tick, kick through a turnstile at `level` and
    /// returns the `info` lines it logged.
    fn hook_output(level: u8) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .without_time()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let table: StateTable = StateTable::new(
                [
                    (StateKey::from("Locked"), vec![("coin", Rule::to("Unlocked", named("open_gate")))]),
                    (StateKey::from("Unlocked"), vec![("pass", Rule::stay(named("count_pass")))]),
                    (StateKey::Any, vec![("tick", Rule::stay(named("tick_any")))]),
                ],
                None,
            )
            .unwrap();
            let d = Dispatcher::new(table).with_debug(level);
            for event in ["coin", "pass", "pass", "tick", "kick"] {
                d.fire(event).unwrap();
            }
        });

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn count(output: &str, needle: &str) -> usize {
        output.lines().filter(|line| line.contains(needle)).count()
    }

    #[test]
    fn debug_level_gates_transition_logging() {
        let off = hook_output(0);
        assert_eq!(count(&off, "transition"), 0);

        let moves = hook_output(1);
        assert_eq!(count(&moves, "actions=open_gate"), 1);
        assert_eq!(count(&moves, "actions=count_pass"), 0);
        assert_eq!(count(&moves, "actions=tick_any"), 0);

        let events = hook_output(2);
        assert_eq!(count(&events, "actions=count_pass"), 1);

        let actions = hook_output(3);
        assert_eq!(count(&actions, "actions=open_gate"), 1);
        assert_eq!(count(&actions, "actions=count_pass"), 2);
        assert_eq!(count(&actions, "actions=tick_any"), 0);
        assert_eq!(count(&actions, "unbound event ignored"), 0);

        let any_state = hook_output(4);
        assert_eq!(count(&any_state, "actions=tick_any"), 1);
        assert_eq!(count(&any_state, "unbound event ignored"), 1);
    }

    #[test]
    fn current_event_tracks_last_dispatch() {
        let d: Dispatcher = Dispatcher::default();
        d.fire("page_shown").unwrap();
        assert_eq!(d.current_event(), Some(Event::from("page_shown")));
    }
}
