//! State table: the (state × event → rule) mapping and the machine's position.
//!
//! [`StateTable`] owns every rule of a dispatcher together with the current,
//! previous and default state. It is a plain data structure: [`StateTable::lookup`]
//! is a pure read, and moving between states is left to the dispatcher, which
//! commits a transition only after the rule's action succeeded.
//!
//! # Layout
//!
//! ```text
//! StateTable
//! ├── [Locked]   Context { coin → Unlocked, pass → Locked }
//! ├── [Unlocked] Context { coin → Unlocked, pass → Locked }
//! └── [*]        Context { page_shown → (stay) }
//! ```
//!
//! Both maps keep insertion order, which only matters for display.
//!
//! # Example
//!
//! ```rust
//! use statewire::{Event, Rule, State, StateKey, StateTable};
//!
//! let table: StateTable = StateTable::new(
//!     [
//!         ("Locked", vec![("coin", Rule::transition("Unlocked"))]),
//!         ("Unlocked", vec![("pass", Rule::transition("Locked"))]),
//!     ],
//!     None,
//! )?;
//!
//! assert_eq!(table.current(), Some(&State::from("Locked")));
//! assert!(table.lookup(&StateKey::from("Locked"), &Event::from("coin")).is_some());
//! assert!(table.lookup(&StateKey::from("Locked"), &Event::from("pass")).is_none());
//! # Ok::<(), statewire::StatewireError>(())
//! ```

use crate::domain::{Event, Result, State, StateKey, StatewireError};
use crate::machine::action::{ActionId, BoxError, Handler};
use crate::machine::pattern::EventPatterns;
use crate::machine::rule::Rule;
use crate::machine::snapshot::{ActionSnapshot, ContextSnapshot, RuleSnapshot, TableSnapshot};
use indexmap::IndexMap;
use std::fmt;

/// Event → rule mapping of a single state.
pub struct Context<P = (), R = (), E = BoxError> {
    rules: IndexMap<Event, Rule<P, R, E>>,
    patterns: EventPatterns,
}

impl<P, R, E> Context<P, R, E> {
    fn new() -> Self {
        Self {
            rules: IndexMap::new(),
            patterns: EventPatterns::default(),
        }
    }

    fn reindex(&mut self) {
        self.patterns = EventPatterns::build(self.rules.keys());
    }

    /// Exact-key rule for `event`.
    #[must_use]
    pub fn get(&self, event: &Event) -> Option<&Rule<P, R, E>> {
        self.rules.get(event)
    }

    /// Exact key first, then wildcard keys by priority.
    ///
    /// Returns the key that matched alongside the rule.
    #[must_use]
    pub fn lookup(&self, event: &Event) -> Option<(&Event, &Rule<P, R, E>)> {
        if let Some(found) = self.rules.get_key_value(event) {
            return Some(found);
        }
        let key = self.patterns.find(event)?;
        self.rules.get_key_value(key)
    }

    fn insert(&mut self, event: Event, rule: Rule<P, R, E>) -> Option<Rule<P, R, E>> {
        let previous = self.rules.insert(event, rule);
        if previous.is_none() {
            self.reindex();
        }
        previous
    }

    fn remove(&mut self, event: &Event) -> Option<Rule<P, R, E>> {
        let removed = self.rules.shift_remove(event);
        if removed.is_some() {
            self.reindex();
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Event, &Rule<P, R, E>)> {
        self.rules.iter()
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.rules.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// The full rule table of a dispatcher plus its current position.
pub struct StateTable<P = (), R = (), E = BoxError> {
    contexts: IndexMap<StateKey, Context<P, R, E>>,
    default_state: Option<State>,
    current: Option<State>,
    previous: Option<State>,
    current_event: Option<Event>,
}

impl<P, R, E> StateTable<P, R, E> {
    /// A table with no states. `current()` stays `None` until the first named
    /// state is inserted, which then becomes both current and default.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            contexts: IndexMap::new(),
            default_state: None,
            current: None,
            previous: None,
            current_event: None,
        }
    }

    /// Builds a table from a nested `(state, [(event, rule)])` mapping.
    ///
    /// When `default_state` is omitted the first inserted named state becomes
    /// the default and the initial current state.
    ///
    /// # Errors
    ///
    /// Returns [`StatewireError::Config`] if `default_state` is given but is not
    /// a key of `table`.
    pub fn new<K, I, Ev>(table: impl IntoIterator<Item = (K, I)>, default_state: Option<State>) -> Result<Self>
    where
        K: Into<StateKey>,
        I: IntoIterator<Item = (Ev, Rule<P, R, E>)>,
        Ev: Into<Event>,
    {
        let mut this = Self::empty();
        this.merge(table);

        if let Some(default) = default_state {
            if !this.contains_state(&default) {
                return Err(StatewireError::Config(format!(
                    "default state {default:?} is not a state of the table"
                )));
            }
            this.default_state = Some(default);
            this.reset();
        }

        tracing::debug!(
            states = this.contexts.len(),
            default_state = ?this.default_state,
            "state table constructed"
        );

        Ok(this)
    }

    /// Looks up the rule for `event` in `state`.
    ///
    /// Tries the exact event key, then the state's wildcard keys. `None` means
    /// nothing matched. Never touches the current state.
    #[must_use]
    pub fn lookup(&self, state: &StateKey, event: &Event) -> Option<&Rule<P, R, E>> {
        self.lookup_matched(state, event).map(|(_, rule)| rule)
    }

    /// Like [`lookup`](Self::lookup), also returning the key that matched.
    #[must_use]
    pub fn lookup_matched(&self, state: &StateKey, event: &Event) -> Option<(&Event, &Rule<P, R, E>)> {
        self.contexts.get(state)?.lookup(event)
    }

    #[must_use]
    pub fn contains_state(&self, state: &State) -> bool {
        self.contexts.contains_key(&StateKey::Named(state.clone()))
    }

    #[must_use]
    pub fn context(&self, key: &StateKey) -> Option<&Context<P, R, E>> {
        self.contexts.get(key)
    }

    pub fn states(&self) -> impl Iterator<Item = &StateKey> {
        self.contexts.keys()
    }

    #[must_use]
    pub const fn current(&self) -> Option<&State> {
        self.current.as_ref()
    }

    #[must_use]
    pub const fn previous(&self) -> Option<&State> {
        self.previous.as_ref()
    }

    /// The event most recently delivered to the dispatcher.
    #[must_use]
    pub const fn current_event(&self) -> Option<&Event> {
        self.current_event.as_ref()
    }

    #[must_use]
    pub const fn default_state(&self) -> Option<&State> {
        self.default_state.as_ref()
    }

    /// Forces the current state without running any action.
    ///
    /// The target does not need to be registered.
    pub fn set_current(&mut self, state: impl Into<State>) {
        let state = state.into();
        tracing::debug!(from = ?self.current, to = %state, "current state overridden");
        self.current = Some(state);
        self.current_event = None;
    }

    /// Puts current and previous state back to the default state.
    pub fn reset(&mut self) {
        self.current.clone_from(&self.default_state);
        self.previous.clone_from(&self.default_state);
        self.current_event = None;
    }

    pub(crate) fn record_event(&mut self, event: &Event) {
        self.current_event = Some(event.clone());
    }

    /// Records a completed transition out of `from`.
    ///
    /// A `None` target leaves the current state as it is.
    pub(crate) fn commit(&mut self, from: Option<State>, target: Option<&State>) {
        self.previous = from;
        if let Some(target) = target {
            self.current = Some(target.clone());
        }
    }

    /// Inserts or replaces the rule for (`state`, `event`).
    pub fn insert_rule(
        &mut self,
        state: impl Into<StateKey>,
        event: impl Into<Event>,
        rule: Rule<P, R, E>,
    ) -> Option<Rule<P, R, E>> {
        let (state, event) = (state.into(), event.into());
        self.warn_if_dangling(&state, &event, rule.target.as_ref());
        let previous = self.insert_unchecked(state, event, rule);
        self.adopt_first_state();
        previous
    }

    /// Merges a nested mapping into the table, entry by entry.
    ///
    /// Every mentioned (state, event) is inserted or replaced; everything else is
    /// left alone.
    pub fn merge<K, I, Ev>(&mut self, partial: impl IntoIterator<Item = (K, I)>)
    where
        K: Into<StateKey>,
        I: IntoIterator<Item = (Ev, Rule<P, R, E>)>,
        Ev: Into<Event>,
    {
        let mut touched = Vec::new();
        for (state, rules) in partial {
            let state = state.into();
            self.contexts.entry(state.clone()).or_insert_with(Context::new);
            for (event, rule) in rules {
                let event = event.into();
                touched.push((state.clone(), event.clone(), rule.target.clone()));
                self.insert_unchecked(state.clone(), event, rule);
            }
        }

        // targets may be registered later in the same mapping
        for (state, event, target) in &touched {
            self.warn_if_dangling(state, event, target.as_ref());
        }
        self.adopt_first_state();
    }

    /// Removes the rule for (`state`, `event`), if any.
    ///
    /// The state itself stays registered even when its last rule goes.
    pub fn remove_rule(&mut self, state: &StateKey, event: &Event) -> Option<Rule<P, R, E>> {
        self.contexts.get_mut(state)?.remove(event)
    }

    /// Appends `handler` to the chain of (`state`, `event`), creating the rule
    /// when absent.
    ///
    /// If a rule exists with a different target, the target is replaced and a
    /// warning is logged since other listeners on that rule move too.
    pub fn append_handler(
        &mut self,
        state: impl Into<StateKey>,
        event: impl Into<Event>,
        target: Option<State>,
        handler: Handler<P, R, E>,
    ) -> ActionId {
        let (state, event) = (state.into(), event.into());
        let id = handler.id();

        let existing = self
            .contexts
            .get_mut(&state)
            .and_then(|context| context.rules.get_mut(&event));

        match existing {
            Some(rule) => {
                if rule.target != target {
                    tracing::warn!(
                        state = %state,
                        event = %event,
                        old_target = ?rule.target,
                        new_target = ?target,
                        "listener changes the target of an existing rule"
                    );
                    rule.target = target;
                }
                rule.action.push(handler);
            }
            None => {
                self.warn_if_dangling(&state, &event, target.as_ref());
                self.insert_unchecked(
                    state,
                    event,
                    Rule {
                        target,
                        action: handler.into(),
                    },
                );
                self.adopt_first_state();
            }
        }
        id
    }

    /// Removes one handler from the chain of (`state`, `event`).
    ///
    /// Drops the whole rule once its chain is empty. Returns whether a handler
    /// was removed.
    pub fn remove_handler(&mut self, state: &StateKey, event: &Event, id: ActionId) -> bool {
        let Some(context) = self.contexts.get_mut(state) else {
            return false;
        };
        let Some(rule) = context.rules.get_mut(event) else {
            return false;
        };
        if !rule.action.remove(id) {
            return false;
        }
        if rule.action.is_empty() {
            context.remove(event);
        }
        true
    }

    /// Serializable view of every rule, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> TableSnapshot {
        let states = self
            .contexts
            .iter()
            .map(|(state, context)| ContextSnapshot {
                state: state.clone(),
                rules: context
                    .iter()
                    .map(|(event, rule)| RuleSnapshot {
                        event: event.clone(),
                        target: rule.target.clone(),
                        actions: rule
                            .action
                            .handlers()
                            .iter()
                            .map(|h| ActionSnapshot {
                                id: h.id(),
                                name: h.name().to_string(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        TableSnapshot {
            default_state: self.default_state.clone(),
            current: self.current.clone(),
            states,
        }
    }

    fn insert_unchecked(&mut self, state: StateKey, event: Event, rule: Rule<P, R, E>) -> Option<Rule<P, R, E>> {
        self.contexts
            .entry(state)
            .or_insert_with(Context::new)
            .insert(event, rule)
    }

    fn warn_if_dangling(&self, state: &StateKey, event: &Event, target: Option<&State>) {
        if let Some(target) = target {
            if !self.contains_state(target) && state.as_state() != Some(target) {
                tracing::warn!(
                    state = %state,
                    event = %event,
                    target = %target,
                    "transition targets a state with no rules"
                );
            }
        }
    }

    fn adopt_first_state(&mut self) {
        if self.current.is_some() || self.default_state.is_some() {
            return;
        }
        if let Some(first) = self.contexts.keys().find_map(StateKey::as_state).cloned() {
            self.default_state = Some(first);
            self.reset();
        }
    }
}

impl<P, R, E> Default for StateTable<P, R, E> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<P, R, E> fmt::Display for StateTable<P, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (state, context) in &self.contexts {
            writeln!(f, "[ {state} ]")?;
            for (event, rule) in context.iter() {
                let target = rule.target.as_ref().map_or("(stay)", State::as_str);
                let names = rule.action.names().join(", ");
                writeln!(f, "{event:>32} : {target:<12} {names}")?;
            }
        }
        Ok(())
    }
}

impl<P, R, E> fmt::Debug for StateTable<P, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTable")
            .field("states", &self.contexts.keys().collect::<Vec<_>>())
            .field("default_state", &self.default_state)
            .field("current", &self.current)
            .field("previous", &self.previous)
            .finish_non_exhaustive()
    }
}
