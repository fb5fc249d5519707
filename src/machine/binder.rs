//! Runtime registration API.
//!
//! Plugins receive a shared `&Dispatcher` from the container that owns it and
//! attach behavior through [`Binder`]. Every method mutates the live table in
//! place; there is no versioning and the last registration wins. Binder calls
//! are allowed from inside a running action and take effect for the very next
//! lookup, including nested dispatches of the same chain.
//!
//! # Example
//!
//! ```rust
//! use statewire::{Binder, Dispatcher, Handler, Rule, State};
//!
//! let panel: Dispatcher = Dispatcher::default();
//! panel.update([("Idle", vec![("open", Rule::transition("Shown"))])]);
//! panel.update([("Shown", vec![("close", Rule::transition("Idle"))])]);
//!
//! // Fires from any state; never moves the machine.
//! panel.bind_any("page_shown", Rule::stay(Handler::new(|_: &()| Ok(()))));
//!
//! panel.fire("open")?;
//! panel.fire("page_shown")?;
//! assert_eq!(panel.current_state(), Some(State::from("Shown")));
//! # Ok::<(), statewire::BoxError>(())
//! ```

use crate::domain::{Event, State, StateKey};
use crate::machine::action::{ActionId, Handler};
use crate::machine::dispatcher::Dispatcher;
use crate::machine::rule::Rule;

/// Mutation operations on a dispatcher's table.
pub trait Binder<P, R, E> {
    /// Inserts or overwrites the rule for (`state`, `event`).
    ///
    /// Returns the rule it replaced.
    fn bind(
        &self,
        state: impl Into<StateKey>,
        event: impl Into<Event>,
        rule: Rule<P, R, E>,
    ) -> Option<Rule<P, R, E>>;

    /// Binds `rule` on the any-state, so it fires whatever the current state is
    /// (unless that state has its own rule for `event`).
    fn bind_any(&self, event: impl Into<Event>, rule: Rule<P, R, E>) -> Option<Rule<P, R, E>> {
        self.bind(StateKey::Any, event, rule)
    }

    /// Merges a nested `(state, [(event, rule)])` mapping entry by entry.
    fn update<K, I, Ev>(&self, partial: impl IntoIterator<Item = (K, I)>)
    where
        K: Into<StateKey>,
        I: IntoIterator<Item = (Ev, Rule<P, R, E>)>,
        Ev: Into<Event>;

    /// Removes the rule for (`state`, `event`). No-op when absent.
    fn unbind(&self, state: impl Into<StateKey>, event: impl Into<Event>) -> Option<Rule<P, R, E>>;

    /// Appends `handler` to the chain of (`state`, `event`).
    ///
    /// Creates the rule with `target` when absent; otherwise the existing
    /// listeners keep running first and the rule's target becomes `target`.
    fn listen(
        &self,
        state: impl Into<StateKey>,
        event: impl Into<Event>,
        target: Option<State>,
        handler: Handler<P, R, E>,
    ) -> ActionId;

    /// Removes one handler previously added with [`listen`](Self::listen).
    fn unlisten(&self, state: impl Into<StateKey>, event: impl Into<Event>, id: ActionId) -> bool;

    /// Registers a one-shot any-state listener that removes itself before it
    /// runs for the first time.
    fn hook(&self, event: impl Into<Event>, handler: Handler<P, R, E>) -> ActionId;
}

impl<P: 'static, R: 'static, E: 'static> Binder<P, R, E> for Dispatcher<P, R, E> {
    fn bind(
        &self,
        state: impl Into<StateKey>,
        event: impl Into<Event>,
        rule: Rule<P, R, E>,
    ) -> Option<Rule<P, R, E>> {
        let (state, event) = (state.into(), event.into());
        tracing::debug!(state = %state, event = %event, target = ?rule.target, "binding rule");
        self.with_table_mut(|table| table.insert_rule(state, event, rule))
    }

    fn update<K, I, Ev>(&self, partial: impl IntoIterator<Item = (K, I)>)
    where
        K: Into<StateKey>,
        I: IntoIterator<Item = (Ev, Rule<P, R, E>)>,
        Ev: Into<Event>,
    {
        self.with_table_mut(|table| table.merge(partial));
        tracing::debug!("table updated");
    }

    fn unbind(&self, state: impl Into<StateKey>, event: impl Into<Event>) -> Option<Rule<P, R, E>> {
        let (state, event) = (state.into(), event.into());
        let removed = self.with_table_mut(|table| table.remove_rule(&state, &event));
        tracing::debug!(state = %state, event = %event, removed = removed.is_some(), "unbinding rule");
        removed
    }

    fn listen(
        &self,
        state: impl Into<StateKey>,
        event: impl Into<Event>,
        target: Option<State>,
        handler: Handler<P, R, E>,
    ) -> ActionId {
        let (state, event) = (state.into(), event.into());
        tracing::debug!(state = %state, event = %event, handler = %handler.name(), "adding listener");
        self.with_table_mut(|table| table.append_handler(state, event, target, handler))
    }

    fn unlisten(&self, state: impl Into<StateKey>, event: impl Into<Event>, id: ActionId) -> bool {
        let (state, event) = (state.into(), event.into());
        self.with_table_mut(|table| table.remove_handler(&state, &event, id))
    }

    fn hook(&self, event: impl Into<Event>, handler: Handler<P, R, E>) -> ActionId {
        let event = event.into();
        let id = ActionId::next();
        let name = handler.name().to_string();
        let key = event.clone();

        let once = Handler::with_dispatcher(move |dispatcher: &Self, payload: &P| {
            dispatcher.unlisten(StateKey::Any, key.clone(), id);
            handler.call(dispatcher, payload)
        })
        .named(name)
        .with_id(id);

        self.listen(StateKey::Any, event, None, once)
    }
}
