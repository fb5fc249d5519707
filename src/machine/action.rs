//! Actions executed when a rule fires.
//!
//! An [`Action`] is either a single [`Handler`] or an ordered chain of them. Both
//! shapes run through [`Action::invoke`], so the dispatcher has one execution path:
//! every handler in the chain receives the same payload, and the value of the last
//! one becomes the dispatch result.
//!
//! Handlers receive the [`Dispatcher`] that invoked them in addition to the payload.
//! This is what makes re-entrant dispatch and self-rebinding possible without the
//! handler holding a reference-counted handle to its own dispatcher.
//!
//! # Example
//!
//! ```rust
//! use statewire::{Action, Handler};
//!
//! let log: Action<i32, i32> = Action::chain([
//!     Handler::new(|n: &i32| Ok(n + 1)),
//!     Handler::new(|n: &i32| Ok(n * 10)),
//! ]);
//! assert_eq!(log.len(), 2);
//! ```

use crate::machine::Dispatcher;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default error type for action callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

type Callback<P, R, E> = Rc<dyn Fn(&Dispatcher<P, R, E>, &P) -> Result<R, E>>;

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a handler, used to remove one listener from a chain.
///
/// Closures cannot be compared, so every [`Handler`] is stamped with a
/// process-unique id when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ActionId(u64);

impl ActionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single callable registered on a rule.
pub struct Handler<P = (), R = (), E = BoxError> {
    id: ActionId,
    name: Cow<'static, str>,
    callback: Callback<P, R, E>,
}

impl<P, R, E> Handler<P, R, E> {
    /// Wraps a callback that only looks at the payload.
    ///
    /// Zero-argument actions just ignore it: `Handler::new(|_: &()| Ok(()))`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&P) -> Result<R, E> + 'static,
    {
        Self {
            id: ActionId::next(),
            name: Cow::Borrowed(std::any::type_name::<F>()),
            callback: Rc::new(move |_: &Dispatcher<P, R, E>, payload: &P| f(payload)),
        }
    }

    /// Wraps a callback that also receives the dispatcher running it.
    ///
    /// Use this for actions that dispatch follow-up events or rebind rules.
    pub fn with_dispatcher<F>(f: F) -> Self
    where
        F: Fn(&Dispatcher<P, R, E>, &P) -> Result<R, E> + 'static,
    {
        Self {
            id: ActionId::next(),
            name: Cow::Borrowed(std::any::type_name::<F>()),
            callback: Rc::new(f),
        }
    }

    /// Replaces the diagnostic name (defaults to the callback's type name).
    #[must_use]
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn with_id(mut self, id: ActionId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub const fn id(&self) -> ActionId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the callback.
    ///
    /// # Errors
    ///
    /// Returns whatever the callback returns.
    pub fn call(&self, dispatcher: &Dispatcher<P, R, E>, payload: &P) -> Result<R, E> {
        (self.callback)(dispatcher, payload)
    }
}

impl<P, R, E> Clone for Handler<P, R, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<P, R, E> fmt::Debug for Handler<P, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Callable or ordered chain of callables executed when a rule fires.
pub enum Action<P = (), R = (), E = BoxError> {
    /// One handler.
    Single(Handler<P, R, E>),
    /// Handlers run in registration order; the last result wins.
    ///
    /// An empty chain is a pure transition.
    Chain(Vec<Handler<P, R, E>>),
}

impl<P, R, E> Action<P, R, E> {
    /// Shorthand for a single payload-only handler.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&P) -> Result<R, E> + 'static,
    {
        Self::Single(Handler::new(f))
    }

    pub fn chain(handlers: impl IntoIterator<Item = Handler<P, R, E>>) -> Self {
        Self::Chain(handlers.into_iter().collect())
    }

    /// No handlers at all; the rule only transitions.
    #[must_use]
    pub const fn none() -> Self {
        Self::Chain(Vec::new())
    }

    #[must_use]
    pub fn handlers(&self) -> &[Handler<P, R, E>] {
        match self {
            Self::Single(handler) => std::slice::from_ref(handler),
            Self::Chain(handlers) => handlers,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers().is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: ActionId) -> bool {
        self.handlers().iter().any(|h| h.id == id)
    }

    /// Diagnostic names of the handlers, in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.handlers().iter().map(|h| h.name().to_string()).collect()
    }

    /// Appends a handler, turning a single action into a chain.
    pub(crate) fn push(&mut self, handler: Handler<P, R, E>) {
        *self = match std::mem::replace(self, Self::none()) {
            Self::Single(first) => Self::Chain(vec![first, handler]),
            Self::Chain(mut handlers) => {
                handlers.push(handler);
                Self::Chain(handlers)
            }
        };
    }

    /// Removes the handler with `id`. Returns whether one was removed.
    pub(crate) fn remove(&mut self, id: ActionId) -> bool {
        match self {
            Self::Single(handler) if handler.id == id => {
                *self = Self::none();
                true
            }
            Self::Single(_) => false,
            Self::Chain(handlers) => {
                let before = handlers.len();
                handlers.retain(|h| h.id != id);
                handlers.len() != before
            }
        }
    }

    /// Runs every handler in order with the same payload.
    ///
    /// Returns the last handler's value, or `None` for an empty chain. Stops at
    /// the first error.
    ///
    /// # Errors
    ///
    /// Returns the first handler error, unmodified.
    pub fn invoke(&self, dispatcher: &Dispatcher<P, R, E>, payload: &P) -> Result<Option<R>, E> {
        let mut last = None;
        for handler in self.handlers() {
            last = Some(handler.call(dispatcher, payload)?);
        }
        Ok(last)
    }
}

impl<P, R, E> From<Handler<P, R, E>> for Action<P, R, E> {
    fn from(handler: Handler<P, R, E>) -> Self {
        Self::Single(handler)
    }
}

impl<P, R, E> Clone for Action<P, R, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Single(handler) => Self::Single(handler.clone()),
            Self::Chain(handlers) => Self::Chain(handlers.clone()),
        }
    }
}

impl<P, R, E> fmt::Debug for Action<P, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(handler) => f.debug_tuple("Single").field(handler).finish(),
            Self::Chain(handlers) => f.debug_tuple("Chain").field(handlers).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_turns_single_into_chain() {
        let first: Handler = Handler::new(|_: &()| Ok(()));
        let second: Handler = Handler::new(|_: &()| Ok(()));
        let (a, b) = (first.id(), second.id());

        let mut action = Action::from(first);
        action.push(second);

        assert!(matches!(action, Action::Chain(_)));
        assert_eq!(action.handlers().iter().map(Handler::id).collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn remove_only_drops_matching_handler() {
        let keep: Handler = Handler::new(|_: &()| Ok(()));
        let drop_me: Handler = Handler::new(|_: &()| Ok(()));
        let (keep_id, drop_id) = (keep.id(), drop_me.id());

        let mut action = Action::chain([keep, drop_me]);
        assert!(action.remove(drop_id));
        assert!(!action.remove(drop_id));
        assert!(action.contains(keep_id));
        assert_eq!(action.len(), 1);
    }

    #[test]
    fn ids_are_unique() {
        let a: Handler = Handler::new(|_: &()| Ok(()));
        let b: Handler = Handler::new(|_: &()| Ok(()));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn named_overrides_type_name() {
        let handler: Handler = Handler::new(|_: &()| Ok(())).named("buzz");
        assert_eq!(handler.name(), "buzz");
    }
}
