use std::collections::BTreeMap;
use std::fmt;

use futures::future::BoxFuture;

use crate::error::HandlerResult;
use crate::event::EventArgs;

/// A receiver: an addon method run when its event is dispatched.
///
/// Written as a plain method so it coerces to the pointer type:
///
/// ```rust,ignore
/// fn member_join<'a>(&'a self, args: &'a EventArgs) -> BoxFuture<'a, HandlerResult> {
///     Box::pin(async move { /* ... */ Ok(()) })
/// }
/// ```
pub type ReceiverFn<A> = for<'a> fn(&'a A, &'a EventArgs) -> BoxFuture<'a, HandlerResult>;

/// The event-to-receiver table of one addon type.
///
/// Built once per loaded addon from [`Addon::receivers`](super::Addon::receivers)
/// and never changed afterwards.
pub struct Receivers<A> {
    table: BTreeMap<&'static str, ReceiverFn<A>>,
}

impl<A> Receivers<A> {
    pub fn new() -> Self {
        Self {
            table: BTreeMap::new(),
        }
    }

    /// Declares `receiver` for `event`. A later declaration for the same
    /// event replaces the earlier one.
    pub fn on(mut self, event: &'static str, receiver: ReceiverFn<A>) -> Self {
        self.table.insert(event, receiver);
        self
    }

    pub fn get(&self, event: &str) -> Option<ReceiverFn<A>> {
        self.table.get(event).copied()
    }

    pub fn contains(&self, event: &str) -> bool {
        self.table.contains_key(event)
    }

    /// Declared event names, sorted.
    pub fn events(&self) -> Vec<&'static str> {
        self.table.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl<A> Default for Receivers<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Receivers<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.table.keys()).finish()
    }
}
