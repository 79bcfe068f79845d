//! Event listeners and the global listener registry.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::addon::AddonRef;
use crate::error::HandlerResult;
use crate::event::EventArgs;

/// Boxed listener callback. Receives the addon the listener is bound to.
pub type ListenerFn = Arc<dyn Fn(AddonRef, EventArgs) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// A named callable that is bound to an addon when registered.
///
/// The name doubles as the default event name.
#[derive(Clone)]
pub struct Listener {
    name: String,
    callback: ListenerFn,
}

impl Listener {
    pub fn new<F, Fut>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(AddonRef, EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            callback: Arc::new(move |owner, args| callback(owner, args).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the callback bound to `owner`.
    pub fn call(&self, owner: AddonRef, args: EventArgs) -> BoxFuture<'static, HandlerResult> {
        (self.callback)(owner, args)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("name", &self.name).finish()
    }
}

// =============================================================================
// ListenerRegistry
// =============================================================================

#[derive(Clone)]
struct Registration {
    owner: &'static str,
    listener: Listener,
}

/// Listeners by event name, each bound to an owning addon.
#[derive(Default)]
pub struct ListenerRegistry {
    by_event: RwLock<HashMap<String, Vec<Registration>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for `event` under `owner`.
    ///
    /// A listener with the same name already registered by the same owner for
    /// the same event is replaced. Returns `true` if something was replaced.
    pub fn register(&self, event: &str, owner: &'static str, listener: Listener) -> bool {
        let mut by_event = self.by_event.write();
        let slot = by_event.entry(event.to_owned()).or_default();
        let before = slot.len();
        slot.retain(|r| !(r.owner == owner && r.listener.name == listener.name));
        let replaced = slot.len() != before;
        slot.push(Registration { owner, listener });
        replaced
    }

    /// Removes the named listener of `owner` for `event`.
    pub fn remove(&self, event: &str, owner: &str, name: &str) -> bool {
        let mut by_event = self.by_event.write();
        let Some(slot) = by_event.get_mut(event) else {
            return false;
        };
        let before = slot.len();
        slot.retain(|r| !(r.owner == owner && r.listener.name == name));
        let removed = slot.len() != before;
        if slot.is_empty() {
            by_event.remove(event);
        }
        removed
    }

    /// Removes every listener of `owner`, returning `(event, listener)` pairs.
    pub fn remove_owner(&self, owner: &str) -> Vec<(String, Listener)> {
        let mut by_event = self.by_event.write();
        let mut removed = Vec::new();
        for (event, slot) in by_event.iter_mut() {
            slot.retain(|r| {
                if r.owner == owner {
                    removed.push((event.clone(), r.listener.clone()));
                    false
                } else {
                    true
                }
            });
        }
        by_event.retain(|_, slot| !slot.is_empty());
        removed.sort_by(|a, b| a.0.cmp(&b.0));
        removed
    }

    /// Snapshot of `(owner, listener)` pairs for `event`, in registration order.
    pub fn listeners(&self, event: &str) -> Vec<(&'static str, Listener)> {
        self.by_event
            .read()
            .get(event)
            .map(|slot| slot.iter().map(|r| (r.owner, r.listener.clone())).collect())
            .unwrap_or_default()
    }

    /// `(event, listener name)` pairs registered by `owner`, sorted.
    pub fn owned_by(&self, owner: &str) -> Vec<(String, String)> {
        let mut owned: Vec<_> = self
            .by_event
            .read()
            .iter()
            .flat_map(|(event, slot)| {
                slot.iter()
                    .filter(|r| r.owner == owner)
                    .map(|r| (event.clone(), r.listener.name.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        owned.sort();
        owned
    }

    pub fn count(&self, event: &str) -> usize {
        self.by_event.read().get(event).map_or(0, Vec::len)
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let by_event = self.by_event.read();
        let mut events: Vec<_> = by_event.iter().map(|(e, s)| (e.as_str(), s.len())).collect();
        events.sort();
        f.debug_struct("ListenerRegistry").field("events", &events).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> Listener {
        Listener::new(name, |_owner, _args| async { Ok(()) })
    }

    #[test]
    fn test_register_replaces_same_owner_and_name() {
        let registry = ListenerRegistry::new();
        assert!(!registry.register("message", "a", noop("on_message")));
        assert!(registry.register("message", "a", noop("on_message")));
        assert!(!registry.register("message", "b", noop("on_message")));

        assert_eq!(registry.count("message"), 2);
        let owners: Vec<_> = registry.listeners("message").into_iter().map(|(o, _)| o).collect();
        assert_eq!(owners, vec!["a", "b"]);
    }

    #[test]
    fn test_remove_owner() {
        let registry = ListenerRegistry::new();
        registry.register("message", "a", noop("on_message"));
        registry.register("ready", "a", noop("on_ready"));
        registry.register("message", "b", noop("log"));

        let removed = registry.remove_owner("a");
        let removed: Vec<_> = removed.iter().map(|(e, l)| (e.as_str(), l.name())).collect();
        assert_eq!(removed, vec![("message", "on_message"), ("ready", "on_ready")]);
        assert_eq!(registry.count("ready"), 0);
        assert_eq!(registry.owned_by("b"), vec![("message".to_owned(), "log".to_owned())]);
    }

    #[test]
    fn test_remove_single() {
        let registry = ListenerRegistry::new();
        registry.register("message", "a", noop("on_message"));
        assert!(!registry.remove("message", "a", "other"));
        assert!(registry.remove("message", "a", "on_message"));
        assert_eq!(registry.count("message"), 0);
    }
}
