//! Time-decaying containers.
//!
//! [`DecayingSet`] and [`DecayingMap`] forget their members a fixed delay
//! after the last insertion. Every member owns exactly one timer task; a
//! re-insert cancels the running timer and starts a fresh one, so membership
//! means "inserted within the last decay window".
//!
//! ```rust,ignore
//! let recently_notified = DecayingSet::new(Duration::from_secs(60));
//! recently_notified.insert(user_id);
//! if recently_notified.contains(&user_id) {
//!     return; // still inside the grace period
//! }
//! ```
//!
//! Timers are spawned on the current tokio runtime, so inserting outside of
//! a runtime panics.
//!
//! # Ownership
//!
//! A container built with [`DecayingSet::with_parent`] ties its timers to a
//! parent [`CancellationToken`]: cancelling the parent (for example when the
//! owning addon unloads) stops every pending countdown. Members inserted
//! after that point no longer decay.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

struct Entry<V> {
    value: V,
    generation: u64,
    timer: CancellationToken,
}

struct Slots<K, V> {
    entries: HashMap<K, Entry<V>>,
    next_generation: u64,
}

// =============================================================================
// DecayingMap
// =============================================================================

/// A map whose entries expire `decay` after their last insertion.
pub struct DecayingMap<K, V> {
    slots: Arc<Mutex<Slots<K, V>>>,
    decay: Duration,
    root: CancellationToken,
}

impl<K, V> DecayingMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    /// Creates an empty map with the given decay time.
    pub fn new(decay: Duration) -> Self {
        Self::with_token(decay, CancellationToken::new())
    }

    /// Creates an empty map whose timers are cancelled together with `parent`.
    pub fn with_parent(decay: Duration, parent: &CancellationToken) -> Self {
        Self::with_token(decay, parent.child_token())
    }

    fn with_token(decay: Duration, root: CancellationToken) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                entries: HashMap::new(),
                next_generation: 0,
            })),
            decay,
            root,
        }
    }

    /// Returns the delay after which an entry is dropped.
    pub fn decay_time(&self) -> Duration {
        self.decay
    }

    /// Inserts `value` under `key` and restarts the key's countdown.
    ///
    /// Returns the previous value, whose timer is cancelled before the new
    /// one starts.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let timer = self.root.child_token();
        let (generation, previous) = {
            let mut slots = self.slots.lock();
            let generation = slots.next_generation;
            slots.next_generation += 1;
            let previous = slots.entries.insert(
                key.clone(),
                Entry {
                    value,
                    generation,
                    timer: timer.clone(),
                },
            );
            (generation, previous)
        };

        let previous = previous.map(|entry| {
            entry.timer.cancel();
            entry.value
        });
        self.spawn_timer(key, generation, timer);
        previous
    }

    /// Removes `key`, cancelling its countdown.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entry = self.slots.lock().entries.remove(key)?;
        entry.timer.cancel();
        Some(entry.value)
    }

    /// Returns a clone of the value stored under `key`, if it has not decayed.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.slots.lock().entries.get(key).map(|e| e.value.clone())
    }

    /// Returns `true` if `key` is present and has not decayed.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.slots.lock().entries.contains_key(key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    /// Returns `true` if no entry is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the live keys.
    pub fn keys(&self) -> Vec<K> {
        self.slots.lock().entries.keys().cloned().collect()
    }

    /// Removes every entry and cancels every countdown.
    pub fn clear(&self) {
        let drained: Vec<Entry<V>> = {
            let mut slots = self.slots.lock();
            slots.entries.drain().map(|(_, e)| e).collect()
        };
        for entry in drained {
            entry.timer.cancel();
        }
    }

    fn spawn_timer(&self, key: K, generation: u64, timer: CancellationToken) {
        let slots = Arc::downgrade(&self.slots);
        let decay = self.decay;

        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(decay) => {
                    let Some(slots) = slots.upgrade() else {
                        return;
                    };
                    let mut slots = slots.lock();
                    // A refreshed entry carries a newer generation; leave it alone.
                    if slots
                        .entries
                        .get(&key)
                        .is_some_and(|e| e.generation == generation)
                    {
                        slots.entries.remove(&key);
                        trace!(generation, "Decayed entry removed");
                    }
                }
            }
        });
    }
}

impl<K, V> Drop for DecayingMap<K, V> {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

impl<K, V> fmt::Debug for DecayingMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecayingMap")
            .field("len", &self.slots.lock().entries.len())
            .field("decay", &self.decay)
            .finish()
    }
}

// =============================================================================
// DecayingSet
// =============================================================================

/// A set whose members expire `decay` after their last insertion.
pub struct DecayingSet<T> {
    inner: DecayingMap<T, ()>,
}

impl<T> DecayingSet<T>
where
    T: Eq + Hash + Clone + Send + 'static,
{
    /// Creates an empty set with the given decay time.
    pub fn new(decay: Duration) -> Self {
        Self {
            inner: DecayingMap::new(decay),
        }
    }

    /// Creates an empty set whose timers are cancelled together with `parent`.
    pub fn with_parent(decay: Duration, parent: &CancellationToken) -> Self {
        Self {
            inner: DecayingMap::with_parent(decay, parent),
        }
    }

    /// Creates a set from initial members. Each member starts its own countdown.
    pub fn with_members(decay: Duration, members: impl IntoIterator<Item = T>) -> Self {
        let set = Self::new(decay);
        for member in members {
            set.insert(member);
        }
        set
    }

    /// Returns the delay after which a member is dropped.
    pub fn decay_time(&self) -> Duration {
        self.inner.decay_time()
    }

    /// Inserts `item` and restarts its countdown.
    ///
    /// Returns `true` if the item was not already a member.
    pub fn insert(&self, item: T) -> bool {
        self.inner.insert(item, ()).is_none()
    }

    /// Removes `item` and cancels its countdown. Absent items are ignored.
    pub fn remove<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.remove(item).is_some()
    }

    /// Returns `true` if `item` was inserted within the decay window.
    pub fn contains<Q>(&self, item: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains_key(item)
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the set has no live member.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot of the live members.
    pub fn members(&self) -> Vec<T> {
        self.inner.keys()
    }

    /// Removes every member and cancels every countdown.
    pub fn clear(&self) {
        self.inner.clear();
    }
}

impl<T> fmt::Debug for DecayingSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecayingSet")
            .field("len", &self.inner.slots.lock().entries.len())
            .field("decay", &self.inner.decay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const DECAY: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn test_member_expires_after_decay() {
        let set = DecayingSet::new(DECAY);
        assert!(set.insert(42u64));
        assert!(set.contains(&42));

        sleep(DECAY + Duration::from_millis(10)).await;
        assert!(!set.contains(&42));
        assert!(set.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinsert_refreshes_countdown() {
        let set = DecayingSet::new(DECAY);
        set.insert("channel");

        sleep(Duration::from_millis(600)).await;
        assert!(!set.insert("channel"));

        // Past the original expiry instant, inside the refreshed window.
        sleep(Duration::from_millis(600)).await;
        assert!(set.contains("channel"));

        sleep(Duration::from_millis(500)).await;
        assert!(!set.contains("channel"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_cancels_countdown() {
        let set = DecayingSet::new(DECAY);
        set.insert(1);

        sleep(Duration::from_millis(500)).await;
        assert!(set.remove(&1));
        assert!(!set.contains(&1));

        sleep(Duration::from_millis(100)).await;
        set.insert(1);

        // The first timer would have fired here if it were still alive.
        sleep(Duration::from_millis(500)).await;
        assert!(set.contains(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_absent_is_noop() {
        let set: DecayingSet<i64> = DecayingSet::new(DECAY);
        assert!(!set.remove(&7));
        assert_eq!(set.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_members_decay() {
        let set = DecayingSet::with_members(DECAY, [1, 2, 3]);
        assert_eq!(set.len(), 3);

        sleep(DECAY + Duration::from_millis(10)).await;
        assert!(set.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_timers() {
        let parent = CancellationToken::new();
        let set = DecayingSet::with_parent(DECAY, &parent);
        set.insert(5);

        parent.cancel();
        sleep(DECAY * 2).await;
        assert!(set.contains(&5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_empties_set() {
        let set = DecayingSet::with_members(DECAY, ["a", "b"]);
        set.clear();
        assert!(set.is_empty());

        set.insert("a");
        sleep(Duration::from_millis(500)).await;
        assert_eq!(set.members(), vec!["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_map_values_decay() {
        let cache = DecayingMap::new(DECAY);
        assert_eq!(cache.insert("star", 3u32), None);
        assert_eq!(cache.get("star"), Some(3));

        sleep(Duration::from_millis(700)).await;
        assert_eq!(cache.insert("star", 4), Some(3));

        sleep(Duration::from_millis(700)).await;
        assert_eq!(cache.get("star"), Some(4));

        sleep(Duration::from_millis(400)).await;
        assert!(!cache.contains_key("star"));
    }
}
