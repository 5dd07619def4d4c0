//! Subscriber registry storage.
//!
//! A [`SubscriberStore`] maps each [`KeyId`] to its ordered subscriber list.
//! Lists are copy-on-write: [`SubscriberStore::snapshot`] hands out an `Arc`
//! to the current list, and mutations clone the list only while a snapshot
//! is still held by an in-flight publish. A list is removed from the map as
//! soon as it becomes empty.
//!
//! Two strategies ship with the crate:
//!
//! - [`LockedStore`]: one `parking_lot::Mutex` over the whole map (default).
//! - [`ShardedStore`]: a `DashMap`, locking per shard.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;

use crate::handler::Handler;
use crate::key::KeyId;
use crate::subscription::SubscriberId;

/// Immutable view of one key's subscribers, in subscription order.
pub type Snapshot = Arc<Vec<Subscriber>>;

// ---------------------------------------------------------------------------
// Subscriber
// ---------------------------------------------------------------------------

/// One registered handler together with its identifier.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    handler: Arc<dyn Any + Send + Sync>,
}

impl Subscriber {
    pub(crate) fn new<T: 'static>(id: SubscriberId, handler: Handler<T>) -> Self {
        Self {
            id,
            handler: Arc::new(handler),
        }
    }

    /// The subscription's identifier.
    #[inline]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The handler, if it was registered for payload type `T`.
    pub(crate) fn handler<T: 'static>(&self) -> Option<&Handler<T>> {
        self.handler.downcast_ref()
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// SubscriberStore
// ---------------------------------------------------------------------------

/// Concurrency strategy for the subscriber registry.
///
/// Every method must be atomic with respect to the others for the same key.
/// Implementations never call back into user code, so holding a lock for the
/// duration of a method is fine.
pub trait SubscriberStore: Send + Sync {
    /// Append `subscriber` to the list for `key`, creating the list if absent.
    fn insert(&self, key: &KeyId, subscriber: Subscriber);

    /// Remove the first subscriber of `key` for which `matches` returns true.
    ///
    /// Drops the list when it becomes empty. Returns the removed id.
    fn remove_first(
        &self,
        key: &KeyId,
        matches: &dyn Fn(&Subscriber) -> bool,
    ) -> Option<SubscriberId>;

    /// Current subscribers of `key`, or `None` if there are none.
    fn snapshot(&self, key: &KeyId) -> Option<Snapshot>;

    /// Drop every subscriber of `key`, returning how many were removed.
    fn remove_key(&self, key: &KeyId) -> usize;

    /// Number of subscribers of `key`.
    fn count(&self, key: &KeyId) -> usize;

    /// Number of keys with at least one subscriber.
    fn key_count(&self) -> usize;

    /// Drop every list.
    fn clear(&self);
}

// ---------------------------------------------------------------------------
// LockedStore
// ---------------------------------------------------------------------------

/// Registry guarded by a single coarse-grained lock.
#[derive(Default)]
pub struct LockedStore {
    lists: Mutex<HashMap<KeyId, Snapshot>>,
}

impl LockedStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubscriberStore for LockedStore {
    fn insert(&self, key: &KeyId, subscriber: Subscriber) {
        let mut lists = self.lists.lock();
        Arc::make_mut(lists.entry(key.clone()).or_default()).push(subscriber);
    }

    fn remove_first(
        &self,
        key: &KeyId,
        matches: &dyn Fn(&Subscriber) -> bool,
    ) -> Option<SubscriberId> {
        let mut lists = self.lists.lock();
        let list = lists.get_mut(key)?;
        let pos = list.iter().position(matches)?;
        let removed = Arc::make_mut(list).remove(pos);
        if list.is_empty() {
            lists.remove(key);
        }
        Some(removed.id)
    }

    fn snapshot(&self, key: &KeyId) -> Option<Snapshot> {
        self.lists.lock().get(key).cloned()
    }

    fn remove_key(&self, key: &KeyId) -> usize {
        self.lists.lock().remove(key).map_or(0, |list| list.len())
    }

    fn count(&self, key: &KeyId) -> usize {
        self.lists.lock().get(key).map_or(0, |list| list.len())
    }

    fn key_count(&self) -> usize {
        self.lists.lock().len()
    }

    fn clear(&self) {
        self.lists.lock().clear();
    }
}

impl fmt::Debug for LockedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedStore")
            .field("keys", &self.key_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ShardedStore
// ---------------------------------------------------------------------------

/// Registry sharded across a `DashMap`; operations on different keys rarely
/// contend.
#[derive(Default)]
pub struct ShardedStore {
    lists: DashMap<KeyId, Snapshot>,
}

impl ShardedStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubscriberStore for ShardedStore {
    fn insert(&self, key: &KeyId, subscriber: Subscriber) {
        let mut list = self.lists.entry(key.clone()).or_default();
        Arc::make_mut(&mut *list).push(subscriber);
    }

    fn remove_first(
        &self,
        key: &KeyId,
        matches: &dyn Fn(&Subscriber) -> bool,
    ) -> Option<SubscriberId> {
        match self.lists.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let pos = occupied.get().iter().position(matches)?;
                let removed = Arc::make_mut(occupied.get_mut()).remove(pos);
                if occupied.get().is_empty() {
                    occupied.remove();
                }
                Some(removed.id)
            }
            Entry::Vacant(_) => None,
        }
    }

    fn snapshot(&self, key: &KeyId) -> Option<Snapshot> {
        self.lists.get(key).map(|list| Arc::clone(list.value()))
    }

    fn remove_key(&self, key: &KeyId) -> usize {
        self.lists.remove(key).map_or(0, |(_, list)| list.len())
    }

    fn count(&self, key: &KeyId) -> usize {
        self.lists.get(key).map_or(0, |list| list.len())
    }

    fn key_count(&self) -> usize {
        self.lists.len()
    }

    fn clear(&self) {
        self.lists.clear();
    }
}

impl fmt::Debug for ShardedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedStore")
            .field("keys", &self.key_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::key::KeyRegistry;

    fn subscriber() -> Subscriber {
        Subscriber::new(SubscriberId::next(), Handler::new(|_: &u32| ()))
    }

    fn ids(snapshot: &Snapshot) -> Vec<SubscriberId> {
        snapshot.iter().map(Subscriber::id).collect()
    }

    #[rstest]
    #[case::locked(Box::new(LockedStore::new()))]
    #[case::sharded(Box::new(ShardedStore::new()))]
    fn keeps_subscription_order(#[case] store: Box<dyn SubscriberStore>) {
        let keys = KeyRegistry::new();
        let key = keys.key::<u32>("ordered").unwrap();
        let (a, b, c) = (subscriber(), subscriber(), subscriber());
        let expected = vec![a.id(), b.id(), c.id()];

        store.insert(key.id(), a);
        store.insert(key.id(), b);
        store.insert(key.id(), c);

        assert_eq!(ids(&store.snapshot(key.id()).unwrap()), expected);
        assert_eq!(store.count(key.id()), 3);
    }

    #[rstest]
    #[case::locked(Box::new(LockedStore::new()))]
    #[case::sharded(Box::new(ShardedStore::new()))]
    fn empty_lists_are_dropped(#[case] store: Box<dyn SubscriberStore>) {
        let keys = KeyRegistry::new();
        let key = keys.key::<u32>("transient").unwrap();
        let sub = subscriber();
        let id = sub.id();

        store.insert(key.id(), sub);
        assert_eq!(store.key_count(), 1);

        assert_eq!(store.remove_first(key.id(), &|s| s.id() == id), Some(id));
        assert_eq!(store.key_count(), 0);
        assert!(store.snapshot(key.id()).is_none());
        assert_eq!(store.remove_first(key.id(), &|s| s.id() == id), None);
    }

    #[rstest]
    #[case::locked(Box::new(LockedStore::new()))]
    #[case::sharded(Box::new(ShardedStore::new()))]
    fn snapshot_is_isolated_from_mutation(#[case] store: Box<dyn SubscriberStore>) {
        let keys = KeyRegistry::new();
        let key = keys.key::<u32>("isolated").unwrap();
        let first = subscriber();
        let first_id = first.id();
        store.insert(key.id(), first);

        let before = store.snapshot(key.id()).unwrap();
        store.insert(key.id(), subscriber());
        store.remove_first(key.id(), &|s| s.id() == first_id);

        assert_eq!(ids(&before), vec![first_id]);
        assert_eq!(store.count(key.id()), 1);
    }

    #[rstest]
    #[case::locked(Box::new(LockedStore::new()))]
    #[case::sharded(Box::new(ShardedStore::new()))]
    fn remove_key_and_clear(#[case] store: Box<dyn SubscriberStore>) {
        let keys = KeyRegistry::new();
        let a = keys.key::<u32>("a").unwrap();
        let b = keys.key::<u32>("b").unwrap();
        store.insert(a.id(), subscriber());
        store.insert(a.id(), subscriber());
        store.insert(b.id(), subscriber());

        assert_eq!(store.remove_key(a.id()), 2);
        assert_eq!(store.remove_key(a.id()), 0);
        assert_eq!(store.key_count(), 1);

        store.clear();
        assert_eq!(store.key_count(), 0);
        assert_eq!(store.count(b.id()), 0);
    }

    #[test]
    fn handler_downcast_requires_matching_type() {
        let sub = subscriber();
        assert!(sub.handler::<u32>().is_some());
        assert!(sub.handler::<String>().is_none());
    }
}
