//! Disposable subscription handles.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::key::KeyId;
use crate::store::SubscriberStore;

static NEXT_SUBSCRIBER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SUBSCRIBER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle returned by every subscribe call.
///
/// [`dispose`](Self::dispose) removes exactly the subscription this handle was
/// issued for. It takes effect at most once: later calls, concurrent calls
/// that lose the race, and calls made after the bus was cleared or dropped
/// are no-ops.
///
/// Dropping a `Subscription` does **not** unsubscribe; use
/// [`into_guard`](Self::into_guard) for scope-bound subscriptions.
pub struct Subscription {
    key: KeyId,
    id: SubscriberId,
    store: Weak<dyn SubscriberStore>,
    disposed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(key: KeyId, id: SubscriberId, store: &Arc<dyn SubscriberStore>) -> Self {
        Self {
            key,
            id,
            store: Arc::downgrade(store),
            disposed: AtomicBool::new(false),
        }
    }

    /// Identifier of the subscribed handler.
    #[inline]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Key the handler was subscribed to.
    #[inline]
    pub fn key(&self) -> &KeyId {
        &self.key
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Unsubscribe the handler.
    ///
    /// Returns `true` if this call removed it from the bus.
    pub fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let Some(store) = self.store.upgrade() else {
            return false;
        };
        let id = self.id;
        let removed = store.remove_first(&self.key, &|sub| sub.id() == id).is_some();
        if removed {
            tracing::debug!(key = %self.key, subscriber = %id, "subscription disposed");
        }
        removed
    }

    /// Convert into a guard that disposes the subscription when dropped.
    #[must_use]
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard { inner: self }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// RAII wrapper around a [`Subscription`]; disposes it on drop.
#[derive(Debug)]
#[must_use = "dropping the guard unsubscribes immediately"]
pub struct SubscriptionGuard {
    inner: Subscription,
}

impl SubscriptionGuard {
    /// The wrapped subscription.
    pub fn subscription(&self) -> &Subscription {
        &self.inner
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::key::KeyRegistry;
    use crate::store::{LockedStore, Subscriber};

    fn store_with_one(key: &KeyId) -> (Arc<dyn SubscriberStore>, SubscriberId) {
        let store: Arc<dyn SubscriberStore> = Arc::new(LockedStore::new());
        let id = SubscriberId::next();
        store.insert(key, Subscriber::new(id, Handler::new(|_: &u32| ())));
        (store, id)
    }

    #[test]
    fn dispose_is_one_shot() {
        let keys = KeyRegistry::new();
        let key = keys.key::<u32>("ticks").unwrap();
        let (store, id) = store_with_one(key.id());
        let sub = Subscription::new(key.id().clone(), id, &store);

        assert!(sub.dispose());
        assert!(!sub.dispose());
        assert!(sub.is_disposed());
        assert_eq!(store.count(key.id()), 0);
    }

    #[test]
    fn dispose_after_store_dropped_is_noop() {
        let keys = KeyRegistry::new();
        let key = keys.key::<u32>("ticks").unwrap();
        let (store, id) = store_with_one(key.id());
        let sub = Subscription::new(key.id().clone(), id, &store);
        drop(store);

        assert!(!sub.dispose());
    }

    #[test]
    fn guard_disposes_on_drop() {
        let keys = KeyRegistry::new();
        let key = keys.key::<u32>("ticks").unwrap();
        let (store, id) = store_with_one(key.id());

        let guard = Subscription::new(key.id().clone(), id, &store).into_guard();
        assert_eq!(guard.subscription().id(), id);
        assert_eq!(store.count(key.id()), 1);
        drop(guard);
        assert_eq!(store.count(key.id()), 0);
    }

    #[test]
    fn ids_are_unique_and_ordered() {
        let a = SubscriberId::next();
        let b = SubscriberId::next();
        assert!(b > a);
        assert_eq!(a.to_string(), format!("sub-{}", a.get()));
    }
}
