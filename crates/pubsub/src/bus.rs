//! The dispatch engine.
//!
//! [`Bus`] owns a [`SubscriberStore`] and an [`ErrorObservers`] set. Publishing
//! takes a snapshot of the key's subscriber list under the store lock,
//! releases the lock, then invokes every handler of the snapshot in order on
//! the calling thread. Subscribing or unsubscribing while a publish is in
//! flight (including from inside a handler) never changes the set of handlers
//! that publish invokes; the change is visible to the next publish.
//!
//! A failing handler, whether it returns an error or panics, is reported to
//! the error observers and dispatch continues with the next handler.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{BusConfig, StoreKind};
use crate::envelope::{AsKey, Packet};
use crate::error::{HandlerError, PublishError};
use crate::handler::{Handler, HandlerOutput};
use crate::key::{Key, KeyId};
use crate::observer::{ErrorObservers, PublishFailure};
use crate::store::{LockedStore, ShardedStore, Subscriber, SubscriberStore};
use crate::subscription::{SubscriberId, Subscription};
use crate::unit::Unit;

/// Counters describing a bus's activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Publish calls, including those that found no subscribers.
    pub published: u64,
    /// Handler invocations that completed successfully.
    pub delivered: u64,
    /// Handler invocations that failed.
    pub failed: u64,
}

/// Strongly-typed publish/subscribe bus.
///
/// All methods take `&self` and may be called concurrently from any thread.
/// Share a bus with `Arc<Bus>` or use the [`global`](crate::global) facade.
///
/// # Examples
///
/// ```
/// use nebula_pubsub::{Bus, KeyRegistry};
///
/// let keys = KeyRegistry::new();
/// let greeted = keys.key::<String>("user.greeted").unwrap();
///
/// let bus = Bus::new();
/// let failures = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
/// let seen = failures.clone();
/// bus.errors().attach(move |_| {
///     seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
/// });
///
/// bus.subscribe(&greeted, |name: &String| -> Result<(), String> {
///     Err(format!("cannot greet {name}"))
/// });
/// bus.publish(&greeted, &"ada".to_owned());
///
/// assert_eq!(failures.load(std::sync::atomic::Ordering::SeqCst), 1);
/// assert_eq!(bus.stats().failed, 1);
/// ```
pub struct Bus {
    store: Arc<dyn SubscriberStore>,
    observers: ErrorObservers,
    config: BusConfig,
    published: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl Bus {
    /// Create a bus with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a bus from `config`.
    #[must_use]
    pub fn with_config(config: BusConfig) -> Self {
        let store: Arc<dyn SubscriberStore> = match config.store {
            StoreKind::Locked => Arc::new(LockedStore::new()),
            StoreKind::Sharded => Arc::new(ShardedStore::new()),
        };
        Self::with_store(store, config)
    }

    /// Create a bus over a caller-provided registry strategy.
    ///
    /// `config.store` is ignored.
    #[must_use]
    pub fn with_store(store: Arc<dyn SubscriberStore>, config: BusConfig) -> Self {
        Self {
            store,
            observers: ErrorObservers::new(),
            config,
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// The configuration this bus was built with.
    #[inline]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Subscribe / unsubscribe
    // -----------------------------------------------------------------------

    /// Subscribe a payload callback to `key`.
    ///
    /// `key` may be a [`Key`], a [`Packet`] or a
    /// [`Notification`](crate::Notification).
    pub fn subscribe<T, F, R>(&self, key: &impl AsKey<T>, handler: F) -> Subscription
    where
        T: 'static,
        F: Fn(&T) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        self.subscribe_handler(key, Handler::new(handler))
    }

    /// Subscribe a no-argument callback to a notification key.
    pub fn subscribe_notification<F, R>(&self, key: &impl AsKey<Unit>, handler: F) -> Subscription
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        self.subscribe_handler(key, Handler::signal(handler))
    }

    /// Subscribe a prebuilt [`Handler`].
    ///
    /// Keep a clone of the handler to remove it later with
    /// [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe_handler<T: 'static>(
        &self,
        key: &impl AsKey<T>,
        handler: Handler<T>,
    ) -> Subscription {
        let key = key.as_key().id();
        let id = SubscriberId::next();
        self.store.insert(key, Subscriber::new(id, handler));
        tracing::debug!(key = %key, subscriber = %id, "handler subscribed");
        Subscription::new(key.clone(), id, &self.store)
    }

    /// Remove the first subscription of `handler` (or a clone of it) to `key`.
    ///
    /// Returns `false` if it was not subscribed.
    pub fn unsubscribe<T: 'static>(&self, key: &impl AsKey<T>, handler: &Handler<T>) -> bool {
        let key = key.as_key().id();
        let removed = self.store.remove_first(key, &|sub| {
            sub.handler::<T>().is_some_and(|h| h.same_as(handler))
        });
        if let Some(id) = removed {
            tracing::debug!(key = %key, subscriber = %id, "handler unsubscribed");
        }
        removed.is_some()
    }

    /// Remove every subscription to `key`, returning how many were removed.
    pub fn unsubscribe_all<T>(&self, key: &impl AsKey<T>) -> usize {
        let key = key.as_key().id();
        let removed = self.store.remove_key(key);
        tracing::debug!(key = %key, removed, "all handlers unsubscribed");
        removed
    }

    // -----------------------------------------------------------------------
    // Publish
    // -----------------------------------------------------------------------

    /// Publish `payload` to every handler subscribed to `key`.
    pub fn publish<T: 'static>(&self, key: &impl AsKey<T>, payload: &T) {
        self.dispatch(key.as_key(), payload);
    }

    /// Publish the payload bound to `packet`.
    ///
    /// Fails with [`PublishError::MissingPayload`] for descriptor packets.
    pub fn publish_packet<T: 'static>(&self, packet: &Packet<T>) -> Result<(), PublishError> {
        let payload = packet
            .payload()
            .ok_or_else(|| PublishError::MissingPayload {
                key: packet.name().to_owned(),
            })?;
        self.dispatch(packet.key(), payload);
        Ok(())
    }

    /// Publish a notification.
    ///
    /// No-argument handlers are called without arguments; payload handlers
    /// registered on the key receive [`Unit`].
    pub fn notify(&self, key: &impl AsKey<Unit>) {
        self.dispatch(key.as_key(), &Unit);
    }

    fn dispatch<T: 'static>(&self, key: &Key<T>, payload: &T) {
        self.published.fetch_add(1, Ordering::Relaxed);

        let id = key.id();
        let Some(snapshot) = self.store.snapshot(id) else {
            tracing::trace!(key = %id, "no subscribers");
            return;
        };
        tracing::trace!(key = %id, subscribers = snapshot.len(), "dispatching");

        for subscriber in snapshot.iter() {
            // Unreachable for handlers subscribed through the typed API.
            let Some(handler) = subscriber.handler::<T>() else {
                continue;
            };
            match self.invoke(handler, payload) {
                Ok(()) => {
                    self.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(error) => self.report(id, subscriber.id(), error),
            }
        }
    }

    fn invoke<T>(&self, handler: &Handler<T>, payload: &T) -> Result<(), HandlerError> {
        if !self.config.catch_panics {
            return handler.call(payload).map_err(HandlerError::Failed);
        }
        match panic::catch_unwind(AssertUnwindSafe(|| handler.call(payload))) {
            Ok(result) => result.map_err(HandlerError::Failed),
            Err(panic) => Err(HandlerError::from_panic(&*panic)),
        }
    }

    fn report(&self, key: &KeyId, subscriber: SubscriberId, error: HandlerError) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if self.config.log_failures {
            tracing::warn!(key = %key, subscriber = %subscriber, error = %error, "event handler failed");
        }
        let failure = PublishFailure {
            key: key.clone(),
            subscriber,
            error,
        };
        self.observers.notify(&failure, self.config.catch_panics);
    }

    // -----------------------------------------------------------------------
    // Queries and bulk operations
    // -----------------------------------------------------------------------

    /// Observers notified of every handler failure.
    #[inline]
    pub fn errors(&self) -> &ErrorObservers {
        &self.observers
    }

    /// Whether `key` has at least one subscriber.
    pub fn has_subscribers<T>(&self, key: &impl AsKey<T>) -> bool {
        self.count(key) > 0
    }

    /// Number of subscriptions to `key`; 0 for unknown keys.
    pub fn count<T>(&self, key: &impl AsKey<T>) -> usize {
        self.store.count(key.as_key().id())
    }

    /// Number of keys with at least one subscriber.
    pub fn key_count(&self) -> usize {
        self.store.key_count()
    }

    /// Drop every subscription on every key.
    ///
    /// Outstanding [`Subscription`] handles stay valid; disposing them
    /// afterwards is a no-op.
    pub fn clear(&self) {
        self.store.clear();
        tracing::debug!("bus cleared");
    }

    /// Activity counters.
    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("keys", &self.key_count())
            .field("observers", &self.observers.len())
            .field("config", &self.config)
            .finish()
    }
}
