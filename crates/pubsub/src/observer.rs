//! Diagnostic channel for handler failures.
//!
//! Observers are purely diagnostic: they see every failure but cannot change
//! dispatch order or outcome.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::HandlerError;
use crate::key::KeyId;
use crate::subscription::SubscriberId;

static NEXT_OBSERVER: AtomicU64 = AtomicU64::new(1);

/// A handler invocation that failed during publish.
#[derive(Debug)]
pub struct PublishFailure {
    /// Key that was being published.
    pub key: KeyId,
    /// The failing subscription.
    ///
    /// Handlers are identified by the [`SubscriberId`] they were registered
    /// under rather than by a handler reference; compare it with
    /// [`Subscription::id`](crate::Subscription::id).
    pub subscriber: SubscriberId,
    /// What went wrong.
    pub error: HandlerError,
}

/// Identifier returned by [`ErrorObservers::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type ObserverFn = dyn Fn(&PublishFailure) + Send + Sync;

/// Set of callbacks notified of every [`PublishFailure`].
#[derive(Default)]
pub struct ErrorObservers {
    observers: RwLock<Vec<(ObserverId, Arc<ObserverFn>)>>,
}

impl ErrorObservers {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an observer; it is called once per failed handler invocation.
    pub fn attach<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&PublishFailure) + Send + Sync + 'static,
    {
        let id = ObserverId(NEXT_OBSERVER.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(observer)));
        id
    }

    /// Detach an observer. Unknown ids are ignored and return `false`.
    pub fn detach(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Number of attached observers.
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Whether no observer is attached.
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Call every observer with `failure`.
    ///
    /// With `catch_panics` set, a panicking observer is logged and skipped so
    /// that the remaining observers still run and the panic never reaches the
    /// publisher.
    pub(crate) fn notify(&self, failure: &PublishFailure, catch_panics: bool) {
        // Snapshot under the lock, then release before calling out.
        let observers: Vec<Arc<ObserverFn>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in &observers {
            if !catch_panics {
                observer(failure);
                continue;
            }
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| observer(failure))) {
                let error = HandlerError::from_panic(&*panic);
                tracing::warn!(
                    key = %failure.key,
                    subscriber = %failure.subscriber,
                    error = %error,
                    "error observer panicked"
                );
            }
        }
    }
}

impl fmt::Debug for ErrorObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorObservers")
            .field("observer_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::key::KeyRegistry;

    fn failure() -> PublishFailure {
        let keys = KeyRegistry::new();
        PublishFailure {
            key: keys.key::<u32>("observed").unwrap().id().clone(),
            subscriber: SubscriberId::next(),
            error: HandlerError::Panicked("boom".into()),
        }
    }

    #[test]
    fn every_observer_is_notified() {
        let observers = ErrorObservers::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let hits = Arc::clone(&hits);
            observers.attach(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        observers.notify(&failure(), true);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_observer_does_not_stop_the_others() {
        let observers = ErrorObservers::new();
        let hits = Arc::new(AtomicUsize::new(0));
        observers.attach(|_| panic!("observer bug"));
        let sink = Arc::clone(&hits);
        observers.attach(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        observers.notify(&failure(), true);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            observers.notify(&failure(), false);
        }));
        assert!(outcome.is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn detach_unknown_is_noop() {
        let observers = ErrorObservers::new();
        let id = observers.attach(|_| {});

        assert!(observers.detach(id));
        assert!(!observers.detach(id));
        assert!(observers.is_empty());
    }

    #[test]
    fn observer_may_detach_itself() {
        let observers = Arc::new(ErrorObservers::new());
        let slot = Arc::new(parking_lot::Mutex::new(None::<ObserverId>));

        let weak = Arc::downgrade(&observers);
        let own = Arc::clone(&slot);
        let id = observers.attach(move |_| {
            if let (Some(observers), Some(id)) = (weak.upgrade(), *own.lock()) {
                observers.detach(id);
            }
        });
        *slot.lock() = Some(id);

        observers.notify(&failure(), true);
        assert_eq!(observers.len(), 0);
    }
}
