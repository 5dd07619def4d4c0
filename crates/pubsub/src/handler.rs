//! Subscriber callbacks.
//!
//! A [`Handler`] wraps either a payload callback (`Fn(&T)`) or, for
//! notification keys, a no-argument callback (`Fn()`). Callbacks may return
//! `()` or `Result<(), E>`; errors are reported to the bus's error observers.

use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;
use crate::unit::Unit;

/// Return types accepted from handler callbacks.
pub trait HandlerOutput {
    /// Normalize into the bus's internal result type.
    fn into_result(self) -> Result<(), BoxError>;
}

impl HandlerOutput for () {
    #[inline]
    fn into_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E: Into<BoxError>> HandlerOutput for Result<(), E> {
    #[inline]
    fn into_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

type PayloadFn<T> = dyn Fn(&T) -> Result<(), BoxError> + Send + Sync;
type SignalFn = dyn Fn() -> Result<(), BoxError> + Send + Sync;

enum Callback<T> {
    Payload(Arc<PayloadFn<T>>),
    Signal(Arc<SignalFn>),
}

/// A callable registered against a key.
///
/// Clones share identity: [`Bus::unsubscribe`](crate::Bus::unsubscribe)
/// removes the subscription made with any clone of the same handler.
pub struct Handler<T> {
    callback: Callback<T>,
}

impl<T: 'static> Handler<T> {
    /// Wrap a callback receiving the payload by reference.
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(&T) -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        Self {
            callback: Callback::Payload(Arc::new(move |payload: &T| f(payload).into_result())),
        }
    }
}

impl Handler<Unit> {
    /// Wrap a no-argument callback for a notification key.
    pub fn signal<F, R>(f: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: HandlerOutput,
    {
        Self {
            callback: Callback::Signal(Arc::new(move || f().into_result())),
        }
    }
}

impl<T> Handler<T> {
    /// Whether `self` and `other` are clones of the same handler.
    pub fn same_as(&self, other: &Self) -> bool {
        match (&self.callback, &other.callback) {
            (Callback::Payload(a), Callback::Payload(b)) => Arc::ptr_eq(a, b),
            (Callback::Signal(a), Callback::Signal(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether this handler takes no arguments.
    pub fn is_signal(&self) -> bool {
        matches!(self.callback, Callback::Signal(_))
    }

    pub(crate) fn call(&self, payload: &T) -> Result<(), BoxError> {
        match &self.callback {
            Callback::Payload(f) => f(payload),
            Callback::Signal(f) => f(),
        }
    }
}

impl<T> Clone for Handler<T> {
    fn clone(&self) -> Self {
        let callback = match &self.callback {
            Callback::Payload(f) => Callback::Payload(Arc::clone(f)),
            Callback::Signal(f) => Callback::Signal(Arc::clone(f)),
        };
        Self { callback }
    }
}

impl<T> fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = if self.is_signal() { "signal" } else { "payload" };
        f.debug_struct("Handler").field("shape", &shape).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn unit_and_result_outputs_normalize() {
        let ok = Handler::new(|_: &u32| ());
        let fallible = Handler::new(|n: &u32| -> Result<(), String> {
            if *n > 10 { Err(format!("{n} is too large")) } else { Ok(()) }
        });

        assert!(ok.call(&1).is_ok());
        assert!(fallible.call(&3).is_ok());
        assert_eq!(fallible.call(&11).unwrap_err().to_string(), "11 is too large");
    }

    #[test]
    fn signal_ignores_payload() {
        let hits = Arc::new(AtomicU32::new(0));
        let sink = Arc::clone(&hits);
        let handler = Handler::signal(move || {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        handler.call(&Unit).unwrap();
        assert!(handler.is_signal());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn identity_follows_clones() {
        let a = Handler::new(|_: &u8| ());
        let b = Handler::new(|_: &u8| ());

        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&b));
    }
}
