//! Process-wide bus facade.
//!
//! Free functions delegating to one shared [`Bus`], for callers that do not
//! want to thread a bus instance through their code. The shared instance is
//! held in an `ArcSwap`: [`configure`] replaces it without touching call
//! sites, and reads never block.
//!
//! Keys used with the facade are usually minted with [`Key::of`](crate::Key::of),
//! which uses [`KeyRegistry::global`](crate::KeyRegistry::global).
//!
//! Error observers and subscriptions belong to the bus instance they were
//! made on; they do not follow a [`configure`] call.

use std::sync::{Arc, LazyLock};

use arc_swap::ArcSwap;

use crate::bus::Bus;
use crate::envelope::{AsKey, Packet};
use crate::error::PublishError;
use crate::handler::{Handler, HandlerOutput};
use crate::observer::{ObserverId, PublishFailure};
use crate::subscription::Subscription;
use crate::unit::Unit;

static GLOBAL_BUS: LazyLock<ArcSwap<Bus>> = LazyLock::new(|| ArcSwap::from_pointee(Bus::new()));

/// The current shared bus.
#[inline]
pub fn instance() -> Arc<Bus> {
    GLOBAL_BUS.load_full()
}

/// Replace the shared bus, returning the previous one.
pub fn configure(bus: Arc<Bus>) -> Arc<Bus> {
    tracing::debug!("global bus replaced");
    GLOBAL_BUS.swap(bus)
}

/// See [`Bus::subscribe`].
pub fn subscribe<T, F, R>(key: &impl AsKey<T>, handler: F) -> Subscription
where
    T: 'static,
    F: Fn(&T) -> R + Send + Sync + 'static,
    R: HandlerOutput,
{
    GLOBAL_BUS.load().subscribe(key, handler)
}

/// See [`Bus::subscribe_notification`].
pub fn subscribe_notification<F, R>(key: &impl AsKey<Unit>, handler: F) -> Subscription
where
    F: Fn() -> R + Send + Sync + 'static,
    R: HandlerOutput,
{
    GLOBAL_BUS.load().subscribe_notification(key, handler)
}

/// See [`Bus::subscribe_handler`].
pub fn subscribe_handler<T: 'static>(key: &impl AsKey<T>, handler: Handler<T>) -> Subscription {
    GLOBAL_BUS.load().subscribe_handler(key, handler)
}

/// See [`Bus::unsubscribe`].
pub fn unsubscribe<T: 'static>(key: &impl AsKey<T>, handler: &Handler<T>) -> bool {
    GLOBAL_BUS.load().unsubscribe(key, handler)
}

/// See [`Bus::unsubscribe_all`].
pub fn unsubscribe_all<T>(key: &impl AsKey<T>) -> usize {
    GLOBAL_BUS.load().unsubscribe_all(key)
}

// Publishing holds a full `Arc` rather than a load guard, since handlers may
// run for arbitrarily long and may themselves publish.

/// See [`Bus::publish`].
pub fn publish<T: 'static>(key: &impl AsKey<T>, payload: &T) {
    instance().publish(key, payload);
}

/// See [`Bus::publish_packet`].
pub fn publish_packet<T: 'static>(packet: &Packet<T>) -> Result<(), PublishError> {
    instance().publish_packet(packet)
}

/// See [`Bus::notify`].
pub fn notify(key: &impl AsKey<Unit>) {
    instance().notify(key);
}

/// See [`Bus::has_subscribers`].
pub fn has_subscribers<T>(key: &impl AsKey<T>) -> bool {
    GLOBAL_BUS.load().has_subscribers(key)
}

/// See [`Bus::count`].
pub fn count<T>(key: &impl AsKey<T>) -> usize {
    GLOBAL_BUS.load().count(key)
}

/// See [`Bus::clear`].
pub fn clear() {
    GLOBAL_BUS.load().clear();
}

/// Attach an error observer to the current shared bus.
pub fn on_publish_error<F>(observer: F) -> ObserverId
where
    F: Fn(&PublishFailure) + Send + Sync + 'static,
{
    GLOBAL_BUS.load().errors().attach(observer)
}

/// Detach an error observer from the current shared bus.
pub fn detach_observer(id: ObserverId) -> bool {
    GLOBAL_BUS.load().errors().detach(id)
}
