//! # Nebula PubSub
//!
//! Strongly-typed, in-process publish/subscribe bus.
//!
//! Components exchange payload-bearing events ([`Packet`]) or payload-free
//! signals ([`Notification`]) through channels identified by a [`Key`]. The
//! payload type is part of the key, so a handler can never observe a payload
//! of the wrong type.
//!
//! ## Key Components
//!
//! - **Keys**: [`Key`] is minted once per name through a [`KeyRegistry`].
//! - **Envelopes**: [`Packet`] (descriptor or bound payload) and [`Notification`].
//! - **Bus**: [`Bus`] holds the subscriber registry and dispatches synchronously
//!   on the publishing thread over a snapshot of the subscriber list.
//! - **Subscriptions**: [`Subscription`] is a one-shot disposable handle.
//! - **Failure reporting**: handler errors and panics never reach the
//!   publisher; they are forwarded to observers attached via [`Bus::errors`].
//! - **Facade**: [`global`] exposes one replaceable process-wide bus.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! use nebula_pubsub::{Bus, KeyRegistry, Notification, Packet};
//!
//! let keys = KeyRegistry::new();
//! let scored = Packet::new(keys.key::<u32>("player.scored").unwrap());
//! let reset = Notification::new(keys.key("game.reset").unwrap());
//!
//! let bus = Bus::new();
//! let total = Arc::new(AtomicU32::new(0));
//!
//! let sink = Arc::clone(&total);
//! let sub = bus.subscribe(&scored, move |points: &u32| {
//!     sink.fetch_add(*points, Ordering::SeqCst);
//! });
//!
//! let sink = Arc::clone(&total);
//! bus.subscribe_notification(&reset, move || sink.store(0, Ordering::SeqCst));
//!
//! bus.publish(&scored, &10);
//! bus.publish(&scored, &5);
//! assert_eq!(total.load(Ordering::SeqCst), 15);
//!
//! bus.notify(&reset);
//! assert_eq!(total.load(Ordering::SeqCst), 0);
//!
//! sub.dispose();
//! assert_eq!(bus.count(&scored), 0);
//! ```

pub mod bus;
pub mod config;
pub mod envelope;
pub mod error;
pub mod global;
pub mod handler;
pub mod key;
pub mod observer;
pub mod store;
pub mod subscription;
pub mod unit;

pub use bus::{Bus, BusStats};
pub use config::{BusConfig, StoreKind};
pub use envelope::{AsKey, Notification, Packet};
pub use error::{BoxError, HandlerError, KeyError, PublishError};
pub use handler::{Handler, HandlerOutput};
pub use key::{Key, KeyId, KeyRegistry};
pub use observer::{ErrorObservers, ObserverId, PublishFailure};
pub use store::{LockedStore, ShardedStore, Subscriber, SubscriberStore};
pub use subscription::{SubscriberId, Subscription, SubscriptionGuard};
pub use unit::Unit;

/// Common prelude for crates publishing or subscribing through the bus.
pub mod prelude {
    pub use super::{
        AsKey, Bus, BusConfig, Handler, Key, KeyError, KeyRegistry, Notification, Packet,
        PublishFailure, Subscription, Unit,
    };
}
