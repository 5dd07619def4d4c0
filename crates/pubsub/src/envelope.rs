//! Envelopes binding a [`Key`] to an optional payload.
//!
//! Every bus operation accepts anything implementing [`AsKey`], so a bare
//! key, a [`Packet`] and a [`Notification`] all address the same channel.

use std::fmt;

use crate::key::Key;
use crate::unit::Unit;

/// Anything that designates a channel carrying payloads of type `T`.
pub trait AsKey<T> {
    /// The channel's key.
    fn as_key(&self) -> &Key<T>;
}

impl<T> AsKey<T> for Key<T> {
    #[inline]
    fn as_key(&self) -> &Key<T> {
        self
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A key plus, optionally, the payload to publish on it.
///
/// A *descriptor* packet ([`Packet::new`]) carries only the key and is meant
/// to be cached and published with a fresh payload each time. A *bound*
/// packet ([`Packet::bound`]) carries the payload as well and can be
/// published as-is through [`Bus::publish_packet`](crate::Bus::publish_packet).
pub struct Packet<T> {
    key: Key<T>,
    payload: Option<T>,
}

impl<T> Packet<T> {
    /// Create a descriptor packet carrying only `key`.
    #[must_use]
    pub fn new(key: Key<T>) -> Self {
        Self { key, payload: None }
    }

    /// Create a packet with its payload bound up front.
    #[must_use]
    pub fn bound(key: Key<T>, payload: T) -> Self {
        Self {
            key,
            payload: Some(payload),
        }
    }

    /// Return a copy of this packet's key bound to `payload`.
    #[must_use]
    pub fn with_payload(&self, payload: T) -> Self {
        Self::bound(self.key.clone(), payload)
    }

    /// The packet's key.
    #[inline]
    pub fn key(&self) -> &Key<T> {
        &self.key
    }

    /// The key's name.
    #[inline]
    pub fn name(&self) -> &str {
        self.key.name()
    }

    /// The bound payload, if any.
    #[inline]
    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    /// Whether this packet is a descriptor without a payload.
    #[inline]
    pub fn is_descriptor(&self) -> bool {
        self.payload.is_none()
    }
}

impl<T: Clone> Clone for Packet<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            payload: self.payload.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Packet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("key", &self.key)
            .field("payload", &self.payload)
            .finish()
    }
}

impl<T> From<Key<T>> for Packet<T> {
    fn from(key: Key<T>) -> Self {
        Self::new(key)
    }
}

impl<T> AsKey<T> for Packet<T> {
    #[inline]
    fn as_key(&self) -> &Key<T> {
        &self.key
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A payload-free signal, such as "button pressed".
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Notification {
    key: Key<Unit>,
}

impl Notification {
    /// Create a notification for `key`.
    #[must_use]
    pub fn new(key: Key<Unit>) -> Self {
        Self { key }
    }

    /// The notification's key.
    #[inline]
    pub fn key(&self) -> &Key<Unit> {
        &self.key
    }

    /// The key's name.
    #[inline]
    pub fn name(&self) -> &str {
        self.key.name()
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Notification").field(&self.key).finish()
    }
}

impl From<Key<Unit>> for Notification {
    fn from(key: Key<Unit>) -> Self {
        Self::new(key)
    }
}

impl AsKey<Unit> for Notification {
    #[inline]
    fn as_key(&self) -> &Key<Unit> {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyRegistry;

    #[test]
    fn descriptor_and_bound_share_the_key() {
        let keys = KeyRegistry::new();
        let descriptor = Packet::new(keys.key::<u32>("points").unwrap());
        let bound = descriptor.with_payload(7);

        assert!(descriptor.is_descriptor());
        assert_eq!(descriptor.payload(), None);
        assert_eq!(bound.payload(), Some(&7));
        assert_eq!(descriptor.as_key(), bound.as_key());
        assert_eq!(bound.name(), "points");
    }

    #[test]
    fn notification_wraps_unit_key() {
        let keys = KeyRegistry::new();
        let key = keys.key::<Unit>("clicked").unwrap();
        let note = Notification::from(key.clone());

        assert_eq!(note.key(), &key);
        assert_eq!(note.name(), "clicked");
        assert_eq!(note.clone(), note);
    }
}
