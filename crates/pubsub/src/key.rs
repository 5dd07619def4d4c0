//! Typed event keys and the registry that keeps their names unique.

use std::any::{TypeId, type_name};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;

use crate::error::KeyError;

/// Process-wide name registry used by [`Key::of`].
static GLOBAL_KEYS: LazyLock<KeyRegistry> = LazyLock::new(KeyRegistry::new);

static NEXT_REGISTRY: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// KeyId
// ---------------------------------------------------------------------------

/// Type-erased identity of a [`Key`]: its name, its payload type and the
/// registry that minted it.
///
/// Two ids are equal iff all three match, so keys minted by independent
/// registries never address the same channel. The hash only covers the name.
#[derive(Clone)]
pub struct KeyId {
    name: Arc<str>,
    payload: TypeId,
    payload_name: &'static str,
    registry: u64,
}

impl KeyId {
    fn of<T: 'static>(name: Arc<str>, registry: u64) -> Self {
        Self {
            name,
            payload: TypeId::of::<T>(),
            payload_name: type_name::<T>(),
            registry,
        }
    }

    /// The key's name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified name of the payload type.
    #[inline]
    pub fn payload_type(&self) -> &'static str {
        self.payload_name
    }
}

impl PartialEq for KeyId {
    fn eq(&self, other: &Self) -> bool {
        self.registry == other.registry && self.payload == other.payload && self.name == other.name
    }
}

impl Eq for KeyId {}

impl Hash for KeyId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyId")
            .field("name", &self.name)
            .field("payload", &self.payload_name)
            .field("registry", &self.registry)
            .finish()
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// Identifier of one event channel carrying payloads of type `T`.
///
/// Keys are minted through a [`KeyRegistry`], which guarantees that a name is
/// used by at most one key regardless of payload type. Cloning a key is cheap
/// and clones compare equal.
///
/// # Examples
///
/// ```
/// use nebula_pubsub::{Key, KeyError, KeyRegistry};
///
/// let keys = KeyRegistry::new();
/// let scored: Key<u32> = keys.key("player.scored").unwrap();
/// assert_eq!(scored.name(), "player.scored");
///
/// // The name is taken, whatever the payload type.
/// assert!(matches!(
///     keys.key::<String>("player.scored"),
///     Err(KeyError::Conflict { .. })
/// ));
/// ```
pub struct Key<T> {
    id: KeyId,
    _payload: PhantomData<fn() -> T>,
}

impl<T: 'static> Key<T> {
    /// Mint a key in the process-wide registry.
    ///
    /// Fails with [`KeyError::Blank`] for empty or whitespace names and with
    /// [`KeyError::Conflict`] if any key already uses `name`.
    pub fn of(name: impl AsRef<str>) -> Result<Self, KeyError> {
        KeyRegistry::global().key(name)
    }
}

impl<T> Key<T> {
    /// The key's name.
    #[inline]
    pub fn name(&self) -> &str {
        self.id.name()
    }

    /// Type-erased identity of this key.
    #[inline]
    pub fn id(&self) -> &KeyId {
        &self.id
    }
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Key<T> {}

impl<T> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.id).finish()
    }
}

impl<T> fmt::Display for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Key<{}>: {}",
            short_type_name(self.id.payload_name),
            self.id.name
        )
    }
}

/// Strip module paths from every segment of a `type_name`, so
/// `core::option::Option<alloc::string::String>` becomes `Option<String>`.
fn short_type_name(full: &str) -> String {
    let mut short = String::with_capacity(full.len());
    let mut start = 0;
    for (i, c) in full.char_indices() {
        if matches!(c, '<' | '>' | ',' | '(' | ')' | '[' | ']' | ';' | '&' | '*' | ' ') {
            short.push_str(last_segment(&full[start..i]));
            short.push(c);
            start = i + c.len_utf8();
        }
    }
    short.push_str(last_segment(&full[start..]));
    short
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

// ---------------------------------------------------------------------------
// KeyRegistry
// ---------------------------------------------------------------------------

/// Set of key names handed out so far.
///
/// The check-and-insert performed by [`KeyRegistry::key`] runs under a single
/// lock, so two concurrent callers can never both mint the same name.
///
/// Every registry has its own identity, carried by the keys it mints. A key
/// from one registry never equals a key from another, even when both share a
/// name and payload type.
pub struct KeyRegistry {
    id: u64,
    names: Mutex<HashSet<Arc<str>>>,
}

impl KeyRegistry {
    /// Create an empty registry, independent of the global one.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed),
            names: Mutex::new(HashSet::new()),
        }
    }

    /// The process-wide registry backing [`Key::of`].
    pub fn global() -> &'static Self {
        &GLOBAL_KEYS
    }

    /// Mint a new key named `name` carrying payloads of type `T`.
    pub fn key<T: 'static>(&self, name: impl AsRef<str>) -> Result<Key<T>, KeyError> {
        let name = name.as_ref();
        if name.trim().is_empty() {
            return Err(KeyError::Blank);
        }

        let name: Arc<str> = Arc::from(name);
        {
            let mut names = self.names.lock();
            if !names.insert(Arc::clone(&name)) {
                return Err(KeyError::Conflict {
                    name: name.to_string(),
                });
            }
        }

        tracing::debug!(key = %name, payload = type_name::<T>(), "event key registered");
        Ok(Key {
            id: KeyId::of::<T>(name, self.id),
            _payload: PhantomData,
        })
    }

    /// Whether `name` has already been minted.
    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    /// Number of names minted so far.
    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    /// Whether no names have been minted.
    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }

    /// Forget every minted name so test suites can reuse them.
    ///
    /// Keys minted before the call stay valid; a new key with a reused name
    /// compares equal to an old one of the same payload type.
    #[cfg(any(test, feature = "testing"))]
    pub fn clear_for_testing(&self) {
        self.names.lock().clear();
    }
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRegistry")
            .field("id", &self.id)
            .field("registered", &self.len())
            .finish()
    }
}
