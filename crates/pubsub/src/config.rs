//! Bus configuration types

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which [`SubscriberStore`](crate::SubscriberStore) a bus is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StoreKind {
    /// [`LockedStore`](crate::LockedStore): one lock over the whole registry.
    #[default]
    Locked,
    /// [`ShardedStore`](crate::ShardedStore): per-shard locking.
    Sharded,
}

/// Configuration for a [`Bus`](crate::Bus)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BusConfig {
    /// Trap handler panics and report them as failures instead of unwinding
    /// into the publisher
    pub catch_panics: bool,
    /// Log every handler failure at `warn` level
    pub log_failures: bool,
    /// Registry strategy
    pub store: StoreKind,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            catch_panics: true,
            log_failures: true,
            store: StoreKind::Locked,
        }
    }
}

impl BusConfig {
    /// Set [`catch_panics`](Self::catch_panics).
    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    /// Set [`log_failures`](Self::log_failures).
    pub fn with_log_failures(mut self, enabled: bool) -> Self {
        self.log_failures = enabled;
        self
    }

    /// Set [`store`](Self::store).
    pub fn with_store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }
}
