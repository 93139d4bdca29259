//! Removal notifications.
//!
//! A [`RemovalListener`] is invoked on a dedicated background thread for
//! every entry that leaves the cache, together with the [`RemovalCause`]
//! describing why.

use std::sync::Arc;

/// Describes why an entry was removed from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
  /// The entry was evicted because the cache exceeded its capacity.
  Capacity,
  /// The entry was evicted because its TTL or TTI elapsed.
  Expired,
  /// The entry was removed by an explicit `invalidate`/`clear`.
  Invalidated,
}

impl RemovalCause {
  /// Returns `true` when the removal was a policy-driven eviction rather
  /// than an explicit invalidation.
  pub fn is_eviction(&self) -> bool {
    matches!(self, RemovalCause::Capacity | RemovalCause::Expired)
  }
}

/// Receives a notification for every entry removed from the cache.
///
/// Implemented for any `Fn(K, Arc<V>, RemovalCause)` closure, so listeners
/// can be supplied as plain closures.
pub trait RemovalListener<K, V>: Send + Sync {
  /// Called once per removed entry with its key, value and cause.
  fn on_removal(&self, key: K, value: Arc<V>, cause: RemovalCause);
}

impl<K, V, F> RemovalListener<K, V> for F
where
  F: Fn(K, Arc<V>, RemovalCause) + Send + Sync,
{
  fn on_removal(&self, key: K, value: Arc<V>, cause: RemovalCause) {
    self(key, value, cause)
  }
}
