use crate::time;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A container for a value in the cache, holding all necessary metadata.
///
/// Entries are owned exclusively by the cache that created them; only the
/// cache's internal operations touch the access timestamp.
#[derive(Debug)]
pub(crate) struct CacheEntry<V> {
  /// The user's value, wrapped in an Arc for shared ownership.
  pub(crate) value: Arc<V>,
  /// The weight charged against a weight-bounded policy. 1 for all others.
  weight: u64,
  /// Creation timestamp in nanoseconds since the crate epoch. Reset by
  /// replacement: a `put` over an existing key produces a fresh entry.
  pub(crate) created_at: u64,
  /// Last access timestamp in nanoseconds. Refreshed on reads when the
  /// cache uses a time-to-idle policy.
  last_accessed: AtomicU64,
}

impl<V> CacheEntry<V> {
  pub(crate) fn new(value: V, weight: u64) -> Self {
    let now = time::now_nanos();
    Self {
      value: Arc::new(value),
      weight,
      created_at: now,
      last_accessed: AtomicU64::new(now),
    }
  }

  /// Returns a clone of the `Arc` containing the value.
  #[inline]
  pub(crate) fn value(&self) -> Arc<V> {
    self.value.clone()
  }

  #[inline]
  pub(crate) fn weight(&self) -> u64 {
    self.weight
  }

  /// Updates the last accessed timestamp to the current time.
  /// A cheap atomic store.
  #[inline]
  pub(crate) fn touch(&self) {
    self.last_accessed.store(time::now_nanos(), Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn last_accessed_nanos(&self) -> u64 {
    self.last_accessed.load(Ordering::Relaxed)
  }
}
