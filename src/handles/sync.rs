use crate::entry::CacheEntry;
use crate::error::{CacheError, LoadError};
use crate::listener::RemovalCause;
use crate::metrics::StatsSnapshot;
use crate::monitor::StatsSource;
use crate::shared::CacheShared;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// A thread-safe cache bound to one eviction policy.
///
/// Handles are cheap clones sharing the same underlying store; values are
/// held in `Arc<V>` so `V` never needs to be `Clone`.
pub struct Cache<K: Send, V: Send + Sync, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
}

impl<K: Send, V: Send + Sync, H> fmt::Debug for Cache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache").field("shared", &self.shared).finish()
  }
}

impl<K: Send, V: Send + Sync, H> Clone for Cache<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<K, V, H> Cache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Inserts or replaces a value. Replacement resets the entry's creation
  /// and last-access timestamps. Capacity bounds are enforced
  /// synchronously before this call returns; always succeeds.
  pub fn insert(&self, key: K, value: V) {
    let _ = self.shared.insert_value(key, value);
  }

  /// Returns the value for a key if present and unexpired, without
  /// computing one.
  ///
  /// A hit refreshes the entry's idle clock (time-to-idle policies) or its
  /// recency (capacity-bounded policies) and counts one hit. A miss counts
  /// one miss; when the miss is an expired entry, the entry is physically
  /// removed and counted as one eviction.
  pub fn get(&self, key: &K) -> Option<Arc<V>> {
    match self.lookup(key) {
      Some(value) => Some(value),
      None => {
        self.shared.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  /// Reads a value without touching statistics, recency or the idle clock.
  pub fn peek(&self, key: &K) -> Option<Arc<V>> {
    let guard = self.shared.store.shard_for(key).read();
    match guard.get(key) {
      Some(entry) if !self.shared.policy.is_expired(entry) => Some(entry.value()),
      _ => None,
    }
  }

  /// Returns the cached value or computes it with `f`.
  ///
  /// This is the fully stampede-safe variant: when N callers request the
  /// same missing key concurrently, exactly one compute function runs (on
  /// a dedicated thread) and the other N−1 block on its result. A loader
  /// error is cached nowhere, counts one load failure and is delivered to
  /// every waiter; a later call is free to retry.
  pub fn get_with<F>(&self, key: &K, f: F) -> Result<Arc<V>, CacheError>
  where
    F: FnOnce(K) -> Result<V, LoadError> + Send + 'static,
  {
    if let Some(value) = self.lookup(key) {
      return Ok(value);
    }
    self.shared.load_or_wait(key, Box::new(f), None)
  }

  /// [`Cache::get_with`] with a caller-imposed deadline.
  ///
  /// On timeout the caller gets [`CacheError::LoadTimeout`]; the in-flight
  /// computation continues to completion for the benefit of other waiters
  /// and the store.
  pub fn get_with_timeout<F>(
    &self,
    key: &K,
    f: F,
    timeout: Duration,
  ) -> Result<Arc<V>, CacheError>
  where
    F: FnOnce(K) -> Result<V, LoadError> + Send + 'static,
  {
    if let Some(value) = self.lookup(key) {
      return Ok(value);
    }
    self.shared.load_or_wait(key, Box::new(f), Some(timeout))
  }

  /// Removes an entry, returning `true` if the key was present.
  ///
  /// Explicit removal counts as an invalidation, never as an eviction:
  /// callers of [`Cache::stats`] can tell "removed by request" apart from
  /// "removed by policy".
  pub fn invalidate(&self, key: &K) -> bool {
    let removed = { self.shared.store.shard_for(key).write().remove(key) };

    if let Some(entry) = removed {
      self
        .shared
        .stats
        .invalidations
        .fetch_add(1, Ordering::Relaxed);
      self
        .shared
        .stats
        .current_weight
        .fetch_sub(entry.weight(), Ordering::Relaxed);
      if self.shared.policy.tracks_recency() {
        self.shared.recency.lock().remove(key);
      }
      if let Some(tx) = &self.shared.notification_tx {
        let _ = tx.try_send((key.clone(), entry.value(), RemovalCause::Invalidated));
      }
      true
    } else {
      false
    }
  }

  /// Removes every entry in `keys`.
  pub fn invalidate_many<I>(&self, keys: I)
  where
    I: IntoIterator<Item = K>,
  {
    for key in keys {
      self.invalidate(&key);
    }
  }

  /// Removes all entries. A "stop-the-world" operation: every shard is
  /// write-locked for the duration of the drain.
  pub fn clear(&self) {
    let mut drained: Vec<(K, Arc<CacheEntry<V>>)> = Vec::new();
    {
      let mut guards = self
        .shared
        .store
        .iter_shards()
        .map(|shard| shard.write())
        .collect::<Vec<_>>();
      for guard in guards.iter_mut() {
        drained.extend(guard.drain());
      }
    } // All shard locks are released before bookkeeping.

    self
      .shared
      .stats
      .invalidations
      .fetch_add(drained.len() as u64, Ordering::Relaxed);
    self.shared.stats.current_weight.store(0, Ordering::Relaxed);
    self.shared.recency.lock().clear();

    if let Some(tx) = &self.shared.notification_tx {
      for (key, entry) in drained {
        let _ = tx.try_send((key, entry.value(), RemovalCause::Invalidated));
      }
    }
  }

  /// Approximate live entry count. May lag under concurrent mutation;
  /// callers must not rely on it for exact accounting.
  pub fn len(&self) -> u64 {
    self.shared.store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns the current accumulated statistics as an immutable copy.
  pub fn stats(&self) -> StatsSnapshot {
    self.shared.stats.snapshot(self.shared.store.len())
  }

  /// Looks up a live entry and runs the hit path, without recording a
  /// miss: the load protocol accounts for misses itself, once per burst.
  pub(crate) fn lookup(&self, key: &K) -> Option<Arc<V>> {
    let entry_opt = {
      let guard = self.shared.store.shard_for(key).read();
      guard.get(key).cloned()
    }; // The read lock is dropped before any bookkeeping.

    match entry_opt {
      Some(entry) if self.shared.policy.is_expired(&entry) => {
        self.remove_expired(key);
        None
      }
      Some(entry) => {
        self.on_hit(key, &entry);
        Some(entry.value())
      }
      None => None,
    }
  }

  /// Common logic on a cache hit: refresh the idle clock or recency and
  /// count the hit.
  fn on_hit(&self, key: &K, entry: &Arc<CacheEntry<V>>) {
    if self.shared.policy.refreshes_on_access() {
      entry.touch();
    }
    if self.shared.policy.tracks_recency() {
      self.shared.recency.lock().touch(key);
    }
    self.shared.stats.hits.fetch_add(1, Ordering::Relaxed);
  }

  /// Physically removes an entry observed expired during a read and counts
  /// it as one eviction. Re-checks under the write lock: a concurrent
  /// `insert` may have replaced the entry with a fresh one.
  fn remove_expired(&self, key: &K) {
    let removed = {
      let mut guard = self.shared.store.shard_for(key).write();
      let still_expired = guard
        .get(key)
        .map(|entry| self.shared.policy.is_expired(entry))
        .unwrap_or(false);
      if still_expired {
        guard.remove(key)
      } else {
        None
      }
    };

    if let Some(entry) = removed {
      self.shared.stats.evictions.fetch_add(1, Ordering::Relaxed);
      self
        .shared
        .stats
        .current_weight
        .fetch_sub(entry.weight(), Ordering::Relaxed);
      if let Some(tx) = &self.shared.notification_tx {
        let _ = tx.try_send((key.clone(), entry.value(), RemovalCause::Expired));
      }
    }
  }
}

impl<K, V, H> StatsSource for Cache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  fn stats(&self) -> StatsSnapshot {
    Cache::stats(self)
  }
}
