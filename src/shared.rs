use crate::entry::CacheEntry;
use crate::error::{CacheError, LoadError};
use crate::loader::LoadFuture;
use crate::metrics::StatsRecorder;
use crate::policy::{EvictionPolicy, RecencyList};
use crate::store::{hash_key, ShardedStore};
use crate::task::janitor::{enforce_capacity, Janitor, MaintenanceContext};
use crate::task::notifier::{Notification, Notifier};

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use ahash::HashMap;
use crossbeam_channel::Sender;
use parking_lot::Mutex;

/// A compute function for a single pending load, boxed for the loader
/// thread.
pub(crate) type ComputeFn<K, V> = Box<dyn FnOnce(K) -> Result<V, LoadError> + Send>;

/// The internal, thread-safe core of the cache. Handles are cheap clones
/// of an `Arc` around this.
pub(crate) struct CacheShared<K: Send, V: Send + Sync, H> {
  pub(crate) store: Arc<ShardedStore<K, V, H>>,
  pub(crate) stats: Arc<StatsRecorder>,
  pub(crate) policy: Arc<EvictionPolicy<K, V>>,
  pub(crate) recency: Arc<Mutex<RecencyList<K>>>,
  /// Per-key in-flight-computation markers, sharded like the store.
  pub(crate) pending_loads: Box<[Mutex<HashMap<K, Arc<LoadFuture<V>>>>]>,
  pub(crate) notification_tx: Option<Sender<Notification<K, V>>>,
  pub(crate) notifier: Option<Notifier>,
  pub(crate) janitor: Option<Janitor>,
}

impl<K: Send, V: Send + Sync, H> fmt::Debug for CacheShared<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("policy", &self.policy)
      .field("num_shards", &self.store.shards.len())
      .finish_non_exhaustive()
  }
}

impl<K: Send, V: Send + Sync, H> Drop for CacheShared<K, V, H> {
  fn drop(&mut self) {
    // Stop the janitor first: its maintenance context holds a clone of the
    // notification sender, and the notifier thread only exits once every
    // sender is gone.
    if let Some(janitor) = self.janitor.take() {
      janitor.stop();
    }
    drop(self.notification_tx.take());
    if let Some(notifier) = self.notifier.take() {
      notifier.stop();
    }
  }
}

impl<K, V, H> CacheShared<K, V, H>
where
  K: Eq + Hash + Clone + Send,
  V: Send + Sync,
  H: BuildHasher + Clone,
{
  /// Assembles the context shared by inline and background maintenance.
  pub(crate) fn maintenance_context(&self) -> MaintenanceContext<K, V, H> {
    MaintenanceContext {
      store: Arc::clone(&self.store),
      stats: Arc::clone(&self.stats),
      policy: Arc::clone(&self.policy),
      recency: Arc::clone(&self.recency),
      notification_tx: self.notification_tx.clone(),
    }
  }

  #[inline]
  pub(crate) fn pending_shard(&self, key: &K) -> &Mutex<HashMap<K, Arc<LoadFuture<V>>>> {
    let hash = hash_key(&self.store.hasher, key);
    &self.pending_loads[hash as usize & (self.pending_loads.len() - 1)]
  }

  pub(crate) fn remove_pending(&self, key: &K) {
    self.pending_shard(key).lock().remove(key);
  }

  /// Inserts or replaces a value, adjusting weight accounting and recency
  /// bookkeeping, then synchronously enforces the capacity bound.
  ///
  /// Replacement resets the entry's creation and access timestamps. The
  /// shard guard is released before the recency lock is taken.
  pub(crate) fn insert_value(&self, key: K, value: V) -> Arc<V> {
    let weight = self.policy.weight_of(&key, &value);
    let entry = Arc::new(CacheEntry::new(value, weight));
    let value_arc = entry.value();

    let old_entry = {
      let mut guard = self.store.shard_for(&key).write();
      guard.insert(key.clone(), entry)
    };

    if let Some(old_entry) = old_entry {
      self
        .stats
        .current_weight
        .fetch_sub(old_entry.weight(), Ordering::Relaxed);
    }
    self
      .stats
      .current_weight
      .fetch_add(weight, Ordering::Relaxed);

    if self.policy.tracks_recency() {
      self.recency.lock().record(&key);
    }

    enforce_capacity(&self.maintenance_context());
    value_arc
  }
}

impl<K, V, H> CacheShared<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// The leader/waiter protocol for a missing key.
  ///
  /// The first caller to register an in-flight marker becomes the leader,
  /// records the single miss for the burst and spawns the load; everyone
  /// else becomes a waiter, records a hit (the shared result satisfies the
  /// request without a second computation) and blocks on the same future.
  pub(crate) fn load_or_wait(
    self: &Arc<Self>,
    key: &K,
    compute: ComputeFn<K, V>,
    timeout: Option<Duration>,
  ) -> Result<Arc<V>, CacheError> {
    let mut am_leader = false;
    let future = {
      let mut pending = self.pending_shard(key).lock();
      match pending.get(key) {
        Some(existing) => {
          self.stats.hits.fetch_add(1, Ordering::Relaxed);
          existing.clone()
        }
        None => {
          // The only point where a miss is recorded for the whole burst.
          self.stats.misses.fetch_add(1, Ordering::Relaxed);
          let fresh = Arc::new(LoadFuture::new());
          pending.insert(key.clone(), fresh.clone());
          am_leader = true;
          fresh
        }
      }
    }; // The pending-loads guard is released before spawning or waiting.

    if am_leader {
      Self::spawn_load_task(Arc::clone(self), key.clone(), compute, future.clone());
    }

    future.wait(timeout)
  }

  /// Runs a compute function on a dedicated thread and resolves the
  /// pending future with its outcome.
  ///
  /// The load runs outside every cache lock, and because no waiter thread
  /// executes it, a caller-side timeout never cancels the computation. On
  /// success the value is stored before the in-flight marker is cleared,
  /// so no request can observe the key as both absent and not pending. On
  /// failure nothing is cached, the marker is cleared and all waiters see
  /// the same shared error.
  pub(crate) fn spawn_load_task(
    shared: Arc<Self>,
    key: K,
    compute: ComputeFn<K, V>,
    future: Arc<LoadFuture<V>>,
  ) {
    thread::spawn(move || {
      let started = Instant::now();
      let result = compute(key.clone());
      let elapsed = started.elapsed();

      match result {
        Ok(value) => {
          shared.stats.record_load(elapsed, true);
          let value_arc = shared.insert_value(key.clone(), value);
          shared.remove_pending(&key);
          future.complete(value_arc);
        }
        Err(error) => {
          shared.stats.record_load(elapsed, false);
          shared.remove_pending(&key);
          future.fail(Arc::new(error));
        }
      }
    });
  }
}
