use crate::entry::CacheEntry;
use crate::listener::RemovalCause;
use crate::metrics::StatsRecorder;
use crate::policy::{CapacityBound, EvictionPolicy, RecencyList};
use crate::store::ShardedStore;
use crate::task::notifier::Notification;

use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;

/// The thread-safe parts of a cache that maintenance needs to touch.
///
/// One context is shared by the background janitor and by inline
/// maintenance on the insert path, so both run the same routine.
pub(crate) struct MaintenanceContext<K: Send, V: Send + Sync, H> {
  pub(crate) store: Arc<ShardedStore<K, V, H>>,
  pub(crate) stats: Arc<StatsRecorder>,
  pub(crate) policy: Arc<EvictionPolicy<K, V>>,
  pub(crate) recency: Arc<Mutex<RecencyList<K>>>,
  pub(crate) notification_tx: Option<Sender<Notification<K, V>>>,
}

impl<K: Send, V: Send + Sync, H> Clone for MaintenanceContext<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      stats: Arc::clone(&self.stats),
      policy: Arc::clone(&self.policy),
      recency: Arc::clone(&self.recency),
      notification_tx: self.notification_tx.clone(),
    }
  }
}

/// The full maintenance pass: expired entries first, then the capacity
/// bound. Idempotent, safe to interleave with reads on unrelated keys, and
/// bounded by the number of expired/excess entries it removes.
pub(crate) fn run_maintenance<K, V, H>(context: &MaintenanceContext<K, V, H>)
where
  K: Eq + Hash + Clone + Send,
  V: Send + Sync,
  H: BuildHasher + Clone,
{
  sweep_expired(context);
  enforce_capacity(context);
}

/// Removes every entry whose policy reports it expired.
///
/// Shards are locked one at a time; notifications go out after the shard
/// lock is released.
pub(crate) fn sweep_expired<K, V, H>(context: &MaintenanceContext<K, V, H>)
where
  K: Eq + Hash + Clone + Send,
  V: Send + Sync,
  H: BuildHasher + Clone,
{
  if !context.policy.has_expiry() {
    return;
  }

  for shard in context.store.iter_shards() {
    let mut expired: Vec<(K, Arc<CacheEntry<V>>)> = Vec::new();
    {
      let mut guard = shard.write();
      guard.retain(|key, entry| {
        if context.policy.is_expired(entry) {
          expired.push((key.clone(), entry.clone()));
          false
        } else {
          true
        }
      });
    }

    for (key, entry) in expired {
      context.stats.evictions.fetch_add(1, Ordering::Relaxed);
      context
        .stats
        .current_weight
        .fetch_sub(entry.weight(), Ordering::Relaxed);
      if let Some(tx) = &context.notification_tx {
        let _ = tx.try_send((key, entry.value(), RemovalCause::Expired));
      }
    }
  }
}

/// Removes least-recently-used entries, one at a time, while the entry
/// count or total weight exceeds the policy bound. Insertion order breaks
/// ties: untouched entries leave the recency queue oldest-first.
pub(crate) fn enforce_capacity<K, V, H>(context: &MaintenanceContext<K, V, H>)
where
  K: Eq + Hash + Clone + Send,
  V: Send + Sync,
  H: BuildHasher + Clone,
{
  let Some(bound) = context.policy.bound() else {
    return;
  };

  loop {
    let over = match bound {
      CapacityBound::Entries(max) => context.store.len() > max,
      CapacityBound::Weight(max) => context.stats.current_weight.load(Ordering::Relaxed) > max,
    };
    if !over {
      break;
    }

    // The recency lock is released before the victim's shard is locked.
    let victim = { context.recency.lock().pop_lru() };
    let Some(victim) = victim else {
      break;
    };

    let removed = { context.store.shard_for(&victim).write().remove(&victim) };
    if let Some(entry) = removed {
      context.stats.evictions.fetch_add(1, Ordering::Relaxed);
      context
        .stats
        .current_weight
        .fetch_sub(entry.weight(), Ordering::Relaxed);
      if let Some(tx) = &context.notification_tx {
        let _ = tx.try_send((victim, entry.value(), RemovalCause::Capacity));
      }
    }
  }
}

/// The background task responsible for periodic cleanup of the cache.
pub(crate) struct Janitor {
  handle: JoinHandle<()>,
  shutdown_tx: Sender<()>,
}

impl Janitor {
  /// Spawns a new janitor thread running the maintenance pass on a fixed
  /// tick.
  pub(crate) fn spawn<K, V, H>(
    context: MaintenanceContext<K, V, H>,
    tick_interval: Duration,
  ) -> Self
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: BuildHasher + Clone + Send + Sync + 'static,
  {
    let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

    let handle = thread::spawn(move || loop {
      match shutdown_rx.recv_timeout(tick_interval) {
        Err(RecvTimeoutError::Timeout) => run_maintenance(&context),
        // Disconnected or an explicit message: the cache is shutting down.
        _ => break,
      }
    });

    Self {
      handle,
      shutdown_tx,
    }
  }

  /// Signals the janitor thread to stop and waits for it to exit.
  pub(crate) fn stop(self) {
    drop(self.shutdown_tx);
    let _ = self.handle.join();
  }
}
