use crate::error::{BuildError, LoadError};
use crate::handles::{Cache, LoadingCache};
use crate::listener::RemovalListener;
use crate::loader::{BatchLoaderFn, LoaderFn};
use crate::metrics::StatsRecorder;
use crate::policy::{EvictionPolicy, RecencyList, Weigher};
use crate::shared::CacheShared;
use crate::store::ShardedStore;
use crate::task::janitor::{Janitor, MaintenanceContext};
use crate::task::notifier::Notifier;

use core::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

use ahash::HashMap;
use parking_lot::Mutex;

/// A builder for creating [`Cache`] and [`LoadingCache`] instances.
///
/// Exactly one eviction policy must be configured; the policy slot is the
/// structural guarantee that policies never combine within one cache.
pub struct CacheBuilder<K: Send, V: Send + Sync, H = ahash::RandomState> {
  policy: Option<EvictionPolicy<K, V>>,
  shards: usize,
  janitor_tick_interval: Option<Duration>,
  hasher: H,
  listener: Option<Arc<dyn RemovalListener<K, V>>>,
  loader: Option<LoaderFn<K, V>>,
  batch_loader: Option<BatchLoaderFn<K, V>>,
}

impl<K: Send, V: Send + Sync, H> fmt::Debug for CacheBuilder<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("policy", &self.policy)
      .field("shards", &self.shards)
      .field("has_listener", &self.listener.is_some())
      .field("has_loader", &self.loader.is_some())
      .finish_non_exhaustive()
  }
}

impl<K: Send, V: Send + Sync, H: BuildHasher + Default> CacheBuilder<K, V, H> {
  /// Creates a new `CacheBuilder` with default settings.
  pub fn new() -> Self {
    Self {
      policy: None,
      // At least 1 and a power of two for fast bitwise shard selection.
      shards: (num_cpus::get() * 4).max(1).next_power_of_two(),
      janitor_tick_interval: None,
      hasher: H::default(),
      listener: None,
      loader: None,
      batch_loader: None,
    }
  }
}

impl<K: Send, V: Send + Sync> Default for CacheBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

// --- General configuration methods ---
impl<K: Send, V: Send + Sync, H> CacheBuilder<K, V, H> {
  /// Binds the eviction policy. A later call replaces an earlier one; the
  /// built cache always carries exactly one policy.
  pub fn eviction_policy(mut self, policy: EvictionPolicy<K, V>) -> Self {
    self.policy = Some(policy);
    self
  }

  /// Shorthand for a [`EvictionPolicy::TimeToLive`] policy.
  pub fn time_to_live(self, duration: Duration) -> Self {
    self.eviction_policy(EvictionPolicy::TimeToLive(duration))
  }

  /// Shorthand for a [`EvictionPolicy::TimeToIdle`] policy.
  pub fn time_to_idle(self, duration: Duration) -> Self {
    self.eviction_policy(EvictionPolicy::TimeToIdle(duration))
  }

  /// Shorthand for a [`EvictionPolicy::SizeBounded`] policy.
  pub fn max_entries(self, max_entries: u64) -> Self {
    self.eviction_policy(EvictionPolicy::SizeBounded(max_entries))
  }

  /// Shorthand for a [`EvictionPolicy::WeightBounded`] policy with the
  /// given weigher.
  pub fn max_weight(self, max_weight: u64, weigher: Weigher<K, V>) -> Self {
    self.eviction_policy(EvictionPolicy::WeightBounded {
      max_weight,
      weigher,
    })
  }

  /// Sets the number of concurrent shards. Clamped to at least 1 and
  /// rounded up to a power of two.
  pub fn shards(mut self, shards: usize) -> Self {
    self.shards = shards.max(1).next_power_of_two();
    self
  }

  /// Sets the removal listener for the cache. It is invoked on a dedicated
  /// background thread for every removal, policy-driven or explicit.
  pub fn removal_listener<L>(mut self, listener: L) -> Self
  where
    L: RemovalListener<K, V> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }

  /// Sets the compute function used by [`LoadingCache::fetch`] when a key
  /// is missing.
  pub fn loader(
    mut self,
    f: impl Fn(K) -> Result<V, LoadError> + Send + Sync + 'static,
  ) -> Self {
    self.loader = Some(Arc::new(f));
    self
  }

  /// Sets the batch compute function used by [`LoadingCache::get_all`] for
  /// the missing subset of a multi-key request.
  pub fn batch_loader(
    mut self,
    f: impl Fn(Vec<K>) -> Result<HashMap<K, V>, LoadError> + Send + Sync + 'static,
  ) -> Self {
    self.batch_loader = Some(Arc::new(f));
    self
  }

  /// Sets the tick interval for the background cleanup task.
  /// (Primarily for testing purposes.)
  #[doc(hidden)]
  pub fn janitor_tick_interval(mut self, duration: Duration) -> Self {
    self.janitor_tick_interval = Some(duration);
    self
  }

  // Already-shared function variants, used by the registry builder.

  pub(crate) fn removal_listener_arc(mut self, listener: Arc<dyn RemovalListener<K, V>>) -> Self {
    self.listener = Some(listener);
    self
  }

  pub(crate) fn loader_arc(mut self, loader: LoaderFn<K, V>) -> Self {
    self.loader = Some(loader);
    self
  }

  pub(crate) fn batch_loader_arc(mut self, batch_loader: BatchLoaderFn<K, V>) -> Self {
    self.batch_loader = Some(batch_loader);
    self
  }
}

// --- Build methods ---
// The full set of trait bounds required to actually construct the cache,
// including `K: Clone` for the janitor.
impl<K, V, H> CacheBuilder<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Sets the hasher for the cache.
  pub fn hasher(mut self, hasher: H) -> Self {
    self.hasher = hasher;
    self
  }

  /// Builds a [`Cache`].
  pub fn build(mut self) -> Result<Cache<K, V, H>, BuildError> {
    let shared = self.build_shared_core()?;
    Ok(Cache { shared })
  }

  /// Builds a [`LoadingCache`]. Fails unless a loader was configured.
  pub fn build_loading(mut self) -> Result<LoadingCache<K, V, H>, BuildError> {
    let loader = self.loader.take().ok_or(BuildError::MissingLoader)?;
    let batch_loader = self.batch_loader.take();
    let shared = self.build_shared_core()?;
    Ok(LoadingCache {
      cache: Cache { shared },
      loader,
      batch_loader,
    })
  }

  /// Central logic to construct and validate the shared core of the cache.
  fn build_shared_core(&mut self) -> Result<Arc<CacheShared<K, V, H>>, BuildError> {
    let policy = self.policy.take().ok_or(BuildError::MissingPolicy)?;
    policy.validate()?;
    let policy = Arc::new(policy);

    let store = Arc::new(ShardedStore::new(self.shards, self.hasher.clone()));
    let stats = Arc::new(StatsRecorder::new());
    let recency = Arc::new(Mutex::new(RecencyList::new()));

    let pending_loads = (0..self.shards)
      .map(|_| Mutex::new(HashMap::default()))
      .collect::<Vec<_>>()
      .into_boxed_slice();

    let (notifier, notification_tx) = match self.listener.take() {
      Some(listener) => {
        let (notifier, tx) = Notifier::spawn(listener);
        (Some(notifier), Some(tx))
      }
      None => (None, None),
    };

    let janitor_context = MaintenanceContext {
      store: Arc::clone(&store),
      stats: Arc::clone(&stats),
      policy: Arc::clone(&policy),
      recency: Arc::clone(&recency),
      notification_tx: notification_tx.clone(),
    };
    let tick_interval = self
      .janitor_tick_interval
      .unwrap_or(Duration::from_secs(1));
    let janitor = Janitor::spawn(janitor_context, tick_interval);

    Ok(Arc::new(CacheShared {
      store,
      stats,
      policy,
      recency,
      pending_loads,
      notification_tx,
      notifier,
      janitor: Some(janitor),
    }))
  }
}
