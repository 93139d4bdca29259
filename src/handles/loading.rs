use crate::error::CacheError;
use crate::handles::Cache;
use crate::loader::{BatchLoaderFn, LoaderFn};
use crate::metrics::StatsSnapshot;
use crate::monitor::StatsSource;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::HashMap;

/// A cache that knows how to compute missing values itself.
///
/// Built with [`CacheBuilder::build_loading`](crate::CacheBuilder::build_loading);
/// carries the compute function bound at construction and guarantees at
/// most one concurrent computation per missing key. Dereferences to
/// [`Cache`] for the plain operations (`insert`, `get`, `invalidate`,
/// `stats`, ...).
pub struct LoadingCache<K: Send, V: Send + Sync, H = ahash::RandomState> {
  pub(crate) cache: Cache<K, V, H>,
  pub(crate) loader: LoaderFn<K, V>,
  pub(crate) batch_loader: Option<BatchLoaderFn<K, V>>,
}

impl<K: Send, V: Send + Sync, H> Clone for LoadingCache<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      loader: self.loader.clone(),
      batch_loader: self.batch_loader.clone(),
    }
  }
}

impl<K: Send, V: Send + Sync, H> fmt::Debug for LoadingCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LoadingCache")
      .field("cache", &self.cache)
      .field("has_batch_loader", &self.batch_loader.is_some())
      .finish()
  }
}

impl<K: Send, V: Send + Sync, H> Deref for LoadingCache<K, V, H> {
  type Target = Cache<K, V, H>;

  fn deref(&self) -> &Self::Target {
    &self.cache
  }
}

impl<K, V, H> LoadingCache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Returns the cached value or computes it with the loader bound at
  /// construction.
  ///
  /// Stampede-safe: a burst of concurrent calls for the same missing key
  /// runs the loader exactly once and every caller observes the same
  /// result — or the same failure.
  pub fn fetch(&self, key: &K) -> Result<Arc<V>, CacheError> {
    self.fetch_inner(key, None)
  }

  /// [`LoadingCache::fetch`] with a caller-imposed deadline. The load
  /// itself is never cancelled by a waiter's timeout.
  pub fn fetch_timeout(&self, key: &K, timeout: Duration) -> Result<Arc<V>, CacheError> {
    self.fetch_inner(key, Some(timeout))
  }

  fn fetch_inner(&self, key: &K, timeout: Option<Duration>) -> Result<Arc<V>, CacheError> {
    if let Some(value) = self.cache.lookup(key) {
      return Ok(value);
    }
    let loader = self.loader.clone();
    self
      .cache
      .shared
      .load_or_wait(key, Box::new(move |k| loader(k)), timeout)
  }

  /// Returns the values for `keys`, computing only the missing subset.
  ///
  /// With a batch loader configured, the whole missing subset goes through
  /// one loader invocation, counted as one load; keys the batch loader
  /// omits are simply absent from the result. The batch path does not
  /// coordinate with concurrent single-key loads for the same keys.
  /// Without a batch loader, each missing key takes the stampede-safe
  /// single-key path and the first failure aborts the call.
  pub fn get_all<I>(&self, keys: I) -> Result<HashMap<K, Arc<V>>, CacheError>
  where
    I: IntoIterator<Item = K>,
  {
    match &self.batch_loader {
      Some(batch_loader) => {
        let mut results = HashMap::default();
        let mut missing = Vec::new();
        for key in keys {
          if results.contains_key(&key) || missing.contains(&key) {
            continue;
          }
          match self.cache.get(&key) {
            Some(value) => {
              results.insert(key, value);
            }
            None => missing.push(key),
          }
        }

        if !missing.is_empty() {
          let batch_loader = batch_loader.clone();
          let started = Instant::now();
          let outcome = batch_loader(missing);
          let elapsed = started.elapsed();
          match outcome {
            Ok(loaded) => {
              self.cache.shared.stats.record_load(elapsed, true);
              for (key, value) in loaded {
                let value_arc = self.cache.shared.insert_value(key.clone(), value);
                results.insert(key, value_arc);
              }
            }
            Err(error) => {
              self.cache.shared.stats.record_load(elapsed, false);
              return Err(CacheError::LoadFailed(Arc::new(error)));
            }
          }
        }

        Ok(results)
      }
      None => {
        let mut results = HashMap::default();
        for key in keys {
          if results.contains_key(&key) {
            continue;
          }
          let value = self.fetch(&key)?;
          results.insert(key, value);
        }
        Ok(results)
      }
    }
  }
}

impl<K, V, H> StatsSource for LoadingCache<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  fn stats(&self) -> StatsSnapshot {
    self.cache.stats()
  }
}
