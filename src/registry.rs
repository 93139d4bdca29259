use crate::builder::CacheBuilder;
use crate::config::{CacheDef, PolicyConfig, RegistryConfig};
use crate::error::{CacheError, ConfigError, LoadError};
use crate::handles::{Cache, LoadingCache};
use crate::listener::RemovalListener;
use crate::loader::{BatchLoaderFn, LoaderFn};
use crate::metrics::StatsSnapshot;
use crate::monitor::StatsSource;
use crate::policy::{EvictionPolicy, Weigher};

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

use ahash::HashMap;

/// A registered cache: either a plain [`Cache`] or a [`LoadingCache`].
#[derive(Debug)]
pub enum CacheHandle<K: Send, V: Send + Sync, H = ahash::RandomState> {
  Plain(Cache<K, V, H>),
  Loading(LoadingCache<K, V, H>),
}

impl<K: Send, V: Send + Sync, H> Clone for CacheHandle<K, V, H> {
  fn clone(&self) -> Self {
    match self {
      CacheHandle::Plain(cache) => CacheHandle::Plain(cache.clone()),
      CacheHandle::Loading(cache) => CacheHandle::Loading(cache.clone()),
    }
  }
}

impl<K, V, H> CacheHandle<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// The plain cache view: every handle is at least a [`Cache`].
  pub fn as_cache(&self) -> &Cache<K, V, H> {
    match self {
      CacheHandle::Plain(cache) => cache,
      CacheHandle::Loading(cache) => cache,
    }
  }

  /// The loading view, when the cache was configured with a loader.
  pub fn as_loading(&self) -> Option<&LoadingCache<K, V, H>> {
    match self {
      CacheHandle::Plain(_) => None,
      CacheHandle::Loading(cache) => Some(cache),
    }
  }

  pub fn is_loading(&self) -> bool {
    matches!(self, CacheHandle::Loading(_))
  }

  pub fn insert(&self, key: K, value: V) {
    self.as_cache().insert(key, value)
  }

  pub fn get(&self, key: &K) -> Option<Arc<V>> {
    self.as_cache().get(key)
  }

  pub fn invalidate(&self, key: &K) -> bool {
    self.as_cache().invalidate(key)
  }

  pub fn clear(&self) {
    self.as_cache().clear()
  }

  pub fn len(&self) -> u64 {
    self.as_cache().len()
  }

  pub fn is_empty(&self) -> bool {
    self.as_cache().is_empty()
  }

  pub fn stats(&self) -> StatsSnapshot {
    self.as_cache().stats()
  }
}

/// A named collection of cache instances, populated once at process start
/// from a fixed configuration list. No dynamic registration or removal at
/// runtime.
pub struct CacheRegistry<K: Send, V: Send + Sync, H = ahash::RandomState> {
  caches: HashMap<String, CacheHandle<K, V, H>>,
}

impl<K: Send, V: Send + Sync, H> fmt::Debug for CacheRegistry<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut names = self.caches.keys().collect::<Vec<_>>();
    names.sort();
    f.debug_struct("CacheRegistry").field("caches", &names).finish()
  }
}

impl<K, V, H> CacheRegistry<K, V, H>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  H: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Looks up a cache by name. An unregistered name is an error, not a
  /// silent no-op.
  pub fn get(&self, name: &str) -> Result<&CacheHandle<K, V, H>, CacheError> {
    self
      .caches
      .get(name)
      .ok_or_else(|| CacheError::UnknownCache(name.to_string()))
  }

  /// The registered names, sorted for stable iteration.
  pub fn names(&self) -> Vec<&str> {
    let mut names = self.caches.keys().map(String::as_str).collect::<Vec<_>>();
    names.sort_unstable();
    names
  }

  pub fn len(&self) -> usize {
    self.caches.len()
  }

  pub fn is_empty(&self) -> bool {
    self.caches.is_empty()
  }

  /// A name→statistics-source view of every registered cache, in the shape
  /// the monitoring engine consumes.
  pub fn stats_sources(&self) -> Vec<(String, Arc<dyn StatsSource>)> {
    let mut sources = self
      .caches
      .iter()
      .map(|(name, handle)| {
        let source: Arc<dyn StatsSource> = match handle {
          CacheHandle::Plain(cache) => Arc::new(cache.clone()),
          CacheHandle::Loading(cache) => Arc::new(cache.clone()),
        };
        (name.clone(), source)
      })
      .collect::<Vec<_>>();
    sources.sort_by(|a, b| a.0.cmp(&b.0));
    sources
  }
}

/// Wires a [`RegistryConfig`] to the functions configuration cannot carry:
/// loaders, batch loaders, weighers and removal listeners, each keyed by
/// cache name.
///
/// `build` validates everything up front; on any error no cache is
/// registered, so a registry never exists half-initialized.
pub struct RegistryBuilder<K: Send, V: Send + Sync> {
  config: RegistryConfig,
  loaders: HashMap<String, LoaderFn<K, V>>,
  batch_loaders: HashMap<String, BatchLoaderFn<K, V>>,
  weighers: HashMap<String, Weigher<K, V>>,
  listeners: HashMap<String, Arc<dyn RemovalListener<K, V>>>,
  janitor_tick_interval: Option<Duration>,
}

impl<K: Send, V: Send + Sync> fmt::Debug for RegistryBuilder<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RegistryBuilder")
      .field("config", &self.config)
      .field("loaders", &self.loaders.len())
      .field("weighers", &self.weighers.len())
      .finish_non_exhaustive()
  }
}

impl<K, V> RegistryBuilder<K, V>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  pub fn new(config: RegistryConfig) -> Self {
    Self {
      config,
      loaders: HashMap::default(),
      batch_loaders: HashMap::default(),
      weighers: HashMap::default(),
      listeners: HashMap::default(),
      janitor_tick_interval: None,
    }
  }

  /// Attaches the compute function for a cache declared `loading`.
  pub fn loader(
    mut self,
    name: impl Into<String>,
    f: impl Fn(K) -> Result<V, LoadError> + Send + Sync + 'static,
  ) -> Self {
    self.loaders.insert(name.into(), Arc::new(f));
    self
  }

  /// Attaches a batch compute function for a cache declared `loading`.
  pub fn batch_loader(
    mut self,
    name: impl Into<String>,
    f: impl Fn(Vec<K>) -> Result<HashMap<K, V>, LoadError> + Send + Sync + 'static,
  ) -> Self {
    self.batch_loaders.insert(name.into(), Arc::new(f));
    self
  }

  /// Attaches the weigher for a cache with a weight-bounded policy.
  pub fn weigher(
    mut self,
    name: impl Into<String>,
    f: impl Fn(&K, &V) -> u64 + Send + Sync + 'static,
  ) -> Self {
    self.weighers.insert(name.into(), Arc::new(f));
    self
  }

  /// Attaches a removal listener for a cache.
  pub fn removal_listener(
    mut self,
    name: impl Into<String>,
    listener: impl RemovalListener<K, V> + 'static,
  ) -> Self {
    self.listeners.insert(name.into(), Arc::new(listener));
    self
  }

  /// Overrides the janitor tick for every built cache.
  /// (Primarily for testing purposes.)
  #[doc(hidden)]
  pub fn janitor_tick_interval(mut self, duration: Duration) -> Self {
    self.janitor_tick_interval = Some(duration);
    self
  }

  /// Validates the configuration and builds every cache. Fails without
  /// registering anything if any definition is invalid.
  pub fn build(mut self) -> Result<CacheRegistry<K, V>, ConfigError> {
    let mut caches: HashMap<String, CacheHandle<K, V>> = HashMap::default();
    let defs = std::mem::take(&mut self.config.caches);

    for def in defs {
      if caches.contains_key(&def.name) {
        return Err(ConfigError::DuplicateName(def.name));
      }
      let handle = self.build_one(&def)?;
      caches.insert(def.name, handle);
    }

    Ok(CacheRegistry { caches })
  }

  fn build_one(&mut self, def: &CacheDef) -> Result<CacheHandle<K, V>, ConfigError> {
    let policy = self.policy_for(def)?;

    let mut builder = CacheBuilder::<K, V>::new().eviction_policy(policy);
    if let Some(shards) = def.shards {
      builder = builder.shards(shards);
    }
    if let Some(tick) = self.janitor_tick_interval {
      builder = builder.janitor_tick_interval(tick);
    }
    if let Some(listener) = self.listeners.remove(&def.name) {
      builder = builder.removal_listener_arc(listener);
    }

    if def.loading {
      let loader = self
        .loaders
        .remove(&def.name)
        .ok_or_else(|| ConfigError::MissingLoader(def.name.clone()))?;
      builder = builder.loader_arc(loader);
      if let Some(batch_loader) = self.batch_loaders.remove(&def.name) {
        builder = builder.batch_loader_arc(batch_loader);
      }
      let cache = builder.build_loading().map_err(|source| ConfigError::InvalidCache {
        name: def.name.clone(),
        source,
      })?;
      Ok(CacheHandle::Loading(cache))
    } else {
      let cache = builder.build().map_err(|source| ConfigError::InvalidCache {
        name: def.name.clone(),
        source,
      })?;
      Ok(CacheHandle::Plain(cache))
    }
  }

  fn policy_for(&self, def: &CacheDef) -> Result<EvictionPolicy<K, V>, ConfigError> {
    Ok(match def.policy {
      PolicyConfig::TimeToLive { ttl_ms } => {
        EvictionPolicy::TimeToLive(Duration::from_millis(ttl_ms))
      }
      PolicyConfig::TimeToIdle { tti_ms } => {
        EvictionPolicy::TimeToIdle(Duration::from_millis(tti_ms))
      }
      PolicyConfig::SizeBounded { max_entries } => EvictionPolicy::SizeBounded(max_entries),
      PolicyConfig::WeightBounded { max_weight } => {
        let weigher = self
          .weighers
          .get(&def.name)
          .cloned()
          .ok_or_else(|| ConfigError::MissingWeigher(def.name.clone()))?;
        EvictionPolicy::WeightBounded {
          max_weight,
          weigher,
        }
      }
    })
  }
}
