use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// A boxed error returned by loader and compute functions.
pub type LoadError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur when building a single cache.
///
/// These are configuration faults: they are fatal at construction time and
/// a cache is never handed out in a half-initialized state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// No eviction policy was configured. Every cache is bound to exactly
  /// one policy for its lifetime.
  #[error("an eviction policy is required")]
  MissingPolicy,
  /// A bounded policy was configured with a capacity of zero.
  #[error("bounded capacity cannot be zero")]
  ZeroCapacity,
  /// An expiry policy was configured with a zero duration.
  #[error("expiry duration cannot be zero")]
  ZeroDuration,
  /// `build_loading` was called without a loader function.
  #[error("a loader is required to build a loading cache")]
  MissingLoader,
}

/// Errors raised while assembling a [`CacheRegistry`](crate::registry::CacheRegistry)
/// from configuration. Fatal at startup: no cache from an invalid
/// configuration is registered.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("duplicate cache name {0:?}")]
  DuplicateName(String),
  #[error("cache {name:?}: {source}")]
  InvalidCache {
    name: String,
    #[source]
    source: BuildError,
  },
  #[error("cache {0:?} declares a weight bound but no weigher was provided")]
  MissingWeigher(String),
  #[error("cache {0:?} is declared loading but no loader was provided")]
  MissingLoader(String),
}

/// Recoverable errors surfaced by cache operations at runtime.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
  /// A registry lookup for an unregistered cache name.
  #[error("unknown cache {0:?}")]
  UnknownCache(String),
  /// The compute function for a key failed. Every caller awaiting that key
  /// receives a clone of this error; nothing is cached and a later request
  /// is free to retry.
  #[error("value load failed: {0}")]
  LoadFailed(Arc<LoadError>),
  /// The caller-imposed deadline elapsed while waiting for a value load.
  /// The underlying computation keeps running for the benefit of other
  /// waiters.
  #[error("timed out after {0:?} waiting for value load")]
  LoadTimeout(Duration),
}
