//! Concurrent in-process caching with built-in monitoring.
//!
//! # Features
//! - **One policy per cache**: Time-to-Live, Time-to-Idle, size-bounded
//!   and weight-bounded LRU eviction, validated at construction.
//! - **High Concurrency**: Sharded store; operations on different keys
//!   never contend for the same lock.
//! - **Non-Clone Support**: Values live in an `Arc<V>`, avoiding
//!   `V: Clone` bounds.
//! - **Stampede Protection**: A [`LoadingCache`] computes each missing key
//!   at most once per concurrent burst; waiters share the result (or the
//!   failure) and may impose their own deadlines.
//! - **Named Registry**: A fixed fleet of caches built from configuration
//!   and addressed by name.
//! - **Monitoring**: [`CacheMonitor`] snapshots every cache on a schedule,
//!   keeps an age-bounded history, logs threshold alerts and reports
//!   per-cache and overall health.

// Public modules that form the API
pub mod builder;
pub mod config;
pub mod error;
pub mod handles;
pub mod listener;
pub mod metrics;
pub mod monitor;
pub mod policy;
pub mod registry;

// Internal, crate-only modules
mod entry;
mod loader;
mod shared;
mod store;
mod task;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use config::{CacheDef, MonitorConfig, PolicyConfig, RegistryConfig};
pub use error::{BuildError, CacheError, ConfigError, LoadError};
pub use handles::{Cache, LoadingCache};
pub use listener::{RemovalCause, RemovalListener};
pub use loader::{BatchLoaderFn, LoaderFn};
pub use metrics::StatsSnapshot;
pub use monitor::{
  Alert, AlertThresholds, CacheHealth, CacheMonitor, HealthStatus, HistoryWindow,
  RealtimeMetrics, StatsSource, SystemInfo,
};
pub use policy::{EvictionPolicy, Weigher};
pub use registry::{CacheHandle, CacheRegistry, RegistryBuilder};
