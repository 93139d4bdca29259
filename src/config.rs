//! Plain-data configuration for the cache fleet and its monitor.
//!
//! Configuration is read once at process start and mapped onto builders by
//! [`RegistryBuilder`](crate::registry::RegistryBuilder); where it came
//! from (a file, the environment, code) is the host's business. Loader,
//! weigher and listener functions cannot live in data and are attached in
//! code, keyed by cache name.

use crate::monitor::AlertThresholds;

use std::time::Duration;

/// The full cache fleet: one entry per named cache.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct RegistryConfig {
  pub caches: Vec<CacheDef>,
}

/// One named cache: its eviction policy and whether it computes missing
/// values itself.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
pub struct CacheDef {
  pub name: String,
  pub policy: PolicyConfig,
  /// When true the cache is built as a [`LoadingCache`](crate::LoadingCache)
  /// and a loader must be registered for its name.
  #[cfg_attr(feature = "serde", serde(default))]
  pub loading: bool,
  /// Override for the shard count; defaults to a multiple of the available
  /// cores.
  #[cfg_attr(feature = "serde", serde(default))]
  pub shards: Option<usize>,
}

/// The numeric parameters of an eviction policy. Durations are integer
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum PolicyConfig {
  TimeToLive { ttl_ms: u64 },
  TimeToIdle { tti_ms: u64 },
  SizeBounded { max_entries: u64 },
  /// Requires a weigher registered for the cache's name.
  WeightBounded { max_weight: u64 },
}

/// Monitoring engine configuration, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MonitorConfig {
  /// How often statistics are collected from every watched cache.
  pub collection_interval_ms: u64,
  /// How long collected snapshots are retained.
  pub retention_ms: u64,
  /// How often a summary report is written to the log.
  pub report_interval_ms: u64,
  pub thresholds: AlertThresholds,
}

impl Default for MonitorConfig {
  fn default() -> Self {
    Self {
      collection_interval_ms: 30_000,
      retention_ms: 3_600_000,
      report_interval_ms: 300_000,
      thresholds: AlertThresholds::default(),
    }
  }
}

impl MonitorConfig {
  pub fn collection_interval(&self) -> Duration {
    Duration::from_millis(self.collection_interval_ms)
  }

  pub fn retention(&self) -> Duration {
    Duration::from_millis(self.retention_ms)
  }

  pub fn report_interval(&self) -> Duration {
    Duration::from_millis(self.report_interval_ms)
  }
}
