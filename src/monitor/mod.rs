//! The monitoring engine: periodic statistics collection with a bounded
//! history window per cache, alert-threshold evaluation and health
//! reporting.
//!
//! Monitoring is best-effort and fully isolated from the caches it
//! watches: it only ever reads statistics snapshots, never mutates cache
//! state, and its lifecycle is independent of cache traffic.

mod engine;
mod health;
mod history;

pub use engine::{CacheMonitor, RealtimeMetrics, SystemInfo};
pub use health::{Alert, AlertThresholds, CacheHealth, HealthStatus};
pub use history::HistoryWindow;

use crate::metrics::StatsSnapshot;

/// A source of cache statistics the monitor can poll.
///
/// Implemented by [`Cache`](crate::Cache) and
/// [`LoadingCache`](crate::LoadingCache); the registry hands the monitor
/// one source per registered name.
pub trait StatsSource: Send + Sync {
  fn stats(&self) -> StatsSnapshot;
}
