use crate::time;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal statistics recorder for one cache.
///
/// All cells are independent atomics so updates are lock-free and never
/// covered by the shard locks. Counters are monotonic for the lifetime of
/// the cache and never double-count a single logical event; minor
/// cross-counter skew under concurrency is acceptable — this is a
/// monitoring signal, not a ledger.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
  // --- Read outcomes ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Loader outcomes ---
  pub(crate) load_successes: CachePadded<AtomicU64>,
  pub(crate) load_failures: CachePadded<AtomicU64>,
  pub(crate) total_load_time_nanos: CachePadded<AtomicU64>,

  // --- Removals ---
  /// Policy-driven removals only (expiry and capacity).
  pub(crate) evictions: CachePadded<AtomicU64>,
  /// Explicit removals requested by callers. Kept apart from evictions so
  /// capacity planning can tell the two apart.
  pub(crate) invalidations: CachePadded<AtomicU64>,

  // --- Weight accounting ---
  pub(crate) current_weight: CachePadded<AtomicU64>,
}

impl StatsRecorder {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Records the outcome of one loader invocation.
  pub(crate) fn record_load(&self, elapsed: Duration, success: bool) {
    if success {
      self.load_successes.fetch_add(1, Ordering::Relaxed);
    } else {
      self.load_failures.fetch_add(1, Ordering::Relaxed);
    }
    self
      .total_load_time_nanos
      .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current statistics.
  pub(crate) fn snapshot(&self, estimated_size: u64) -> StatsSnapshot {
    let hit_count = self.hits.load(Ordering::Relaxed);
    let miss_count = self.misses.load(Ordering::Relaxed);
    let request_count = hit_count + miss_count;
    let load_success_count = self.load_successes.load(Ordering::Relaxed);
    let load_failure_count = self.load_failures.load(Ordering::Relaxed);
    let total_load_time_nanos = self.total_load_time_nanos.load(Ordering::Relaxed);
    let load_count = load_success_count + load_failure_count;

    StatsSnapshot {
      request_count,
      hit_count,
      miss_count,
      hit_rate: if request_count == 0 {
        0.0
      } else {
        hit_count as f64 / request_count as f64
      },
      load_success_count,
      load_failure_count,
      total_load_time_nanos,
      average_load_penalty_ms: if load_count == 0 {
        0.0
      } else {
        total_load_time_nanos as f64 / load_count as f64 / 1_000_000.0
      },
      eviction_count: self.evictions.load(Ordering::Relaxed),
      invalidation_count: self.invalidations.load(Ordering::Relaxed),
      current_weight: self.current_weight.load(Ordering::Relaxed),
      estimated_size,
      timestamp: time::now_duration(),
    }
  }
}

/// An immutable, point-in-time copy of a cache's accumulated statistics.
///
/// Created fresh on every `stats()` call and every monitoring poll; never
/// mutated after creation.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StatsSnapshot {
  /// Total read requests (hits + misses).
  pub request_count: u64,
  /// Reads satisfied without invoking a compute function.
  pub hit_count: u64,
  /// Reads that found no live entry.
  pub miss_count: u64,
  /// `hit_count / request_count`, 0 when no requests were made.
  pub hit_rate: f64,
  /// Loader invocations that produced a value.
  pub load_success_count: u64,
  /// Loader invocations that failed.
  pub load_failure_count: u64,
  /// Cumulative wall time spent inside loader invocations.
  pub total_load_time_nanos: u64,
  /// `total_load_time / (successes + failures)` in milliseconds, 0 when no
  /// loads were performed.
  pub average_load_penalty_ms: f64,
  /// Policy-driven removals (expiry and capacity).
  pub eviction_count: u64,
  /// Explicit removals requested by callers.
  pub invalidation_count: u64,
  /// Sum of live entry weights (equals the entry count unless a weigher is
  /// bound).
  pub current_weight: u64,
  /// Approximate live entry count; may lag under concurrent mutation.
  pub estimated_size: u64,
  /// When the snapshot was taken, on the crate's monotonic time axis.
  pub timestamp: Duration,
}

impl fmt::Debug for StatsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StatsSnapshot")
      .field("request_count", &self.request_count)
      .field("hit_count", &self.hit_count)
      .field("miss_count", &self.miss_count)
      .field("hit_rate", &format!("{:.2}%", self.hit_rate * 100.0))
      .field("load_success_count", &self.load_success_count)
      .field("load_failure_count", &self.load_failure_count)
      .field(
        "average_load_penalty_ms",
        &format!("{:.2}", self.average_load_penalty_ms),
      )
      .field("eviction_count", &self.eviction_count)
      .field("invalidation_count", &self.invalidation_count)
      .field("current_weight", &self.current_weight)
      .field("estimated_size", &self.estimated_size)
      .finish_non_exhaustive()
  }
}
