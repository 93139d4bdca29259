use crate::config::MonitorConfig;
use crate::error::CacheError;
use crate::metrics::StatsSnapshot;
use crate::monitor::health::{evaluate_alerts, evaluate_health};
use crate::monitor::history::HistoryWindow;
use crate::monitor::{Alert, AlertThresholds, CacheHealth, HealthStatus, StatsSource};
use crate::registry::CacheRegistry;
use crate::time;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ahash::HashMap;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};

/// The monitoring engine.
///
/// Watches a fixed set of caches, pulls a statistics snapshot from each on
/// its own periodic schedule, retains an age-bounded history per cache,
/// logs threshold alerts and answers health and metrics queries.
///
/// The collection cycle runs on a thread owned by this engine, started and
/// stopped explicitly: nothing is scheduled before [`CacheMonitor::start`]
/// and [`CacheMonitor::stop`] only prevents further cycles — a cycle
/// already in progress finishes, and in-flight cache loads are unaffected.
pub struct CacheMonitor {
  inner: Arc<MonitorInner>,
  collector: Mutex<Option<Collector>>,
}

struct MonitorInner {
  sources: RwLock<Vec<(String, Arc<dyn StatsSource>)>>,
  history: Mutex<HashMap<String, HistoryWindow>>,
  thresholds: AlertThresholds,
  collection_interval: Duration,
  retention: Duration,
  report_interval: Duration,
}

struct Collector {
  handle: JoinHandle<()>,
  shutdown_tx: Sender<()>,
}

impl fmt::Debug for CacheMonitor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheMonitor")
      .field("watched", &self.inner.sources.read().len())
      .field("collection_interval", &self.inner.collection_interval)
      .field("retention", &self.inner.retention)
      .field("running", &self.collector.lock().is_some())
      .finish()
  }
}

impl CacheMonitor {
  pub fn new(config: MonitorConfig) -> Self {
    Self {
      inner: Arc::new(MonitorInner {
        sources: RwLock::new(Vec::new()),
        history: Mutex::new(HashMap::default()),
        thresholds: config.thresholds.clone(),
        collection_interval: config.collection_interval(),
        retention: config.retention(),
        report_interval: config.report_interval(),
      }),
      collector: Mutex::new(None),
    }
  }

  /// Creates a monitor watching every cache in the registry.
  pub fn for_registry<K, V, H>(registry: &CacheRegistry<K, V, H>, config: MonitorConfig) -> Self
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    H: BuildHasher + Clone + Send + Sync + 'static,
  {
    let monitor = Self::new(config);
    for (name, source) in registry.stats_sources() {
      monitor.watch(name, source);
    }
    monitor
  }

  /// Registers a cache under a stable name. Normally done once, at
  /// startup, for every cache in the registry.
  pub fn watch(&self, name: impl Into<String>, source: Arc<dyn StatsSource>) {
    let name = name.into();
    tracing::debug!(cache = %name, "watching cache");
    self.inner.sources.write().push((name, source));
  }

  /// Starts the periodic collection cycle. Idempotent: a second call while
  /// running is a no-op.
  pub fn start(&self) {
    let mut collector = self.collector.lock();
    if collector.is_some() {
      return;
    }

    let inner = Arc::clone(&self.inner);
    let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
    tracing::info!(
      interval = ?inner.collection_interval,
      retention = ?inner.retention,
      "starting cache monitor"
    );

    let handle = thread::spawn(move || {
      let mut last_report = Instant::now();
      loop {
        match shutdown_rx.recv_timeout(inner.collection_interval) {
          Err(RecvTimeoutError::Timeout) => {
            inner.collect_cycle();
            if last_report.elapsed() >= inner.report_interval {
              inner.log_report();
              last_report = Instant::now();
            }
          }
          // Disconnected or an explicit message: shut down.
          _ => break,
        }
      }
      tracing::info!("cache monitor stopped");
    });

    *collector = Some(Collector {
      handle,
      shutdown_tx,
    });
  }

  /// Stops scheduling collection cycles and waits for the collector thread
  /// to exit. A cycle already in progress runs to completion.
  pub fn stop(&self) {
    let collector = self.collector.lock().take();
    if let Some(Collector {
      handle,
      shutdown_tx,
    }) = collector
    {
      drop(shutdown_tx);
      let _ = handle.join();
    }
  }

  /// Runs one collection cycle immediately, returning the alerts it
  /// raised. The periodic schedule is unaffected.
  pub fn collect_now(&self) -> Vec<Alert> {
    self.inner.collect_cycle()
  }

  /// The health verdict for one cache, derived fresh from its current
  /// statistics (plus the last collected snapshot for delta rules).
  pub fn health_of(&self, name: &str) -> Result<CacheHealth, CacheError> {
    let source = self
      .inner
      .source_for(name)
      .ok_or_else(|| CacheError::UnknownCache(name.to_string()))?;
    let current = source.stats();
    let previous = {
      let history = self.inner.history.lock();
      history.get(name).and_then(|w| w.latest().cloned())
    };
    Ok(evaluate_health(
      name,
      &current,
      previous.as_ref(),
      &self.inner.thresholds,
    ))
  }

  /// `Healthy` iff every watched cache reports healthy.
  pub fn overall_health(&self) -> HealthStatus {
    let sources = self.inner.sources.read().clone();
    for (name, _) in &sources {
      match self.health_of(name) {
        Ok(health) if health.status.is_healthy() => {}
        _ => return HealthStatus::Warning,
      }
    }
    HealthStatus::Healthy
  }

  /// Current snapshot-derived fields for every watched cache, plus an
  /// informational block of host figures.
  pub fn realtime_metrics(&self) -> RealtimeMetrics {
    let sources = self.inner.sources.read().clone();
    let caches = sources
      .iter()
      .map(|(name, source)| (name.clone(), source.stats()))
      .collect();
    RealtimeMetrics {
      caches,
      system: SystemInfo::capture(),
    }
  }

  /// The retained history window of every watched cache.
  pub fn historical_metrics(&self) -> HashMap<String, HistoryWindow> {
    self.inner.history.lock().clone()
  }

  /// The retained history window for one cache. Empty until the first
  /// collection cycle.
  pub fn cache_history(&self, name: &str) -> Result<HistoryWindow, CacheError> {
    if self.inner.source_for(name).is_none() {
      return Err(CacheError::UnknownCache(name.to_string()));
    }
    Ok(
      self
        .inner
        .history
        .lock()
        .get(name)
        .cloned()
        .unwrap_or_default(),
    )
  }

  /// Clears every history window. The caches' own counters are monotonic
  /// for their lifetime and are not reset.
  pub fn reset_history(&self) {
    tracing::info!("resetting cache statistics history");
    self.inner.history.lock().clear();
  }
}

impl Drop for CacheMonitor {
  fn drop(&mut self) {
    self.stop();
  }
}

impl MonitorInner {
  fn source_for(&self, name: &str) -> Option<Arc<dyn StatsSource>> {
    self
      .sources
      .read()
      .iter()
      .find(|(n, _)| n == name)
      .map(|(_, s)| Arc::clone(s))
  }

  /// One collection cycle: snapshot every cache, evaluate alert rules
  /// against the previous snapshot, append to the history and prune it.
  fn collect_cycle(&self) -> Vec<Alert> {
    tracing::debug!("collecting cache statistics");
    let sources = self.sources.read().clone();
    let now = time::now_duration();
    let mut raised = Vec::new();

    let mut history = self.history.lock();
    for (name, source) in &sources {
      let snapshot = source.stats();
      let window = history.entry(name.clone()).or_insert_with(HistoryWindow::new);

      let alerts = evaluate_alerts(name, &snapshot, window.latest(), &self.thresholds);
      window.push(snapshot);
      window.prune(now, self.retention);

      for alert in &alerts {
        tracing::warn!(cache = %name, %alert, "cache alert");
      }
      raised.extend(alerts);
    }

    raised
  }

  /// The periodic summary report, one log line per cache.
  fn log_report(&self) {
    let sources = self.sources.read().clone();
    for (name, source) in &sources {
      let stats = source.stats();
      tracing::info!(
        cache = %name,
        size = stats.estimated_size,
        hit_rate = format_args!("{:.2}%", stats.hit_rate * 100.0),
        misses = stats.miss_count,
        evictions = stats.eviction_count,
        avg_load_ms = format_args!("{:.2}", stats.average_load_penalty_ms),
        "cache report"
      );
    }
  }
}

/// Current snapshot-derived fields per cache plus host figures, as
/// returned by [`CacheMonitor::realtime_metrics`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RealtimeMetrics {
  pub caches: HashMap<String, StatsSnapshot>,
  pub system: SystemInfo,
}

/// Process-wide host figures. Informational only, never alertable, and
/// kept clearly apart from the per-cache metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SystemInfo {
  /// Total physical memory in MiB; `None` where the host does not expose
  /// it.
  pub total_memory_mb: Option<u64>,
  pub free_memory_mb: Option<u64>,
  pub used_memory_mb: Option<u64>,
  pub max_memory_mb: Option<u64>,
  pub available_parallelism: usize,
}

impl SystemInfo {
  pub(crate) fn capture() -> Self {
    let (total, available) = read_memory_figures();
    Self {
      total_memory_mb: total,
      free_memory_mb: available,
      used_memory_mb: match (total, available) {
        (Some(total), Some(available)) => Some(total.saturating_sub(available)),
        _ => None,
      },
      // The process may use everything the host has; there is no separate
      // configured ceiling.
      max_memory_mb: total,
      available_parallelism: num_cpus::get(),
    }
  }
}

/// Reads `(MemTotal, MemAvailable)` in MiB from `/proc/meminfo`.
#[cfg(target_os = "linux")]
fn read_memory_figures() -> (Option<u64>, Option<u64>) {
  let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") else {
    return (None, None);
  };

  let mut total = None;
  let mut available = None;
  for line in meminfo.lines() {
    if let Some(rest) = line.strip_prefix("MemTotal:") {
      total = parse_meminfo_kb(rest);
    } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
      available = parse_meminfo_kb(rest);
    }
  }
  (total, available)
}

#[cfg(not(target_os = "linux"))]
fn read_memory_figures() -> (Option<u64>, Option<u64>) {
  (None, None)
}

/// Parses the `"  16384 kB"` tail of a meminfo line into MiB.
#[cfg(target_os = "linux")]
fn parse_meminfo_kb(rest: &str) -> Option<u64> {
  rest
    .trim()
    .strip_suffix("kB")
    .map(str::trim)
    .and_then(|kb| kb.parse::<u64>().ok())
    .map(|kb| kb / 1024)
}
