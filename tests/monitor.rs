mod common;

use warden_cache::{
  Alert, AlertThresholds, CacheBuilder, CacheError, CacheMonitor, HealthStatus, MonitorConfig,
};

use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn test_config() -> MonitorConfig {
  MonitorConfig {
    // The periodic schedule is irrelevant for collect_now-driven tests.
    collection_interval_ms: 60_000,
    retention_ms: 3_600_000,
    report_interval_ms: 300_000,
    thresholds: AlertThresholds::default(),
  }
}

#[test]
fn test_collection_appends_history() {
  common::init_tracing();
  let cache = CacheBuilder::<&str, i32>::new()
    .max_entries(10)
    .build()
    .unwrap();
  let monitor = CacheMonitor::new(test_config());
  monitor.watch("demo", Arc::new(cache.clone()));

  cache.insert("k", 1);
  let _ = cache.get(&"k");

  assert!(monitor.collect_now().is_empty());
  assert!(monitor.collect_now().is_empty());

  let history = monitor.cache_history("demo").unwrap();
  assert_eq!(history.len(), 2);
  let latest = history.latest().unwrap();
  assert_eq!(latest.hit_count, 1);
  assert_eq!(latest.estimated_size, 1);
}

#[test]
fn test_history_is_pruned_by_age() {
  common::init_tracing();
  let cache = CacheBuilder::<&str, i32>::new()
    .max_entries(10)
    .build()
    .unwrap();
  let config = MonitorConfig {
    retention_ms: 200,
    ..test_config()
  };
  let monitor = CacheMonitor::new(config);
  monitor.watch("demo", Arc::new(cache.clone()));

  monitor.collect_now();
  monitor.collect_now();
  thread::sleep(Duration::from_millis(300));
  monitor.collect_now();

  let history = monitor.cache_history("demo").unwrap();
  assert_eq!(
    history.len(),
    1,
    "snapshots older than the retention are dropped"
  );

  // Retention bound: everything kept is younger than the cutoff.
  let retention = Duration::from_millis(200);
  let newest = history.latest().unwrap().timestamp;
  assert!(history
    .iter()
    .all(|snapshot| snapshot.timestamp + retention >= newest));
}

#[test]
fn test_low_hit_rate_raises_warning() {
  common::init_tracing();
  let cache = CacheBuilder::<u32, u32>::new()
    .max_entries(1000)
    .build()
    .unwrap();
  let monitor = CacheMonitor::new(test_config());
  monitor.watch("demo", Arc::new(cache.clone()));

  // 60 hits and 40 misses: hit rate 0.60 over 100 requests.
  for i in 0..60 {
    cache.insert(i, i);
    let _ = cache.get(&i);
  }
  for i in 1000..1040 {
    let _ = cache.get(&i);
  }

  let alerts = monitor.collect_now();
  assert!(alerts
    .iter()
    .any(|alert| matches!(alert, Alert::LowHitRate { cache, .. } if cache == "demo")));

  let health = monitor.health_of("demo").unwrap();
  assert_eq!(health.status, HealthStatus::Warning);
  assert_eq!(health.issues.len(), 1);
  assert!(health.issues[0].contains("hit rate"));
  assert!((health.hit_rate - 0.60).abs() < 1e-9);
  assert_eq!(monitor.overall_health(), HealthStatus::Warning);
}

#[test]
fn test_cold_cache_is_not_unhealthy() {
  common::init_tracing();
  let cache = CacheBuilder::<u32, u32>::new()
    .max_entries(1000)
    .build()
    .unwrap();
  let monitor = CacheMonitor::new(test_config());
  monitor.watch("demo", Arc::new(cache.clone()));

  // Only 3 requests, all misses: far below the sample floor.
  for i in 0..3 {
    let _ = cache.get(&i);
  }

  assert!(monitor.collect_now().is_empty());
  let health = monitor.health_of("demo").unwrap();
  assert_eq!(health.status, HealthStatus::Healthy);
  assert!(health.issues.is_empty());
  assert_eq!(monitor.overall_health(), HealthStatus::Healthy);
}

#[test]
fn test_eviction_spike_is_a_delta_rule() {
  common::init_tracing();
  let cache = CacheBuilder::<u32, u32>::new()
    .max_entries(1)
    .build()
    .unwrap();
  let config = MonitorConfig {
    thresholds: AlertThresholds {
      high_eviction_delta: 5,
      ..AlertThresholds::default()
    },
    ..test_config()
  };
  let monitor = CacheMonitor::new(config);
  monitor.watch("demo", Arc::new(cache.clone()));

  // Baseline snapshot with no evictions: no previous snapshot, no alert.
  assert!(monitor.collect_now().is_empty());

  // Nine capacity evictions inside one collection interval.
  for i in 0..10 {
    cache.insert(i, i);
  }
  let alerts = monitor.collect_now();
  assert!(alerts
    .iter()
    .any(|alert| matches!(alert, Alert::EvictionSpike { evictions: 9, .. })));

  // The rate settled back down: the next cycle sees a zero delta.
  assert!(monitor.collect_now().is_empty());
}

#[test]
fn test_slow_loads_raise_alert() {
  common::init_tracing();
  let cache = CacheBuilder::<u32, u32>::new()
    .max_entries(10)
    .loader(|key| {
      thread::sleep(Duration::from_millis(30));
      Ok(key)
    })
    .build_loading()
    .unwrap();
  let config = MonitorConfig {
    thresholds: AlertThresholds {
      high_load_penalty_ms: 10.0,
      ..AlertThresholds::default()
    },
    ..test_config()
  };
  let monitor = CacheMonitor::new(config);
  monitor.watch("demo", Arc::new(cache.clone()));

  let _ = cache.fetch(&1).unwrap();

  let alerts = monitor.collect_now();
  assert!(alerts
    .iter()
    .any(|alert| matches!(alert, Alert::SlowLoad { penalty_ms, .. } if *penalty_ms >= 30.0)));

  let health = monitor.health_of("demo").unwrap();
  assert_eq!(health.status, HealthStatus::Warning);
}

#[test]
fn test_overall_health_requires_every_cache_healthy() {
  common::init_tracing();
  let healthy = CacheBuilder::<u32, u32>::new()
    .max_entries(10)
    .build()
    .unwrap();
  let unhealthy = CacheBuilder::<u32, u32>::new()
    .max_entries(1000)
    .build()
    .unwrap();

  let monitor = CacheMonitor::new(test_config());
  monitor.watch("good", Arc::new(healthy.clone()));
  monitor.watch("bad", Arc::new(unhealthy.clone()));
  assert_eq!(monitor.overall_health(), HealthStatus::Healthy);

  // Drive the second cache's hit rate under the threshold.
  for i in 0..200 {
    let _ = unhealthy.get(&i);
  }
  assert_eq!(monitor.overall_health(), HealthStatus::Warning);
  assert_eq!(
    monitor.health_of("good").unwrap().status,
    HealthStatus::Healthy
  );
}

#[test]
fn test_unknown_cache_is_an_error() {
  let monitor = CacheMonitor::new(test_config());
  assert!(matches!(
    monitor.health_of("nope"),
    Err(CacheError::UnknownCache(name)) if name == "nope"
  ));
  assert!(matches!(
    monitor.cache_history("nope"),
    Err(CacheError::UnknownCache(_))
  ));
}

#[test]
fn test_realtime_metrics_includes_system_block() {
  common::init_tracing();
  let cache = CacheBuilder::<&str, i32>::new()
    .max_entries(10)
    .build()
    .unwrap();
  let monitor = CacheMonitor::new(test_config());
  monitor.watch("demo", Arc::new(cache.clone()));

  cache.insert("k", 1);
  let _ = cache.get(&"k");

  let metrics = monitor.realtime_metrics();
  let demo = &metrics.caches["demo"];
  assert_eq!(demo.hit_count, 1);
  assert_eq!(demo.estimated_size, 1);
  assert!(metrics.system.available_parallelism >= 1);
}

#[test]
fn test_reset_history_clears_windows() {
  common::init_tracing();
  let cache = CacheBuilder::<&str, i32>::new()
    .max_entries(10)
    .build()
    .unwrap();
  let monitor = CacheMonitor::new(test_config());
  monitor.watch("demo", Arc::new(cache.clone()));

  monitor.collect_now();
  assert_eq!(monitor.cache_history("demo").unwrap().len(), 1);

  monitor.reset_history();
  assert!(monitor.cache_history("demo").unwrap().is_empty());
  assert!(monitor.historical_metrics().is_empty());
}

#[test]
fn test_start_stop_lifecycle() {
  common::init_tracing();
  let cache = CacheBuilder::<&str, i32>::new()
    .max_entries(10)
    .build()
    .unwrap();
  let config = MonitorConfig {
    collection_interval_ms: 20,
    ..test_config()
  };
  let monitor = CacheMonitor::new(config);
  monitor.watch("demo", Arc::new(cache.clone()));

  monitor.start();
  monitor.start(); // idempotent
  thread::sleep(Duration::from_millis(200));
  monitor.stop();

  let collected = monitor.cache_history("demo").unwrap().len();
  assert!(collected >= 2, "the collector should have run repeatedly");

  // No further cycles are scheduled after stop.
  thread::sleep(Duration::from_millis(100));
  assert_eq!(monitor.cache_history("demo").unwrap().len(), collected);
}
