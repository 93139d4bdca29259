use crate::metrics::StatsSnapshot;

use std::fmt;

/// Alert thresholds, fixed at startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AlertThresholds {
  /// Request-count floor before hit-rate rules apply; a cold cache is not
  /// a sick cache.
  pub min_hit_rate_samples: u64,
  /// Hit rate below this raises [`Alert::LowHitRate`].
  pub low_hit_rate: f64,
  /// More policy evictions than this between two collections raises
  /// [`Alert::EvictionSpike`].
  pub high_eviction_delta: u64,
  /// Average load penalty above this (milliseconds) raises
  /// [`Alert::SlowLoad`].
  pub high_load_penalty_ms: f64,
}

impl Default for AlertThresholds {
  fn default() -> Self {
    Self {
      min_hit_rate_samples: 100,
      low_hit_rate: 0.70,
      high_eviction_delta: 100,
      high_load_penalty_ms: 100.0,
    }
  }
}

/// A derived health classification. There is no terminal state: health is
/// recomputed fresh from the latest snapshots on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum HealthStatus {
  Healthy,
  Warning,
}

impl HealthStatus {
  pub fn is_healthy(&self) -> bool {
    matches!(self, HealthStatus::Healthy)
  }
}

impl fmt::Display for HealthStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HealthStatus::Healthy => write!(f, "HEALTHY"),
      HealthStatus::Warning => write!(f, "WARNING"),
    }
  }
}

/// The health verdict for one cache.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CacheHealth {
  pub status: HealthStatus,
  /// Human-readable descriptions of every threshold the cache is
  /// currently violating. Empty when healthy.
  pub issues: Vec<String>,
  pub size: u64,
  pub hit_rate: f64,
  pub eviction_count: u64,
}

/// An advisory raised when a snapshot crosses a threshold. Alerts are
/// reported and logged; they never mutate cache state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Alert {
  LowHitRate { cache: String, hit_rate: f64 },
  EvictionSpike { cache: String, evictions: u64 },
  SlowLoad { cache: String, penalty_ms: f64 },
}

impl Alert {
  pub fn cache(&self) -> &str {
    match self {
      Alert::LowHitRate { cache, .. }
      | Alert::EvictionSpike { cache, .. }
      | Alert::SlowLoad { cache, .. } => cache,
    }
  }
}

impl fmt::Display for Alert {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Alert::LowHitRate { cache, hit_rate } => {
        write!(f, "cache {cache:?}: hit rate too low ({:.2}%)", hit_rate * 100.0)
      }
      Alert::EvictionSpike { cache, evictions } => {
        write!(f, "cache {cache:?}: eviction spike ({evictions} per interval)")
      }
      Alert::SlowLoad { cache, penalty_ms } => {
        write!(f, "cache {cache:?}: average load time too high ({penalty_ms:.2}ms)")
      }
    }
  }
}

/// Evaluates the alert rules for one cache against its newest snapshot and
/// the immediately preceding one. Pure: no side effects, no stored state.
pub(crate) fn evaluate_alerts(
  name: &str,
  current: &StatsSnapshot,
  previous: Option<&StatsSnapshot>,
  thresholds: &AlertThresholds,
) -> Vec<Alert> {
  let mut alerts = Vec::new();

  if current.request_count >= thresholds.min_hit_rate_samples
    && current.hit_rate < thresholds.low_hit_rate
  {
    alerts.push(Alert::LowHitRate {
      cache: name.to_string(),
      hit_rate: current.hit_rate,
    });
  }

  if let Some(previous) = previous {
    let delta = current.eviction_count.saturating_sub(previous.eviction_count);
    if delta > thresholds.high_eviction_delta {
      alerts.push(Alert::EvictionSpike {
        cache: name.to_string(),
        evictions: delta,
      });
    }
  }

  if current.average_load_penalty_ms > thresholds.high_load_penalty_ms {
    alerts.push(Alert::SlowLoad {
      cache: name.to_string(),
      penalty_ms: current.average_load_penalty_ms,
    });
  }

  alerts
}

/// Derives the health verdict for one cache from the alert rules.
pub(crate) fn evaluate_health(
  name: &str,
  current: &StatsSnapshot,
  previous: Option<&StatsSnapshot>,
  thresholds: &AlertThresholds,
) -> CacheHealth {
  let alerts = evaluate_alerts(name, current, previous, thresholds);
  let issues = alerts.iter().map(issue_text).collect::<Vec<_>>();

  CacheHealth {
    status: if issues.is_empty() {
      HealthStatus::Healthy
    } else {
      HealthStatus::Warning
    },
    issues,
    size: current.estimated_size,
    hit_rate: current.hit_rate,
    eviction_count: current.eviction_count,
  }
}

fn issue_text(alert: &Alert) -> String {
  match alert {
    Alert::LowHitRate { hit_rate, .. } => {
      format!("hit rate too low: {:.2}%", hit_rate * 100.0)
    }
    Alert::EvictionSpike { evictions, .. } => {
      format!("eviction spike: {evictions} evictions since last collection")
    }
    Alert::SlowLoad { penalty_ms, .. } => {
      format!("average load time too high: {penalty_ms:.2}ms")
    }
  }
}
