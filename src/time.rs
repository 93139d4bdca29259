//! Monotonic time source for the cache.
//!
//! All timestamps are expressed relative to a single process-wide epoch
//! captured on first use, so they are cheap to read and serializable.

use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

/// The single, static reference point for all time calculations.
/// Initialized lazily on its first use.
static CACHE_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Returns the current time as a [`Duration`] since the cache epoch.
#[inline]
pub(crate) fn now_duration() -> Duration {
  Instant::now().saturating_duration_since(*CACHE_EPOCH)
}

/// Returns the current time in nanoseconds since the cache epoch.
#[inline]
pub(crate) fn now_nanos() -> u64 {
  now_duration().as_nanos() as u64
}
