use crate::entry::CacheEntry;
use crate::error::BuildError;
use crate::time;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Computes the weight charged for an entry under a
/// [`EvictionPolicy::WeightBounded`] policy. Must be cheap and pure.
pub type Weigher<K, V> = Arc<dyn Fn(&K, &V) -> u64 + Send + Sync>;

/// The rule deciding when an entry becomes eligible for removal.
///
/// Exactly one policy is bound to a cache for its lifetime; policies never
/// combine within one cache instance. All four variants are evaluated by
/// the same maintenance routine: expiry first, then the capacity bound.
pub enum EvictionPolicy<K, V> {
  /// Entries expire a fixed duration after creation, irrespective of
  /// access.
  TimeToLive(Duration),
  /// Entries expire a fixed duration after their last access; every read
  /// refreshes the access time.
  TimeToIdle(Duration),
  /// The least-recently-used entry is evicted when an insertion would
  /// exceed the entry count bound. Ties are broken by insertion order.
  SizeBounded(u64),
  /// Least-recently-used entries are evicted until the total weight is
  /// within the bound.
  WeightBounded {
    max_weight: u64,
    weigher: Weigher<K, V>,
  },
}

impl<K, V> Clone for EvictionPolicy<K, V> {
  fn clone(&self) -> Self {
    match self {
      EvictionPolicy::TimeToLive(d) => EvictionPolicy::TimeToLive(*d),
      EvictionPolicy::TimeToIdle(d) => EvictionPolicy::TimeToIdle(*d),
      EvictionPolicy::SizeBounded(n) => EvictionPolicy::SizeBounded(*n),
      EvictionPolicy::WeightBounded { max_weight, weigher } => EvictionPolicy::WeightBounded {
        max_weight: *max_weight,
        weigher: weigher.clone(),
      },
    }
  }
}

impl<K, V> fmt::Debug for EvictionPolicy<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvictionPolicy::TimeToLive(d) => f.debug_tuple("TimeToLive").field(d).finish(),
      EvictionPolicy::TimeToIdle(d) => f.debug_tuple("TimeToIdle").field(d).finish(),
      EvictionPolicy::SizeBounded(n) => f.debug_tuple("SizeBounded").field(n).finish(),
      EvictionPolicy::WeightBounded { max_weight, .. } => f
        .debug_struct("WeightBounded")
        .field("max_weight", max_weight)
        .finish_non_exhaustive(),
    }
  }
}

/// The capacity bound a policy enforces, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CapacityBound {
  Entries(u64),
  Weight(u64),
}

impl<K, V> EvictionPolicy<K, V> {
  /// Validates the policy parameters. Zero bounds and zero durations are
  /// configuration faults.
  pub(crate) fn validate(&self) -> Result<(), BuildError> {
    match self {
      EvictionPolicy::TimeToLive(d) | EvictionPolicy::TimeToIdle(d) => {
        if d.is_zero() {
          return Err(BuildError::ZeroDuration);
        }
      }
      EvictionPolicy::SizeBounded(n) => {
        if *n == 0 {
          return Err(BuildError::ZeroCapacity);
        }
      }
      EvictionPolicy::WeightBounded { max_weight, .. } => {
        if *max_weight == 0 {
          return Err(BuildError::ZeroCapacity);
        }
      }
    }
    Ok(())
  }

  /// Whether entries under this policy can expire with time.
  #[inline]
  pub(crate) fn has_expiry(&self) -> bool {
    matches!(
      self,
      EvictionPolicy::TimeToLive(_) | EvictionPolicy::TimeToIdle(_)
    )
  }

  /// Whether reads refresh the entry's idle clock.
  #[inline]
  pub(crate) fn refreshes_on_access(&self) -> bool {
    matches!(self, EvictionPolicy::TimeToIdle(_))
  }

  /// Whether reads must update least-recently-used bookkeeping.
  #[inline]
  pub(crate) fn tracks_recency(&self) -> bool {
    matches!(
      self,
      EvictionPolicy::SizeBounded(_) | EvictionPolicy::WeightBounded { .. }
    )
  }

  #[inline]
  pub(crate) fn bound(&self) -> Option<CapacityBound> {
    match self {
      EvictionPolicy::SizeBounded(n) => Some(CapacityBound::Entries(*n)),
      EvictionPolicy::WeightBounded { max_weight, .. } => Some(CapacityBound::Weight(*max_weight)),
      _ => None,
    }
  }

  /// The weight charged for an entry. 1 unless a weigher is bound.
  #[inline]
  pub(crate) fn weight_of(&self, key: &K, value: &V) -> u64 {
    match self {
      EvictionPolicy::WeightBounded { weigher, .. } => weigher(key, value),
      _ => 1,
    }
  }

  /// Checks whether an entry is expired under this policy at the current
  /// clock reading.
  pub(crate) fn is_expired(&self, entry: &CacheEntry<V>) -> bool {
    let now = time::now_nanos();
    match self {
      EvictionPolicy::TimeToLive(d) => now >= entry.created_at + d.as_nanos() as u64,
      EvictionPolicy::TimeToIdle(d) => now >= entry.last_accessed_nanos() + d.as_nanos() as u64,
      _ => false,
    }
  }
}

/// A queue of keys ordered by recent use (front is most recent), used by
/// the capacity-bounded policies to pick eviction victims.
///
/// Keys are pushed on insert, moved to the front on access and popped from
/// the back on eviction, so untouched entries fall out in insertion order.
#[derive(Debug)]
pub(crate) struct RecencyList<K> {
  order: VecDeque<K>,
}

impl<K: Eq + Clone> RecencyList<K> {
  pub(crate) fn new() -> Self {
    Self {
      order: VecDeque::new(),
    }
  }

  /// Records an insert or replacement: the key becomes the most recently
  /// used.
  pub(crate) fn record(&mut self, key: &K) {
    if let Some(pos) = self.order.iter().position(|k| k == key) {
      self.order.remove(pos);
    }
    self.order.push_front(key.clone());
  }

  /// Moves an existing key to the front of the usage queue.
  pub(crate) fn touch(&mut self, key: &K) {
    if let Some(pos) = self.order.iter().position(|k| k == key) {
      if let Some(found) = self.order.remove(pos) {
        self.order.push_front(found);
      }
    }
  }

  /// Stops tracking a key after an invalidation or expiry removal.
  pub(crate) fn remove(&mut self, key: &K) {
    self.order.retain(|k| k != key);
  }

  /// Pops the least recently used key.
  pub(crate) fn pop_lru(&mut self) -> Option<K> {
    self.order.pop_back()
  }

  pub(crate) fn clear(&mut self) {
    self.order.clear();
  }
}
