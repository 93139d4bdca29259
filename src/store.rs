use crate::entry::CacheEntry;

use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
pub(crate) fn hash_key<K: Hash, H: BuildHasher>(hasher: &H, key: &K) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

pub(crate) type ShardMap<K, V, H> = HashMap<K, Arc<CacheEntry<V>>, H>;

/// A cache store partitioned into multiple, independently locked shards.
///
/// Operations on different keys land on different shards with high
/// probability and never contend for the same lock; a single key's shard
/// is the unit of mutual exclusion.
pub(crate) struct ShardedStore<K, V, H> {
  pub(crate) shards: Box<[CachePadded<RwLock<ShardMap<K, V, H>>>]>,
  pub(crate) hasher: H,
}

impl<K, V, H> fmt::Debug for ShardedStore<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ShardedStore")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl<K, V, H> ShardedStore<K, V, H>
where
  K: Eq + Hash,
  H: BuildHasher + Clone,
{
  /// Creates a new store. `num_shards` must be a power of two; the builder
  /// guarantees this.
  pub(crate) fn new(num_shards: usize, hasher: H) -> Self {
    let mut shards = Vec::with_capacity(num_shards);
    for _ in 0..num_shards {
      shards.push(CachePadded::new(RwLock::new(HashMap::with_hasher(
        hasher.clone(),
      ))));
    }

    Self {
      shards: shards.into_boxed_slice(),
      hasher,
    }
  }

  #[inline]
  pub(crate) fn shard_index(&self, key: &K) -> usize {
    let hash = hash_key(&self.hasher, key);
    hash as usize & (self.shards.len() - 1)
  }

  /// Returns the lock guarding the shard for a given key.
  #[inline]
  pub(crate) fn shard_for(&self, key: &K) -> &RwLock<ShardMap<K, V, H>> {
    &self.shards[self.shard_index(key)]
  }

  /// Approximate live entry count. Each shard is read-locked briefly in
  /// turn, so the total may lag concurrent mutation.
  pub(crate) fn len(&self) -> u64 {
    self
      .shards
      .iter()
      .map(|shard| shard.read().len() as u64)
      .sum()
  }

  /// An iterator over all the shard locks, for whole-cache operations like
  /// `clear()` and maintenance sweeps.
  pub(crate) fn iter_shards(&self) -> impl Iterator<Item = &RwLock<ShardMap<K, V, H>>> {
    self.shards.iter().map(|padded| &**padded)
  }
}
