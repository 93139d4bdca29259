use warden_cache::CacheBuilder;

use std::sync::Arc;
use std::thread;

#[test]
fn test_size_bound_evicts_least_recently_used() {
  let cache = CacheBuilder::<&str, i32>::new()
    .max_entries(2)
    .build()
    .unwrap();

  // No intervening reads: "a" is the least recently used when "c" lands.
  cache.insert("a", 1);
  cache.insert("b", 2);
  cache.insert("c", 3);

  assert_eq!(cache.len(), 2);
  assert!(cache.get(&"a").is_none(), "LRU entry should be gone");
  assert!(cache.get(&"b").is_some());
  assert!(cache.get(&"c").is_some());
  assert_eq!(cache.stats().eviction_count, 1);
}

#[test]
fn test_read_refreshes_recency() {
  let cache = CacheBuilder::<&str, i32>::new()
    .max_entries(2)
    .build()
    .unwrap();

  cache.insert("a", 1);
  cache.insert("b", 2);
  // "a" becomes the most recently used, leaving "b" as the victim.
  assert!(cache.get(&"a").is_some());
  cache.insert("c", 3);

  assert!(cache.get(&"a").is_some());
  assert!(cache.get(&"b").is_none());
  assert!(cache.get(&"c").is_some());
}

#[test]
fn test_size_bound_holds_after_every_insert() {
  let cache = CacheBuilder::<u32, u32>::new()
    .max_entries(10)
    .build()
    .unwrap();

  for i in 0..100 {
    cache.insert(i, i);
    assert!(cache.len() <= 10, "size bound violated after insert {i}");
  }
  assert_eq!(cache.stats().eviction_count, 90);
}

#[test]
fn test_weight_bound_evicts_until_within_budget() {
  let cache = CacheBuilder::<&str, u64>::new()
    .max_weight(10, Arc::new(|_key, value| *value))
    .build()
    .unwrap();

  cache.insert("a", 6);
  cache.insert("b", 5);

  // 6 + 5 exceeds the budget; the older entry pays for it.
  assert!(cache.get(&"a").is_none());
  assert!(cache.get(&"b").is_some());
  let stats = cache.stats();
  assert_eq!(stats.eviction_count, 1);
  assert_eq!(stats.current_weight, 5);
  assert!(stats.current_weight <= 10);
}

#[test]
fn test_replacement_adjusts_weight() {
  let cache = CacheBuilder::<&str, u64>::new()
    .max_weight(10, Arc::new(|_key, value| *value))
    .build()
    .unwrap();

  cache.insert("a", 3);
  cache.insert("a", 9);

  assert_eq!(cache.stats().current_weight, 9);
  assert_eq!(cache.stats().eviction_count, 0);
  assert_eq!(*cache.get(&"a").unwrap(), 9);
}

#[test]
fn test_concurrent_inserts_respect_bound() {
  let cache = Arc::new(
    CacheBuilder::<u32, u32>::new()
      .max_entries(50)
      .build()
      .unwrap(),
  );

  let mut handles = vec![];
  for t in 0..4u32 {
    let cache = cache.clone();
    handles.push(thread::spawn(move || {
      for i in 0..100 {
        let key = t * 1000 + i;
        cache.insert(key, key);
        let _ = cache.get(&key);
      }
    }));
  }
  for handle in handles {
    handle.join().unwrap();
  }

  assert!(cache.len() <= 50);
  assert!(cache.stats().eviction_count >= 350);
}
