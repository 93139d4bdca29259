use warden_cache::CacheBuilder;

use std::{thread, time::Duration};

const TINY_TTI: Duration = Duration::from_millis(300);
const JANITOR_TICK: Duration = Duration::from_millis(20);

#[test]
fn test_idle_item_expires_after_tti() {
  let cache = CacheBuilder::<&str, &str>::new()
    .time_to_idle(TINY_TTI)
    .janitor_tick_interval(JANITOR_TICK)
    .build()
    .unwrap();

  cache.insert("key", "value");
  thread::sleep(TINY_TTI + Duration::from_millis(150));

  assert!(
    cache.get(&"key").is_none(),
    "Item should be identified as expired on get"
  );
  assert_eq!(cache.stats().eviction_count, 1);
  assert_eq!(cache.stats().miss_count, 1);
}

#[test]
fn test_access_keeps_item_alive() {
  let cache = CacheBuilder::<&str, &str>::new()
    .time_to_idle(TINY_TTI)
    .janitor_tick_interval(JANITOR_TICK)
    .build()
    .unwrap();

  cache.insert("key", "value");

  // Four reads spaced well under the TTI; by the last read the entry has
  // lived longer than the TTI itself.
  for _ in 0..4 {
    thread::sleep(Duration::from_millis(100));
    assert!(
      cache.get(&"key").is_some(),
      "Access should reset the idle timer"
    );
  }

  // A gap longer than the TTI finally expires it.
  thread::sleep(TINY_TTI + Duration::from_millis(150));
  assert!(cache.get(&"key").is_none());
}

#[test]
fn test_peek_does_not_refresh_idle_clock() {
  let cache = CacheBuilder::<&str, &str>::new()
    .time_to_idle(TINY_TTI)
    .janitor_tick_interval(JANITOR_TICK)
    .build()
    .unwrap();

  cache.insert("key", "value");
  thread::sleep(Duration::from_millis(200));
  assert!(cache.peek(&"key").is_some());
  thread::sleep(Duration::from_millis(250));

  // 450ms idle in total: the peek at 200ms must not have reset the clock.
  assert!(cache.get(&"key").is_none());
}
