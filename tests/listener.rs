mod common;

use warden_cache::{CacheBuilder, RemovalCause};

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

type Events = Arc<Mutex<Vec<(String, i32, RemovalCause)>>>;

fn recording_listener(
  events: &Events,
) -> impl Fn(String, Arc<i32>, RemovalCause) + Send + Sync + 'static {
  let events = events.clone();
  move |key, value, cause| {
    events.lock().unwrap().push((key, *value, cause));
  }
}

#[test]
fn test_capacity_and_invalidation_causes() {
  common::init_tracing();
  let events: Events = Arc::new(Mutex::new(Vec::new()));

  let cache = CacheBuilder::<String, i32>::new()
    .max_entries(1)
    .removal_listener(recording_listener(&events))
    .build()
    .unwrap();

  cache.insert("a".to_string(), 1);
  cache.insert("b".to_string(), 2); // evicts "a"
  cache.invalidate(&"b".to_string());

  // The listener runs on its own thread; give it a moment to drain.
  thread::sleep(Duration::from_millis(200));

  let events = events.lock().unwrap();
  assert!(events.contains(&("a".to_string(), 1, RemovalCause::Capacity)));
  assert!(events.contains(&("b".to_string(), 2, RemovalCause::Invalidated)));
}

#[test]
fn test_expiry_notifies_with_expired_cause() {
  common::init_tracing();
  let events: Events = Arc::new(Mutex::new(Vec::new()));

  let cache = CacheBuilder::<String, i32>::new()
    .time_to_live(Duration::from_millis(100))
    .janitor_tick_interval(Duration::from_millis(10))
    .removal_listener(recording_listener(&events))
    .build()
    .unwrap();

  cache.insert("k".to_string(), 9);
  thread::sleep(Duration::from_millis(300));

  let events = events.lock().unwrap();
  assert_eq!(
    events.as_slice(),
    &[("k".to_string(), 9, RemovalCause::Expired)]
  );
}

#[test]
fn test_cause_classification() {
  assert!(RemovalCause::Capacity.is_eviction());
  assert!(RemovalCause::Expired.is_eviction());
  assert!(!RemovalCause::Invalidated.is_eviction());
}

#[test]
fn test_clear_notifies_every_entry() {
  common::init_tracing();
  let events: Events = Arc::new(Mutex::new(Vec::new()));

  let cache = CacheBuilder::<String, i32>::new()
    .max_entries(10)
    .removal_listener(recording_listener(&events))
    .build()
    .unwrap();

  cache.insert("x".to_string(), 1);
  cache.insert("y".to_string(), 2);
  cache.clear();
  thread::sleep(Duration::from_millis(200));

  let events = events.lock().unwrap();
  assert_eq!(events.len(), 2);
  assert!(events
    .iter()
    .all(|(_, _, cause)| *cause == RemovalCause::Invalidated));
  assert_eq!(cache.stats().invalidation_count, 2);
}
