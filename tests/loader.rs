use warden_cache::{CacheBuilder, CacheError};

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc, Barrier,
};
use std::thread;
use std::time::Duration;

#[test]
fn test_get_with_computes_once_then_hits() {
  let load_count = Arc::new(AtomicUsize::new(0));
  let cache = CacheBuilder::<i32, i32>::new()
    .max_entries(10)
    .build()
    .unwrap();

  let count = load_count.clone();
  let value = cache
    .get_with(&5, move |key| {
      count.fetch_add(1, Ordering::SeqCst);
      Ok(key * 10)
    })
    .unwrap();
  assert_eq!(*value, 50);
  assert_eq!(load_count.load(Ordering::SeqCst), 1);
  assert_eq!(cache.stats().miss_count, 1);
  assert_eq!(cache.stats().load_success_count, 1);

  let count = load_count.clone();
  let value = cache
    .get_with(&5, move |key| {
      count.fetch_add(1, Ordering::SeqCst);
      Ok(key * 10)
    })
    .unwrap();
  assert_eq!(*value, 50);
  assert_eq!(
    load_count.load(Ordering::SeqCst),
    1,
    "Loader should NOT be called again"
  );
  assert_eq!(cache.stats().hit_count, 1);
}

#[test]
fn test_thundering_herd_computes_once() {
  let load_count = Arc::new(AtomicUsize::new(0));
  let num_threads = 20;

  let cache = Arc::new(
    CacheBuilder::<i32, i32>::new()
      .max_entries(10)
      .build()
      .unwrap(),
  );

  let barrier = Arc::new(Barrier::new(num_threads));
  let mut handles = vec![];

  for _ in 0..num_threads {
    let cache = cache.clone();
    let barrier = barrier.clone();
    let load_count = load_count.clone();
    handles.push(thread::spawn(move || {
      barrier.wait();
      // All threads request the same missing key at once.
      let value = cache
        .get_with(&99, move |key| {
          // Simulate a slow database call.
          thread::sleep(Duration::from_millis(100));
          load_count.fetch_add(1, Ordering::SeqCst);
          Ok(key * 10)
        })
        .unwrap();
      assert_eq!(*value, 990);
    }));
  }

  for handle in handles {
    handle.join().unwrap();
  }

  assert_eq!(
    load_count.load(Ordering::SeqCst),
    1,
    "Thundering herd protection failed: compute ran more than once"
  );
  let stats = cache.stats();
  assert_eq!(stats.miss_count, 1, "There should be only one initial miss");
  // The other threads hit the pending computation.
  assert_eq!(stats.hit_count, (num_threads - 1) as u64);
  assert_eq!(stats.load_success_count, 1);
}

#[test]
fn test_failure_is_shared_and_retryable() {
  let load_count = Arc::new(AtomicUsize::new(0));
  let num_threads = 5;

  let cache = Arc::new(
    CacheBuilder::<i32, i32>::new()
      .max_entries(10)
      .build()
      .unwrap(),
  );

  let barrier = Arc::new(Barrier::new(num_threads));
  let mut handles = vec![];

  for _ in 0..num_threads {
    let cache = cache.clone();
    let barrier = barrier.clone();
    let load_count = load_count.clone();
    handles.push(thread::spawn(move || {
      barrier.wait();
      cache.get_with(&7, move |_key| {
        thread::sleep(Duration::from_millis(50));
        load_count.fetch_add(1, Ordering::SeqCst);
        Err("backing store unavailable".into())
      })
    }));
  }

  for handle in handles {
    let outcome = handle.join().unwrap();
    assert!(
      matches!(outcome, Err(CacheError::LoadFailed(_))),
      "every waiter observes the same failure"
    );
  }

  assert_eq!(load_count.load(Ordering::SeqCst), 1);
  let stats = cache.stats();
  assert_eq!(stats.load_failure_count, 1);
  assert_eq!(stats.load_success_count, 0);
  assert!(cache.peek(&7).is_none(), "failures are never cached");

  // A fresh request after the failure is free to retry.
  let value = cache.get_with(&7, |key| Ok(key + 1)).unwrap();
  assert_eq!(*value, 8);
  assert_eq!(cache.stats().load_success_count, 1);
}

#[test]
fn test_timeout_does_not_cancel_load() {
  let cache = CacheBuilder::<i32, i32>::new()
    .max_entries(10)
    .build()
    .unwrap();

  let outcome = cache.get_with_timeout(
    &1,
    |_key| {
      thread::sleep(Duration::from_millis(300));
      Ok(7)
    },
    Duration::from_millis(50),
  );
  assert!(matches!(outcome, Err(CacheError::LoadTimeout(_))));

  // The computation keeps running and its result still lands.
  thread::sleep(Duration::from_millis(450));
  let value = cache.peek(&1).expect("load completed after the timeout");
  assert_eq!(*value, 7);
  assert_eq!(cache.stats().load_success_count, 1);
}

#[test]
fn test_waiters_share_leaders_result() {
  let cache = Arc::new(
    CacheBuilder::<i32, Vec<u8>>::new()
      .max_entries(10)
      .build()
      .unwrap(),
  );

  let leader_cache = cache.clone();
  let leader = thread::spawn(move || {
    leader_cache
      .get_with(&3, |_key| {
        thread::sleep(Duration::from_millis(150));
        Ok(vec![1, 2, 3])
      })
      .unwrap()
  });

  // Give the leader time to register the in-flight marker.
  thread::sleep(Duration::from_millis(30));
  let waiter_value = cache
    .get_with(&3, |_key| {
      panic!("the waiter's compute function must never run")
    })
    .unwrap();
  let leader_value = leader.join().unwrap();

  // Both observe the same allocation, not merely equal contents.
  assert!(Arc::ptr_eq(&leader_value, &waiter_value));
}
