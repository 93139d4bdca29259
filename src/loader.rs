use crate::error::{CacheError, LoadError};

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use ahash::HashMap;
use parking_lot::Mutex;

/// The state of a value being computed for the cache.
pub(crate) enum LoadState<V> {
  Computing,
  Complete(Arc<V>),
  Failed(Arc<LoadError>),
}

struct Inner<V> {
  state: LoadState<V>,
  waiters: VecDeque<Thread>,
}

/// The per-key in-flight-computation marker.
///
/// Exactly one `LoadFuture` exists per key while a load is pending; it is
/// visible to every caller through the `pending_loads` table and is
/// resolved exactly once, with either the computed value or the shared
/// failure. Any number of threads can block on it, each with its own
/// optional deadline.
pub(crate) struct LoadFuture<V> {
  inner: Mutex<Inner<V>>,
}

impl<V> LoadFuture<V> {
  /// Creates a new future in the `Computing` state.
  pub(crate) fn new() -> Self {
    Self {
      inner: Mutex::new(Inner {
        state: LoadState::Computing,
        waiters: VecDeque::new(),
      }),
    }
  }

  /// Completes the future with a value, waking all waiters.
  pub(crate) fn complete(&self, value: Arc<V>) {
    let mut inner = self.inner.lock();
    inner.state = LoadState::Complete(value);
    for waiter in inner.waiters.drain(..) {
      waiter.unpark();
    }
  }

  /// Fails the future. Every waiter observes a clone of the same error;
  /// there is no retry storm from the waiting side.
  pub(crate) fn fail(&self, error: Arc<LoadError>) {
    let mut inner = self.inner.lock();
    inner.state = LoadState::Failed(error);
    for waiter in inner.waiters.drain(..) {
      waiter.unpark();
    }
  }

  /// Blocks the current thread until the future resolves, or until the
  /// caller's timeout elapses.
  ///
  /// A timed-out waiter gets `LoadTimeout`; the computation itself keeps
  /// running and later waiters (and the store) still receive its result.
  pub(crate) fn wait(&self, timeout: Option<Duration>) -> Result<Arc<V>, CacheError> {
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut inner = self.inner.lock();
    loop {
      match &inner.state {
        LoadState::Complete(value) => return Ok(value.clone()),
        LoadState::Failed(error) => return Err(CacheError::LoadFailed(error.clone())),
        LoadState::Computing => {
          let remaining = match deadline {
            Some(deadline) => {
              let now = Instant::now();
              if now >= deadline {
                // `timeout` is present whenever `deadline` is.
                return Err(CacheError::LoadTimeout(timeout.unwrap_or_default()));
              }
              Some(deadline - now)
            }
            None => None,
          };

          inner.waiters.push_back(thread::current());
          drop(inner); // Unlock before parking.
          match remaining {
            Some(remaining) => thread::park_timeout(remaining),
            None => thread::park(),
          }
          inner = self.inner.lock();
        }
      }
    }
  }
}

/// The compute function bound to a loading cache at construction.
pub type LoaderFn<K, V> = Arc<dyn Fn(K) -> Result<V, LoadError> + Send + Sync>;

/// An optional batch compute function: given the missing keys, returns the
/// values it could produce. Keys it omits are treated as absent.
pub type BatchLoaderFn<K, V> = Arc<dyn Fn(Vec<K>) -> Result<HashMap<K, V>, LoadError> + Send + Sync>;
