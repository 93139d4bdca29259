use crate::listener::{RemovalCause, RemovalListener};

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};

/// A message sent to the notifier task for every removed entry.
pub(crate) type Notification<K, V> = (K, Arc<V>, RemovalCause);

/// The background task responsible for calling a user-provided removal
/// listener.
///
/// Removal events are emitted through a bounded channel after the cache
/// state mutation completes and consumed here on a dedicated thread, so
/// listener code can never re-enter the cache's locks. Under sustained
/// backpressure events are dropped rather than blocking cache operations.
pub(crate) struct Notifier {
  handle: JoinHandle<()>,
}

impl Notifier {
  /// Spawns a new notifier thread.
  pub(crate) fn spawn<K, V>(
    listener: Arc<dyn RemovalListener<K, V>>,
  ) -> (Self, Sender<Notification<K, V>>)
  where
    K: Send + 'static,
    V: Send + Sync + 'static,
  {
    const NOTIFICATION_CHANNEL_CAPACITY: usize = 128;
    let (tx, rx) = bounded::<Notification<K, V>>(NOTIFICATION_CHANNEL_CAPACITY);

    let handle = thread::spawn(move || {
      // The loop ends when the channel disconnects, i.e. when every sender
      // held by the cache has been dropped.
      while let Ok((key, value, cause)) = rx.recv() {
        listener.on_removal(key, value, cause);
      }
      tracing::trace!("removal notifier stopped");
    });

    (Self { handle }, tx)
  }

  /// Waits for the notifier thread to drain and exit. The caller must have
  /// dropped every sender first.
  pub(crate) fn stop(self) {
    let _ = self.handle.join();
  }
}
