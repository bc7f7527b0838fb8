//! Append-only result buffer shared between worker threads and the owning thread.

use std::sync::Arc;

use parking_lot::Mutex;

/// A cloneable handle to a lock-guarded vector of finished results.
///
/// Workers call [`ResultChannel::push`] as they finish work; the owning thread calls
/// [`ResultChannel::drain`] once per update cycle and receives everything pushed since the
/// previous drain. Items pushed from different threads have no relative ordering.
pub struct ResultChannel<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> ResultChannel<T> {
    /// Creates an empty channel.
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Appends one result.
    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    /// Takes every buffered result, leaving the channel empty.
    ///
    /// The buffer is swapped out under the lock, so concurrent drains each receive a
    /// disjoint subset and nothing is copied.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock())
    }

    /// Number of results currently buffered.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether no results are buffered.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> Default for ResultChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ResultChannel<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}
