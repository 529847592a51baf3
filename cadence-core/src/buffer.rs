//! Write buffer between caller threads and the engine thread
//!
//! Any thread may [`add`](WriteBuffer::add) at any time. The engine thread
//! takes the whole backlog with [`drain`](WriteBuffer::drain), which swaps
//! the collection for an empty one under the lock, so a batch is never
//! observed half-drained and no item is delivered twice.
//!
//! ```
//! use cadence_core::WriteBuffer;
//!
//! let buffer = WriteBuffer::new();
//! buffer.add(1);
//! buffer.add(2);
//! assert_eq!(buffer.drain(), vec![1, 2]);
//! assert!(buffer.drain().is_empty());
//! ```

use std::sync::{Mutex, MutexGuard};

/// Mutex-guarded append-only collection with atomic drain-and-reset
#[derive(Debug)]
pub struct WriteBuffer<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for WriteBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WriteBuffer<T> {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        // A Vec cannot be left half-updated by a panicking pusher, so a
        // poisoned lock still guards consistent data.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an item
    pub fn add(&self, item: T) {
        self.lock().push(item);
    }

    /// Take every buffered item in append order, leaving the buffer empty
    pub fn drain(&self) -> Vec<T> {
        core::mem::take(&mut *self.lock())
    }

    /// Discard every buffered item
    pub fn force_clear(&self) {
        self.lock().clear();
    }

    /// Number of buffered items
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
