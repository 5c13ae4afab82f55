//! Bounded blocking FIFO shared by the listener and the worker threads.
//!
//! `push` blocks while the queue holds `capacity` items and `pop` blocks
//! while it is empty. Items move through the queue by value, so a
//! connection is never visible to two workers at once.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Fixed-capacity multi-consumer queue backed by a mutex and two condvars.
pub struct DispatchQueue<T> {
    items: Mutex<VecDeque<T>>,
    /// Signalled when an item is removed.
    not_full: Condvar,
    /// Signalled when an item is added.
    not_empty: Condvar,
    capacity: usize,
}

impl<T> DispatchQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "dispatch queue capacity must be non-zero");
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Append an item, blocking until there is room.
    ///
    /// Returns the queue depth right after the push.
    pub fn push(&self, item: T) -> usize {
        let mut items = self.lock();
        while items.len() >= self.capacity {
            items = self
                .not_full
                .wait(items)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        items.push_back(item);
        let depth = items.len();
        drop(items);
        self.not_empty.notify_one();
        depth
    }

    /// Remove the oldest item, blocking until one is available.
    pub fn pop(&self) -> T {
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                drop(items);
                self.not_full.notify_one();
                return item;
            }
            items = self
                .not_empty
                .wait(items)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if nothing is buffered.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // Critical sections are single VecDeque calls; a poisoned lock still
    // guards a consistent queue.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
