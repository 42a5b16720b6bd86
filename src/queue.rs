//! Lock-free single-producer single-consumer queue
//!
//! Fixed-capacity queue shared between exactly one writer (the audio
//! callback) and one reader (the UI idle tick), backed by crossbeam's
//! `ArrayQueue`. Storage is allocated once in [`bounded`] and never resized.
//! Each half is owned by one thread and takes `&mut self`.
//!
//! When the queue is full, `push` drops the incoming element and keeps the
//! ones already queued. The drop is counted, never reported as an error.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::ConfigError;

struct Shared<T> {
    queue: ArrayQueue<T>,
    overflow_count: AtomicUsize,
}

/// Create a queue holding at most `capacity` elements
pub fn bounded<T: Send>(capacity: usize) -> Result<(Producer<T>, Consumer<T>), ConfigError> {
    if capacity == 0 {
        return Err(ConfigError::ZeroCapacity);
    }

    let shared = Arc::new(Shared {
        queue: ArrayQueue::new(capacity),
        overflow_count: AtomicUsize::new(0),
    });

    Ok((
        Producer {
            shared: shared.clone(),
        },
        Consumer { shared },
    ))
}

/// Writing half, owned by the audio thread
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Producer<T> {
    /// Push an element
    ///
    /// Returns false and drops `item` if the queue is full. Never blocks or
    /// allocates.
    #[inline]
    pub fn push(&mut self, item: T) -> bool {
        match self.shared.queue.push(item) {
            Ok(()) => true,
            Err(_) => {
                self.shared.overflow_count.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    /// Elements currently queued
    pub fn len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.shared.queue.is_full()
    }

    /// Number of elements dropped because the queue was full
    pub fn overflow_count(&self) -> usize {
        self.shared.overflow_count.load(Ordering::Relaxed)
    }
}

/// Reading half, owned by the UI thread
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Consumer<T> {
    /// Pop the oldest element, `None` when empty
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.shared.queue.pop()
    }

    /// Elements available to the consumer right now
    ///
    /// May grow while the caller looks at it; use the value to bound a drain.
    pub fn len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.shared.queue.is_full()
    }

    /// Get buffer capacity
    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    /// Get fill level as a fraction of capacity
    pub fn fill_level(&self) -> f32 {
        self.len() as f32 / self.capacity() as f32
    }

    /// Number of elements the producer dropped because the queue was full
    pub fn overflow_count(&self) -> usize {
        self.shared.overflow_count.load(Ordering::Relaxed)
    }

    /// Reset statistics
    pub fn reset_stats(&self) {
        self.shared.overflow_count.store(0, Ordering::Relaxed);
    }
}
