// src/staging.rs
//
// Bounded hand-off between the byte-arrival context and the decoder worker.
//
// One mutex guards the buffer and the closed flag. Producers wait on
// `not_full`, consumers on `not_empty`; each insertion wakes one consumer and
// each removal wakes one producer. `shutdown` wakes everyone.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{ConfigError, QueueClosed, TryPushError};

/// Default number of tokens staged before producers block
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

struct Slots<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded FIFO with blocking push/pop and explicit shutdown.
pub struct StagingQueue<T> {
    slots: Mutex<Slots<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> StagingQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(StagingQueue {
            slots: Mutex::new(Slots {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        })
    }

    // Nothing panics while the lock is held, so a poisoned lock still guards
    // a consistent buffer.
    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `item`, blocking while the queue is full.
    /// Fails only if the queue is (or becomes) shut down while waiting.
    pub fn push(&self, item: T) -> Result<(), QueueClosed> {
        let guard = self.lock();
        let mut guard = self
            .not_full
            .wait_while(guard, |s| !s.closed && s.items.len() >= self.capacity)
            .unwrap_or_else(PoisonError::into_inner);

        if guard.closed {
            return Err(QueueClosed);
        }
        guard.items.push_back(item);
        drop(guard);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Non-blocking push. The item comes back inside the error.
    pub fn try_push(&self, item: T) -> Result<(), TryPushError<T>> {
        let mut guard = self.lock();
        if guard.closed {
            return Err(TryPushError::Closed(item));
        }
        if guard.items.len() >= self.capacity {
            return Err(TryPushError::Full(item));
        }
        guard.items.push_back(item);
        drop(guard);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the head, blocking while the queue is empty.
    /// Items staged before shutdown are still delivered; `QueueClosed` is
    /// returned once the queue is shut down and drained.
    pub fn pop(&self) -> Result<T, QueueClosed> {
        let guard = self.lock();
        let mut guard = self
            .not_empty
            .wait_while(guard, |s| !s.closed && s.items.is_empty())
            .unwrap_or_else(PoisonError::into_inner);

        let item = guard.items.pop_front().ok_or(QueueClosed)?;
        drop(guard);

        self.not_full.notify_one();
        Ok(item)
    }

    /// Non-blocking pop. `None` when nothing is staged.
    pub fn try_pop(&self) -> Option<T> {
        let item = self.lock().items.pop_front()?;
        self.not_full.notify_one();
        Some(item)
    }

    /// Close the queue and wake every blocked producer and consumer.
    /// Calling it again has no further effect.
    pub fn shutdown(&self) {
        let mut guard = self.lock();
        if guard.closed {
            return;
        }
        guard.closed = true;
        drop(guard);

        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for StagingQueue<T> {
    fn default() -> Self {
        StagingQueue {
            slots: Mutex::new(Slots {
                items: VecDeque::with_capacity(DEFAULT_QUEUE_CAPACITY),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
