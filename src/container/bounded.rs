//! Capacity-bounded, thread-safe item storage.
//!
//! A [`BoundedContainer`] keeps items in insertion order and hands them out
//! either oldest-first ([`Order::Fifo`]) or newest-first ([`Order::Lifo`]).
//! Eviction on a forced push always removes the *oldest* items, whatever
//! the pop order is.

use super::error::ContainerError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Capacity used when none is given.
pub const DEFAULT_CAPACITY: usize = 64;

/// Number of recent error messages kept by each container.
pub const ERROR_HISTORY_DEPTH: usize = 16;

static CONTAINER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Pop order of a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    /// Queue semantics: oldest item is popped first.
    Fifo,
    /// Stack semantics: newest item is popped first.
    Lifo,
}

impl Order {
    fn prefix(self) -> &'static str {
        match self {
            Order::Fifo => "Queue",
            Order::Lifo => "Stack",
        }
    }
}

/// Thread-safe store that never holds more than `capacity` items.
///
/// All mutating operations are serialized through a single lock. `len`,
/// `capacity` and `lost_count` are plain atomic reads.
///
/// # Example
///
/// ```rust
/// use devfsm::container::BoundedQueue;
///
/// let queue = BoundedQueue::fifo(2);
/// assert!(queue.push("a", false).is_ok());
/// assert!(queue.push("b", false).is_ok());
/// assert!(queue.push("c", false).is_err());
///
/// // Forced push evicts the oldest entry.
/// assert_eq!(queue.push("c", true), Ok(1));
/// assert_eq!(queue.lost_count(), 1);
/// assert_eq!(queue.pop(), Some("b"));
/// ```
pub struct BoundedContainer<T> {
    name: String,
    order: Order,
    capacity: AtomicUsize,
    count: AtomicUsize,
    lost: AtomicU64,
    items: Mutex<Option<VecDeque<T>>>,
    errors: Mutex<VecDeque<String>>,
}

/// FIFO flavour of [`BoundedContainer`].
pub type BoundedQueue<T> = BoundedContainer<T>;

/// LIFO flavour of [`BoundedContainer`].
pub type BoundedStack<T> = BoundedContainer<T>;

impl<T> BoundedContainer<T> {
    /// Create a container with a generated name.
    ///
    /// Capacity is clamped to at least one item.
    pub fn new(order: Order, capacity: usize) -> Self {
        let serial = CONTAINER_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
        Self::named(format!("{}_{serial}", order.prefix()), order, capacity)
    }

    /// Create a named container.
    pub fn named(name: impl Into<String>, order: Order, capacity: usize) -> Self {
        Self {
            name: name.into(),
            order,
            capacity: AtomicUsize::new(capacity.max(1)),
            count: AtomicUsize::new(0),
            lost: AtomicU64::new(0),
            items: Mutex::new(Some(VecDeque::with_capacity(capacity.clamp(1, 1024)))),
            errors: Mutex::new(VecDeque::with_capacity(ERROR_HISTORY_DEPTH)),
        }
    }

    /// Create a queue (oldest item popped first).
    pub fn fifo(capacity: usize) -> Self {
        Self::new(Order::Fifo, capacity)
    }

    /// Create a stack (newest item popped first).
    pub fn lifo(capacity: usize) -> Self {
        Self::new(Order::Lifo, capacity)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn room_left(&self) -> usize {
        self.capacity().saturating_sub(self.len())
    }

    pub fn at_capacity(&self) -> bool {
        self.len() >= self.capacity()
    }

    /// Total number of items evicted by forced pushes since creation or the
    /// last [`reset_lost_count`](Self::reset_lost_count).
    pub fn lost_count(&self) -> u64 {
        self.lost.load(Ordering::Acquire)
    }

    pub fn reset_lost_count(&self) {
        self.lost.store(0, Ordering::Release);
    }

    /// Change the capacity.
    ///
    /// Shrinking below the current item count evicts the oldest items and
    /// counts them as lost.
    pub fn set_capacity(&self, capacity: usize) -> Result<usize, ContainerError> {
        let capacity = capacity.max(1);
        let mut slot = self.items.lock();
        let Some(items) = slot.as_mut() else {
            return Err(self.fail(self.disposed()));
        };

        self.capacity.store(capacity, Ordering::Release);
        let mut evicted = 0;
        while items.len() > capacity && items.pop_front().is_some() {
            evicted += 1;
        }
        self.account(items.len(), evicted);
        Ok(evicted)
    }

    /// Insert an item.
    ///
    /// Without `force`, a full container rejects the item and is left
    /// untouched. With `force`, the oldest items are evicted until exactly
    /// one slot is free. Returns the number of evicted items.
    pub fn push(&self, item: T, force: bool) -> Result<usize, ContainerError> {
        self.push_evicting(item, force).map(|evicted| evicted.len())
    }

    /// Same as [`push`](Self::push), but hands the evicted items back to the
    /// caller, oldest first.
    pub fn push_evicting(&self, item: T, force: bool) -> Result<Vec<T>, ContainerError> {
        let mut slot = self.items.lock();
        let Some(items) = slot.as_mut() else {
            return Err(self.fail(self.disposed()));
        };

        let capacity = self.capacity();
        let mut evicted = Vec::new();

        if items.len() >= capacity {
            if !force {
                return Err(self.fail(ContainerError::AtCapacity {
                    name: self.name.clone(),
                    capacity,
                }));
            }
            while items.len() >= capacity {
                match items.pop_front() {
                    Some(oldest) => evicted.push(oldest),
                    None => break,
                }
            }
        }

        items.push_back(item);
        self.account(items.len(), evicted.len());
        Ok(evicted)
    }

    /// Insert items so that they are the next ones popped, in the given order.
    ///
    /// Fails without mutation if there is not enough room for all of them.
    pub fn push_front(&self, batch: Vec<T>) -> Result<(), ContainerError> {
        let mut slot = self.items.lock();
        let Some(items) = slot.as_mut() else {
            return Err(self.fail(self.disposed()));
        };

        let capacity = self.capacity();
        if batch.len() > capacity.saturating_sub(items.len()) {
            return Err(self.fail(ContainerError::InsufficientRoom {
                name: self.name.clone(),
                requested: batch.len(),
                capacity,
            }));
        }

        match self.order {
            Order::Fifo => {
                for item in batch.into_iter().rev() {
                    items.push_front(item);
                }
            }
            Order::Lifo => {
                for item in batch.into_iter().rev() {
                    items.push_back(item);
                }
            }
        }

        self.account(items.len(), 0);
        Ok(())
    }

    /// Remove and return the next item in pop order.
    pub fn pop(&self) -> Option<T> {
        let mut slot = self.items.lock();
        let Some(items) = slot.as_mut() else {
            self.fail(self.disposed());
            return None;
        };

        let item = match self.order {
            Order::Fifo => items.pop_front(),
            Order::Lifo => items.pop_back(),
        };
        self.account(items.len(), 0);
        item
    }

    /// Inspect the next item without removing it.
    pub fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let slot = self.items.lock();
        let items = slot.as_ref()?;
        let next = match self.order {
            Order::Fifo => items.front(),
            Order::Lifo => items.back(),
        };
        next.map(f)
    }

    /// Evict oldest items until at least `room` slots are free.
    ///
    /// Returns the number of evicted items.
    pub fn make_room(&self, room: usize) -> Result<usize, ContainerError> {
        let mut slot = self.items.lock();
        let Some(items) = slot.as_mut() else {
            return Err(self.fail(self.disposed()));
        };

        let capacity = self.capacity();
        if room > capacity {
            return Err(self.fail(ContainerError::InsufficientRoom {
                name: self.name.clone(),
                requested: room,
                capacity,
            }));
        }

        let mut evicted = 0;
        while capacity - items.len() < room && items.pop_front().is_some() {
            evicted += 1;
        }
        self.account(items.len(), evicted);
        Ok(evicted)
    }

    /// Remove every item. Returns how many were removed.
    ///
    /// Cleared items are not counted as lost.
    pub fn clear(&self) -> usize {
        self.drain().len()
    }

    /// Remove every item, returning them in pop order.
    pub fn drain(&self) -> Vec<T> {
        let mut slot = self.items.lock();
        let Some(items) = slot.as_mut() else {
            return Vec::new();
        };

        let drained: Vec<T> = match self.order {
            Order::Fifo => items.drain(..).collect(),
            Order::Lifo => items.drain(..).rev().collect(),
        };
        self.account(0, 0);
        drained
    }

    /// Drop all items and refuse every further mutation.
    pub fn dispose(&self) {
        let mut slot = self.items.lock();
        *slot = None;
        self.count.store(0, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.items.lock().is_none()
    }

    /// Most recent failure message, if any.
    pub fn last_error(&self) -> Option<String> {
        self.errors.lock().back().cloned()
    }

    /// Recent failure messages, oldest first.
    pub fn error_history(&self) -> Vec<String> {
        self.errors.lock().iter().cloned().collect()
    }

    fn account(&self, len: usize, evicted: usize) {
        self.count.store(len, Ordering::Release);
        if evicted > 0 {
            self.lost.fetch_add(evicted as u64, Ordering::AcqRel);
        }
    }

    fn disposed(&self) -> ContainerError {
        ContainerError::Disposed {
            name: self.name.clone(),
        }
    }

    fn fail(&self, error: ContainerError) -> ContainerError {
        let mut errors = self.errors.lock();
        while errors.len() >= ERROR_HISTORY_DEPTH {
            errors.pop_front();
        }
        errors.push_back(error.to_string());
        error
    }
}

impl<T: Clone> BoundedContainer<T> {
    /// Clone of the next item in pop order.
    pub fn peek(&self) -> Option<T> {
        self.peek_with(T::clone)
    }

    /// Copy of every item without mutating the container.
    ///
    /// `newest_first` selects the order of the returned items.
    pub fn snapshot(&self, newest_first: bool) -> Vec<T> {
        let slot = self.items.lock();
        let Some(items) = slot.as_ref() else {
            return Vec::new();
        };

        if newest_first {
            items.iter().rev().cloned().collect()
        } else {
            items.iter().cloned().collect()
        }
    }
}

impl<T> std::fmt::Debug for BoundedContainer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedContainer")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("lost", &self.lost_count())
            .finish()
    }
}
