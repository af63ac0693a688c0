//! FIFO-fair reader/writer lock
//!
//! Every index node is protected by its own [`FairLock`]. Requests of either
//! kind are granted in strict arrival order: a request is admitted only when
//! it is at the head of the wait queue and the lock state allows it (no
//! writer for shared requests, no holder at all for exclusive requests).
//! Neither readers nor writers can starve, at the cost of less read
//! parallelism than a reader-preferring lock.
//!
//! The lock is NOT reentrant. Acquiring it again on a thread that already
//! holds it deadlocks.
//!
//! # Example
//!
//! ```
//! use tuplespace_concurrency::FairLock;
//!
//! let lock = FairLock::new(Vec::new());
//! lock.acquire_exclusive().push(1);
//! assert_eq!(lock.acquire_shared().len(), 1);
//! ```

use parking_lot::{Condvar, Mutex};
use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: bool,
    queue: VecDeque<u64>,
    next_ticket: u64,
}

impl LockState {
    fn enqueue(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.queue.push_back(ticket);
        ticket
    }

    fn is_head(&self, ticket: u64) -> bool {
        self.queue.front() == Some(&ticket)
    }
}

/// Reader/writer lock with FIFO admission
pub struct FairLock<T: ?Sized> {
    state: Mutex<LockState>,
    granted: Condvar,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is mediated by the lock state: many shared
// guards (needs T: Sync) or one exclusive guard (needs T: Send).
unsafe impl<T: ?Sized + Send> Send for FairLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for FairLock<T> {}

impl<T> FairLock<T> {
    /// Create an unlocked lock around `value`
    pub fn new(value: T) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            granted: Condvar::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Consume the lock, returning the protected value
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> FairLock<T> {
    /// Acquire the lock in shared mode, blocking until admitted
    pub fn acquire_shared(&self) -> SharedGuard<'_, T> {
        let mut state = self.state.lock();
        if !state.writer && state.queue.is_empty() {
            state.readers += 1;
            return SharedGuard { lock: self };
        }

        let ticket = state.enqueue();
        while state.writer || !state.is_head(ticket) {
            self.granted.wait(&mut state);
        }
        state.queue.pop_front();
        state.readers += 1;
        // The next request in line may be another reader
        self.granted.notify_all();
        SharedGuard { lock: self }
    }

    /// Acquire the lock in exclusive mode, blocking until admitted
    pub fn acquire_exclusive(&self) -> ExclusiveGuard<'_, T> {
        let mut state = self.state.lock();
        if !state.writer && state.readers == 0 && state.queue.is_empty() {
            state.writer = true;
            return ExclusiveGuard { lock: self };
        }

        let ticket = state.enqueue();
        while state.writer || state.readers > 0 || !state.is_head(ticket) {
            self.granted.wait(&mut state);
        }
        state.queue.pop_front();
        state.writer = true;
        ExclusiveGuard { lock: self }
    }

    /// True while an exclusive guard is alive
    pub fn is_exclusively_held(&self) -> bool {
        self.state.lock().writer
    }

    /// Number of requests queued behind the current holders
    pub fn waiting_count(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Number of live shared guards
    pub fn shared_count(&self) -> usize {
        self.state.lock().readers
    }

    /// Mutable access without locking; the borrow proves exclusivity
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    fn release_shared(&self) {
        let mut state = self.state.lock();
        state.readers -= 1;
        if state.readers == 0 {
            self.granted.notify_all();
        }
    }

    fn release_exclusive(&self) {
        let mut state = self.state.lock();
        state.writer = false;
        self.granted.notify_all();
    }
}

impl<T: Default> Default for FairLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized> fmt::Debug for FairLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FairLock")
            .field("readers", &state.readers)
            .field("writer", &state.writer)
            .field("waiting", &state.queue.len())
            .finish()
    }
}

/// Shared access; released on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct SharedGuard<'a, T: ?Sized> {
    lock: &'a FairLock<T>,
}

impl<T: ?Sized> Deref for SharedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: a shared guard excludes exclusive guards
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for SharedGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_shared();
    }
}

/// Exclusive access; released on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ExclusiveGuard<'a, T: ?Sized> {
    lock: &'a FairLock<T>,
}

impl<T: ?Sized> Deref for ExclusiveGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: an exclusive guard excludes every other guard
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for ExclusiveGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: an exclusive guard excludes every other guard
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for ExclusiveGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release_exclusive();
    }
}
