//! Cancellable one-shot and repeating timers
//!
//! A [`Scheduler`] owns one timer thread. Callbacks run on that thread, so
//! they must be short: expiry callbacks only flip a flag and enqueue work for
//! a background worker. A panicking callback is logged and the thread keeps
//! running.
//!
//! Cancelling through a [`TaskHandle`] drops the callback immediately (and
//! with it anything the closure captured). Cancelling a task that already
//! fired, or was already cancelled, is a no-op.

use crate::worker::guarded;
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const SCHEDULED: u8 = 0;
const CANCELLED: u8 = 1;
const FIRED: u8 = 2;

/// Stale deadlines tolerated before the heap is rebuilt
const STALE_DEADLINE_SLACK: usize = 64;

enum Job {
    Once(Box<dyn FnOnce() + Send>),
    Repeating {
        period: Duration,
        run: Box<dyn FnMut() + Send>,
    },
}

struct Scheduled {
    job: Job,
    status: Arc<AtomicU8>,
}

#[derive(Default)]
struct Queue {
    deadlines: BinaryHeap<Reverse<(Instant, u64)>>,
    tasks: FxHashMap<u64, Scheduled>,
    shutdown: bool,
}

impl Queue {
    /// Drop a cancelled task
    ///
    /// Its deadline stays in the heap until popped; once stale deadlines
    /// outnumber live tasks the heap is rebuilt from the live ones.
    fn forget(&mut self, id: u64) {
        self.tasks.remove(&id);
        let stale = self.deadlines.len().saturating_sub(self.tasks.len());
        if stale > STALE_DEADLINE_SLACK && stale > self.tasks.len() {
            let tasks = &self.tasks;
            self.deadlines.retain(|Reverse((_, task))| tasks.contains_key(task));
        }
    }
}

struct Shared {
    queue: Mutex<Queue>,
    wakeup: Condvar,
    next_id: AtomicU64,
}

impl Shared {
    fn push(&self, at: Instant, job: Job) -> TaskHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let status = Arc::new(AtomicU8::new(SCHEDULED));
        let mut queue = self.queue.lock();
        if queue.shutdown {
            status.store(CANCELLED, Ordering::Release);
        } else {
            queue.deadlines.push(Reverse((at, id)));
            queue.tasks.insert(
                id,
                Scheduled {
                    job,
                    status: Arc::clone(&status),
                },
            );
            self.wakeup.notify_one();
        }
        TaskHandle {
            id,
            status,
            shared: Weak::new(),
        }
    }
}

/// Handle to a scheduled task
#[derive(Debug)]
pub struct TaskHandle {
    id: u64,
    status: Arc<AtomicU8>,
    shared: Weak<Shared>,
}

impl TaskHandle {
    /// Cancel the task
    ///
    /// Returns true if this call prevented a future run. Idempotent.
    pub fn cancel(&self) -> bool {
        let won = self
            .status
            .compare_exchange(SCHEDULED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            if let Some(shared) = self.shared.upgrade() {
                shared.queue.lock().forget(self.id);
            }
        }
        won
    }

    /// True once the task was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.status.load(Ordering::Acquire) == CANCELLED
    }

    /// True once a one-shot task ran
    pub fn has_fired(&self) -> bool {
        self.status.load(Ordering::Acquire) == FIRED
    }
}

/// Source of cancellable delayed and periodic callbacks
///
/// Object safe so owners can hold an `Arc<dyn Timer>` and share one timer
/// thread between several components.
pub trait Timer: Send + Sync {
    /// Run `task` once after `delay`
    fn after(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TaskHandle;

    /// Run `task` every `period`, first after one period
    fn every(&self, period: Duration, task: Box<dyn FnMut() + Send>) -> TaskHandle;
}

/// Timer service with a dedicated thread
pub struct Scheduler {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Start a scheduler whose thread carries `name`
    pub fn start(name: &str) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            wakeup: Condvar::new(),
            next_id: AtomicU64::new(0),
        });
        let thread = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(name.to_string())
                .spawn(move || timer_loop(&shared))?
        };
        Ok(Self {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Run `task` once after `delay`
    pub fn schedule_once<F>(&self, delay: Duration, task: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let mut handle = self
            .shared
            .push(Instant::now() + delay, Job::Once(Box::new(task)));
        handle.shared = Arc::downgrade(&self.shared);
        handle
    }

    /// Run `task` every `period`, first after one period
    pub fn schedule_repeating<F>(&self, period: Duration, task: F) -> TaskHandle
    where
        F: FnMut() + Send + 'static,
    {
        let job = Job::Repeating {
            period,
            run: Box::new(task),
        };
        let mut handle = self.shared.push(Instant::now() + period, job);
        handle.shared = Arc::downgrade(&self.shared);
        handle
    }

    /// Number of tasks waiting to fire
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    #[cfg(test)]
    fn queued_deadlines(&self) -> usize {
        self.shared.queue.lock().deadlines.len()
    }

    /// Stop the timer thread, dropping every pending task
    pub fn shutdown(&self) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                return;
            }
            queue.shutdown = true;
            for (_, task) in queue.tasks.drain() {
                task.status.store(CANCELLED, Ordering::Release);
            }
            queue.deadlines.clear();
            self.shared.wakeup.notify_all();
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Timer for Scheduler {
    fn after(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TaskHandle {
        self.schedule_once(delay, task)
    }

    fn every(&self, period: Duration, task: Box<dyn FnMut() + Send>) -> TaskHandle {
        self.schedule_repeating(period, task)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

fn timer_loop(shared: &Shared) {
    let mut queue = shared.queue.lock();
    loop {
        if queue.shutdown {
            return;
        }
        let (at, id) = match queue.deadlines.peek() {
            Some(Reverse(next)) => *next,
            None => {
                shared.wakeup.wait(&mut queue);
                continue;
            }
        };
        if at > Instant::now() {
            shared.wakeup.wait_until(&mut queue, at);
            continue;
        }
        queue.deadlines.pop();

        // Cancelled tasks were already removed from the table
        let Some(Scheduled { job, status }) = queue.tasks.remove(&id) else {
            continue;
        };

        match job {
            Job::Once(run) => {
                if status
                    .compare_exchange(SCHEDULED, FIRED, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    continue;
                }
                drop(queue);
                guarded("timer", run);
                queue = shared.queue.lock();
            }
            Job::Repeating { period, mut run } => {
                drop(queue);
                guarded("timer", &mut run);
                queue = shared.queue.lock();
                if status.load(Ordering::Acquire) == SCHEDULED && !queue.shutdown {
                    queue.deadlines.push(Reverse((Instant::now() + period, id)));
                    queue.tasks.insert(
                        id,
                        Scheduled {
                            job: Job::Repeating { period, run },
                            status,
                        },
                    );
                }
            }
        }
    }
}
