//! Channel-fed background workers
//!
//! A [`Worker`] is one named thread draining an unbounded
//! `crossbeam-channel`. It blocks while the channel is empty and hands
//! whatever has accumulated to its handler as one batch, so producers never
//! wait on the consumer.
//!
//! ```text
//! producers ──send()──▶ [ channel ] ──recv + try_iter──▶ handler(batch)
//! ```
//!
//! A panic inside the handler is caught and logged; the worker then moves on
//! to the next batch. [`Worker::flush`] is a barrier: it returns once every
//! item sent before the call has been handed to the handler. Called from the
//! handler itself it returns immediately, since the worker cannot wait on
//! its own batch.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

/// Upper bound on items handed to the handler in one batch
const MAX_BATCH: usize = 1024;

enum Message<T> {
    Item(T),
    Flush(Sender<()>),
    Shutdown,
}

/// Sending side of a worker's queue, cheap to clone
pub struct WorkerSender<T> {
    sender: Sender<Message<T>>,
}

impl<T> Clone for WorkerSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> WorkerSender<T> {
    /// Enqueue an item; false if the worker is gone
    pub fn send(&self, item: T) -> bool {
        self.sender.send(Message::Item(item)).is_ok()
    }

    /// Items waiting in the queue
    pub fn backlog(&self) -> usize {
        self.sender.len()
    }
}

impl<T> std::fmt::Debug for WorkerSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSender")
            .field("backlog", &self.sender.len())
            .finish()
    }
}

/// A named background thread consuming a queue in batches
pub struct Worker<T> {
    name: String,
    sender: WorkerSender<T>,
    thread_id: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Worker<T> {
    /// Spawn a worker thread named `name`
    pub fn spawn<F>(name: &str, handler: F) -> io::Result<Self>
    where
        F: FnMut(Vec<T>) + Send + 'static,
    {
        let (sender, receiver) = unbounded();
        let label = name.to_string();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&label, receiver, handler))?;
        Ok(Self {
            name: name.to_string(),
            sender: WorkerSender { sender },
            thread_id: thread.thread().id(),
            thread: Mutex::new(Some(thread)),
        })
    }
}

impl<T> Worker<T> {
    /// Sending handle for producers
    pub fn sender(&self) -> WorkerSender<T> {
        self.sender.clone()
    }

    /// Enqueue one item
    pub fn send(&self, item: T) -> bool {
        self.sender.send(item)
    }

    /// Worker thread name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when called from the worker's own thread
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Block until everything sent before this call was processed
    ///
    /// A no-op on the worker's own thread.
    pub fn flush(&self) {
        if self.is_current() {
            tracing::trace!(worker = %self.name, "flush from own thread skipped");
            return;
        }
        let (ack, done) = bounded(1);
        if self.sender.sender.send(Message::Flush(ack)).is_ok() {
            // Err means the worker stopped; nothing left to wait for
            let _ = done.recv();
        }
    }

    /// Stop the worker after the batch in progress and join it
    pub fn shutdown(&self) {
        let _ = self.sender.sender.send(Message::Shutdown);
        if let Some(handle) = self.thread.lock().take() {
            if !self.is_current() {
                let _ = handle.join();
            }
        }
    }
}

impl<T> Drop for Worker<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<T> std::fmt::Debug for Worker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("backlog", &self.sender.backlog())
            .finish()
    }
}

fn run<T, F>(name: &str, receiver: Receiver<Message<T>>, mut handler: F)
where
    F: FnMut(Vec<T>),
{
    tracing::debug!(worker = name, "worker started");
    while let Ok(first) = receiver.recv() {
        let mut batch = Vec::new();
        let mut acks = Vec::new();
        let mut stop = false;

        for message in std::iter::once(first).chain(receiver.try_iter().take(MAX_BATCH)) {
            match message {
                Message::Item(item) => batch.push(item),
                Message::Flush(ack) => acks.push(ack),
                Message::Shutdown => {
                    stop = true;
                    break;
                }
            }
        }

        if !batch.is_empty() {
            guarded(name, || handler(batch));
        }
        for ack in acks {
            let _ = ack.send(());
        }
        if stop {
            break;
        }
    }
    tracing::debug!(worker = name, "worker stopped");
}

/// Run `f`, catching and logging a panic
///
/// Returns false if `f` panicked. Background threads wrap every unit of
/// work with this so one bad item never takes the thread down.
pub fn guarded<F: FnOnce()>(context: &str, f: F) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                context = context,
                panic = %panic_message(payload.as_ref()),
                "background task panicked"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
