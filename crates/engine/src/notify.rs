//! One-shot notifications for future writes
//!
//! A registration pairs a template with a [`Listener`]. The first record
//! written after the registration that matches the template is delivered to
//! the listener, then the registration is gone.
//!
//! Written records and new registrations travel over one ordered channel to
//! a single worker, so a registration is compared against exactly the
//! records written after it was queued:
//!
//! ```text
//! write ──Written──┐
//!                  ├──▶ [ channel ] ──▶ pass: match staged + table ──▶ merge staged
//! register ─Registered┘
//! ```
//!
//! Registrations queued during a pass are staged and only merged into the
//! table after the pass. Each registration carries a delivery flag shared
//! with the registering thread, so an immediate match found by the caller
//! and a match found by the worker can never both fire.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tuplespace_concurrency::{guarded, Worker};
use tuplespace_core::{correlates, Entry, Tuple, TypeRegistry, TypeTag};
use tuplespace_storage::Record;

/// Receiver of one matching entry
pub trait Listener: Send + Sync {
    /// Called at most once per registration
    fn notify(&self, entry: Entry);
}

impl<F> Listener for F
where
    F: Fn(Entry) + Send + Sync,
{
    fn notify(&self, entry: Entry) {
        self(entry)
    }
}

/// Ticket for one registration, shared with the caller that made it
#[derive(Clone)]
pub struct Registration {
    inner: Arc<RegistrationInner>,
}

struct RegistrationInner {
    template: Tuple,
    listener: Arc<dyn Listener>,
    delivered: AtomicBool,
    deadline: Option<Instant>,
    /// Shared count of undelivered registrations
    pending: Arc<AtomicUsize>,
}

impl Registration {
    /// Template the registration waits for
    pub fn template(&self) -> &Tuple {
        &self.inner.template
    }

    /// True once the listener was called or the lease ran out
    pub fn is_done(&self) -> bool {
        self.inner.delivered.load(Ordering::Acquire)
    }

    /// Deliver `entry` unless something already completed the registration
    ///
    /// Returns true if this call invoked the listener.
    pub fn deliver(&self, entry: &Entry) -> bool {
        if !self.complete() {
            return false;
        }
        let listener = Arc::clone(&self.inner.listener);
        let entry = entry.clone();
        guarded("listener", move || listener.notify(entry));
        true
    }

    fn matches(&self, types: &TypeRegistry, record: &Record) -> bool {
        types.is_subtype(record.type_tag(), self.inner.template.type_tag())
            && correlates(record.tuple(), &self.inner.template)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.inner.deadline.map_or(false, |deadline| deadline <= now)
    }

    fn complete(&self) -> bool {
        let won = !self.inner.delivered.swap(true, Ordering::AcqRel);
        if won {
            self.inner.pending.fetch_sub(1, Ordering::AcqRel);
        }
        won
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("template", &self.inner.template)
            .field("done", &self.is_done())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

enum Event {
    Written(Record),
    Registered(Registration),
    Prune,
}

/// Registrations grouped by template type
#[derive(Default)]
struct Table {
    by_type: FxHashMap<TypeTag, Vec<Registration>>,
}

impl Table {
    fn deliver(&mut self, types: &TypeRegistry, record: &Record) {
        self.by_type.retain(|tag, registrations| {
            if types.is_subtype(record.type_tag(), *tag) {
                registrations.retain(|r| !(r.matches(types, record) && r.deliver(record.entry())));
            }
            registrations.retain(|r| !r.is_done());
            !registrations.is_empty()
        });
    }

    fn merge(&mut self, staged: &mut Vec<Registration>) {
        for registration in staged.drain(..) {
            if registration.is_done() {
                continue;
            }
            self.by_type
                .entry(registration.template().type_tag())
                .or_default()
                .push(registration);
        }
    }

    fn prune(&mut self, now: Instant) -> usize {
        let mut dropped = 0;
        self.by_type.retain(|_, registrations| {
            registrations.retain(|r| {
                if r.is_expired(now) && r.complete() {
                    dropped += 1;
                    return false;
                }
                !r.is_done()
            });
            !registrations.is_empty()
        });
        dropped
    }
}

/// Background matcher of written records against registrations
pub struct NotificationRegistry {
    worker: Worker<Event>,
    pending: Arc<AtomicUsize>,
    lease: Option<Duration>,
    /// Serializes enqueueing against shutdown
    closed: Mutex<bool>,
}

impl NotificationRegistry {
    /// Start the notification worker
    ///
    /// With a `lease`, registrations still undelivered after it are dropped.
    pub fn start(types: Arc<TypeRegistry>, lease: Option<Duration>) -> io::Result<Self> {
        let mut table = Table::default();
        let mut staged = Vec::new();
        let worker = Worker::spawn("tuplespace-notify", move |batch: Vec<Event>| {
            let mut prune = lease.is_some();
            for event in batch {
                match event {
                    Event::Registered(registration) => staged.push(registration),
                    Event::Written(record) => {
                        table.deliver(&types, &record);
                        staged.retain(|r| !(r.matches(&types, &record) && r.deliver(record.entry())));
                    }
                    Event::Prune => prune = true,
                }
            }
            table.merge(&mut staged);
            if prune {
                let dropped = table.prune(Instant::now());
                if dropped > 0 {
                    tracing::debug!(dropped, "registration leases expired");
                }
            }
        })?;
        Ok(Self {
            worker,
            pending: Arc::new(AtomicUsize::new(0)),
            lease,
            closed: Mutex::new(false),
        })
    }

    /// Queue a registration; the returned ticket can complete it early
    ///
    /// Returns `None` once the registry is shut down.
    pub fn register(&self, template: Tuple, listener: Arc<dyn Listener>) -> Option<Registration> {
        let registration = Registration {
            inner: Arc::new(RegistrationInner {
                template,
                listener,
                delivered: AtomicBool::new(false),
                deadline: self.lease.map(|lease| Instant::now() + lease),
                pending: Arc::clone(&self.pending),
            }),
        };
        let closed = self.closed.lock();
        if *closed {
            return None;
        }
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.worker.send(Event::Registered(registration.clone()));
        Some(registration)
    }

    /// Queue a written record for matching
    pub fn written(&self, record: &Record) {
        if !*self.closed.lock() {
            self.worker.send(Event::Written(record.clone()));
        }
    }

    /// Ask the worker to drop registrations past their lease
    pub fn prune(&self) {
        if self.lease.is_some() && !*self.closed.lock() {
            self.worker.send(Event::Prune);
        }
    }

    /// Undelivered registrations, queued or tabled
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Wait until every event queued so far was processed
    pub fn flush(&self) {
        self.worker.flush();
    }

    /// Stop the worker; undelivered registrations are dropped
    pub fn shutdown(&self) {
        *self.closed.lock() = true;
        self.worker.shutdown();
    }
}

impl fmt::Debug for NotificationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationRegistry")
            .field("pending", &self.pending())
            .field("lease", &self.lease)
            .finish()
    }
}
