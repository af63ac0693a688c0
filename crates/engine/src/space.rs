//! The tuple space
//!
//! [`Space`] wires the store to its background machinery:
//!
//! | component              | thread                 | fed by                        |
//! |------------------------|------------------------|-------------------------------|
//! | [`DisposalWorker`]     | `tuplespace-disposal`  | take, lease expiry            |
//! | [`NotificationRegistry`] | `tuplespace-notify`  | write, register               |
//! | type discovery         | `tuplespace-discovery` | write (first record of a type)|
//! | [`Timer`]              | `tuplespace-timer`     | lease expiry, compaction      |
//!
//! Caller threads never wait on any of them, except in [`Space::flush`].

use crate::config::SpaceConfig;
use crate::notify::{Listener, NotificationRegistry};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tuplespace_concurrency::{Scheduler, TaskHandle, Timer};
use tuplespace_core::{Entry, Error, Result, TypeRegistry, TypeSchema, TypeTag};
use tuplespace_storage::{
    CompactionHints, CompactionJob, CompactionReport, DisposalWorker, Store,
};

/// Point-in-time counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpaceStats {
    /// Attribute indexes in the store
    pub attribute_indexes: usize,
    /// Value nodes across all attribute indexes
    pub value_nodes: usize,
    /// Stored instances of attributeless types
    pub schemaless_records: usize,
    /// Registrations not yet delivered
    pub pending_registrations: usize,
    /// Index nodes hinted empty, awaiting compaction
    pub pending_hints: usize,
    /// Invalidated records awaiting unlinking
    pub pending_disposals: usize,
}

struct SpaceInner {
    config: SpaceConfig,
    store: Arc<Store>,
    disposal: DisposalWorker,
    notifications: NotificationRegistry,
    timer: Arc<dyn Timer>,
    /// Set when the space started its own scheduler
    own_scheduler: Option<Arc<Scheduler>>,
    compaction_job: CompactionJob,
    compaction_task: Mutex<Option<TaskHandle>>,
    shut_down: AtomicBool,
}

/// Concurrent in-memory tuple space
///
/// # Example
///
/// ```
/// use tuplespace_engine::Space;
/// use tuplespace_core::{Entry, TypeSchema};
///
/// let space = Space::builder()
///     .register(TypeSchema::new("Task").attribute("queue").attribute("id"))
///     .open()?;
///
/// space.write(Entry::new("Task").with("queue", "build").with("id", 7), 10);
/// let task = space.take(Entry::new("Task").with("queue", "build"));
/// assert_eq!(task.unwrap().get("id"), Some(&7.into()));
/// # Ok::<(), tuplespace_core::Error>(())
/// ```
pub struct Space {
    inner: Arc<SpaceInner>,
}

impl Space {
    /// Builder with default configuration
    pub fn builder() -> SpaceBuilder {
        SpaceBuilder::new()
    }

    /// Open a space with default configuration
    pub fn open() -> Result<Self> {
        SpaceBuilder::new().open()
    }

    /// Type registry shared with the store
    pub fn types(&self) -> &Arc<TypeRegistry> {
        self.inner.store.types()
    }

    /// Active configuration
    pub fn config(&self) -> &SpaceConfig {
        &self.inner.config
    }

    /// Register an entry type
    pub fn register_type(&self, schema: TypeSchema) -> Result<TypeTag> {
        self.types().register(schema)
    }

    /// Store `entry` for `ttl_minutes` (at least one)
    ///
    /// Failures are logged and the entry is dropped; use
    /// [`try_write`](Self::try_write) to observe them.
    pub fn write(&self, entry: Entry, ttl_minutes: u64) {
        let type_name = entry.type_name().to_string();
        if let Err(e) = self.try_write(entry, ttl_minutes) {
            tracing::warn!(type_name = %type_name, error = %e, "write dropped");
        }
    }

    /// Store `entry` for `ttl_minutes` (at least one)
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownType`] / [`Error::UndeclaredAttribute`] if the entry
    ///   does not fit a registered schema
    /// - [`Error::ShutDown`] after [`shutdown`](Self::shutdown)
    pub fn try_write(&self, entry: Entry, ttl_minutes: u64) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_open()?;
        if ttl_minutes < crate::config::MIN_TTL_MINUTES {
            tracing::warn!(
                ttl_minutes,
                min = crate::config::MIN_TTL_MINUTES,
                "lease below minimum, raised"
            );
        }

        let record = inner.store.prepare(entry)?;
        let expiry = {
            let record = record.clone();
            let disposals = inner.store.disposals().clone();
            inner.timer.after(
                inner.config.lease_for(ttl_minutes),
                Box::new(move || {
                    if record.expire() {
                        tracing::trace!(record = record.id(), "lease expired");
                        disposals.enqueue(record);
                    }
                }),
            )
        };
        record.set_expiry(expiry);
        inner.store.insert(&record);
        inner.notifications.written(&record);
        Ok(())
    }

    /// Copy of a stored entry matching `template`
    ///
    /// `None` if nothing matches or the template is invalid.
    pub fn read(&self, template: Entry) -> Option<Entry> {
        self.find(template, false)
    }

    /// Remove and return a stored entry matching `template`
    ///
    /// Of several concurrent takes that could match the same entry, exactly
    /// one gets it. `None` if nothing matches or the template is invalid.
    pub fn take(&self, template: Entry) -> Option<Entry> {
        self.find(template, true)
    }

    /// Deliver the first entry matching `template` to `listener`, once
    ///
    /// If a matching entry is already stored, the listener is called on
    /// this thread before returning. Otherwise it is called from the
    /// notification worker when a matching entry is written.
    pub fn register<L>(&self, template: Entry, listener: L) -> Result<()>
    where
        L: Listener + 'static,
    {
        let inner = &self.inner;
        inner.ensure_open()?;
        let template = inner.store.template(template)?;

        // Queue first, then look: a write landing in between is seen by one
        // side, and the ticket lets only one of them deliver.
        let ticket = inner
            .notifications
            .register(template.clone(), Arc::new(listener))
            .ok_or(Error::ShutDown)?;
        if let Some(record) = inner.store.find(&template, false) {
            ticket.deliver(record.entry());
        }
        Ok(())
    }

    /// Wait until background work queued before this call is done
    ///
    /// Covers type discovery, notification matching and disposal. Lease
    /// expiry and compaction run on the timer and are not waited for.
    pub fn flush(&self) {
        let inner = &self.inner;
        inner.store.schemaless().flush();
        inner.notifications.flush();
        inner.disposal.flush();
    }

    /// Run a compaction pass now
    pub fn compact_now(&self) -> CompactionReport {
        self.inner.compact()
    }

    /// Current counters
    pub fn stats(&self) -> SpaceStats {
        let inner = &self.inner;
        SpaceStats {
            attribute_indexes: inner.store.attribute_index_count(),
            value_nodes: inner.store.value_node_count(),
            schemaless_records: inner.store.schemaless().len(),
            pending_registrations: inner.notifications.pending(),
            pending_hints: inner.store.hints().len(),
            pending_disposals: inner.store.disposals().backlog(),
        }
    }

    /// True once [`shutdown`](Self::shutdown) ran
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Stop every background thread
    ///
    /// Later writes and registrations fail with [`Error::ShutDown`]; reads
    /// and takes still see what is stored. Idempotent; also run on drop.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl std::fmt::Debug for Space {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Space")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl Drop for Space {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl Space {
    fn find(&self, template: Entry, take: bool) -> Option<Entry> {
        let template = match self.inner.store.template(template) {
            Ok(template) => template,
            Err(e) => {
                tracing::debug!(error = %e, take, "invalid template");
                return None;
            }
        };
        self.inner
            .store
            .find(&template, take)
            .map(|record| record.entry().clone())
    }
}

impl SpaceInner {
    fn ensure_open(&self) -> Result<()> {
        if self.shut_down.load(Ordering::Acquire) {
            Err(Error::ShutDown)
        } else {
            Ok(())
        }
    }

    fn compact(&self) -> CompactionReport {
        self.notifications.prune();
        self.compaction_job.run()
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.compaction_task.lock().take() {
            task.cancel();
        }
        self.notifications.shutdown();
        self.store.shutdown();
        self.disposal.shutdown();
        if let Some(scheduler) = &self.own_scheduler {
            scheduler.shutdown();
        }
        tracing::debug!("space shut down");
    }
}

/// Builder for [`Space`]
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tuplespace_engine::Space;
///
/// let space = Space::builder()
///     .minute(Duration::from_millis(50))
///     .cleanup_period(Duration::from_secs(1))
///     .open()?;
/// # Ok::<(), tuplespace_core::Error>(())
/// ```
pub struct SpaceBuilder {
    config: SpaceConfig,
    timer: Option<Arc<dyn Timer>>,
    types: Option<Arc<TypeRegistry>>,
    schemas: Vec<TypeSchema>,
}

impl SpaceBuilder {
    /// Builder with default configuration
    pub fn new() -> Self {
        Self {
            config: SpaceConfig::default(),
            timer: None,
            types: None,
            schemas: Vec::new(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: SpaceConfig) -> Self {
        self.config = config;
        self
    }

    /// Length of one lease minute
    pub fn minute(mut self, minute: Duration) -> Self {
        self.config.minute = minute;
        self
    }

    /// Period of the compaction job
    pub fn cleanup_period(mut self, period: Duration) -> Self {
        self.config.cleanup_period = period;
        self
    }

    /// Drop registrations still undelivered after `lease`
    pub fn registration_lease(mut self, lease: Duration) -> Self {
        self.config.registration_lease = Some(lease);
        self
    }

    /// Use an existing timer instead of starting a scheduler
    ///
    /// The space cancels its own tasks on shutdown but leaves the timer
    /// running.
    pub fn timer(mut self, timer: Arc<dyn Timer>) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Use an existing type registry
    pub fn types(mut self, types: Arc<TypeRegistry>) -> Self {
        self.types = Some(types);
        self
    }

    /// Register `schema` when the space opens
    pub fn register(mut self, schema: TypeSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Validate the configuration and start the space
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for an invalid configuration
    /// - schema errors from the queued registrations
    /// - [`Error::Io`] if a background thread cannot be spawned
    pub fn open(self) -> Result<Space> {
        self.config.validate()?;

        let types = self.types.unwrap_or_default();
        for schema in self.schemas {
            types.register(schema)?;
        }

        let (timer, own_scheduler) = match self.timer {
            Some(timer) => (timer, None),
            None => {
                let scheduler = Arc::new(Scheduler::start("tuplespace-timer")?);
                (Arc::clone(&scheduler) as Arc<dyn Timer>, Some(scheduler))
            }
        };

        let hints = Arc::new(CompactionHints::new());
        let disposal = DisposalWorker::spawn(Arc::clone(&hints))?;
        let store = Arc::new(Store::new(Arc::clone(&types), disposal.queue(), hints)?);
        let notifications =
            NotificationRegistry::start(Arc::clone(&types), self.config.registration_lease)?;

        let inner = Arc::new(SpaceInner {
            compaction_job: CompactionJob::new(Arc::downgrade(&store)),
            config: self.config,
            store,
            disposal,
            notifications,
            timer,
            own_scheduler,
            compaction_task: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        });

        let weak: Weak<SpaceInner> = Arc::downgrade(&inner);
        let task = inner.timer.every(
            inner.config.cleanup_period,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.compact();
                }
            }),
        );
        *inner.compaction_task.lock() = Some(task);

        tracing::debug!(
            minute_ms = inner.config.minute.as_millis() as u64,
            cleanup_period_secs = inner.config.cleanup_period.as_secs(),
            "space opened"
        );
        Ok(Space { inner })
    }
}

impl Default for SpaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
