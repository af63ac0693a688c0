//! Concurrency primitives for the tuple space
//!
//! This crate provides the building blocks the index layers are made of:
//! - [`FairLock`]: FIFO-fair, non-reentrant reader/writer lock used at
//!   every index node
//! - [`Timer`] / [`Scheduler`]: cancellable one-shot and repeating timers (record
//!   expiry, periodic compaction)
//! - [`Worker`]: named background thread draining a channel in batches
//!   (disposal, notification, type discovery)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fair_lock;
pub mod scheduler;
pub mod worker;

pub use fair_lock::{ExclusiveGuard, FairLock, SharedGuard};
pub use scheduler::{Scheduler, TaskHandle, Timer};
pub use worker::{guarded, Worker, WorkerSender};
