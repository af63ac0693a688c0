//! Tuple space engine
//!
//! Ties the store, the background workers and the timer together behind
//! [`Space`]:
//! - [`Space`] / [`SpaceBuilder`]: write, read, take, register
//! - [`SpaceConfig`]: lease minute, compaction period, registration lease
//! - [`NotificationRegistry`] / [`Listener`]: one-shot notifications

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod notify;
pub mod space;

pub use config::SpaceConfig;
pub use notify::{Listener, NotificationRegistry, Registration};
pub use space::{Space, SpaceBuilder, SpaceStats};
pub use tuplespace_storage::CompactionReport;
