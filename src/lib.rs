//! # Tuplespace
//!
//! Concurrent in-memory tuple space: a shared associative store of typed
//! entries, accessed by template matching instead of by key.
//!
//! ## Quick Start
//!
//! ```
//! use tuplespace::prelude::*;
//!
//! let space = Space::builder()
//!     .register(TypeSchema::new("Vehicle").attribute("wheels"))
//!     .register(TypeSchema::new("Car").extends("Vehicle").attribute("color"))
//!     .open()?;
//!
//! // Leases are counted in minutes
//! space.write(Entry::new("Car").with("wheels", 4).with("color", "red"), 10);
//!
//! // A template on the parent type matches the stored car
//! let car = space.read(Entry::new("Vehicle").with("wheels", 4)).unwrap();
//! assert_eq!(car.type_name(), "Car");
//!
//! // Take removes it; only one taker ever wins
//! assert!(space.take(Entry::new("Car")).is_some());
//! assert!(space.read(Entry::new("Car")).is_none());
//! # Ok::<(), Error>(())
//! ```
//!
//! ## Matching
//!
//! A template matches a stored entry when the entry's type is the template's
//! type or a subtype, and every attribute the template sets is equal on the
//! entry. Unset attributes are wildcards.
//!
//! ## Crates
//!
//! - `tuplespace-core`: values, entries, schemas, matching
//! - `tuplespace-concurrency`: fair lock, timer, background workers
//! - `tuplespace-storage`: the two-level index, disposal, compaction
//! - `tuplespace-engine`: [`Space`], configuration, notifications

#![warn(missing_docs)]

mod logging;

pub mod prelude;

// Re-export main entry points
pub use tuplespace_engine::{
    CompactionReport, Listener, Registration, Space, SpaceBuilder, SpaceConfig, SpaceStats,
};

// Re-export core types
pub use tuplespace_core::{Entry, Error, Result, TypeRegistry, TypeSchema, TypeTag, Value};

// Re-export timer plumbing for callers sharing a scheduler
pub use tuplespace_concurrency::{Scheduler, TaskHandle, Timer};

pub use logging::{init_logging, DEFAULT_FILTER, LOG_ENV};
