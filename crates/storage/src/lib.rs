//! Index structures for the tuple space
//!
//! This crate holds stored records and everything needed to find them:
//! - [`Store`]: two-level index, attribute identity → value → records
//! - [`SchemalessIndex`]: instances of attributeless types
//! - [`Record`]: lifecycle (pending, valid, invalidated) and back-references
//! - [`DisposalWorker`]: background unlinking of taken and expired records
//! - [`CompactionJob`]: periodic pruning of empty index nodes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute_index;
pub mod compaction;
pub mod disposal;
pub mod record;
pub mod schemaless;
pub mod store;
pub mod value_index;

pub use attribute_index::AttributeIndex;
pub use compaction::{CompactionHints, CompactionJob, CompactionReport};
pub use disposal::{DisposalQueue, DisposalWorker};
pub use record::{Record, RecordId, RecordState};
pub use schemaless::{SchemalessIndex, SchemalessMatch};
pub use store::{MatchContext, Store};
pub use value_index::ValueIndex;

#[cfg(test)]
static_assertions::assert_impl_all!(Store: Send, Sync);
#[cfg(test)]
static_assertions::assert_impl_all!(Record: Send, Sync, Clone);
