//! Core types for the tuple space
//!
//! This crate defines the data model shared by every layer:
//! - [`Value`]: attribute values, usable as index keys
//! - [`Entry`]: caller-facing typed records and templates
//! - [`TypeSchema`] / [`TypeRegistry`]: explicit type descriptions with
//!   resolved ancestor chains and attribute identities
//! - [`Tuple`] and [`correlates`]: resolved entries and template matching
//! - [`Error`]: error type for all operations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod entry;
pub mod error;
pub mod schema;
pub mod tuple;
pub mod value;

pub use entry::Entry;
pub use error::{Error, Result};
pub use schema::{AttributeId, TypeInfo, TypeRegistry, TypeSchema, TypeTag};
pub use tuple::{correlates, Tuple};
pub use value::{Value, ValueKey};
