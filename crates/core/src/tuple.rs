//! Resolved entries and template matching
//!
//! A [`Tuple`] is an [`Entry`] paired with its resolved [`TypeInfo`]. Stored
//! records and templates are both tuples; only the direction of
//! [`correlates`] tells them apart.

use crate::entry::Entry;
use crate::schema::{TypeInfo, TypeTag};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// An entry resolved against its type schema
#[derive(Clone)]
pub struct Tuple {
    entry: Entry,
    type_info: Arc<TypeInfo>,
    /// Number of non-null attributes
    bound: usize,
}

impl Tuple {
    pub(crate) fn new(entry: Entry, type_info: Arc<TypeInfo>) -> Self {
        let bound = entry.fields().filter(|(_, v)| !v.is_null()).count();
        Self {
            entry,
            type_info,
            bound,
        }
    }

    /// The wrapped entry
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Resolved type
    pub fn type_info(&self) -> &Arc<TypeInfo> {
        &self.type_info
    }

    /// Runtime type tag
    pub fn type_tag(&self) -> TypeTag {
        self.type_info.tag()
    }

    /// Non-null attribute value
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entry.get(name).filter(|v| !v.is_null())
    }

    /// Index key for an attribute: its value, or `Null` when unset
    pub fn key_for(&self, name: &str) -> Value {
        self.value(name).cloned().unwrap_or(Value::Null)
    }

    /// Non-null attributes
    pub fn bound_values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entry.fields().filter(|(_, v)| !v.is_null())
    }

    /// Number of non-null attributes
    pub fn bound_count(&self) -> usize {
        self.bound
    }

    /// True when no attribute is bound, i.e. the template matches any
    /// instance of its type
    pub fn is_wildcard(&self) -> bool {
        self.bound == 0
    }

    /// Consume the tuple, returning the entry
    pub fn into_entry(self) -> Entry {
        self.entry
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.entry, f)
    }
}

/// True when `record` satisfies every bound attribute of `template`
///
/// Missing or null template attributes are wildcards. Extra attributes on
/// the record are allowed; a bound template attribute the record lacks is a
/// mismatch. Types are not compared here, callers filter by type first.
pub fn correlates(record: &Tuple, template: &Tuple) -> bool {
    template
        .bound_values()
        .all(|(name, expected)| record.value(name) == Some(expected))
}
