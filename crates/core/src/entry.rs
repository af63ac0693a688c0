//! Caller-facing entries
//!
//! An [`Entry`] is what clients write into the space and what they pass as a
//! template. It names its runtime type and carries attribute values; the
//! type's schema decides which attributes exist (see [`crate::schema`]).

use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A typed bag of attribute values
///
/// The same type is used for stored entries and for templates. In a
/// template, attributes that are missing or `Null` match anything.
///
/// # Examples
///
/// ```
/// use tuplespace_core::Entry;
///
/// let car = Entry::new("Car").with("wheels", 4).with("color", "red");
/// assert_eq!(car.type_name(), "Car");
/// assert_eq!(car.get("wheels").and_then(|v| v.as_int()), Some(4));
/// ```
#[derive(Clone, PartialEq)]
pub struct Entry {
    type_name: Arc<str>,
    fields: BTreeMap<String, Value>,
}

impl Entry {
    /// Create an entry of the given type with no attributes set
    pub fn new(type_name: impl AsRef<str>) -> Self {
        Self {
            type_name: Arc::from(type_name.as_ref()),
            fields: BTreeMap::new(),
        }
    }

    /// Set an attribute, builder style
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set an attribute
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Runtime type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Attribute value, if set
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// All attributes in name order, including `Null` ones
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(&self.type_name);
        for (k, v) in &self.fields {
            s.field(k, v);
        }
        s.finish()
    }
}
