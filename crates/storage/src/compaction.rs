//! Pruning of empty index nodes
//!
//! Nothing removes an empty node on the hot path. Disposal and searches
//! record hints instead, and a periodic job walks them:
//!
//! 1. snapshot and clear the hints
//! 2. for each hinted attribute, drop the hinted value nodes still empty
//! 3. drop the attribute indexes left without value nodes, including the
//!    ones step 2 just emptied
//!
//! Every removal re-checks emptiness under the parent's exclusive lock, so a
//! stale hint costs a lookup and nothing else.

use crate::store::Store;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Weak;
use tuplespace_core::{AttributeId, Value, ValueKey};

/// Value nodes hinted empty, grouped by attribute
pub type ValueHints = FxHashMap<AttributeId, FxHashSet<ValueKey>>;

/// Thread-safe collection of nodes believed empty
#[derive(Debug, Default)]
pub struct CompactionHints {
    values: Mutex<ValueHints>,
    attributes: Mutex<FxHashSet<AttributeId>>,
}

impl CompactionHints {
    /// Create an empty hint set
    pub fn new() -> Self {
        Self::default()
    }

    /// Hint that the node for `attribute == value` may be empty
    pub fn note_empty_value(&self, attribute: &AttributeId, value: &Value) {
        let key = ValueKey::new(value.clone());
        let mut values = self.values.lock();
        match values.get_mut(attribute) {
            Some(set) => {
                set.insert(key);
            }
            None => {
                let mut set = FxHashSet::default();
                set.insert(key);
                values.insert(attribute.clone(), set);
            }
        }
    }

    /// Hint that the index for `attribute` may be empty
    pub fn note_empty_attribute(&self, attribute: &AttributeId) {
        self.attributes.lock().insert(attribute.clone());
    }

    /// Take every hint collected so far, leaving the set empty
    pub fn take(&self) -> (ValueHints, FxHashSet<AttributeId>) {
        let values = std::mem::take(&mut *self.values.lock());
        let attributes = std::mem::take(&mut *self.attributes.lock());
        (values, attributes)
    }

    /// Number of hinted nodes
    pub fn len(&self) -> usize {
        let values: usize = self.values.lock().values().map(FxHashSet::len).sum();
        values + self.attributes.lock().len()
    }

    /// True when no hint is pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What one compaction run removed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompactionReport {
    /// Value nodes removed
    pub value_nodes: usize,
    /// Attribute indexes removed
    pub attribute_indexes: usize,
}

/// Periodic compaction over a store
///
/// Holds the store weakly so a scheduled job never keeps it alive.
#[derive(Debug, Clone)]
pub struct CompactionJob {
    store: Weak<Store>,
}

impl CompactionJob {
    /// Create a job for `store`
    pub fn new(store: Weak<Store>) -> Self {
        Self { store }
    }

    /// Run one pass; a no-op once the store is gone
    pub fn run(&self) -> CompactionReport {
        let Some(store) = self.store.upgrade() else {
            return CompactionReport::default();
        };

        let (values, mut attributes) = store.hints().take();
        let mut report = CompactionReport::default();
        for (attribute, candidates) in &values {
            if let Some((removed, now_empty)) = store.compact_values(attribute, candidates) {
                report.value_nodes += removed;
                if now_empty {
                    attributes.insert(attribute.clone());
                }
            }
        }
        if !attributes.is_empty() {
            report.attribute_indexes = store.compact_attributes(&attributes);
        }

        if report != CompactionReport::default() {
            tracing::debug!(
                value_nodes = report.value_nodes,
                attribute_indexes = report.attribute_indexes,
                "compaction pass"
            );
        }
        report
    }
}
