//! First index level: one attribute of one declaring type
//!
//! Maps every observed value of the attribute to its [`ValueIndex`]. All
//! stored records of types exposing the attribute are reachable from here,
//! including records whose attribute is unset (under the `Null` key).
//!
//! A value node is created at most once per key: the exclusive path re-reads
//! the map after acquiring the lock, so two writers racing on a new value
//! end up sharing one node. Records are inserted into the node while this
//! index's lock is still held, which keeps compaction from pruning a node
//! that is about to receive a record.

use crate::record::Record;
use crate::store::MatchContext;
use crate::value_index::ValueIndex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tuplespace_concurrency::FairLock;
use tuplespace_core::{AttributeId, Tuple, Value, ValueKey};

/// Value nodes of one attribute
#[derive(Debug)]
pub struct AttributeIndex {
    id: AttributeId,
    values: FairLock<FxHashMap<ValueKey, Arc<ValueIndex>>>,
    /// Set once compaction unlinked this index from the store
    retired: AtomicBool,
}

impl AttributeIndex {
    /// Create an empty index for `id`
    pub fn new(id: AttributeId) -> Self {
        Self {
            id,
            values: FairLock::new(FxHashMap::default()),
            retired: AtomicBool::new(false),
        }
    }

    /// Attribute identity
    pub fn id(&self) -> &AttributeId {
        &self.id
    }

    /// Index `record` under its value for this attribute
    ///
    /// Returns false if the index was retired by compaction; the caller
    /// must resolve a fresh index from the store and retry.
    pub fn add_record(&self, record: &Record) -> bool {
        let key = ValueKey::from(record.tuple().key_for(self.id.name()));
        {
            let values = self.values.acquire_shared();
            if self.is_retired() {
                return false;
            }
            if let Some(node) = values.get(&key) {
                node.insert(record);
                return true;
            }
        }

        let mut values = self.values.acquire_exclusive();
        if self.is_retired() {
            return false;
        }
        let node = values.entry(key).or_insert_with_key(|key| {
            tracing::trace!(attribute = %self.id, value = %key, "value node created");
            Arc::new(ValueIndex::new(self.id.clone(), key.value().clone()))
        });
        node.insert(record);
        true
    }

    /// Search for a record matching `template`
    ///
    /// A bound template goes straight to the node for its value. A wildcard
    /// template walks every node. Empty nodes met on the way, this index
    /// included, are reported to the compaction hints.
    pub fn find_match(&self, template: &Tuple, take: bool, ctx: &MatchContext) -> Option<Record> {
        let values = self.values.acquire_shared();
        if values.is_empty() {
            ctx.hints.note_empty_attribute(&self.id);
            return None;
        }

        let Some(key) = template.value(self.id.name()) else {
            return values.values().find_map(|node| {
                if node.is_empty() {
                    ctx.hints.note_empty_value(&self.id, node.value());
                    return None;
                }
                node.find_match(template, take, ctx)
            });
        };

        let node = values.get(&ValueKey::new(key.clone()))?;
        if node.is_empty() {
            ctx.hints.note_empty_value(&self.id, key);
            return None;
        }
        node.find_match(template, take, ctx)
    }

    /// Drop the listed value nodes that are still empty
    ///
    /// Returns the number of nodes removed.
    pub fn compact(&self, candidates: &FxHashSet<ValueKey>) -> usize {
        let mut values = self.values.acquire_exclusive();
        let before = values.len();
        for value in candidates {
            if values.get(value).map_or(false, |node| node.is_empty()) {
                values.remove(value);
                tracing::trace!(attribute = %self.id, value = %value, "value node pruned");
            }
        }
        before - values.len()
    }

    /// Mark the index retired if it holds no value node
    ///
    /// Must be called with the store's exclusive lock held, right before
    /// unlinking the index.
    pub(crate) fn retire_if_empty(&self) -> bool {
        let values = self.values.acquire_exclusive();
        if values.is_empty() {
            self.retired.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// True once compaction unlinked this index
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    /// True when no value node remains
    pub fn is_empty(&self) -> bool {
        self.values.acquire_shared().is_empty()
    }

    /// Number of value nodes
    pub fn value_count(&self) -> usize {
        self.values.acquire_shared().len()
    }

    /// Value node for `value`, if one exists
    pub fn value_index(&self, value: &Value) -> Option<Arc<ValueIndex>> {
        self.values.acquire_shared().get(&ValueKey::new(value.clone())).cloned()
    }

    /// True while a writer holds this index
    pub fn is_exclusively_held(&self) -> bool {
        self.values.is_exclusively_held()
    }

    /// Requests queued on this index's lock
    pub fn waiting_count(&self) -> usize {
        self.values.waiting_count()
    }

    #[cfg(test)]
    pub(crate) fn hold_exclusive(
        &self,
    ) -> tuplespace_concurrency::ExclusiveGuard<'_, FxHashMap<ValueKey, Arc<ValueIndex>>> {
        self.values.acquire_exclusive()
    }
}
