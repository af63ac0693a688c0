//! The two-level index
//!
//! ```text
//! Store
//!  ├── AttributeIndex (Shape.color)            one per attribute identity
//!  │    ├── ValueIndex ("red")                 one per observed value
//!  │    │    ├── Circle → [r1, r4]             one bucket per runtime type
//!  │    │    └── Square → [r2]
//!  │    └── ValueIndex (Null) ...              records with color unset
//!  ├── AttributeIndex (Circle.radius) ...
//!  └── SchemalessIndex                         attributeless types
//! ```
//!
//! Attributes are keyed by declaring type, so a `Circle` and a `Square` both
//! live under `Shape.color` and a template on `Shape` finds either one.
//!
//! Lock order is always store → attribute index → value node → record. Each
//! level is a [`FairLock`]; a search holds shared locks only, creating a node
//! takes the parent's exclusive lock for as short as possible.

use crate::attribute_index::AttributeIndex;
use crate::compaction::CompactionHints;
use crate::disposal::DisposalQueue;
use crate::record::Record;
use crate::schemaless::{SchemalessIndex, SchemalessMatch};
use rustc_hash::{FxHashMap, FxHashSet};
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tuplespace_concurrency::FairLock;
use tuplespace_core::{AttributeId, Entry, Result, Tuple, TypeRegistry, ValueKey};

/// Shared state every search needs
#[derive(Debug, Clone)]
pub struct MatchContext {
    pub(crate) types: Arc<TypeRegistry>,
    pub(crate) disposals: DisposalQueue,
    pub(crate) hints: Arc<CompactionHints>,
}

impl MatchContext {
    /// Bundle the registry, disposal queue and hints
    pub fn new(
        types: Arc<TypeRegistry>,
        disposals: DisposalQueue,
        hints: Arc<CompactionHints>,
    ) -> Self {
        Self {
            types,
            disposals,
            hints,
        }
    }

    /// Try to hand `record` to a caller
    ///
    /// A read only needs the record to be valid. A take must win the claim;
    /// the winner queues the record for disposal.
    pub(crate) fn acquire(&self, record: &Record, take: bool) -> bool {
        if !take {
            return record.is_valid();
        }
        if record.claim() {
            self.disposals.enqueue(record.clone());
            true
        } else {
            false
        }
    }
}

/// Record store over the attribute and schemaless indexes
#[derive(Debug)]
pub struct Store {
    attributes: FairLock<FxHashMap<AttributeId, Arc<AttributeIndex>>>,
    schemaless: Arc<SchemalessIndex>,
    ctx: MatchContext,
    next_id: AtomicU64,
}

impl Store {
    /// Create an empty store
    ///
    /// Starts the schemaless index's discovery worker.
    pub fn new(
        types: Arc<TypeRegistry>,
        disposals: DisposalQueue,
        hints: Arc<CompactionHints>,
    ) -> std::io::Result<Self> {
        let schemaless = Arc::new(SchemalessIndex::new(Arc::clone(&types))?);
        Ok(Self {
            attributes: FairLock::default(),
            schemaless,
            ctx: MatchContext::new(types, disposals, hints),
            next_id: AtomicU64::new(1),
        })
    }

    /// Type registry
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.ctx.types
    }

    /// Compaction hints fed by searches and disposal
    pub fn hints(&self) -> &Arc<CompactionHints> {
        &self.ctx.hints
    }

    /// Queue feeding the disposal worker
    pub fn disposals(&self) -> &DisposalQueue {
        &self.ctx.disposals
    }

    /// Attributeless record index
    pub fn schemaless(&self) -> &Arc<SchemalessIndex> {
        &self.schemaless
    }

    /// Resolve an entry into a pending record
    pub fn prepare(&self, entry: Entry) -> Result<Record> {
        let tuple = self.ctx.types.extract(entry)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Record::new(id, tuple))
    }

    /// Resolve an entry used as a template
    pub fn template(&self, entry: Entry) -> Result<Tuple> {
        self.ctx.types.extract(entry)
    }

    /// Link a pending record into every index it belongs to, then validate it
    ///
    /// If the record expired while being linked, it is queued for disposal
    /// again so the links added after the first disposal are dropped too.
    pub fn insert(&self, record: &Record) {
        let info = record.tuple().type_info();
        self.schemaless.discover(info);

        if info.is_attributeless() {
            self.schemaless.add_record(record);
        } else {
            for mut index in self.resolve_indexes(info.attributes()) {
                while !index.add_record(record) {
                    // Retired by compaction between lookup and insert
                    match self.resolve_indexes(slice::from_ref(index.id())).pop() {
                        Some(fresh) => index = fresh,
                        None => break,
                    }
                }
            }
        }

        if !record.validate() {
            tracing::debug!(record = record.id(), "record expired during insertion");
            self.ctx.disposals.enqueue(record.clone());
        }
    }

    /// Find a valid record matching `template`; with `take`, claim it
    ///
    /// Attribute-bearing templates search a single attribute index, chosen
    /// for the least lock contention. Attributeless templates search the
    /// schemaless index, then the attribute indexes of known subtypes.
    pub fn find(&self, template: &Tuple, take: bool) -> Option<Record> {
        let info = template.type_info();
        if info.is_attributeless() {
            return match self.schemaless.find_match(template, take, &self.ctx) {
                SchemalessMatch::Found(record) => Some(record),
                SchemalessMatch::Fallback(ids) => {
                    let mut candidates = self.candidates(&ids, true)?;
                    sort_by_contention(&mut candidates);
                    candidates
                        .iter()
                        .find_map(|index| index.find_match(template, take, &self.ctx))
                }
            };
        }

        let mut candidates = self.candidates(info.attributes(), false)?;
        if !template.is_wildcard() {
            candidates.retain(|index| template.value(index.id().name()).is_some());
        }
        pick_least_contended(&candidates)?.find_match(template, take, &self.ctx)
    }

    /// Attribute indexes for `ids`
    ///
    /// Without `partial`, a single missing index means nothing can match and
    /// the whole lookup yields `None`.
    fn candidates(&self, ids: &[AttributeId], partial: bool) -> Option<Vec<Arc<AttributeIndex>>> {
        let attributes = self.attributes.acquire_shared();
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match attributes.get(id) {
                Some(index) => found.push(Arc::clone(index)),
                None if partial => {}
                None => return None,
            }
        }
        (!found.is_empty()).then_some(found)
    }

    /// Live attribute indexes for `ids`, created on first use
    fn resolve_indexes(&self, ids: &[AttributeId]) -> Vec<Arc<AttributeIndex>> {
        let mut resolved = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        {
            let attributes = self.attributes.acquire_shared();
            for id in ids {
                match attributes.get(id) {
                    Some(index) => resolved.push(Arc::clone(index)),
                    None => missing.push(id),
                }
            }
        }
        if missing.is_empty() {
            return resolved;
        }

        let mut attributes = self.attributes.acquire_exclusive();
        for id in missing {
            // Another writer may have created it since the shared pass
            let index = attributes.entry(id.clone()).or_insert_with(|| {
                tracing::debug!(attribute = %id, "attribute index created");
                Arc::new(AttributeIndex::new(id.clone()))
            });
            resolved.push(Arc::clone(index));
        }
        resolved
    }

    /// Prune still-empty value nodes of one attribute
    ///
    /// Returns the number removed and whether the attribute index is now
    /// empty, or `None` if the index no longer exists.
    pub fn compact_values(
        &self,
        attribute: &AttributeId,
        candidates: &FxHashSet<ValueKey>,
    ) -> Option<(usize, bool)> {
        let index = self.attribute_index(attribute)?;
        let removed = index.compact(candidates);
        Some((removed, index.is_empty()))
    }

    /// Unlink still-empty attribute indexes; returns the number removed
    pub fn compact_attributes(&self, candidates: &FxHashSet<AttributeId>) -> usize {
        let mut attributes = self.attributes.acquire_exclusive();
        let mut removed = 0;
        for id in candidates {
            let retired = attributes
                .get(id)
                .map_or(false, |index| index.retire_if_empty());
            if retired {
                attributes.remove(id);
                removed += 1;
                tracing::debug!(attribute = %id, "attribute index pruned");
            }
        }
        removed
    }

    /// Attribute index for `id`, if one exists
    pub fn attribute_index(&self, id: &AttributeId) -> Option<Arc<AttributeIndex>> {
        self.attributes.acquire_shared().get(id).cloned()
    }

    /// Number of attribute indexes
    pub fn attribute_index_count(&self) -> usize {
        self.attributes.acquire_shared().len()
    }

    /// Number of value nodes across every attribute index
    pub fn value_node_count(&self) -> usize {
        let indexes: Vec<_> = self.attributes.acquire_shared().values().cloned().collect();
        indexes.iter().map(|index| index.value_count()).sum()
    }

    /// Stop the store's discovery worker
    pub fn shutdown(&self) {
        self.schemaless.shutdown();
    }
}

/// First index not held by a writer, else the one with the shortest queue
fn pick_least_contended(candidates: &[Arc<AttributeIndex>]) -> Option<&Arc<AttributeIndex>> {
    let mut best: Option<(&Arc<AttributeIndex>, usize)> = None;
    for index in candidates {
        if !index.is_exclusively_held() {
            return Some(index);
        }
        let waiting = index.waiting_count();
        if best.map_or(true, |(_, fewest)| waiting < fewest) {
            best = Some((index, waiting));
        }
    }
    best.map(|(index, _)| index)
}

fn sort_by_contention(candidates: &mut [Arc<AttributeIndex>]) {
    candidates.sort_by_cached_key(|index| (index.is_exclusively_held(), index.waiting_count()));
}
