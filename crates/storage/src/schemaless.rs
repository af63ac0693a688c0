//! Storage for instances of attributeless types
//!
//! Types exposing no attribute cannot live in the attribute indexes. Their
//! instances are kept here, bucketed by runtime type. Such types are often
//! abstract roots: a template of an attributeless type may have to match
//! records of attribute-bearing subtypes, which only the attribute indexes
//! hold. For that case this index tracks, per attributeless type, the
//! attribute identities exposed by every registered subtype.
//!
//! That subtype table is filled off the write path by a discovery worker.
//! Each runtime type is sent to the worker once.

use crate::record::{BackRef, Record, RecordId};
use crate::store::MatchContext;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use tuplespace_concurrency::{FairLock, Worker};
use tuplespace_core::{AttributeId, Tuple, TypeInfo, TypeRegistry, TypeTag};

type SubtypeAttributes = FairLock<FxHashMap<TypeTag, FxHashSet<AttributeId>>>;

/// Outcome of a schemaless search
#[derive(Debug)]
pub enum SchemalessMatch {
    /// A stored attributeless record matched
    Found(Record),
    /// Nothing here; search the attribute indexes for these identities
    Fallback(Vec<AttributeId>),
}

/// Index of attributeless records
#[derive(Debug)]
pub struct SchemalessIndex {
    records: FairLock<FxHashMap<TypeTag, BTreeMap<RecordId, Record>>>,
    subtype_attributes: Arc<SubtypeAttributes>,
    seen: Mutex<FxHashSet<TypeTag>>,
    discovery: Worker<Arc<TypeInfo>>,
}

impl SchemalessIndex {
    /// Create the index and start its discovery worker
    pub fn new(types: Arc<TypeRegistry>) -> io::Result<Self> {
        let subtype_attributes: Arc<SubtypeAttributes> = Arc::default();
        let discovery = {
            let table = Arc::clone(&subtype_attributes);
            Worker::spawn("tuplespace-discovery", move |batch: Vec<Arc<TypeInfo>>| {
                let mut table = table.acquire_exclusive();
                for info in batch {
                    record_subtype(&types, &mut table, &info);
                }
            })?
        };
        Ok(Self {
            records: FairLock::default(),
            subtype_attributes,
            seen: Mutex::default(),
            discovery,
        })
    }

    /// Queue `info` for discovery unless it was seen before
    pub fn discover(&self, info: &Arc<TypeInfo>) {
        if self.seen.lock().insert(info.tag()) {
            self.discovery.send(Arc::clone(info));
        }
    }

    /// Store an attributeless record
    pub fn add_record(self: &Arc<Self>, record: &Record) {
        let mut records = self.records.acquire_exclusive();
        records
            .entry(record.type_tag())
            .or_default()
            .insert(record.id(), record.clone());
        record.add_back_ref(BackRef::Schemaless(Arc::downgrade(self)));
    }

    /// Search for a record matching an attributeless `template`
    ///
    /// Looks through the stored records of the template's type and its
    /// subtypes first. On a miss, returns the attribute identities of the
    /// registered subtypes so the caller can search the attribute indexes.
    pub fn find_match(&self, template: &Tuple, take: bool, ctx: &MatchContext) -> SchemalessMatch {
        let wanted = template.type_tag();
        {
            let records = self.records.acquire_shared();
            let found = records
                .iter()
                .filter(|(tag, _)| ctx.types.is_subtype(**tag, wanted))
                .find_map(|(_, bucket)| {
                    bucket.values().find(|record| ctx.acquire(record, take)).cloned()
                });
            if let Some(record) = found {
                return SchemalessMatch::Found(record);
            }
        }

        let mut attributes: Vec<_> = self
            .subtype_attributes
            .acquire_shared()
            .get(&wanted)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        attributes.sort();
        SchemalessMatch::Fallback(attributes)
    }

    /// Unlink a record
    pub fn remove(&self, record: &Record) {
        let mut records = self.records.acquire_exclusive();
        let tag = record.type_tag();
        if let Some(bucket) = records.get_mut(&tag) {
            bucket.remove(&record.id());
            if bucket.is_empty() {
                records.remove(&tag);
            }
        }
    }

    /// Number of stored attributeless records
    pub fn len(&self) -> usize {
        self.records.acquire_shared().values().map(BTreeMap::len).sum()
    }

    /// True when no attributeless record is stored
    pub fn is_empty(&self) -> bool {
        self.records.acquire_shared().is_empty()
    }

    /// Attribute identities known for an attributeless type
    pub fn subtype_attributes(&self, tag: TypeTag) -> Vec<AttributeId> {
        let mut ids: Vec<_> = self
            .subtype_attributes
            .acquire_shared()
            .get(&tag)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Wait until every queued type was discovered
    pub fn flush(&self) {
        self.discovery.flush();
    }

    /// Stop the discovery worker
    pub fn shutdown(&self) {
        self.discovery.shutdown();
    }
}

/// Credit `info`'s attributes to each attributeless ancestor, itself included
fn record_subtype(
    types: &TypeRegistry,
    table: &mut FxHashMap<TypeTag, FxHashSet<AttributeId>>,
    info: &TypeInfo,
) {
    for &ancestor in info.ancestors() {
        let Some(ancestor_info) = types.get(ancestor) else {
            continue;
        };
        if ancestor_info.is_attributeless() {
            table
                .entry(ancestor)
                .or_default()
                .extend(info.attributes().iter().cloned());
        }
    }
    tracing::trace!(type_name = info.name(), "type discovered");
}
