//! Second index level: one attribute value
//!
//! A [`ValueIndex`] holds every record whose attribute has one particular
//! value, bucketed by runtime type. Buckets keep insertion order.
//!
//! An empty node is left in place. Emptiness is only reported (as a hint)
//! and the periodic compaction job prunes it, so the disposal path never
//! needs the parent's exclusive lock.

use crate::record::{BackRef, Record, RecordId};
use crate::store::MatchContext;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tuplespace_concurrency::FairLock;
use tuplespace_core::{correlates, AttributeId, Tuple, TypeTag, Value};

type Bucket = BTreeMap<RecordId, Record>;

/// Records sharing one attribute value, partitioned by runtime type
#[derive(Debug)]
pub struct ValueIndex {
    attribute: AttributeId,
    value: Value,
    buckets: FairLock<FxHashMap<TypeTag, Bucket>>,
}

impl ValueIndex {
    /// Create an empty node for `attribute == value`
    pub fn new(attribute: AttributeId, value: Value) -> Self {
        Self {
            attribute,
            value,
            buckets: FairLock::new(FxHashMap::default()),
        }
    }

    /// Attribute this node belongs to
    pub fn attribute(&self) -> &AttributeId {
        &self.attribute
    }

    /// Attribute value shared by every record in this node
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Add a record under its runtime type and link it back to this node
    pub fn insert(self: &Arc<Self>, record: &Record) {
        let mut buckets = self.buckets.acquire_exclusive();
        buckets
            .entry(record.type_tag())
            .or_default()
            .insert(record.id(), record.clone());
        record.add_back_ref(BackRef::Value(Arc::downgrade(self)));
    }

    /// Find the first valid record matching `template`
    ///
    /// A wildcard template matches any record whose type is the template's
    /// type or a subtype. Otherwise the template's own type bucket is tried
    /// first, then the buckets of its subtypes, comparing attributes with
    /// [`correlates`]. With `take`, the winner is invalidated and queued for
    /// disposal before this returns.
    pub fn find_match(&self, template: &Tuple, take: bool, ctx: &MatchContext) -> Option<Record> {
        let buckets = self.buckets.acquire_shared();
        let wanted = template.type_tag();

        if template.is_wildcard() {
            return buckets
                .iter()
                .filter(|(tag, _)| ctx.types.is_subtype(**tag, wanted))
                .find_map(|(_, bucket)| scan(bucket, None, take, ctx));
        }

        if let Some(found) = buckets
            .get(&wanted)
            .and_then(|bucket| scan(bucket, Some(template), take, ctx))
        {
            return Some(found);
        }
        buckets
            .iter()
            .filter(|(tag, _)| **tag != wanted && ctx.types.is_subtype(**tag, wanted))
            .find_map(|(_, bucket)| scan(bucket, Some(template), take, ctx))
    }

    /// Unlink a record; true if the node is empty afterwards
    pub fn remove(&self, record: &Record) -> bool {
        let mut buckets = self.buckets.acquire_exclusive();
        let tag = record.type_tag();
        if let Some(bucket) = buckets.get_mut(&tag) {
            bucket.remove(&record.id());
            if bucket.is_empty() {
                buckets.remove(&tag);
            }
        }
        buckets.is_empty()
    }

    /// True when no record of any type is linked
    pub fn is_empty(&self) -> bool {
        self.buckets.acquire_shared().is_empty()
    }

    /// Number of linked records, valid or not
    pub fn len(&self) -> usize {
        self.buckets.acquire_shared().values().map(Bucket::len).sum()
    }
}

fn scan(
    bucket: &Bucket,
    template: Option<&Tuple>,
    take: bool,
    ctx: &MatchContext,
) -> Option<Record> {
    bucket
        .values()
        .filter(|record| template.map_or(true, |t| correlates(record.tuple(), t)))
        .find(|record| ctx.acquire(record, take))
        .cloned()
}
