//! Stored records and their lifecycle
//!
//! ```text
//!  write()          all indexes hold it        take() / lease expiry     disposal worker
//! ─────────▶ Pending ───────validate()──────▶ Valid ─────────────────▶ Invalidated ─────▶ unlinked
//!               └──────────────── lease expiry ───────────────────────────▲
//! ```
//!
//! The lifecycle state and the expiry handle sit behind a per-record lock,
//! separate from the index locks. Whoever flips a record to `Invalidated`
//! first wins the take/expiry race and alone enqueues it for disposal.
//!
//! Index nodes own their records. A record only keeps weak back-references
//! to the nodes it was inserted into, so disposal can find them without
//! searching and without a reference cycle.

use crate::schemaless::SchemalessIndex;
use crate::value_index::ValueIndex;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::{Arc, Weak};
use tuplespace_concurrency::TaskHandle;
use tuplespace_core::{Entry, Tuple, TypeTag};

/// Unique record identifier, monotonically assigned per store
pub type RecordId = u64;

/// Lifecycle state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Written, not yet visible in every index
    Pending,
    /// Visible to read and take
    Valid,
    /// Taken or expired; waiting for disposal
    Invalidated,
}

pub(crate) enum BackRef {
    Value(Weak<ValueIndex>),
    Schemaless(Weak<SchemalessIndex>),
}

struct Lifecycle {
    state: RecordState,
    expiry: Option<TaskHandle>,
}

struct RecordInner {
    id: RecordId,
    tuple: Tuple,
    lifecycle: Mutex<Lifecycle>,
    back_refs: Mutex<SmallVec<[BackRef; 4]>>,
}

/// A stored entry, shared between every index node that holds it
#[derive(Clone)]
pub struct Record {
    inner: Arc<RecordInner>,
}

impl Record {
    /// Wrap a resolved tuple as a pending record
    pub fn new(id: RecordId, tuple: Tuple) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                id,
                tuple,
                lifecycle: Mutex::new(Lifecycle {
                    state: RecordState::Pending,
                    expiry: None,
                }),
                back_refs: Mutex::new(SmallVec::new()),
            }),
        }
    }

    /// Record identifier
    pub fn id(&self) -> RecordId {
        self.inner.id
    }

    /// Resolved tuple
    pub fn tuple(&self) -> &Tuple {
        &self.inner.tuple
    }

    /// Caller entry
    pub fn entry(&self) -> &Entry {
        self.inner.tuple.entry()
    }

    /// Runtime type
    pub fn type_tag(&self) -> TypeTag {
        self.inner.tuple.type_tag()
    }

    /// Current lifecycle state
    pub fn state(&self) -> RecordState {
        self.inner.lifecycle.lock().state
    }

    /// True while the record can be read or taken
    pub fn is_valid(&self) -> bool {
        self.state() == RecordState::Valid
    }

    /// Attach the lease timer; cancelled right away if already invalidated
    pub fn set_expiry(&self, handle: TaskHandle) {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.state == RecordState::Invalidated {
            handle.cancel();
        } else {
            lifecycle.expiry = Some(handle);
        }
    }

    /// Pending → Valid. False if the record was invalidated meanwhile.
    pub fn validate(&self) -> bool {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.state == RecordState::Pending {
            lifecycle.state = RecordState::Valid;
            true
        } else {
            false
        }
    }

    /// Valid → Invalidated for a take; cancels the lease timer
    ///
    /// True only for the single caller that won the record.
    pub fn claim(&self) -> bool {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.state != RecordState::Valid {
            return false;
        }
        lifecycle.state = RecordState::Invalidated;
        if let Some(expiry) = lifecycle.expiry.take() {
            expiry.cancel();
        }
        true
    }

    /// Invalidate on lease expiry, from any live state
    ///
    /// True if this call invalidated the record.
    pub fn expire(&self) -> bool {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.state == RecordState::Invalidated {
            return false;
        }
        lifecycle.state = RecordState::Invalidated;
        lifecycle.expiry = None;
        true
    }

    pub(crate) fn add_back_ref(&self, back_ref: BackRef) {
        self.inner.back_refs.lock().push(back_ref);
    }

    /// Number of index nodes still linking this record
    pub fn back_ref_count(&self) -> usize {
        self.inner.back_refs.lock().len()
    }

    /// Unlink the record from every node it was inserted into
    ///
    /// Idempotent: back-references are drained, so a second call finds
    /// nothing left to do. Returns the value nodes this call left empty.
    pub fn dispose(&self) -> Vec<Arc<ValueIndex>> {
        let back_refs = std::mem::take(&mut *self.inner.back_refs.lock());
        let mut emptied = Vec::new();
        for back_ref in back_refs {
            match back_ref {
                BackRef::Value(node) => {
                    if let Some(node) = node.upgrade() {
                        if node.remove(self) {
                            emptied.push(node);
                        }
                    }
                }
                BackRef::Schemaless(index) => {
                    if let Some(index) = index.upgrade() {
                        index.remove(self);
                    }
                }
            }
        }
        emptied
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Record {}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("entry", self.entry())
            .finish()
    }
}
