//! Background unlinking of invalidated records
//!
//! Take and expiry only flip a record's state; the record is still linked
//! from its index nodes. The disposal worker unlinks it later, off the
//! caller's path, and reports nodes it leaves empty to the compaction hints.

use crate::compaction::CompactionHints;
use crate::record::Record;
use std::io;
use std::sync::Arc;
use tuplespace_concurrency::{guarded, Worker, WorkerSender};

/// Producer side of the disposal queue
#[derive(Debug, Clone)]
pub struct DisposalQueue {
    sender: WorkerSender<Record>,
}

impl DisposalQueue {
    /// Queue an invalidated record for unlinking
    pub fn enqueue(&self, record: Record) {
        let id = record.id();
        if !self.sender.send(record) {
            tracing::warn!(record = id, "disposal worker stopped, record left linked");
        }
    }

    /// Records waiting to be unlinked
    pub fn backlog(&self) -> usize {
        self.sender.backlog()
    }
}

/// The disposal worker thread
#[derive(Debug)]
pub struct DisposalWorker {
    worker: Worker<Record>,
}

impl DisposalWorker {
    /// Start the worker; emptied nodes are reported to `hints`
    pub fn spawn(hints: Arc<CompactionHints>) -> io::Result<Self> {
        let worker = Worker::spawn("tuplespace-disposal", move |batch: Vec<Record>| {
            for record in batch {
                guarded("disposal", || dispose(&record, &hints));
            }
        })?;
        Ok(Self { worker })
    }

    /// Producer handle
    pub fn queue(&self) -> DisposalQueue {
        DisposalQueue {
            sender: self.worker.sender(),
        }
    }

    /// Wait until every record queued so far is unlinked
    pub fn flush(&self) {
        self.worker.flush();
    }

    /// Stop the worker
    pub fn shutdown(&self) {
        self.worker.shutdown();
    }
}

fn dispose(record: &Record, hints: &CompactionHints) {
    let emptied = record.dispose();
    for node in &emptied {
        hints.note_empty_value(node.attribute(), node.value());
    }
    tracing::trace!(record = record.id(), emptied = emptied.len(), "record disposed");
}
