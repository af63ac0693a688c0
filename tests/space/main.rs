//! Tuple Space Integration Tests
//!
//! End-to-end behaviour of `Space`: matching, take exclusivity, leases,
//! notifications, compaction, and concurrent index creation.

mod common;

mod compaction;
mod concurrency;
mod config;
mod expiry;
mod matching;
mod notification;
mod round_trip;
mod take;
