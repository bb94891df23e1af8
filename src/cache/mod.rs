//! In-memory TTL cache with change detection.
//!
//! This module provides the process-wide cache shared by the request layer
//! and the sync service:
//! - Entries expire per key namespace (`balance_*`, `tasks_*`, ...)
//! - Every write stores a checksum so redundant updates can be skipped
//! - Snapshots can be diffed one level deep to drive incremental updates

mod checksum;
mod diff;
mod ttl;

pub use checksum::Checksum;
pub use diff::Diff;
pub use ttl::{TtlCache, TtlPolicy};
