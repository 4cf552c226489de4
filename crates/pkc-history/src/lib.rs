//! pkc-history
//!
//! Append-only log of executed batches, one JSON object per line.
//!
//! - entries are never rewritten; undo appends a compensating entry
//! - one entry is one `write` of one line, under an exclusive lock file,
//!   so concurrent invocations cannot interleave partial entries
//! - readers skip a truncated trailing line and corrupt lines instead of
//!   failing, so a crash mid-append never hides earlier history
//! - storage sits behind [`RecordStore`]; [`History`] only sees records

mod entry;
mod history;
mod lock;
mod store;

pub use entry::{HistoryEntry, HistoryKind, META_PARTIALLY_REVERSES, META_REVERSES};
pub use history::{parse_since, History, ListOrder, ListQuery};
pub use lock::LockGuard;
pub use store::{JsonlFileStore, MemoryStore, ReadBatch, RecordStore};
