//! pkc-advisor
//!
//! Consumes classification decisions produced by an external advisor and
//! folds them into a manifest. How the decisions were produced is opaque;
//! only their shape is trusted, and only after validation.
//!
//! Merge rules:
//! - `keep` / `remove` overwrite the manifest entry for that key
//! - `ask` never touches the manifest; it is returned for human review
//! - a `remove` for a protected name is discarded, a `keep` passes through
//! - keys merge independently, in file order, and replays are idempotent

mod decisions;
mod merge;

pub use decisions::{
    load_decisions, parse_decisions_json, parse_decisions_toml, Classification, Decision,
    DecisionBatch,
};
pub use merge::{
    merge_decisions, DiscardedDecision, MergeOutcome, MergePolicy, ReviewCause, ReviewItem,
};
