//! pkc-reconcile
//!
//! Diff engine and protected-pattern matcher.
//!
//! Architectural decisions:
//! - Keys are `(source, name)`; every output sequence is sorted by key
//! - `new` / `missing` / `extra` are disjoint by construction
//! - Protection is an absolute veto on removals, never confidence-weighted
//! - Presentation filters (`DiffOptions`) narrow `new` only; `missing` and
//!   `extra` always see the full observed inventory
//!
//! Deterministic, pure logic. No IO. No package-manager calls.

mod engine;
mod gate;
mod protected;
mod types;

pub use engine::{compute_diff, diff_inventory};
pub use gate::{check_removal_gate, ProtectionViolation, RemovalGate};
pub use protected::{ProtectedMatcher, BASELINE_PATTERNS};
pub use types::*;
