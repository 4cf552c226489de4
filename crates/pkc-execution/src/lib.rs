//! pkc-execution
//!
//! Action planning and the single mutation choke-point.
//!
//! - `plan_actions` turns a diff into ordered actions: installs first, then
//!   removals; protected removals are dropped and reported as skipped
//! - `Executor` is the only holder of a [`SourceInvokeToken`], so
//!   `PackageSource::install` / `remove` cannot be called around it
//! - every executed action yields exactly one `ActionResult`, order-preserving
//! - dry-run plans and gates identically but never calls a mutator
//! - no retries: a failed action is reported, not re-attempted

mod executor;
mod plan;
mod source;
mod state;

// --- choke-point exports ---

/// The only public path to package mutations.
pub use executor::{ExecutionMode, ExecutionReport, Executor};

/// Source capability trait + invoke token. External crates implement
/// `PackageSource`; only `Executor` can mint the token its mutators require.
pub use source::{PackageSource, SourceInvokeToken};

pub use plan::{plan_actions, ActionBatch, ActionPlan, PlanOptions, SkippedAction};
pub use state::{ActionEvent, ActionState, TransitionError};
