//! Executor: the SINGLE choke-point for package mutations.
//!
//! ```text
//! caller
//!   └──► Executor::execute(&plan, mode)
//!            ├── removal gate on every action   → ProtectionViolation (nothing runs)
//!            ├── DryRun: stop here, report planned actions
//!            └── per (source, kind) batch
//!                  ├── source missing/unavailable → failed result per action
//!                  └── PackageSource::install|remove(…, &SourceInvokeToken)
//! ```
//!
//! Protection is checked again here even though the planner already filters:
//! a plan built by hand (forced removal, undo compensation) must not bypass it.

use pkc_reconcile::{check_removal_gate, ProtectedMatcher, ProtectionViolation};
use pkc_schemas::{Action, ActionKind, ActionResult, Source};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::{ActionBatch, ActionEvent, ActionPlan, ActionState, PackageSource, SkippedAction, SourceInvokeToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Live,
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub mode: ExecutionMode,
    /// Actions the plan contained, in execution order. Identical for both modes.
    pub planned: Vec<Action>,
    pub skipped: Vec<SkippedAction>,
    /// One per executed action, same order as `planned`. Empty for dry-run.
    pub results: Vec<ActionResult>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &ActionResult> {
        self.results.iter().filter(|r| r.succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ActionResult> {
        self.results.iter().filter(|r| !r.succeeded)
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    /// True only when something ran and nothing succeeded.
    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| !r.succeeded)
    }

    /// Final state of every action the run touched, filtered ones first.
    pub fn states(&self) -> Vec<(Action, ActionState)> {
        let mut out = Vec::with_capacity(self.skipped.len() + self.planned.len());
        for s in &self.skipped {
            let state = ActionState::Planned
                .apply(ActionEvent::Filter {
                    pattern: s.pattern.clone(),
                })
                .unwrap_or(ActionState::Planned);
            out.push((s.action.clone(), state));
        }
        for (i, a) in self.planned.iter().enumerate() {
            let event = match self.results.get(i) {
                Some(r) if r.succeeded => Some(ActionEvent::Succeed),
                Some(r) => Some(ActionEvent::Fail {
                    error: r.error.clone().unwrap_or_default(),
                }),
                None => None,
            };
            let state = match event {
                Some(e) => ActionState::Planned.apply(e).unwrap_or(ActionState::Planned),
                None => ActionState::Planned,
            };
            out.push((a.clone(), state));
        }
        out
    }
}

pub struct Executor<S: PackageSource> {
    sources: BTreeMap<Source, S>,
    protected: ProtectedMatcher,
}

impl<S: PackageSource> Executor<S> {
    /// Later sources with the same tag replace earlier ones.
    pub fn new<I>(sources: I, protected: ProtectedMatcher) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        let sources = sources.into_iter().map(|s| (s.source(), s)).collect();
        Self { sources, protected }
    }

    pub fn protected(&self) -> &ProtectedMatcher {
        &self.protected
    }

    pub fn source(&self, source: Source) -> Option<&S> {
        self.sources.get(&source)
    }

    pub fn sources(&self) -> impl Iterator<Item = &S> {
        self.sources.values()
    }

    /// Refuses the whole plan if any action is a protected removal.
    pub fn check_plan(&self, actions: &[Action]) -> Result<(), ProtectionViolation> {
        for a in actions {
            let key = a.key();
            check_removal_gate(&self.protected, a.kind, &key).into_result(&key)?;
        }
        Ok(())
    }

    pub fn execute(&self, plan: &ActionPlan, mode: ExecutionMode) -> Result<ExecutionReport, ProtectionViolation> {
        self.check_plan(&plan.actions)?;

        let mut report = ExecutionReport {
            mode,
            planned: plan.actions.clone(),
            skipped: plan.skipped.clone(),
            results: Vec::new(),
        };

        if mode == ExecutionMode::DryRun {
            debug!(actions = plan.len(), "dry-run: no mutating calls");
            return Ok(report);
        }

        // Batches group by (source, kind); a plan that interleaves sources
        // would come back out of order, so results are matched back per action.
        let mut pool: Vec<Option<ActionResult>> = Vec::with_capacity(plan.len());
        for batch in plan.batches() {
            pool.extend(self.run_batch(&batch).into_iter().map(Some));
        }
        report.results = plan
            .actions
            .iter()
            .map(|a| take_result(&mut pool, a))
            .collect();
        Ok(report)
    }

    /// Run one `(source, kind)` batch; callers that must stop between
    /// batches (undo) drive this directly.
    pub fn execute_batch(&self, batch: &ActionBatch) -> Result<Vec<ActionResult>, ProtectionViolation> {
        self.check_plan(&batch.actions)?;
        Ok(self.run_batch(batch))
    }

    fn run_batch(&self, batch: &ActionBatch) -> Vec<ActionResult> {
        let Some(src) = self.sources.get(&batch.source).filter(|s| s.is_available()) else {
            warn!(source = %batch.source, kind = %batch.kind, "source unavailable; failing batch");
            let err = format!("source unavailable: {}", batch.source);
            return fail_all(batch, &err);
        };

        info!(source = %batch.source, kind = %batch.kind, count = batch.actions.len(), "executing batch");
        let token = SourceInvokeToken::mint();
        let names = batch.names();
        let raw = match batch.kind {
            ActionKind::Install => src.install(&names, &token),
            ActionKind::Remove => src.remove(&names, false, &token),
            ActionKind::Purge => src.remove(&names, true, &token),
        };
        align_results(batch, raw)
    }
}

fn fail_all(batch: &ActionBatch, error: &str) -> Vec<ActionResult> {
    batch
        .actions
        .iter()
        .map(|a| ActionResult::failure(a.kind, a.source, a.package.clone(), error))
        .collect()
}

/// Exactly one result per action, in action order, whatever the source returned.
fn align_results(batch: &ActionBatch, raw: Vec<ActionResult>) -> Vec<ActionResult> {
    let mut pool: Vec<Option<ActionResult>> = raw
        .into_iter()
        .map(|mut r| {
            r.kind = batch.kind;
            r.source = batch.source;
            Some(r)
        })
        .collect();
    batch.actions.iter().map(|a| take_result(&mut pool, a)).collect()
}

/// First unclaimed result for `a`, or a failure when the source reported none.
fn take_result(pool: &mut [Option<ActionResult>], a: &Action) -> ActionResult {
    pool.iter_mut()
        .find(|slot| {
            slot.as_ref()
                .map_or(false, |r| r.source == a.source && r.kind == a.kind && r.package == a.package)
        })
        .and_then(Option::take)
        .unwrap_or_else(|| ActionResult::failure(a.kind, a.source, a.package.clone(), "no result reported by source"))
}
