//! Undo: compensate recorded batches by appending new forward entries.
//!
//! ```text
//! undo_candidates (newest first, not yet reversed, not undo entries,
//!                  items narrowed by earlier partial undos)
//!   └── scope: last N | since T
//!         ├── empty                    → UndoRefusal::NothingToUndo
//!         ├── any non-reversible entry → UndoRefusal::NotReversible (nothing runs)
//!         ├── any protected removal    → ProtectionViolation (nothing runs)
//!         └── per entry, per batch: execute; first failure stops everything
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use pkc_execution::{ActionPlan, PackageSource};
use pkc_history::{HistoryEntry, HistoryKind, RecordStore, META_PARTIALLY_REVERSES, META_REVERSES};
use pkc_schemas::{Action, ActionResult};
use tracing::{info, warn};

use crate::{ConfirmationRequired, Engine, UndoRefusal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoScope {
    /// The most recent N batches.
    Steps(usize),
    /// Every batch recorded at or after this instant.
    Since(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoRequest {
    pub scope: UndoScope,
    pub dry_run: bool,
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndoOutcome {
    /// Entries selected for reversal, newest first.
    pub selected: Vec<HistoryEntry>,
    /// Every compensating action, in execution order.
    pub planned: Vec<Action>,
    /// Results of what actually ran. Shorter than `planned` when stopped.
    pub results: Vec<ActionResult>,
    pub recorded: Vec<HistoryEntry>,
    /// Id of the entry whose compensation failed, if any.
    pub stopped_at: Option<String>,
}

impl UndoOutcome {
    pub fn is_complete(&self) -> bool {
        self.stopped_at.is_none()
    }

    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| !r.succeeded)
    }
}

fn compensation_plan(entry: &HistoryEntry) -> Result<ActionPlan, UndoRefusal> {
    let not_reversible = || UndoRefusal::NotReversible {
        id: entry.id.clone(),
        kind: entry.action_kind,
    };
    if !entry.reversible {
        return Err(not_reversible());
    }
    let kind = entry.action_kind.compensation().ok_or_else(not_reversible)?;
    let reason = format!("undo {}", entry.id);
    let actions: Vec<Action> = entry
        .items
        .iter()
        .map(|k| Action::new(kind, k).with_reason(reason.clone()))
        .collect();
    Ok(ActionPlan {
        actions,
        skipped: Vec::new(),
    })
}

impl<S: PackageSource, R: RecordStore> Engine<S, R> {
    pub fn select_undo(&self, scope: UndoScope) -> Result<Vec<HistoryEntry>> {
        let candidates = self.history.undo_candidates()?;
        Ok(match scope {
            UndoScope::Steps(n) => candidates.into_iter().take(n).collect(),
            UndoScope::Since(ts) => candidates.into_iter().filter(|e| e.timestamp >= ts).collect(),
        })
    }

    pub fn undo(&mut self, req: &UndoRequest) -> Result<UndoOutcome> {
        let selected = self.select_undo(req.scope)?;
        if selected.is_empty() {
            return Err(UndoRefusal::NothingToUndo.into());
        }

        // Validate every selected entry before anything runs.
        let mut plans = Vec::with_capacity(selected.len());
        for entry in &selected {
            let plan = compensation_plan(entry)?;
            self.executor.check_plan(&plan.actions)?;
            plans.push(plan);
        }
        let planned: Vec<Action> = plans.iter().flat_map(|p| p.actions.iter().cloned()).collect();

        let mut outcome = UndoOutcome {
            selected: selected.clone(),
            planned,
            results: Vec::new(),
            recorded: Vec::new(),
            stopped_at: None,
        };
        if req.dry_run {
            return Ok(outcome);
        }
        if !req.confirmed {
            return Err(ConfirmationRequired { operation: "undo" }.into());
        }

        for (entry, plan) in selected.iter().zip(&plans) {
            let mut done = Vec::new();
            let mut failed = false;
            for batch in plan.batches() {
                let results = self.executor.execute_batch(&batch)?;
                failed = results.iter().any(|r| !r.succeeded);
                done.extend(results.iter().filter(|r| r.succeeded).map(|r| r.key()));
                outcome.results.extend(results);
                if failed {
                    break;
                }
            }

            if !done.is_empty() {
                let kind = HistoryKind::from(plan.actions[0].kind);
                let marker = if failed { META_PARTIALLY_REVERSES } else { META_REVERSES };
                let undo_entry = HistoryEntry::new(kind, entry.source.clone(), done)
                    .with_metadata(marker, entry.id.clone())
                    .irreversible();
                self.record(&undo_entry)?;
                outcome.recorded.push(undo_entry);
            }

            if failed {
                warn!(entry = %entry.id, "undo stopped: compensating action failed");
                outcome.stopped_at = Some(entry.id.clone());
                break;
            }
            info!(entry = %entry.id, kind = %entry.action_kind, "reversed");
        }
        Ok(outcome)
    }
}
