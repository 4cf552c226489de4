use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pkc_advisor::{merge_decisions, DecisionBatch, MergeOutcome, MergePolicy};
use pkc_config::EngineConfig;
use pkc_execution::{plan_actions, ActionPlan, ExecutionMode, ExecutionReport, Executor, PackageSource, PlanOptions};
use pkc_history::{History, HistoryEntry, HistoryKind, ListQuery, RecordStore};
use pkc_reconcile::{check_removal_gate, diff_inventory, DiffOptions, DiffResult, ProtectedMatcher};
use pkc_schemas::{Action, ActionKind, Manifest, PackageKey, ScanExport, ScannedPackage, Source};
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::ConfirmationRequired;

// ---------------------------------------------------------------------------
// Requests / outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub packages: Vec<ScannedPackage>,
    pub scanned_sources: Vec<Source>,
    /// Enabled sources whose tooling is missing. Not an error.
    pub skipped_unavailable: Vec<Source>,
}

impl ScanOutcome {
    pub fn to_export(&self, scanned_at_utc: DateTime<Utc>, hostname: Option<String>) -> ScanExport {
        ScanExport::new(scanned_at_utc, hostname, self.scanned_sources.clone(), self.packages.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyRequest {
    /// `None` means every enabled source.
    pub sources: Option<BTreeSet<Source>>,
    /// Overrides `apply.purge` when set.
    pub purge: Option<bool>,
    pub dry_run: bool,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveRequest {
    pub keys: Vec<PackageKey>,
    pub purge: bool,
    pub dry_run: bool,
    pub confirmed: bool,
}

/// What one execution did and what it wrote to history.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub report: ExecutionReport,
    pub recorded: Vec<HistoryEntry>,
}

impl RunOutcome {
    /// Non-zero exit is reserved for runs where every attempted action failed.
    pub fn all_failed(&self) -> bool {
        self.report.all_failed()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    pub diff: DiffResult,
    pub run: RunOutcome,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine<S: PackageSource, R: RecordStore> {
    config: EngineConfig,
    pub(crate) executor: Executor<S>,
    pub(crate) history: History<R>,
}

impl<S: PackageSource, R: RecordStore> Engine<S, R> {
    /// Sources disabled by `apply.sources` are dropped here and never scanned
    /// or mutated.
    pub fn new<I>(config: EngineConfig, sources: I, store: R) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        let protected = ProtectedMatcher::from_config(config.protected.use_baseline, config.protected.patterns.clone());
        let enabled: Vec<S> = sources
            .into_iter()
            .filter(|s| config.source_enabled(s.source()))
            .collect();
        Self {
            executor: Executor::new(enabled, protected),
            history: History::new(store),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn protected(&self) -> &ProtectedMatcher {
        self.executor.protected()
    }

    pub fn history(&self) -> &History<R> {
        &self.history
    }

    pub fn executor(&self) -> &Executor<S> {
        &self.executor
    }

    // ----- scan / diff ------------------------------------------------------

    pub fn scan(&self) -> Result<ScanOutcome> {
        self.scan_sources(None)
    }

    pub fn scan_sources(&self, only: Option<&BTreeSet<Source>>) -> Result<ScanOutcome> {
        let mut outcome = ScanOutcome {
            packages: Vec::new(),
            scanned_sources: Vec::new(),
            skipped_unavailable: Vec::new(),
        };
        for src in self.executor.sources() {
            let tag = src.source();
            if only.is_some_and(|o| !o.contains(&tag)) {
                continue;
            }
            if !src.is_available() {
                info!(source = %tag, "source tooling not found; skipping");
                outcome.skipped_unavailable.push(tag);
                continue;
            }
            let found = src.scan().with_context(|| format!("scan {tag} failed"))?;
            info!(source = %tag, packages = found.len(), "scanned");
            outcome.packages.extend(found);
            outcome.scanned_sources.push(tag);
        }
        Ok(outcome)
    }

    pub fn diff_options(&self, sources: Option<BTreeSet<Source>>) -> DiffOptions {
        DiffOptions {
            sources,
            manual_only_new: self.config.diff.manual_only,
            hide_protected_new: self.config.diff.hide_protected_new,
        }
    }

    pub fn diff(&self, packages: &[ScannedPackage], manifest: &Manifest, sources: Option<BTreeSet<Source>>) -> DiffResult {
        diff_inventory(packages, manifest, &self.diff_options(sources), self.protected())
    }

    pub fn plan(&self, diff: &DiffResult, purge: bool) -> ActionPlan {
        plan_actions(diff, self.protected(), &PlanOptions { purge })
    }

    // ----- apply ------------------------------------------------------------

    pub fn apply(&mut self, manifest: &Manifest, packages: &[ScannedPackage], req: &ApplyRequest) -> Result<ApplyOutcome> {
        let diff = self.diff(packages, manifest, req.sources.clone());
        let purge = req.purge.unwrap_or(self.config.apply.purge);
        let plan = self.plan(&diff, purge);
        for s in &plan.skipped {
            info!(package = %s.action.key(), pattern = %s.pattern, "skipped: protected");
        }
        let run = self.run_plan(&plan, req.dry_run, req.confirmed, "apply")?;
        Ok(ApplyOutcome { diff, run })
    }

    /// Explicit removal of named packages. A protected name refuses the
    /// whole request rather than being dropped.
    pub fn remove_packages(&mut self, req: &RemoveRequest) -> Result<RunOutcome> {
        let actions: Vec<Action> = req
            .keys
            .iter()
            .map(|k| {
                let kind = if req.purge && k.source.supports_purge() {
                    ActionKind::Purge
                } else {
                    ActionKind::Remove
                };
                Action::new(kind, k).with_reason("requested removal")
            })
            .collect();
        for a in &actions {
            let key = a.key();
            check_removal_gate(self.protected(), a.kind, &key).into_result(&key)?;
        }
        let plan = ActionPlan::from_actions(actions, self.protected());
        self.run_plan(&plan, req.dry_run, req.confirmed, "remove")
    }

    fn run_plan(&mut self, plan: &ActionPlan, dry_run: bool, confirmed: bool, operation: &'static str) -> Result<RunOutcome> {
        if dry_run {
            let report = self.executor.execute(plan, ExecutionMode::DryRun)?;
            return Ok(RunOutcome {
                report,
                recorded: Vec::new(),
            });
        }
        if !plan.is_empty() && !confirmed {
            return Err(ConfirmationRequired { operation }.into());
        }

        let report = self.executor.execute(plan, ExecutionMode::Live)?;
        for r in report.failed() {
            warn!(package = %r.key(), kind = %r.kind, error = r.error.as_deref().unwrap_or(""), "action failed");
        }
        let recorded = self.record_report(&report)?;
        Ok(RunOutcome { report, recorded })
    }

    /// One entry per `(source, kind)` group of succeeded results, in run order.
    fn record_report(&mut self, report: &ExecutionReport) -> Result<Vec<HistoryEntry>> {
        let mut groups: Vec<(Source, ActionKind, Vec<PackageKey>)> = Vec::new();
        for r in report.succeeded() {
            match groups.iter_mut().find(|(s, k, _)| *s == r.source && *k == r.kind) {
                Some((_, _, items)) => items.push(r.key()),
                None => groups.push((r.source, r.kind, vec![r.key()])),
            }
        }

        let mut recorded = Vec::with_capacity(groups.len());
        for (source, kind, items) in groups {
            let entry = HistoryEntry::new(HistoryKind::from(kind), source.as_str(), items);
            self.record(&entry)?;
            recorded.push(entry);
        }
        Ok(recorded)
    }

    // ----- advisor ----------------------------------------------------------

    /// Fold decisions into a copy of `manifest`. Nothing is written.
    pub fn merge_advisor(&self, manifest: &Manifest, batch: &DecisionBatch) -> MergeOutcome {
        let policy = MergePolicy {
            min_confidence: self.config.advisor.min_confidence,
        };
        merge_decisions(manifest, batch, self.protected(), &policy)
    }

    /// Call after the merged manifest has been saved. Returns `None` when the
    /// merge changed nothing.
    pub fn record_advisor_apply(&mut self, outcome: &MergeOutcome, decisions_label: &str) -> Result<Option<HistoryEntry>> {
        if outcome.written.is_empty() {
            return Ok(None);
        }
        let entry = HistoryEntry::new(HistoryKind::AdvisorApply, "advisor", outcome.written.clone())
            .with_metadata("decisions", decisions_label)
            .with_metadata("written", outcome.written.len())
            .with_metadata("needs_review", outcome.needs_review.len())
            .with_metadata("discarded_protected", outcome.discarded_protected.len());
        self.record(&entry)?;
        Ok(Some(entry))
    }

    // ----- history ----------------------------------------------------------

    pub fn list_history(&self, query: &ListQuery) -> Result<Vec<HistoryEntry>> {
        self.history.list(query)
    }

    pub(crate) fn record(&mut self, entry: &HistoryEntry) -> Result<()> {
        self.history
            .record(entry)
            .with_context(|| format!("RECORD_FAILED: history entry {} ({})", entry.id, entry.action_kind))?;
        let max = self.config.history.max_entries;
        if max > 0 {
            let dropped = self.history.prune(max)?;
            if dropped > 0 {
                info!(dropped, max, "pruned history");
            }
        }
        Ok(())
    }
}
