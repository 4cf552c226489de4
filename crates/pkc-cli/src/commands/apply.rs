use anyhow::{bail, Result};
use pkc_runtime::{ApplyRequest, RemoveRequest, RunOutcome};
use pkc_schemas::{PackageKey, Source};
use serde_json::json;
use std::path::PathBuf;

use super::{load_inventory, print_json, print_result, source_filter, Session};
use crate::GlobalArgs;

pub struct ApplyArgs {
    pub sources: Vec<Source>,
    pub purge: bool,
    pub dry_run: bool,
    pub yes: bool,
    pub from_scan: Option<PathBuf>,
    pub json: bool,
}

pub fn apply(g: &GlobalArgs, args: ApplyArgs) -> Result<()> {
    if args.from_scan.is_some() && !args.dry_run {
        bail!("REFUSING apply --from-scan without --dry-run: a live apply needs a live scan");
    }

    let session = Session::load(g)?;
    let mut engine = session.engine();
    let manifest = pkc_artifacts::load_manifest(&session.paths.manifest)?;
    let only = source_filter(&args.sources);
    let inv = load_inventory(&engine, args.from_scan.as_deref(), only.as_ref())?;

    let req = ApplyRequest {
        // Never plan against a source that was not observed.
        sources: Some(inv.sources.iter().copied().collect()),
        purge: args.purge.then_some(true),
        dry_run: args.dry_run,
        confirmed: args.yes,
    };
    let out = engine.apply(&manifest, &inv.packages, &req)?;

    if args.json {
        print_json(&json!({
            "config_hash": session.config_hash,
            "diff": out.diff,
            "report": out.run.report,
            "recorded": out.run.recorded,
        }))?;
    } else {
        println!("config_hash={}", session.config_hash);
        println!("new_unmanaged={}", out.diff.new.len());
        print_run(&out.run, args.dry_run);
    }
    finish(&out.run)
}

pub fn remove(g: &GlobalArgs, source: Source, names: &[String], purge: bool, dry_run: bool, yes: bool) -> Result<()> {
    let session = Session::load(g)?;
    let mut engine = session.engine();
    let req = RemoveRequest {
        keys: names.iter().map(|n| PackageKey::new(source, n.clone())).collect(),
        purge,
        dry_run,
        confirmed: yes,
    };
    let run = engine.remove_packages(&req)?;
    print_run(&run, dry_run);
    finish(&run)
}

pub(super) fn print_run(run: &RunOutcome, dry_run: bool) {
    let report = &run.report;
    println!("mode={}", if dry_run { "dry_run" } else { "live" });
    for a in &report.planned {
        println!(
            "action={} package={} reason={}",
            a.kind,
            a.key(),
            a.reason.as_deref().unwrap_or("")
        );
    }
    for s in &report.skipped {
        println!("skipped={} reason={}", s.action.key(), s.reason());
    }
    for r in &report.results {
        print_result(r);
    }
    for e in &run.recorded {
        println!("recorded={} kind={} items={}", e.id, e.action_kind, e.items.len());
    }
    println!("planned={} skipped={}", report.planned.len(), report.skipped.len());
    if !dry_run {
        println!(
            "succeeded={} failed={}",
            report.succeeded().count(),
            report.failure_count()
        );
    }
}

/// Partial failure is reported, not fatal. Only a run where nothing
/// succeeded exits non-zero.
pub(super) fn finish(run: &RunOutcome) -> Result<()> {
    if run.all_failed() {
        bail!("ALL_ACTIONS_FAILED: {} action(s) attempted, none succeeded", run.report.results.len());
    }
    Ok(())
}
