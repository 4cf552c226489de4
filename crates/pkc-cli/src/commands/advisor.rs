use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use std::path::Path;

use super::{hostname, print_json, Session};
use crate::GlobalArgs;

pub fn export(g: &GlobalArgs, out: Option<&Path>) -> Result<()> {
    let session = Session::load(g)?;
    let engine = session.engine();
    let scan = engine.scan()?;
    for s in &scan.skipped_unavailable {
        println!("source_unavailable={s}");
    }

    let path = out.unwrap_or(&session.paths.scan_export);
    let export = scan.to_export(Utc::now(), hostname());
    pkc_artifacts::write_scan_export(path, &export)?;
    println!("exported={}", path.display());
    println!("packages={}", export.packages.len());
    Ok(())
}

pub fn apply(g: &GlobalArgs, decisions: &Path, dry_run: bool, json: bool) -> Result<()> {
    let session = Session::load(g)?;
    let mut engine = session.engine();
    let manifest = pkc_artifacts::load_manifest(&session.paths.manifest)?;
    let batch = pkc_advisor::load_decisions(decisions)?;

    let mut outcome = engine.merge_advisor(&manifest, &batch);

    let mut recorded = None;
    if !dry_run && outcome.changed() {
        pkc_artifacts::touch_updated(&mut outcome.manifest, Utc::now());
        pkc_artifacts::save_manifest(&session.paths.manifest, &outcome.manifest)?;
        recorded = engine.record_advisor_apply(&outcome, &decisions.display().to_string())?;
    }

    if json {
        return print_json(&json!({
            "dry_run": dry_run,
            "decisions": batch.len(),
            "written": outcome.written,
            "needs_review": outcome.needs_review,
            "discarded_protected": outcome.discarded_protected,
            "recorded": recorded,
        }));
    }

    println!("mode={}", if dry_run { "dry_run" } else { "live" });
    for k in &outcome.written {
        let status = outcome
            .manifest
            .get(k)
            .map(|e| e.status.to_string())
            .unwrap_or_default();
        println!("written={k} status={status}");
    }
    for r in &outcome.needs_review {
        println!(
            "review={} suggested={} confidence={:.2} reason={}",
            r.key, r.suggested, r.confidence, r.reason
        );
    }
    for d in &outcome.discarded_protected {
        println!("discarded={} protected={}", d.key, d.pattern);
    }
    if let Some(e) = &recorded {
        println!("recorded={}", e.id);
    }
    println!(
        "decisions={} written_count={} review_count={} discarded_count={}",
        batch.len(),
        outcome.written.len(),
        outcome.needs_review.len(),
        outcome.discarded_protected.len()
    );
    Ok(())
}
