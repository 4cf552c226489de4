//! `pkc sync`: one invocation of the whole loop.
//!
//! scan -> init (only when no manifest exists) -> advisor merge (only with
//! `--decisions`) -> diff -> plan -> execute -> record
//!
//! Every stage works from the same scan. A dry run writes neither the
//! manifest nor history.

use anyhow::{bail, Result};
use chrono::Utc;
use pkc_runtime::{ApplyRequest, ConfirmationRequired};
use pkc_schemas::{Manifest, Source};
use std::path::{Path, PathBuf};

use super::apply::{finish, print_run};
use super::{hostname, load_inventory, source_filter, LiveEngine, Session};
use crate::GlobalArgs;

pub struct SyncArgs {
    pub sources: Vec<Source>,
    pub decisions: Option<PathBuf>,
    pub purge: bool,
    pub dry_run: bool,
    pub yes: bool,
    pub from_scan: Option<PathBuf>,
}

pub fn sync(g: &GlobalArgs, args: SyncArgs) -> Result<()> {
    if args.from_scan.is_some() && !args.dry_run {
        bail!("REFUSING sync --from-scan without --dry-run: a live sync needs a live scan");
    }
    // Refused before init or the advisor merge can write anything.
    if !args.dry_run && !args.yes {
        return Err(ConfirmationRequired { operation: "sync" }.into());
    }

    let session = Session::load(g)?;
    let mut engine = session.engine();
    let only = source_filter(&args.sources);
    let inv = load_inventory(&engine, args.from_scan.as_deref(), only.as_ref())?;
    let path = &session.paths.manifest;

    let mut manifest = if path.exists() {
        pkc_artifacts::load_manifest(path)?
    } else if args.dry_run {
        let m = pkc_artifacts::manifest_from_scan(&inv.packages, engine.protected(), Default::default());
        println!("bootstrapped={} kept={} written=false", path.display(), m.len());
        m
    } else {
        let res = pkc_artifacts::init_manifest_from_scan(
            path,
            &inv.packages,
            engine.protected(),
            Utc::now(),
            hostname().as_deref(),
            false,
        )?;
        println!("bootstrapped={} kept={} written=true", res.path.display(), res.kept);
        pkc_artifacts::load_manifest(path)?
    };

    if let Some(decisions) = &args.decisions {
        manifest = merge_decisions(&session, &mut engine, manifest, decisions, args.dry_run)?;
    }

    let req = ApplyRequest {
        sources: Some(inv.sources.iter().copied().collect()),
        purge: args.purge.then_some(true),
        dry_run: args.dry_run,
        confirmed: args.yes,
    };
    let out = engine.apply(&manifest, &inv.packages, &req)?;
    println!("new_unmanaged={}", out.diff.new.len());
    print_run(&out.run, args.dry_run);
    finish(&out.run)
}

fn merge_decisions(
    session: &Session,
    engine: &mut LiveEngine,
    manifest: Manifest,
    decisions: &Path,
    dry_run: bool,
) -> Result<Manifest> {
    let batch = pkc_advisor::load_decisions(decisions)?;
    let mut outcome = engine.merge_advisor(&manifest, &batch);
    for r in &outcome.needs_review {
        println!("review={} suggested={} confidence={:.2}", r.key, r.suggested, r.confidence);
    }
    for d in &outcome.discarded_protected {
        println!("discarded={} protected={}", d.key, d.pattern);
    }
    println!(
        "advisor_written={} advisor_review={} advisor_discarded={}",
        outcome.written.len(),
        outcome.needs_review.len(),
        outcome.discarded_protected.len()
    );

    if !dry_run && outcome.changed() {
        pkc_artifacts::touch_updated(&mut outcome.manifest, Utc::now());
        pkc_artifacts::save_manifest(&session.paths.manifest, &outcome.manifest)?;
        if let Some(e) = engine.record_advisor_apply(&outcome, &decisions.display().to_string())? {
            println!("recorded={} kind={}", e.id, e.action_kind);
        }
    }
    Ok(outcome.manifest)
}
