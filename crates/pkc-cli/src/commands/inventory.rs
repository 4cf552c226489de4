use anyhow::Result;
use chrono::Utc;
use pkc_schemas::{InstallStatus, Source};
use serde_json::json;
use std::path::Path;

use super::{hostname, load_inventory, print_json, source_filter, Session};
use crate::GlobalArgs;

pub fn scan(g: &GlobalArgs, sources: &[Source], export: Option<&Path>) -> Result<()> {
    let session = Session::load(g)?;
    let engine = session.engine();
    let only = source_filter(sources);
    let outcome = engine.scan_sources(only.as_ref())?;

    for s in &outcome.skipped_unavailable {
        println!("source_unavailable={s}");
    }
    for s in &outcome.scanned_sources {
        let of_source: Vec<_> = outcome.packages.iter().filter(|p| p.source == *s).collect();
        let manual = of_source.iter().filter(|p| p.status == InstallStatus::Manual).count();
        println!(
            "source={s} packages={} manual={} auto_installed={}",
            of_source.len(),
            manual,
            of_source.len() - manual
        );
    }
    println!("total={}", outcome.packages.len());

    if let Some(path) = export {
        let export = outcome.to_export(Utc::now(), hostname());
        pkc_artifacts::write_scan_export(path, &export)?;
        println!("exported={}", path.display());
    }
    Ok(())
}

pub fn init(g: &GlobalArgs, from_scan: Option<&Path>, force: bool) -> Result<()> {
    let session = Session::load(g)?;
    let engine = session.engine();
    let inv = load_inventory(&engine, from_scan, None)?;

    let res = pkc_artifacts::init_manifest_from_scan(
        &session.paths.manifest,
        &inv.packages,
        engine.protected(),
        Utc::now(),
        hostname().as_deref(),
        force,
    )?;
    println!("manifest={}", res.path.display());
    println!("kept={}", res.kept);
    println!("skipped_auto_installed={}", res.skipped_auto);
    println!("skipped_protected={}", res.skipped_protected);
    Ok(())
}

pub fn diff(g: &GlobalArgs, sources: &[Source], from_scan: Option<&Path>, json: bool) -> Result<()> {
    let session = Session::load(g)?;
    let engine = session.engine();
    let manifest = pkc_artifacts::load_manifest(&session.paths.manifest)?;
    let only = source_filter(sources);
    let inv = load_inventory(&engine, from_scan, only.as_ref())?;

    // Declared entries of sources that were not observed cannot be judged.
    // `inv.sources` is already narrowed to `--source`.
    let diff = engine.diff(&inv.packages, &manifest, Some(inv.sources.iter().copied().collect()));

    if json {
        return print_json(&json!({
            "in_sync": diff.is_in_sync(),
            "new": diff.new,
            "missing": diff.missing,
            "extra": diff.extra,
        }));
    }

    for k in &diff.new {
        println!("new={k}");
    }
    for k in &diff.missing {
        println!("missing={k}");
    }
    for k in &diff.extra {
        match engine.protected().matching_pattern(&k.name) {
            Some(p) => println!("extra={k} protected={p}"),
            None => println!("extra={k}"),
        }
    }
    println!(
        "new_count={} missing_count={} extra_count={} in_sync={}",
        diff.new.len(),
        diff.missing.len(),
        diff.extra.len(),
        diff.is_in_sync()
    );
    Ok(())
}
