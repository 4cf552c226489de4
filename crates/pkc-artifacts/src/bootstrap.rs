use anyhow::{bail, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use pkc_reconcile::ProtectedMatcher;
use pkc_schemas::{Manifest, ManifestEntry, ScannedPackage};
use std::path::{Path, PathBuf};

use crate::save_manifest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitManifestResult {
    pub path: PathBuf,
    pub kept: usize,
    pub skipped_auto: usize,
    pub skipped_protected: usize,
}

/// Keep every manual, unprotected package. Dependencies and system
/// packages stay undeclared.
pub fn manifest_from_scan(packages: &[ScannedPackage], protected: &ProtectedMatcher, metadata: toml::Table) -> Manifest {
    let mut manifest = Manifest::with_metadata(metadata);
    for p in packages {
        if p.is_manual() && !protected.is_protected(&p.name) {
            manifest.insert(p.key(), ManifestEntry::keep().with_reason("installed at init"));
        }
    }
    manifest
}

pub fn init_manifest_from_scan(
    path: &Path,
    packages: &[ScannedPackage],
    protected: &ProtectedMatcher,
    now: DateTime<Utc>,
    hostname: Option<&str>,
    force: bool,
) -> Result<InitManifestResult> {
    if path.exists() && !force {
        bail!("REFUSING to overwrite existing manifest {} (pass --force)", path.display());
    }

    let stamp = toml::Value::String(now.to_rfc3339_opts(SecondsFormat::Secs, true));
    let mut meta = toml::Table::new();
    meta.insert("version".into(), toml::Value::Integer(1));
    meta.insert("created".into(), stamp.clone());
    meta.insert("updated".into(), stamp);
    if let Some(h) = hostname {
        meta.insert("hostname".into(), toml::Value::String(h.to_string()));
    }
    let mut metadata = toml::Table::new();
    metadata.insert("meta".into(), toml::Value::Table(meta));

    let manifest = manifest_from_scan(packages, protected, metadata);
    save_manifest(path, &manifest)?;

    let skipped_auto = packages.iter().filter(|p| !p.is_manual()).count();
    Ok(InitManifestResult {
        path: path.to_path_buf(),
        kept: manifest.len(),
        skipped_auto,
        skipped_protected: packages.len() - skipped_auto - manifest.len(),
    })
}
