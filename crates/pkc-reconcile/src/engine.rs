use pkc_schemas::{Manifest, ManifestStatus, PackageKey, ScannedPackage};
use std::collections::{BTreeMap, BTreeSet};

use crate::{DiffOptions, DiffResult, ProtectedMatcher};

/// Pure three-way diff.
///
/// - `new`: in `scanned`, absent from `manifest`
/// - `missing`: declared `keep`, absent from `scanned`
/// - `extra`: declared `remove`, present in `scanned`
///
/// A key declared `keep` and observed lands in none of them. Iterating the
/// two ordered collections keeps the output sorted without a final sort.
pub fn compute_diff(scanned: &BTreeSet<PackageKey>, manifest: &Manifest) -> DiffResult {
    let declared = manifest.entries();

    let new = scanned
        .iter()
        .filter(|k| !declared.contains_key(*k))
        .cloned()
        .collect();

    let mut missing = Vec::new();
    let mut extra = Vec::new();
    for (key, entry) in declared {
        match (entry.status, scanned.contains(key)) {
            (ManifestStatus::Keep, false) => missing.push(key.clone()),
            (ManifestStatus::Remove, true) => extra.push(key.clone()),
            _ => {}
        }
    }

    DiffResult { new, missing, extra }
}

/// Diff a full scan with presentation filters applied.
///
/// `missing` and `extra` are computed against every observed package so a
/// dependency that happens to be declared `keep` is not reported missing;
/// only `new` is narrowed to manual, unprotected packages.
pub fn diff_inventory(
    packages: &[ScannedPackage],
    manifest: &Manifest,
    options: &DiffOptions,
    protected: &ProtectedMatcher,
) -> DiffResult {
    let by_key: BTreeMap<PackageKey, &ScannedPackage> = packages
        .iter()
        .filter(|p| options.includes(p.source))
        .map(|p| (p.key(), p))
        .collect();
    let observed: BTreeSet<PackageKey> = by_key.keys().cloned().collect();

    let mut diff = if options.sources.is_some() {
        let mut scoped = Manifest::with_metadata(manifest.metadata.clone());
        for (k, e) in manifest.entries() {
            if options.includes(k.source) {
                scoped.insert(k.clone(), e.clone());
            }
        }
        compute_diff(&observed, &scoped)
    } else {
        compute_diff(&observed, manifest)
    };

    diff.new.retain(|k| {
        let manual_ok = !options.manual_only_new || by_key.get(k).map_or(false, |p| p.is_manual());
        let protect_ok = !options.hide_protected_new || !protected.is_protected(&k.name);
        manual_ok && protect_ok
    });

    diff
}
