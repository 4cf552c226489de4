use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{InstallStatus, MalformedInput, PackageKey, ScannedPackage, Source};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total: usize,
    pub manual: usize,
    pub auto_installed: usize,
    pub per_source: BTreeMap<Source, usize>,
}

impl ScanSummary {
    pub fn from_packages(packages: &[ScannedPackage]) -> Self {
        let mut s = ScanSummary::default();
        for p in packages {
            s.total += 1;
            match p.status {
                InstallStatus::Manual => s.manual += 1,
                InstallStatus::AutoInstalled => s.auto_installed += 1,
            }
            *s.per_source.entry(p.source).or_insert(0) += 1;
        }
        s
    }
}

/// A scan captured for offline use. The working set can be rebuilt from it
/// without touching live scanners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanExport {
    pub scanned_at_utc: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub sources: Vec<Source>,
    pub packages: Vec<ScannedPackage>,
    #[serde(default)]
    pub summary: ScanSummary,
}

impl ScanExport {
    pub fn new(
        scanned_at_utc: DateTime<Utc>,
        hostname: Option<String>,
        sources: Vec<Source>,
        packages: Vec<ScannedPackage>,
    ) -> Self {
        let summary = ScanSummary::from_packages(&packages);
        Self {
            scanned_at_utc,
            hostname,
            sources,
            packages,
            summary,
        }
    }

    pub fn working_set(&self) -> BTreeSet<PackageKey> {
        self.packages.iter().map(ScannedPackage::key).collect()
    }

    /// Duplicate keys or a package from an undeclared source make the export unusable.
    pub fn validate(&self) -> Result<(), MalformedInput> {
        let mut seen = BTreeSet::new();
        for p in &self.packages {
            if p.name.is_empty() {
                return Err(MalformedInput::new("scan export", "package with empty name"));
            }
            if !self.sources.contains(&p.source) {
                return Err(MalformedInput::new(
                    "scan export",
                    format!("{} listed but source '{}' was not scanned", p.key(), p.source),
                ));
            }
            if !seen.insert(p.key()) {
                return Err(MalformedInput::new(
                    "scan export",
                    format!("duplicate package {}", p.key()),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(source: Source, name: &str, status: InstallStatus) -> ScannedPackage {
        ScannedPackage::new(source, name, "1", status)
    }

    #[test]
    fn summary_counts_by_status_and_source() {
        let export = ScanExport::new(
            Utc::now(),
            None,
            vec![Source::Apt, Source::Flatpak],
            vec![
                pkg(Source::Apt, "vim", InstallStatus::Manual),
                pkg(Source::Apt, "libc-bin", InstallStatus::AutoInstalled),
                pkg(Source::Flatpak, "org.gimp.GIMP", InstallStatus::Manual),
            ],
        );
        assert_eq!(export.summary.total, 3);
        assert_eq!(export.summary.manual, 2);
        assert_eq!(export.summary.auto_installed, 1);
        assert_eq!(export.summary.per_source.get(&Source::Apt), Some(&2));
        assert_eq!(export.working_set().len(), 3);
    }

    #[test]
    fn duplicate_keys_are_malformed() {
        let export = ScanExport::new(
            Utc::now(),
            None,
            vec![Source::Apt],
            vec![
                pkg(Source::Apt, "vim", InstallStatus::Manual),
                pkg(Source::Apt, "vim", InstallStatus::Manual),
            ],
        );
        let err = export.validate().unwrap_err();
        assert!(err.detail.contains("duplicate package apt:vim"));
    }
}
