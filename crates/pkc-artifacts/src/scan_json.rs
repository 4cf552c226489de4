use anyhow::{Context, Result};
use pkc_schemas::{MalformedInput, ScanExport};
use std::fs;
use std::path::Path;

use crate::write_atomic;

/// Refuses to write an export that [`read_scan_export`] would reject.
pub fn write_scan_export(path: &Path, export: &ScanExport) -> Result<()> {
    export
        .validate()
        .with_context(|| format!("write scan export {}", path.display()))?;
    let json = serde_json::to_string_pretty(export).context("serialize scan export failed")?;
    write_atomic(path, &format!("{json}\n"))
}

/// Rebuilds a scan without touching live scanners.
pub fn read_scan_export(path: &Path) -> Result<ScanExport> {
    let raw = fs::read_to_string(path).with_context(|| format!("read scan export failed: {}", path.display()))?;
    let export: ScanExport = serde_json::from_str(&raw)
        .map_err(|e| MalformedInput::new("scan export", e.to_string()))
        .with_context(|| format!("load scan export {}", path.display()))?;
    export
        .validate()
        .with_context(|| format!("load scan export {}", path.display()))?;
    Ok(export)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pkc_schemas::{InstallStatus, ScannedPackage, Source};

    #[test]
    fn export_survives_disk_and_rebuilds_working_set() {
        let dir = std::env::temp_dir().join(format!("pkc_scan_{}", uuid::Uuid::new_v4()));
        let path = dir.join("last-scan.json");
        let export = ScanExport::new(
            Utc::now(),
            Some("pop-desk".into()),
            vec![Source::Apt],
            vec![ScannedPackage::new(Source::Apt, "vim", "9.1", InstallStatus::Manual)],
        );
        write_scan_export(&path, &export).unwrap();

        let back = read_scan_export(&path).unwrap();
        assert_eq!(back, export);
        assert_eq!(back.working_set(), export.working_set());
    }

    #[test]
    fn duplicate_keys_are_refused_before_writing() {
        let dir = std::env::temp_dir().join(format!("pkc_scan_{}", uuid::Uuid::new_v4()));
        let path = dir.join("dup.json");
        let pkg = ScannedPackage::new(Source::Apt, "libc6", "2.39", InstallStatus::Manual);
        let export = ScanExport::new(Utc::now(), None, vec![Source::Apt], vec![pkg.clone(), pkg]);

        let err = write_scan_export(&path, &export).unwrap_err();
        assert!(err.downcast_ref::<MalformedInput>().is_some());
        assert!(!path.exists());
    }

    #[test]
    fn bad_json_is_malformed_input() {
        let dir = std::env::temp_dir().join(format!("pkc_scan_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        fs::write(&path, "{\"packages\": 3}").unwrap();

        let err = read_scan_export(&path).unwrap_err();
        assert!(err.downcast_ref::<MalformedInput>().is_some());
    }
}
