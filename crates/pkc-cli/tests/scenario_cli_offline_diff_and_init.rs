use assert_cmd::prelude::*;
use chrono::Utc;
use pkc_schemas::{InstallStatus, ScanExport, ScannedPackage, Source};
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;

/// Isolated environment: no user config, no user history.
fn pkc(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pkc").expect("pkc binary");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_STATE_HOME", home.join("state"))
        .env_remove("RUST_LOG");
    cmd
}

fn write_export(path: &Path) {
    let packages = vec![
        ScannedPackage::new(Source::Apt, "vim", "9.1", InstallStatus::Manual),
        ScannedPackage::new(Source::Apt, "foo", "1.0", InstallStatus::Manual),
        ScannedPackage::new(Source::Apt, "telnet", "0.17", InstallStatus::Manual),
        ScannedPackage::new(Source::Apt, "libfoo1", "1.0", InstallStatus::AutoInstalled),
        ScannedPackage::new(Source::Apt, "linux-image-generic", "6.8", InstallStatus::Manual),
    ];
    let export = ScanExport::new(Utc::now(), Some("testhost".into()), vec![Source::Apt], packages);
    pkc_artifacts::write_scan_export(path, &export).expect("write export");
}

const MANIFEST: &str = r#"
[meta]
version = 1

[packages.apt.vim]
status = "keep"

[packages.apt.htop]
status = "keep"
reason = "monitoring"

[packages.apt.telnet]
status = "remove"
"#;

#[test]
fn diff_from_scan_export_reports_all_three_categories() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let scan = dir.path().join("scan.json");
    let manifest = dir.path().join("manifest.toml");
    write_export(&scan);
    std::fs::write(&manifest, MANIFEST)?;

    pkc(dir.path())
        .args(["diff", "--from-scan"])
        .arg(&scan)
        .arg("--manifest")
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("new=apt:foo"))
        .stdout(predicate::str::contains("missing=apt:htop"))
        .stdout(predicate::str::contains("extra=apt:telnet"))
        // Protected and auto-installed packages are never surfaced as new.
        .stdout(predicate::str::contains("linux-image-generic").not())
        .stdout(predicate::str::contains("libfoo1").not())
        .stdout(predicate::str::contains("new_count=1 missing_count=1 extra_count=1 in_sync=false"));
    Ok(())
}

#[test]
fn apply_dry_run_from_scan_plans_without_recording() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let scan = dir.path().join("scan.json");
    let manifest = dir.path().join("manifest.toml");
    let history = dir.path().join("history.jsonl");
    write_export(&scan);
    std::fs::write(&manifest, MANIFEST)?;

    pkc(dir.path())
        .args(["apply", "--dry-run", "--from-scan"])
        .arg(&scan)
        .arg("--manifest")
        .arg(&manifest)
        .arg("--history")
        .arg(&history)
        .assert()
        .success()
        .stdout(predicate::str::contains("mode=dry_run"))
        .stdout(predicate::str::contains("action=install package=apt:htop"))
        .stdout(predicate::str::contains("action=remove package=apt:telnet"))
        .stdout(predicate::str::contains("planned=2 skipped=0"));

    assert!(!history.exists(), "dry-run must not write history");
    Ok(())
}

#[test]
fn live_apply_from_scan_export_is_refused() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let scan = dir.path().join("scan.json");
    let manifest = dir.path().join("manifest.toml");
    write_export(&scan);
    std::fs::write(&manifest, MANIFEST)?;

    pkc(dir.path())
        .args(["apply", "--yes", "--from-scan"])
        .arg(&scan)
        .arg("--manifest")
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("REFUSING apply --from-scan without --dry-run"));
    Ok(())
}

#[test]
fn init_from_scan_keeps_manual_unprotected_and_refuses_overwrite() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let scan = dir.path().join("scan.json");
    let manifest = dir.path().join("manifest.toml");
    write_export(&scan);

    pkc(dir.path())
        .args(["init", "--from-scan"])
        .arg(&scan)
        .arg("--manifest")
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("kept=3"))
        .stdout(predicate::str::contains("skipped_auto_installed=1"))
        .stdout(predicate::str::contains("skipped_protected=1"));

    let written = pkc_artifacts::load_manifest(&manifest)?;
    let names: Vec<String> = written.entries().keys().map(|k| k.name.clone()).collect();
    assert_eq!(names, vec!["foo", "telnet", "vim"]);

    pkc(dir.path())
        .args(["init", "--from-scan"])
        .arg(&scan)
        .arg("--manifest")
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("REFUSING to overwrite existing manifest"));

    pkc(dir.path())
        .args(["init", "--force", "--from-scan"])
        .arg(&scan)
        .arg("--manifest")
        .arg(&manifest)
        .assert()
        .success();
    Ok(())
}

#[test]
fn missing_manifest_is_reported() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let scan = dir.path().join("scan.json");
    write_export(&scan);

    pkc(dir.path())
        .args(["diff", "--from-scan"])
        .arg(&scan)
        .arg("--manifest")
        .arg(dir.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("MANIFEST_NOT_FOUND"));
    Ok(())
}

#[test]
fn unscanned_source_named_explicitly_yields_no_missing() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let scan = dir.path().join("scan.json");
    let manifest = dir.path().join("manifest.toml");
    write_export(&scan);
    std::fs::write(
        &manifest,
        format!("{MANIFEST}\n[packages.flatpak.\"org.gimp.GIMP\"]\nstatus = \"keep\"\n"),
    )?;

    // The export only covers apt, so flatpak entries cannot be judged.
    pkc(dir.path())
        .args(["diff", "--source", "flatpak", "--from-scan"])
        .arg(&scan)
        .arg("--manifest")
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("missing=").not())
        .stdout(predicate::str::contains("new_count=0 missing_count=0 extra_count=0 in_sync=true"));

    pkc(dir.path())
        .args(["apply", "--dry-run", "--source", "flatpak", "--from-scan"])
        .arg(&scan)
        .arg("--manifest")
        .arg(&manifest)
        .arg("--history")
        .arg(dir.path().join("history.jsonl"))
        .assert()
        .success()
        .stdout(predicate::str::contains("org.gimp.GIMP").not())
        .stdout(predicate::str::contains("planned=0 skipped=0"));
    Ok(())
}
