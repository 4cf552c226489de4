//! A source without tooling is left out of the scan; it is not an error.

use pkc_runtime::ApplyRequest;
use pkc_schemas::{Manifest, ManifestEntry, PackageKey, Source};
use pkc_testkit::{config_with_patterns, engine, FakeSource};

#[test]
fn unavailable_source_is_skipped_not_failed() {
    let apt = FakeSource::new(Source::Apt).with_manual(&["vim"]);
    let flatpak = FakeSource::new(Source::Flatpak).with_manual(&["org.gimp.GIMP"]).unavailable();
    let eng = engine(config_with_patterns(&[]), vec![apt, flatpak.clone()]);

    let scan = eng.scan().unwrap();
    assert_eq!(scan.scanned_sources, vec![Source::Apt]);
    assert_eq!(scan.skipped_unavailable, vec![Source::Flatpak]);
    assert_eq!(scan.packages.len(), 1);
    assert!(flatpak.calls().is_empty(), "unavailable source is never scanned");
}

#[test]
fn disabled_source_is_neither_scanned_nor_reported() {
    let mut cfg = config_with_patterns(&[]);
    cfg.apply.sources = vec![Source::Apt];
    let flatpak = FakeSource::new(Source::Flatpak).with_manual(&["org.gimp.GIMP"]);
    let eng = engine(cfg, vec![FakeSource::new(Source::Apt), flatpak.clone()]);

    let scan = eng.scan().unwrap();
    assert_eq!(scan.scanned_sources, vec![Source::Apt]);
    assert!(scan.skipped_unavailable.is_empty());
    assert!(flatpak.calls().is_empty());
}

#[test]
fn scan_failure_of_an_available_source_is_an_error() {
    let broken = FakeSource::new(Source::Apt).scan_fails("dpkg database locked");
    let eng = engine(config_with_patterns(&[]), vec![broken]);
    let err = eng.scan().unwrap_err();
    assert!(format!("{err:#}").contains("dpkg database locked"));
}

#[test]
fn install_through_unavailable_source_fails_per_action() {
    let flatpak = FakeSource::new(Source::Flatpak).unavailable();
    let mut eng = engine(config_with_patterns(&[]), vec![flatpak.clone()]);
    let mut manifest = Manifest::new();
    manifest.insert(PackageKey::new(Source::Flatpak, "org.gimp.GIMP"), ManifestEntry::keep());

    let out = eng
        .apply(&manifest, &[], &ApplyRequest { confirmed: true, ..Default::default() })
        .unwrap();
    assert!(out.run.all_failed());
    assert_eq!(
        out.run.report.results[0].error.as_deref(),
        Some("source unavailable: flatpak")
    );
    assert!(out.run.recorded.is_empty());
    assert!(flatpak.mutation_calls().is_empty());
}
