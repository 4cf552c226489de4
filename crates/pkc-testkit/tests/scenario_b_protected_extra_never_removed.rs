//! Scenario B: manifest says remove telnet, `tel*` is protected.
//! The diff still reports telnet as extra, the plan drops it, and no
//! mutating call reaches the source.

use pkc_reconcile::ProtectionViolation;
use pkc_runtime::{ApplyRequest, RemoveRequest};
use pkc_schemas::Source;
use pkc_testkit::{apt, apt_manifest, config_with_patterns, engine, FakeSource};

#[test]
fn protected_extra_is_skipped_with_reason() {
    let host = FakeSource::new(Source::Apt).with_manual(&["telnet"]);
    let mut eng = engine(config_with_patterns(&["tel*"]), vec![host.clone()]);
    let manifest = apt_manifest(&[], &["telnet"]);
    let scan = eng.scan().unwrap();

    let out = eng
        .apply(&manifest, &scan.packages, &ApplyRequest { confirmed: true, ..Default::default() })
        .unwrap();
    assert_eq!(out.diff.extra, vec![apt("telnet")]);
    assert!(out.run.report.planned.is_empty());
    assert_eq!(out.run.report.skipped.len(), 1);
    assert_eq!(out.run.report.skipped[0].reason(), "protected: tel*");

    assert!(host.mutation_calls().is_empty());
    assert!(host.is_installed("telnet"));
    assert!(eng.history().entries().unwrap().is_empty());
}

#[test]
fn forced_removal_of_protected_name_is_refused() {
    let host = FakeSource::new(Source::Apt).with_manual(&["telnet", "nano"]);
    let mut eng = engine(config_with_patterns(&["tel*"]), vec![host.clone()]);

    let err = eng
        .remove_packages(&RemoveRequest {
            keys: vec![apt("nano"), apt("telnet")],
            confirmed: true,
            ..Default::default()
        })
        .unwrap_err();
    let violation = err.downcast_ref::<ProtectionViolation>().expect("protection violation");
    assert_eq!(violation.pattern, "tel*");
    assert!(err.to_string().contains("tel*"));

    // The whole request is refused, including the unprotected name.
    assert!(host.mutation_calls().is_empty());
    assert!(host.is_installed("nano"));
}

#[test]
fn forced_removal_of_unprotected_name_runs_and_records() {
    let host = FakeSource::new(Source::Apt).with_manual(&["nano"]);
    let mut eng = engine(config_with_patterns(&["tel*"]), vec![host.clone()]);

    let out = eng
        .remove_packages(&RemoveRequest {
            keys: vec![apt("nano")],
            confirmed: true,
            ..Default::default()
        })
        .unwrap();
    assert!(!host.is_installed("nano"));
    assert_eq!(out.recorded.len(), 1);
    assert!(out.recorded[0].reversible);
}
