use pkc_advisor::*;
use pkc_reconcile::ProtectedMatcher;
use pkc_schemas::{Manifest, ManifestEntry, ManifestStatus, PackageKey, Source};
use proptest::prelude::*;

fn arb_decision() -> impl Strategy<Value = Decision> {
    (
        "[a-d][a-z]{0,3}",
        prop_oneof![
            Just(Classification::Keep),
            Just(Classification::Remove),
            Just(Classification::Ask)
        ],
        0.0f64..=1.0,
    )
        .prop_map(|(name, classification, confidence)| Decision {
            key: PackageKey::new(Source::Apt, name),
            classification,
            confidence,
            reason: String::from("r"),
            category: None,
        })
}

fn arb_manifest() -> impl Strategy<Value = Manifest> {
    prop::collection::vec(("[a-d][a-z]{0,3}", any::<bool>()), 0..10).prop_map(|v| {
        let mut m = Manifest::new();
        for (name, keep) in v {
            let e = if keep { ManifestEntry::keep() } else { ManifestEntry::remove() };
            m.insert(PackageKey::new(Source::Apt, name), e);
        }
        m
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_merge_is_idempotent(
        manifest in arb_manifest(),
        decisions in prop::collection::vec(arb_decision(), 0..20),
        threshold in 0.0f64..=1.0,
    ) {
        let batch = DecisionBatch { decisions };
        let protected = ProtectedMatcher::new(["a*"]);
        let policy = MergePolicy { min_confidence: threshold };

        let once = merge_decisions(&manifest, &batch, &protected, &policy);
        let twice = merge_decisions(&once.manifest, &batch, &protected, &policy);
        prop_assert_eq!(once.manifest, twice.manifest);
    }

    #[test]
    fn prop_merge_never_adds_protected_remove(
        decisions in prop::collection::vec(arb_decision(), 0..20),
    ) {
        let batch = DecisionBatch { decisions };
        let protected = ProtectedMatcher::new(["a*", "b*"]);
        let out = merge_decisions(&Manifest::new(), &batch, &protected, &MergePolicy::default());

        for key in out.manifest.keys_with_status(ManifestStatus::Remove) {
            prop_assert!(!protected.is_protected(&key.name));
        }
    }
}
