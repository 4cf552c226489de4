use pkc_reconcile::ProtectedMatcher;
use pkc_schemas::{Manifest, ManifestEntry, ManifestStatus, PackageKey};
use serde::Serialize;

use crate::{Classification, Decision, DecisionBatch};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MergePolicy {
    /// keep/remove decisions below this go to review instead of the manifest.
    pub min_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewCause {
    /// The advisor itself asked for a human decision.
    Ask,
    /// keep/remove below the configured confidence threshold.
    LowConfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    pub key: PackageKey,
    pub suggested: Classification,
    pub confidence: f64,
    pub reason: String,
    pub cause: ReviewCause,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscardedDecision {
    pub key: PackageKey,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The merged manifest. The input manifest is never touched.
    pub manifest: Manifest,
    /// Keys whose entry was created or changed, sorted.
    pub written: Vec<PackageKey>,
    pub needs_review: Vec<ReviewItem>,
    /// `remove` decisions vetoed by protection.
    pub discarded_protected: Vec<DiscardedDecision>,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        !self.written.is_empty()
    }
}

pub fn merge_decisions(
    manifest: &Manifest,
    batch: &DecisionBatch,
    protected: &ProtectedMatcher,
    policy: &MergePolicy,
) -> MergeOutcome {
    let mut merged = manifest.clone();
    let mut written: Vec<PackageKey> = Vec::new();
    let mut needs_review = Vec::new();
    let mut discarded_protected = Vec::new();

    for d in &batch.decisions {
        let status = match d.classification {
            Classification::Ask => {
                needs_review.push(review(d, ReviewCause::Ask));
                continue;
            }
            Classification::Keep => ManifestStatus::Keep,
            Classification::Remove => ManifestStatus::Remove,
        };

        if status == ManifestStatus::Remove {
            if let Some(pattern) = protected.matching_pattern(&d.key.name) {
                discarded_protected.push(DiscardedDecision {
                    key: d.key.clone(),
                    pattern: pattern.to_string(),
                });
                continue;
            }
        }

        if d.confidence < policy.min_confidence {
            needs_review.push(review(d, ReviewCause::LowConfidence));
            continue;
        }

        let entry = ManifestEntry {
            status,
            reason: Some(d.reason.clone()).filter(|r| !r.is_empty()),
            confidence: Some(d.confidence),
        };
        merged.insert(d.key.clone(), entry);
    }

    // Compare against the input so a key rewritten twice to its old value is not reported.
    for (key, entry) in merged.entries() {
        if manifest.get(key) != Some(entry) {
            written.push(key.clone());
        }
    }

    MergeOutcome {
        manifest: merged,
        written,
        needs_review,
        discarded_protected,
    }
}

fn review(d: &Decision, cause: ReviewCause) -> ReviewItem {
    ReviewItem {
        key: d.key.clone(),
        suggested: d.classification,
        confidence: d.confidence,
        reason: d.reason.clone(),
        cause,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkc_schemas::Source;

    fn decision(name: &str, c: Classification, confidence: f64) -> Decision {
        Decision {
            key: PackageKey::new(Source::Apt, name),
            classification: c,
            confidence,
            reason: format!("{c} {name}"),
            category: None,
        }
    }

    #[test]
    fn later_decision_for_same_key_wins() {
        let batch = DecisionBatch {
            decisions: vec![
                decision("vim", Classification::Remove, 0.6),
                decision("vim", Classification::Keep, 0.9),
            ],
        };
        let out = merge_decisions(&Manifest::new(), &batch, &ProtectedMatcher::empty(), &MergePolicy::default());
        let e = out.manifest.get(&PackageKey::new(Source::Apt, "vim")).unwrap();
        assert_eq!(e.status, ManifestStatus::Keep);
        assert_eq!(out.written.len(), 1);
    }

    #[test]
    fn low_confidence_goes_to_review() {
        let batch = DecisionBatch {
            decisions: vec![decision("gimp", Classification::Remove, 0.3)],
        };
        let policy = MergePolicy { min_confidence: 0.5 };
        let out = merge_decisions(&Manifest::new(), &batch, &ProtectedMatcher::empty(), &policy);
        assert!(out.manifest.is_empty());
        assert_eq!(out.needs_review[0].cause, ReviewCause::LowConfidence);
        assert_eq!(out.needs_review[0].suggested, Classification::Remove);
    }

    #[test]
    fn protected_keep_passes_through() {
        let batch = DecisionBatch {
            decisions: vec![
                decision("systemd", Classification::Keep, 0.99),
                decision("systemd-timesyncd", Classification::Remove, 0.99),
            ],
        };
        let out = merge_decisions(&Manifest::new(), &batch, &ProtectedMatcher::baseline(), &MergePolicy::default());
        assert_eq!(out.manifest.len(), 1);
        assert_eq!(out.discarded_protected.len(), 1);
        assert_eq!(out.discarded_protected[0].pattern, "systemd*");
    }

    #[test]
    fn input_manifest_is_untouched() {
        let mut m = Manifest::new();
        m.insert(PackageKey::new(Source::Apt, "vim"), ManifestEntry::keep());
        let before = m.clone();
        let batch = DecisionBatch {
            decisions: vec![decision("vim", Classification::Remove, 0.9)],
        };
        let out = merge_decisions(&m, &batch, &ProtectedMatcher::empty(), &MergePolicy::default());
        assert_eq!(m, before);
        assert_ne!(out.manifest, before);
    }
}
