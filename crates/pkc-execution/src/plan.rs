use pkc_reconcile::{check_removal_gate, DiffResult, ProtectedMatcher, RemovalGate};
use pkc_schemas::{Action, ActionKind, Source};
use serde::Serialize;

pub const REASON_MISSING: &str = "declared keep, not installed";
pub const REASON_EXTRA: &str = "declared remove, still installed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanOptions {
    /// Removals also discard configuration, where the source supports it.
    pub purge: bool,
}

/// A removal dropped by protection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAction {
    pub action: Action,
    pub pattern: String,
}

impl SkippedAction {
    pub fn reason(&self) -> String {
        format!("protected: {}", self.pattern)
    }
}

/// Actions in execution order plus everything protection filtered out.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ActionPlan {
    pub actions: Vec<Action>,
    pub skipped: Vec<SkippedAction>,
}

/// Actions for one `(source, kind)`, handled by one source invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionBatch {
    pub source: Source,
    pub kind: ActionKind,
    pub actions: Vec<Action>,
}

impl ActionBatch {
    pub fn names(&self) -> Vec<String> {
        self.actions.iter().map(|a| a.package.clone()).collect()
    }
}

/// `missing` -> install, `extra` -> remove (or purge). `new` never plans anything.
pub fn plan_actions(diff: &DiffResult, protected: &ProtectedMatcher, options: &PlanOptions) -> ActionPlan {
    let installs = diff
        .missing
        .iter()
        .map(|k| Action::new(ActionKind::Install, k).with_reason(REASON_MISSING));

    let removals = diff.extra.iter().map(|k| {
        let kind = if options.purge && k.source.supports_purge() {
            ActionKind::Purge
        } else {
            ActionKind::Remove
        };
        Action::new(kind, k).with_reason(REASON_EXTRA)
    });

    ActionPlan::from_actions(installs.chain(removals), protected)
}

impl ActionPlan {
    /// Gate every candidate, then order installs before removals (stable
    /// within each group).
    pub fn from_actions<I>(candidates: I, protected: &ProtectedMatcher) -> Self
    where
        I: IntoIterator<Item = Action>,
    {
        let mut installs = Vec::new();
        let mut removals = Vec::new();
        let mut skipped = Vec::new();

        for action in candidates {
            match check_removal_gate(protected, action.kind, &action.key()) {
                RemovalGate::Vetoed { pattern } => skipped.push(SkippedAction { action, pattern }),
                RemovalGate::Permitted if action.kind.is_removal() => removals.push(action),
                RemovalGate::Permitted => installs.push(action),
            }
        }

        installs.extend(removals);
        ActionPlan {
            actions: installs,
            skipped,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }

    /// Group by `(source, kind)` in first-appearance order, so batch order
    /// follows action order and installs still precede removals.
    pub fn batches(&self) -> Vec<ActionBatch> {
        let mut out: Vec<ActionBatch> = Vec::new();
        for a in &self.actions {
            match out.iter_mut().find(|b| b.source == a.source && b.kind == a.kind) {
                Some(b) => b.actions.push(a.clone()),
                None => out.push(ActionBatch {
                    source: a.source,
                    kind: a.kind,
                    actions: vec![a.clone()],
                }),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkc_schemas::PackageKey;

    fn k(source: Source, name: &str) -> PackageKey {
        PackageKey::new(source, name)
    }

    #[test]
    fn installs_precede_removals_and_new_is_ignored() {
        let diff = DiffResult {
            new: vec![k(Source::Apt, "htop")],
            missing: vec![k(Source::Apt, "vim"), k(Source::Flatpak, "org.a.A")],
            extra: vec![k(Source::Apt, "nano")],
        };
        let plan = plan_actions(&diff, &ProtectedMatcher::empty(), &PlanOptions::default());

        let kinds: Vec<_> = plan.actions.iter().map(|a| (a.kind, a.package.as_str())).collect();
        assert_eq!(
            kinds,
            vec![
                (ActionKind::Install, "vim"),
                (ActionKind::Install, "org.a.A"),
                (ActionKind::Remove, "nano"),
            ]
        );
        assert!(plan.actions.iter().all(|a| a.package != "htop"));
    }

    #[test]
    fn purge_applies_only_where_supported() {
        let diff = DiffResult {
            extra: vec![k(Source::Apt, "nano"), k(Source::Flatpak, "org.b.B")],
            ..DiffResult::default()
        };
        let plan = plan_actions(&diff, &ProtectedMatcher::empty(), &PlanOptions { purge: true });
        assert_eq!(plan.actions[0].kind, ActionKind::Purge);
        assert_eq!(plan.actions[1].kind, ActionKind::Remove);
    }

    #[test]
    fn batches_group_by_source_and_kind() {
        let diff = DiffResult {
            missing: vec![k(Source::Apt, "a"), k(Source::Apt, "b"), k(Source::Flatpak, "c")],
            extra: vec![k(Source::Apt, "d")],
            ..DiffResult::default()
        };
        let batches = plan_actions(&diff, &ProtectedMatcher::empty(), &PlanOptions::default()).batches();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!((batches[1].source, batches[1].kind), (Source::Flatpak, ActionKind::Install));
        assert_eq!(batches[2].kind, ActionKind::Remove);
    }

    #[test]
    fn skipped_reason_names_the_pattern() {
        let diff = DiffResult {
            extra: vec![k(Source::Apt, "telnet")],
            ..DiffResult::default()
        };
        let plan = plan_actions(&diff, &ProtectedMatcher::new(["tel*"]), &PlanOptions::default());
        assert!(plan.is_empty());
        assert_eq!(plan.skipped[0].reason(), "protected: tel*");
    }
}
