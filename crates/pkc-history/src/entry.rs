use chrono::{DateTime, Utc};
use pkc_schemas::{ActionKind, MalformedInput, PackageKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Metadata key on an undo entry naming the entry it fully reversed.
pub const META_REVERSES: &str = "reverses";
/// Metadata key on an undo entry that stopped on a failure.
pub const META_PARTIALLY_REVERSES: &str = "partially_reverses";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    Install,
    Remove,
    Purge,
    AdvisorApply,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Install => "install",
            HistoryKind::Remove => "remove",
            HistoryKind::Purge => "purge",
            HistoryKind::AdvisorApply => "advisor_apply",
        }
    }

    /// Purge discards configuration and an advisor merge changes no package,
    /// so neither has a compensating package action.
    pub fn is_reversible(&self) -> bool {
        matches!(self, HistoryKind::Install | HistoryKind::Remove)
    }

    /// The package action that undoes this one.
    pub fn compensation(&self) -> Option<ActionKind> {
        match self {
            HistoryKind::Install => Some(ActionKind::Remove),
            HistoryKind::Remove => Some(ActionKind::Install),
            HistoryKind::Purge | HistoryKind::AdvisorApply => None,
        }
    }
}

impl From<ActionKind> for HistoryKind {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Install => HistoryKind::Install,
            ActionKind::Remove => HistoryKind::Remove,
            ActionKind::Purge => HistoryKind::Purge,
        }
    }
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed batch. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action_kind: HistoryKind,
    pub items: Vec<PackageKey>,
    /// Ecosystem or subsystem that produced the batch (`apt`, `flatpak`, `advisor`).
    pub source: String,
    pub reversible: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl HistoryEntry {
    pub fn new(action_kind: HistoryKind, source: impl Into<String>, items: Vec<PackageKey>) -> Self {
        Self::at(Utc::now(), action_kind, source, items)
    }

    pub fn at(
        timestamp: DateTime<Utc>,
        action_kind: HistoryKind,
        source: impl Into<String>,
        items: Vec<PackageKey>,
    ) -> Self {
        Self {
            id: new_entry_id(),
            timestamp,
            action_kind,
            items,
            source: source.into(),
            reversible: action_kind.is_reversible(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Compensation entries are themselves never reversible.
    pub fn irreversible(mut self) -> Self {
        self.reversible = false;
        self
    }

    fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Id of the entry this one fully reversed.
    pub fn reverses(&self) -> Option<&str> {
        self.meta_str(META_REVERSES)
    }

    /// Id of the entry this one reversed only in part.
    pub fn partially_reverses(&self) -> Option<&str> {
        self.meta_str(META_PARTIALLY_REVERSES)
    }

    pub fn is_compensation(&self) -> bool {
        self.reverses().is_some() || self.partially_reverses().is_some()
    }

    pub fn validate(&self) -> Result<(), MalformedInput> {
        if self.id.is_empty() {
            return Err(MalformedInput::new("history entry", "empty id"));
        }
        if self.items.is_empty() {
            return Err(MalformedInput::new(
                "history entry",
                format!("{} {} has no items", self.action_kind, self.id),
            ));
        }
        if self.reversible && !self.action_kind.is_reversible() {
            return Err(MalformedInput::new(
                "history entry",
                format!("{} entries cannot be reversible", self.action_kind),
            ));
        }
        Ok(())
    }
}

/// 12 hex chars: short enough to type into `undo`, unique enough for one host.
fn new_entry_id() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkc_schemas::Source;

    #[test]
    fn purge_entries_are_not_reversible() {
        let e = HistoryEntry::new(HistoryKind::Purge, "apt", vec![PackageKey::new(Source::Apt, "nano")]);
        assert!(!e.reversible);
        assert_eq!(e.action_kind.compensation(), None);
        assert_eq!(e.id.len(), 12);
    }

    #[test]
    fn empty_items_fail_validation() {
        let e = HistoryEntry::new(HistoryKind::Install, "apt", vec![]);
        assert!(e.validate().unwrap_err().detail.contains("has no items"));
    }

    #[test]
    fn compensation_marker_round_trips_through_json() {
        let e = HistoryEntry::new(HistoryKind::Remove, "apt", vec![PackageKey::new(Source::Apt, "vim")])
            .with_metadata(META_REVERSES, "abcdef012345")
            .irreversible();
        let back: HistoryEntry = serde_json::from_str(&serde_json::to_string(&e).unwrap()).unwrap();
        assert_eq!(back.reverses(), Some("abcdef012345"));
        assert!(back.is_compensation());
        assert!(!back.reversible);
    }
}
