use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{MalformedInput, PackageKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestStatus {
    Keep,
    Remove,
}

impl ManifestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestStatus::Keep => "keep",
            ManifestStatus::Remove => "remove",
        }
    }
}

impl fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared intent for one `(source, name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub status: ManifestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Only meaningful when the entry came from an advisor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ManifestEntry {
    pub fn keep() -> Self {
        Self {
            status: ManifestStatus::Keep,
            reason: None,
            confidence: None,
        }
    }

    pub fn remove() -> Self {
        Self {
            status: ManifestStatus::Remove,
            reason: None,
            confidence: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Declared desired state: at most one entry per key, plus opaque metadata
/// tables (`[meta]`, `[system]`, ...) that are carried through untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Manifest {
    pub metadata: toml::Table,
    entries: BTreeMap<PackageKey, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(metadata: toml::Table) -> Self {
        Self {
            metadata,
            entries: BTreeMap::new(),
        }
    }

    /// Insert or overwrite the entry for `key`; returns the previous one.
    pub fn insert(&mut self, key: PackageKey, entry: ManifestEntry) -> Option<ManifestEntry> {
        self.entries.insert(key, entry)
    }

    pub fn get(&self, key: &PackageKey) -> Option<&ManifestEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &PackageKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entries(&self) -> &BTreeMap<PackageKey, ManifestEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys_with_status(&self, status: ManifestStatus) -> impl Iterator<Item = &PackageKey> {
        self.entries
            .iter()
            .filter(move |(_, e)| e.status == status)
            .map(|(k, _)| k)
    }

    /// Rejects confidences outside `[0, 1]` and empty names.
    pub fn validate(&self) -> Result<(), MalformedInput> {
        for (key, entry) in &self.entries {
            if key.name.trim().is_empty() {
                return Err(MalformedInput::new(
                    "manifest",
                    format!("empty package name under source '{}'", key.source),
                ));
            }
            if let Some(c) = entry.confidence {
                if !(0.0..=1.0).contains(&c) {
                    return Err(MalformedInput::new(
                        "manifest",
                        format!("{key}: confidence {c} outside [0, 1]"),
                    ));
                }
            }
        }
        Ok(())
    }
}
