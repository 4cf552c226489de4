use pkc_schemas::{PackageKey, Source};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Three-way classification of a scan against a manifest.
///
/// Invariant: the three sequences are sorted by key and pairwise disjoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Observed but not declared. Surfaced for a human; never acted on.
    pub new: Vec<PackageKey>,
    /// Declared `keep` but not observed.
    pub missing: Vec<PackageKey>,
    /// Declared `remove` but still observed.
    pub extra: Vec<PackageKey>,
}

impl DiffResult {
    /// Nothing to do: no missing and no extra packages. `new` does not count.
    pub fn is_in_sync(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }

    pub fn total(&self) -> usize {
        self.new.len() + self.missing.len() + self.extra.len()
    }

    pub fn category_of(&self, key: &PackageKey) -> Option<DiffCategory> {
        if self.new.binary_search(key).is_ok() {
            Some(DiffCategory::New)
        } else if self.missing.binary_search(key).is_ok() {
            Some(DiffCategory::Missing)
        } else if self.extra.binary_search(key).is_ok() {
            Some(DiffCategory::Extra)
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffCategory {
    New,
    Missing,
    Extra,
}

/// Filters applied by [`crate::diff_inventory`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffOptions {
    /// Restrict every category to these sources. `None` keeps all.
    pub sources: Option<BTreeSet<Source>>,
    /// Auto-installed packages are not surfaced as `new`.
    pub manual_only_new: bool,
    /// Protected packages are not surfaced as `new`.
    pub hide_protected_new: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            sources: None,
            manual_only_new: true,
            hide_protected_new: true,
        }
    }
}

impl DiffOptions {
    /// No filtering at all: `diff_inventory` then equals `compute_diff`.
    pub fn unfiltered() -> Self {
        Self {
            sources: None,
            manual_only_new: false,
            hide_protected_new: false,
        }
    }

    pub fn includes(&self, source: Source) -> bool {
        self.sources.as_ref().map_or(true, |s| s.contains(&source))
    }
}
