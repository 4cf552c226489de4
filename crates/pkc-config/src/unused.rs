use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// JSON pointers read by [`crate::EngineConfig::from_json`]. Everything
/// beneath one of these belongs to that field.
///
/// Keep this list in lockstep with the typed config structs.
const CONSUMED: &[&str] = &[
    "/paths/manifest",
    "/paths/history",
    "/paths/scan_export",
    "/protected/use_baseline",
    "/protected/patterns",
    "/apply/purge",
    "/apply/privilege_command",
    "/apply/sources",
    "/diff/manual_only",
    "/diff/hide_protected_new",
    "/advisor/min_confidence",
    "/history/max_entries",
    "/subprocess/timeout_secs",
];

/// How many pointers a `Fail` error names before truncating.
const ERROR_PREVIEW: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Leaf pointers no field reads, sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

pub fn consumed_pointers() -> &'static [&'static str] {
    CONSUMED
}

/// With `Fail`, unused keys are an error; with `Warn` the report is always returned.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let report = UnusedKeyReport {
        unused_leaf_pointers: unconsumed_leaves(config_json).into_iter().collect(),
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let total = report.unused_leaf_pointers.len();
        let mut named = report
            .unused_leaf_pointers
            .iter()
            .take(ERROR_PREVIEW)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if total > ERROR_PREVIEW {
            named.push_str(&format!(", and {} more", total - ERROR_PREVIEW));
        }
        bail!("CONFIG_UNUSED_KEYS: {total} config key(s) are never read (misspelled or obsolete?): {named}");
    }

    Ok(report)
}

/// Walks the tree and stops descending at any consumed pointer, so a
/// list or table under a consumed key never shows up.
fn unconsumed_leaves(root: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut pending: Vec<(String, &Value)> = vec![(String::new(), root)];

    while let Some((pointer, node)) = pending.pop() {
        if CONSUMED.contains(&pointer.as_str()) {
            continue;
        }
        match node {
            Value::Object(map) => {
                pending.extend(map.iter().map(|(key, child)| (child_pointer(&pointer, key), child)));
            }
            Value::Array(items) => {
                pending.extend(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, child)| (child_pointer(&pointer, &i.to_string()), child)),
                );
            }
            _ if pointer.is_empty() => {
                found.insert("/".to_string());
            }
            _ => {
                found.insert(pointer);
            }
        }
    }
    found
}

/// RFC 6901: `~` becomes `~0` and `/` becomes `~1`.
fn child_pointer(parent: &str, key: &str) -> String {
    let mut out = String::with_capacity(parent.len() + key.len() + 1);
    out.push_str(parent);
    out.push('/');
    for c in key.chars() {
        match c {
            '~' => out.push_str("~0"),
            '/' => out.push_str("~1"),
            c => out.push(c),
        }
    }
    out
}
