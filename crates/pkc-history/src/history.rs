use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use pkc_schemas::PackageKey;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::{HistoryEntry, HistoryKind, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
    #[default]
    NewestFirst,
    Chronological,
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub since: Option<DateTime<Utc>>,
    pub kind: Option<HistoryKind>,
    pub order: ListOrder,
}

/// `2024-05-01T12:00:00Z` or a bare date (midnight UTC).
pub fn parse_since(raw: &str) -> Result<DateTime<Utc>> {
    let s = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = d.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    bail!("MALFORMED since: '{s}' is neither RFC3339 nor YYYY-MM-DD")
}

/// Typed view over a [`RecordStore`] of JSON entries.
#[derive(Debug)]
pub struct History<S> {
    store: S,
}

impl<S: RecordStore> History<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn record(&mut self, entry: &HistoryEntry) -> Result<()> {
        entry.validate()?;
        let line = serde_json::to_string(entry).context("serialize history entry")?;
        self.store.append(&line)
    }

    /// Every readable entry in append order. Corrupt lines are skipped.
    pub fn entries(&self) -> Result<Vec<HistoryEntry>> {
        let batch = self.store.read_from(0)?;
        let mut out = Vec::with_capacity(batch.records.len());
        for (i, line) in batch.records.iter().enumerate() {
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(e) => out.push(e),
                Err(err) => warn!(record = i, error = %err, "skipping unreadable history entry"),
            }
        }
        Ok(out)
    }

    pub fn list(&self, query: &ListQuery) -> Result<Vec<HistoryEntry>> {
        let mut entries: Vec<HistoryEntry> = self
            .entries()?
            .into_iter()
            .filter(|e| query.since.map_or(true, |t| e.timestamp >= t))
            .filter(|e| query.kind.map_or(true, |k| e.action_kind == k))
            .collect();
        // Appends are chronological; reversal keeps ties in a stable order.
        if query.order == ListOrder::NewestFirst {
            entries.reverse();
        }
        if let Some(n) = query.limit {
            entries.truncate(n);
        }
        Ok(entries)
    }

    pub fn find(&self, id: &str) -> Result<Option<HistoryEntry>> {
        Ok(self.entries()?.into_iter().find(|e| e.id == id))
    }

    /// Ids already fully compensated by a later undo entry.
    pub fn reversed_ids(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .entries()?
            .iter()
            .filter_map(|e| e.reverses().map(str::to_string))
            .collect())
    }

    /// Entries an undo may select, newest first: original actions not yet
    /// reversed. Undo entries themselves are never candidates. Items already
    /// compensated by a partial undo are dropped from the returned entry, and
    /// an entry with nothing left is not a candidate.
    pub fn undo_candidates(&self) -> Result<Vec<HistoryEntry>> {
        let entries = self.entries()?;
        let mut reversed: BTreeSet<&str> = BTreeSet::new();
        let mut compensated: BTreeMap<&str, BTreeSet<&PackageKey>> = BTreeMap::new();
        for e in &entries {
            if let Some(id) = e.reverses() {
                reversed.insert(id);
            }
            if let Some(id) = e.partially_reverses() {
                compensated.entry(id).or_default().extend(e.items.iter());
            }
        }

        Ok(entries
            .iter()
            .rev()
            .filter(|e| !e.is_compensation() && !reversed.contains(e.id.as_str()))
            .filter_map(|e| {
                let mut remaining = e.clone();
                if let Some(done) = compensated.get(e.id.as_str()) {
                    remaining.items.retain(|k| !done.contains(k));
                }
                (!remaining.items.is_empty()).then_some(remaining)
            })
            .collect())
    }

    /// Keep the newest `max_entries` records. Returns how many were dropped.
    /// `0` disables retention.
    pub fn prune(&mut self, max_entries: usize) -> Result<usize> {
        if max_entries == 0 {
            return Ok(0);
        }
        self.store.retain_last(max_entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, META_PARTIALLY_REVERSES, META_REVERSES};
    use chrono::TimeZone;
    use pkc_schemas::{PackageKey, Source};

    fn apt(name: &str) -> PackageKey {
        PackageKey::new(Source::Apt, name)
    }

    fn at(day: u32, kind: HistoryKind, names: &[&str]) -> HistoryEntry {
        let ts = Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap();
        HistoryEntry::at(ts, kind, "apt", names.iter().map(|n| apt(n)).collect())
    }

    #[test]
    fn since_accepts_date_or_rfc3339() {
        assert_eq!(
            parse_since("2024-05-02").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_since("2024-05-02T10:30:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 2, 8, 30, 0).unwrap()
        );
        assert!(parse_since("last tuesday").unwrap_err().to_string().contains("MALFORMED"));
    }

    #[test]
    fn list_filters_orders_and_limits() {
        let mut h = History::new(MemoryStore::new());
        h.record(&at(1, HistoryKind::Install, &["a"])).unwrap();
        h.record(&at(2, HistoryKind::Remove, &["b"])).unwrap();
        h.record(&at(3, HistoryKind::Install, &["c"])).unwrap();

        let newest = h.list(&ListQuery { limit: Some(2), ..Default::default() }).unwrap();
        assert_eq!(newest[0].items, vec![apt("c")]);
        assert_eq!(newest[1].items, vec![apt("b")]);

        let since = h
            .list(&ListQuery {
                since: Some(parse_since("2024-05-02").unwrap()),
                order: ListOrder::Chronological,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].items, vec![apt("b")]);

        let installs = h
            .list(&ListQuery { kind: Some(HistoryKind::Install), ..Default::default() })
            .unwrap();
        assert_eq!(installs.len(), 2);
    }

    #[test]
    fn invalid_entry_is_rejected_before_write() {
        let mut h = History::new(MemoryStore::new());
        assert!(h.record(&at(1, HistoryKind::Install, &[])).is_err());
        assert!(h.store().contents().is_empty());
    }

    #[test]
    fn reversed_entries_and_undo_entries_are_not_candidates() {
        let mut h = History::new(MemoryStore::new());
        let first = at(1, HistoryKind::Install, &["a"]);
        let second = at(2, HistoryKind::Install, &["b"]);
        h.record(&first).unwrap();
        h.record(&second).unwrap();
        let undo = at(3, HistoryKind::Remove, &["b"])
            .with_metadata(META_REVERSES, second.id.clone())
            .irreversible();
        h.record(&undo).unwrap();

        let candidates = h.undo_candidates().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, first.id);
        assert!(h.reversed_ids().unwrap().contains(&second.id));
    }

    #[test]
    fn partial_undo_narrows_remaining_items() {
        let mut h = History::new(MemoryStore::new());
        let batch = at(1, HistoryKind::Install, &["x", "y", "z"]);
        h.record(&batch).unwrap();
        h.record(
            &at(2, HistoryKind::Remove, &["x"])
                .with_metadata(META_PARTIALLY_REVERSES, batch.id.clone())
                .irreversible(),
        )
        .unwrap();
        h.record(
            &at(3, HistoryKind::Remove, &["z"])
                .with_metadata(META_PARTIALLY_REVERSES, batch.id.clone())
                .irreversible(),
        )
        .unwrap();

        let candidates = h.undo_candidates().unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, batch.id);
        assert_eq!(candidates[0].items, vec![apt("y")]);

        // Stored record is untouched.
        assert_eq!(h.entries().unwrap()[0].items.len(), 3);
    }

    #[test]
    fn path_items_from_a_filesystem_cleanup_log_are_skipped() {
        let mut store = MemoryStore::new();
        store.push_raw(concat!(
            r#"{"id":"aaaaaaaaaaaa","timestamp":"2024-05-01T12:00:00Z","action_kind":"fs_delete","items":["/home/u/.cache/gone"],"source":"filesystem","reversible":false}"#,
            "\n",
        ));
        let mut h = History::new(store);
        h.record(&at(2, HistoryKind::Install, &["a"])).unwrap();

        let entries = h.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].items, vec![apt("a")]);
        assert_eq!(h.undo_candidates().unwrap().len(), 1);
    }

    #[test]
    fn prune_keeps_newest() {
        let mut h = History::new(MemoryStore::new());
        for d in 1..=5 {
            h.record(&at(d, HistoryKind::Install, &["x"])).unwrap();
        }
        assert_eq!(h.prune(0).unwrap(), 0);
        assert_eq!(h.prune(2).unwrap(), 3);
        let left = h.list(&ListQuery { order: ListOrder::Chronological, ..Default::default() }).unwrap();
        assert_eq!(left.len(), 2);
        assert_eq!(left[0].timestamp.format("%d").to_string(), "04");
    }
}
