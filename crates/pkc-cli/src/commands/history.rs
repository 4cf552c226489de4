use anyhow::{bail, Result};
use pkc_history::{parse_since, HistoryEntry, ListOrder, ListQuery};
use pkc_runtime::{UndoRequest, UndoScope};

use super::{print_json, print_result, Session};
use crate::GlobalArgs;

pub fn list(g: &GlobalArgs, limit: Option<usize>, since: Option<&str>, chronological: bool, json: bool) -> Result<()> {
    let session = Session::load(g)?;
    let engine = session.engine();
    let query = ListQuery {
        limit,
        since: since.map(parse_since).transpose()?,
        kind: None,
        order: if chronological {
            ListOrder::Chronological
        } else {
            ListOrder::NewestFirst
        },
    };
    let entries = engine.list_history(&query)?;

    if json {
        return print_json(&serde_json::to_value(&entries)?);
    }
    for e in &entries {
        print_entry(e);
    }
    println!("entries={}", entries.len());
    Ok(())
}

fn print_entry(e: &HistoryEntry) {
    let items: Vec<String> = e.items.iter().map(|k| k.to_string()).collect();
    println!(
        "id={} ts={} kind={} source={} items={} reversible={}",
        e.id,
        e.timestamp.to_rfc3339(),
        e.action_kind,
        e.source,
        items.join(","),
        e.reversible
    );
}

pub fn undo(g: &GlobalArgs, steps: Option<usize>, since: Option<&str>, dry_run: bool, yes: bool) -> Result<()> {
    let session = Session::load(g)?;
    let mut engine = session.engine();
    let scope = match since {
        Some(raw) => UndoScope::Since(parse_since(raw)?),
        None => UndoScope::Steps(steps.unwrap_or(1)),
    };
    let outcome = engine.undo(&UndoRequest {
        scope,
        dry_run,
        confirmed: yes,
    })?;

    println!("mode={}", if dry_run { "dry_run" } else { "live" });
    for e in &outcome.selected {
        println!("selected={} kind={} items={}", e.id, e.action_kind, e.items.len());
    }
    for a in &outcome.planned {
        println!("action={} package={}", a.kind, a.key());
    }
    for r in &outcome.results {
        print_result(r);
    }
    for e in &outcome.recorded {
        println!("recorded={} kind={}", e.id, e.action_kind);
    }
    if let Some(id) = &outcome.stopped_at {
        println!("stopped_at={id}");
    }
    if outcome.all_failed() {
        bail!("ALL_ACTIONS_FAILED: undo attempted {} action(s), none succeeded", outcome.results.len());
    }
    Ok(())
}
