//! Command handlers for pkc.
//!
//! Shared wiring lives here: configuration loading, default paths, engine
//! construction and inventory loading. This is the only place that reads
//! the environment.

pub mod advisor;
pub mod apply;
pub mod history;
pub mod inventory;
pub mod sync;

use anyhow::{bail, Context, Result};
use pkc_config::{report_unused_keys, DefaultPaths, EngineConfig, LoadedConfig, ResolvedPaths, UnusedKeyPolicy};
use pkc_history::JsonlFileStore;
use pkc_runtime::Engine;
use pkc_schemas::{ActionResult, ScannedPackage, Source};
use pkc_sources::{SourceBackend, SystemRunner};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::{GlobalArgs, UnusedKeys};

pub type LiveEngine = Engine<SourceBackend<SystemRunner>, JsonlFileStore>;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session {
    pub config_hash: String,
    pub config: EngineConfig,
    pub paths: ResolvedPaths,
}

impl Session {
    pub fn load(g: &GlobalArgs) -> Result<Self> {
        let defaults = default_paths()?;

        let mut layers = g.config.clone();
        if layers.is_empty() {
            let implicit = defaults.config_dir.join("config.yaml");
            if implicit.exists() {
                layers.push(implicit);
            }
        }
        let loaded = load_config(&layers)?;

        let policy = match g.unused_keys {
            UnusedKeys::Warn => UnusedKeyPolicy::Warn,
            UnusedKeys::Fail => UnusedKeyPolicy::Fail,
        };
        let report = report_unused_keys(&loaded.config_json, policy)?;
        for p in &report.unused_leaf_pointers {
            warn!(pointer = %p, "config key is not used");
        }

        let config = loaded.engine_config()?;
        let mut paths = config.paths.resolve(&defaults);
        if let Some(m) = &g.manifest {
            paths.manifest = m.clone();
        }
        if let Some(h) = &g.history {
            paths.history = h.clone();
        }

        Ok(Self {
            config_hash: loaded.config_hash,
            config,
            paths,
        })
    }

    pub fn engine(&self) -> LiveEngine {
        let runner = SystemRunner::new(Duration::from_secs(self.config.subprocess.timeout_secs));
        let backends = SourceBackend::enabled(&self.config.apply.sources, runner, self.config.privilege_command());
        Engine::new(self.config.clone(), backends, JsonlFileStore::new(&self.paths.history))
    }
}

fn load_config(layers: &[PathBuf]) -> Result<LoadedConfig> {
    if layers.is_empty() {
        return pkc_config::load_layered_yaml_from_strings(&[]);
    }
    pkc_config::load_layered_yaml(layers)
}

/// `~/.config/pkc` and `~/.local/state/pkc` unless XDG says otherwise.
fn default_paths() -> Result<DefaultPaths> {
    let home = dirs::home_dir();
    let config = dirs::config_dir()
        .or_else(|| home.as_ref().map(|h| h.join(".config")))
        .context("cannot locate a config directory; pass --config/--manifest")?;
    let state = dirs::state_dir()
        .or_else(|| home.as_ref().map(|h| h.join(".local").join("state")))
        .context("cannot locate a state directory; pass --history")?;
    Ok(DefaultPaths::new(config.join("pkc"), state.join("pkc")))
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

pub struct Inventory {
    pub packages: Vec<ScannedPackage>,
    pub sources: Vec<Source>,
}

/// Packages from a scan export, or a live scan of the requested sources.
pub fn load_inventory(engine: &LiveEngine, from_scan: Option<&Path>, only: Option<&BTreeSet<Source>>) -> Result<Inventory> {
    if let Some(path) = from_scan {
        let export = pkc_artifacts::read_scan_export(path)?;
        let sources = export
            .sources
            .iter()
            .copied()
            .filter(|s| only.map_or(true, |o| o.contains(s)))
            .collect();
        return Ok(Inventory {
            packages: export.packages,
            sources,
        });
    }

    let scan = engine.scan_sources(only)?;
    for s in &scan.skipped_unavailable {
        println!("source_unavailable={s}");
    }
    if scan.scanned_sources.is_empty() {
        bail!("NO_SOURCES: no enabled package source is available on this host");
    }
    Ok(Inventory {
        packages: scan.packages,
        sources: scan.scanned_sources,
    })
}

pub fn source_filter(sources: &[Source]) -> Option<BTreeSet<Source>> {
    if sources.is_empty() {
        None
    } else {
        Some(sources.iter().copied().collect())
    }
}

pub fn hostname() -> Option<String> {
    hostname::get().ok().map(|h| h.to_string_lossy().into_owned())
}

pub fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("serialize output failed")?);
    Ok(())
}

pub fn print_result(r: &ActionResult) {
    if r.succeeded {
        println!("result=ok kind={} package={}", r.kind, r.key());
    } else {
        println!(
            "result=failed kind={} package={} error={}",
            r.kind,
            r.key(),
            r.error.as_deref().unwrap_or("unknown error")
        );
    }
}
