use anyhow::{bail, Context, Result};
use pkc_schemas::Source;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Typed configuration threaded through every entry point.
///
/// Every section defaults, so an empty document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub paths: PathsConfig,
    pub protected: ProtectedConfig,
    pub apply: ApplyConfig,
    pub diff: DiffConfig,
    pub advisor: AdvisorConfig,
    pub history: HistoryConfig,
    pub subprocess: SubprocessConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub manifest: Option<PathBuf>,
    pub history: Option<PathBuf>,
    pub scan_export: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectedConfig {
    /// Include the built-in baseline of system-critical packages.
    pub use_baseline: bool,
    /// Extra glob patterns, appended to the baseline.
    pub patterns: Vec<String>,
}

impl Default for ProtectedConfig {
    fn default() -> Self {
        Self {
            use_baseline: true,
            patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Removals discard configuration state (not reversible).
    pub purge: bool,
    /// Prefix for privileged package-manager calls; empty or null runs them directly.
    pub privilege_command: Option<String>,
    pub sources: Vec<Source>,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            purge: false,
            privilege_command: Some("sudo".to_string()),
            sources: Source::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Only manually installed packages are surfaced as `new`.
    pub manual_only: bool,
    /// Protected packages are never surfaced as `new`.
    pub hide_protected_new: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            manual_only: true,
            hide_protected_new: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// keep/remove decisions below this confidence go to review instead of the manifest.
    pub min_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Retention limit; 0 keeps everything.
    pub max_entries: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubprocessConfig {
    pub timeout_secs: u64,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

/// Fallback locations, supplied by the caller (the CLI resolves them from XDG dirs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPaths {
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl DefaultPaths {
    pub fn new(config_dir: impl Into<PathBuf>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            state_dir: state_dir.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub manifest: PathBuf,
    pub history: PathBuf,
    pub scan_export: PathBuf,
}

impl PathsConfig {
    pub fn resolve(&self, defaults: &DefaultPaths) -> ResolvedPaths {
        let pick = |explicit: &Option<PathBuf>, dir: &Path, file: &str| {
            explicit.clone().unwrap_or_else(|| dir.join(file))
        };
        ResolvedPaths {
            manifest: pick(&self.manifest, &defaults.config_dir, "manifest.toml"),
            history: pick(&self.history, &defaults.state_dir, "history.jsonl"),
            scan_export: pick(&self.scan_export, &defaults.state_dir, "last-scan.json"),
        }
    }
}

impl EngineConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let cfg: EngineConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: config does not match the engine schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let c = self.advisor.min_confidence;
        if !(0.0..=1.0).contains(&c) {
            bail!("CONFIG_INVALID: advisor.min_confidence={c} must be within [0, 1]");
        }
        if self.apply.sources.is_empty() {
            bail!("CONFIG_INVALID: apply.sources must name at least one source");
        }
        if self.subprocess.timeout_secs == 0 {
            bail!("CONFIG_INVALID: subprocess.timeout_secs must be > 0");
        }
        if let Some(p) = self.protected.patterns.iter().find(|p| p.trim().is_empty()) {
            bail!("CONFIG_INVALID: protected.patterns contains an empty pattern {p:?}");
        }
        Ok(())
    }

    /// The privilege prefix, with empty strings treated as "none".
    pub fn privilege_command(&self) -> Option<&str> {
        self.apply
            .privilege_command
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn source_enabled(&self, source: Source) -> bool {
        self.apply.sources.contains(&source)
    }
}
