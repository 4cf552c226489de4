//! Test doubles and fixtures shared by the cross-crate scenarios under `tests/`.

mod fake_source;

pub use fake_source::{FakeSource, SourceCall};

use pkc_config::EngineConfig;
use pkc_history::MemoryStore;
use pkc_runtime::Engine;
use pkc_schemas::{InstallStatus, Manifest, ManifestEntry, PackageKey, ScannedPackage, Source};

pub type TestEngine = Engine<FakeSource, MemoryStore>;

pub fn apt(name: &str) -> PackageKey {
    PackageKey::new(Source::Apt, name)
}

pub fn manual(source: Source, name: &str) -> ScannedPackage {
    ScannedPackage::new(source, name, "1.0", InstallStatus::Manual)
}

pub fn auto(source: Source, name: &str) -> ScannedPackage {
    ScannedPackage::new(source, name, "1.0", InstallStatus::AutoInstalled)
}

/// Apt-only manifest from `keep` and `remove` name lists.
pub fn apt_manifest(keep: &[&str], remove: &[&str]) -> Manifest {
    let mut m = Manifest::new();
    for n in keep {
        m.insert(apt(n), ManifestEntry::keep());
    }
    for n in remove {
        m.insert(apt(n), ManifestEntry::remove());
    }
    m
}

/// Defaults with the baseline switched off so fixtures control protection.
pub fn config_with_patterns(patterns: &[&str]) -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.protected.use_baseline = false;
    cfg.protected.patterns = patterns.iter().map(|p| p.to_string()).collect();
    cfg
}

pub fn engine(cfg: EngineConfig, sources: Vec<FakeSource>) -> TestEngine {
    Engine::new(cfg, sources, MemoryStore::new())
}
