//! pkc-config
//!
//! Layered YAML configuration:
//! - files merge left to right (later layers override earlier ones, objects merge deeply)
//! - the merged document is canonicalised to JSON and hashed with SHA-256 so a
//!   run can report exactly which configuration it used
//! - [`EngineConfig`] is the typed view every entry point receives explicitly;
//!   nothing below the CLI reads the environment
//! - [`report_unused_keys`] flags leaf keys nobody reads

mod engine;
mod unused;

pub use engine::{
    AdvisorConfig, ApplyConfig, DefaultPaths, DiffConfig, EngineConfig, HistoryConfig,
    PathsConfig, ProtectedConfig, ResolvedPaths, SubprocessConfig,
};
pub use unused::{consumed_pointers, report_unused_keys, UnusedKeyPolicy, UnusedKeyReport};

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed, validated view of the merged document.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        EngineConfig::from_json(&self.config_json)
    }
}

pub fn load_layered_yaml<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let p = p.as_ref();
        let raw = fs::read_to_string(p)
            .with_context(|| format!("failed to read yaml path: {}", p.display()))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for (i, raw) in yaml_docs.iter().enumerate() {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw)
            .with_context(|| format!("invalid yaml in layer {}", i + 1))?;
        let v_json = match serde_json::to_value(v_yaml).context("yaml->json conversion failed")? {
            // An empty document parses as null; treat it as an empty layer.
            Value::Null => serde_json::json!({}),
            v => v,
        };
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn canonicalize_json(v: &Value) -> Result<String> {
    // serde_json's default Map is ordered by key, so compact output is canonical.
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
