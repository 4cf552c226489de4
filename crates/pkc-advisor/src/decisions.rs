use anyhow::{Context, Result};
use pkc_schemas::{MalformedInput, PackageKey, Source};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

const WHAT: &str = "advisor decisions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Keep,
    Remove,
    Ask,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Classification::Keep => "keep",
            Classification::Remove => "remove",
            Classification::Ask => "ask",
        })
    }
}

/// One validated decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub key: PackageKey,
    pub classification: Classification,
    pub confidence: f64,
    pub reason: String,
    pub category: Option<String>,
}

/// All decisions of one file, in file order (sources alphabetical, items as listed).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DecisionBatch {
    pub decisions: Vec<Decision>,
}

impl DecisionBatch {
    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.decisions
            .iter()
            .filter(|d| d.classification == classification)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDecisions {
    #[serde(default)]
    packages: BTreeMap<String, Vec<RawDecision>>,
}

// Classification is read as a string so unknown values get a precise message
// instead of a generic enum error.
#[derive(Debug, Deserialize)]
struct RawDecision {
    name: String,
    classification: String,
    confidence: f64,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    category: Option<String>,
}

pub fn parse_decisions_toml(raw: &str) -> Result<DecisionBatch, MalformedInput> {
    let parsed: RawDecisions =
        toml::from_str(raw).map_err(|e| MalformedInput::new(WHAT, e.to_string()))?;
    validate(parsed)
}

pub fn parse_decisions_json(raw: &str) -> Result<DecisionBatch, MalformedInput> {
    let parsed: RawDecisions =
        serde_json::from_str(raw).map_err(|e| MalformedInput::new(WHAT, e.to_string()))?;
    validate(parsed)
}

/// Reads a decisions file; `.json` files are JSON, everything else TOML.
pub fn load_decisions(path: &Path) -> Result<DecisionBatch> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read advisor decisions failed: {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("json"));
    let batch = if is_json {
        parse_decisions_json(&raw)
    } else {
        parse_decisions_toml(&raw)
    };
    batch.with_context(|| format!("in {}", path.display()))
}

fn validate(raw: RawDecisions) -> Result<DecisionBatch, MalformedInput> {
    let mut decisions = Vec::new();
    for (source_tag, items) in raw.packages {
        let source: Source = source_tag.parse().map_err(|e: MalformedInput| {
            MalformedInput::new(WHAT, format!("packages.{source_tag}: {}", e.detail))
        })?;
        for (i, item) in items.into_iter().enumerate() {
            let at = format!("packages.{source_tag}[{i}]");
            if item.name.trim().is_empty() {
                return Err(MalformedInput::new(WHAT, format!("{at}: empty name")));
            }
            let classification = match item.classification.as_str() {
                "keep" => Classification::Keep,
                "remove" => Classification::Remove,
                "ask" => Classification::Ask,
                other => {
                    return Err(MalformedInput::new(
                        WHAT,
                        format!("{at} ({}): classification '{other}' is not keep|remove|ask", item.name),
                    ))
                }
            };
            if !(0.0..=1.0).contains(&item.confidence) {
                return Err(MalformedInput::new(
                    WHAT,
                    format!("{at} ({}): confidence {} outside [0, 1]", item.name, item.confidence),
                ));
            }
            decisions.push(Decision {
                key: PackageKey::new(source, item.name),
                classification,
                confidence: item.confidence,
                reason: item.reason,
                category: item.category,
            });
        }
    }
    Ok(DecisionBatch { decisions })
}
