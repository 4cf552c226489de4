use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::MalformedInput;

/// One package ecosystem.
///
/// Variant order is the sort order of keys, so new variants must be placed
/// alphabetically by their tag to keep `(source, name)` ordering lexicographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Apt,
    Flatpak,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Apt, Source::Flatpak];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Apt => "apt",
            Source::Flatpak => "flatpak",
        }
    }

    /// Whether removal can also discard configuration state.
    pub fn supports_purge(&self) -> bool {
        matches!(self, Source::Apt)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = MalformedInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "apt" => Ok(Source::Apt),
            "flatpak" => Ok(Source::Flatpak),
            other => Err(MalformedInput::new(
                "source",
                format!("unknown package source '{other}' (expected apt|flatpak)"),
            )),
        }
    }
}

/// Identity of a package across the workspace. Orders by source, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageKey {
    pub source: Source,
    pub name: String,
}

impl PackageKey {
    pub fn new(source: Source, name: impl Into<String>) -> Self {
        Self {
            source,
            name: name.into(),
        }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallStatus {
    #[serde(rename = "manual")]
    Manual,
    /// Pulled in only to satisfy another package's dependency.
    #[serde(rename = "auto-installed")]
    AutoInstalled,
}

/// One observed unit of installed software.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedPackage {
    pub name: String,
    pub source: Source,
    pub version: String,
    pub status: InstallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_date: Option<DateTime<Utc>>,
}

impl ScannedPackage {
    pub fn new(
        source: Source,
        name: impl Into<String>,
        version: impl Into<String>,
        status: InstallStatus,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            version: version.into(),
            status,
            description: None,
            size_bytes: None,
            install_date: None,
        }
    }

    pub fn key(&self) -> PackageKey {
        PackageKey::new(self.source, self.name.clone())
    }

    pub fn is_manual(&self) -> bool {
        self.status == InstallStatus::Manual
    }
}
