use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{PackageKey, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Install,
    Remove,
    /// Removal that also discards configuration state.
    Purge,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Install => "install",
            ActionKind::Remove => "remove",
            ActionKind::Purge => "purge",
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, ActionKind::Remove | ActionKind::Purge)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A planned mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub source: Source,
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind, key: &PackageKey) -> Self {
        Self {
            kind,
            source: key.source,
            package: key.name.clone(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn key(&self) -> PackageKey {
        PackageKey::new(self.source, self.package.clone())
    }
}

/// Outcome of one executed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub kind: ActionKind,
    pub source: Source,
    pub package: String,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn success(kind: ActionKind, source: Source, package: impl Into<String>) -> Self {
        Self {
            kind,
            source,
            package: package.into(),
            succeeded: true,
            message: None,
            error: None,
        }
    }

    pub fn failure(
        kind: ActionKind,
        source: Source,
        package: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            source,
            package: package.into(),
            succeeded: false,
            message: None,
            error: Some(error.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn key(&self) -> PackageKey {
        PackageKey::new(self.source, self.package.clone())
    }
}
