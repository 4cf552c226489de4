use std::fmt;

/// Input that failed schema validation (manifest, scan export, advisor
/// decisions, history line). Fatal to the invoking command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedInput {
    /// What was being read, e.g. `"manifest"` or `"advisor decisions"`.
    pub what: String,
    pub detail: String,
}

impl MalformedInput {
    pub fn new(what: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for MalformedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MALFORMED {}: {}", self.what, self.detail)
    }
}

impl std::error::Error for MalformedInput {}
