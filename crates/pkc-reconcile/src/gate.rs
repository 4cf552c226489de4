//! Removal gate.
//!
//! Every removal or purge the executor performs passes through
//! [`check_removal_gate`]. Planning drops protected removals quietly (they
//! are reported as skipped); a caller that *forces* a protected removal gets
//! a [`ProtectionViolation`] naming the pattern that vetoed it.

use pkc_schemas::{ActionKind, PackageKey};
use std::fmt;

use crate::ProtectedMatcher;

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemovalGate {
    Permitted,
    /// The package matches `pattern`; the removal must not happen.
    Vetoed { pattern: String },
}

impl RemovalGate {
    pub fn is_permitted(&self) -> bool {
        matches!(self, RemovalGate::Permitted)
    }

    /// Turn a veto into an error for callers that asked for this exact removal.
    pub fn into_result(self, key: &PackageKey) -> Result<(), ProtectionViolation> {
        match self {
            RemovalGate::Permitted => Ok(()),
            RemovalGate::Vetoed { pattern } => Err(ProtectionViolation {
                key: key.clone(),
                pattern,
            }),
        }
    }
}

/// Installs always pass; removals and purges pass only for unprotected names.
pub fn check_removal_gate(
    protected: &ProtectedMatcher,
    kind: ActionKind,
    key: &PackageKey,
) -> RemovalGate {
    if !kind.is_removal() {
        return RemovalGate::Permitted;
    }
    match protected.matching_pattern(&key.name) {
        Some(p) => RemovalGate::Vetoed {
            pattern: p.to_string(),
        },
        None => RemovalGate::Permitted,
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectionViolation {
    pub key: PackageKey,
    pub pattern: String,
}

impl fmt::Display for ProtectionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "REFUSING removal of {}: protected by pattern '{}'",
            self.key, self.pattern
        )
    }
}

impl std::error::Error for ProtectionViolation {}
