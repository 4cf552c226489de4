use anyhow::Result;
use pkc_schemas::{ActionResult, ScannedPackage, Source};

// ---------------------------------------------------------------------------
// SourceInvokeToken
// ---------------------------------------------------------------------------

/// Proof that a mutating call comes from [`crate::Executor`].
///
/// The `_priv` field is `pub(crate)`, so code outside this crate cannot build
/// one with a struct literal:
///
/// ```text
/// ✅  executor.execute(&plan, ExecutionMode::Live)     // mints the token internally
/// ❌  SourceInvokeToken { _priv: () }                  // ERROR: private field
/// ```
#[allow(clippy::manual_non_exhaustive)]
#[derive(Debug)]
pub struct SourceInvokeToken {
    pub(crate) _priv: (),
}

impl SourceInvokeToken {
    pub(crate) fn mint() -> Self {
        Self { _priv: () }
    }

    /// Direct mutator access for unit tests of individual sources.
    #[cfg(any(test, feature = "testkit"))]
    pub fn for_test() -> Self {
        Self::mint()
    }
}

// ---------------------------------------------------------------------------
// PackageSource
// ---------------------------------------------------------------------------

/// Capability contract of one package ecosystem.
///
/// `is_available` and `scan` must be side-effect free and safe to repeat.
/// `install` / `remove` are the only mutators and require a token only the
/// executor can produce. Mutators return exactly one result per name, in
/// the order given; a failure for one name must not hide results for others.
pub trait PackageSource {
    fn source(&self) -> Source;

    /// Whether the ecosystem's tooling is present. Never mutates anything.
    fn is_available(&self) -> bool;

    fn scan(&self) -> Result<Vec<ScannedPackage>>;

    fn install(&self, names: &[String], token: &SourceInvokeToken) -> Vec<ActionResult>;

    fn remove(&self, names: &[String], purge: bool, token: &SourceInvokeToken) -> Vec<ActionResult>;
}
