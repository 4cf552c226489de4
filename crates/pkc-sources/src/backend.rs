use anyhow::Result;
use pkc_execution::{PackageSource, SourceInvokeToken};
use pkc_schemas::{ActionResult, ScannedPackage, Source};

use crate::{AptSource, CommandRunner, FlatpakSource};

/// Closed set of ecosystems. The executor and scan aggregation only see
/// `PackageSource`; this enum is where a new ecosystem gets wired in.
#[derive(Debug, Clone)]
pub enum SourceBackend<R> {
    Apt(AptSource<R>),
    Flatpak(FlatpakSource<R>),
}

impl<R: CommandRunner + Clone> SourceBackend<R> {
    pub fn for_source(source: Source, runner: R, privilege: Option<&str>) -> Self {
        match source {
            Source::Apt => SourceBackend::Apt(AptSource::new(runner, privilege.map(str::to_string))),
            Source::Flatpak => SourceBackend::Flatpak(FlatpakSource::new(runner)),
        }
    }

    /// One backend per enabled source, in key order.
    pub fn enabled(enabled: &[Source], runner: R, privilege: Option<&str>) -> Vec<Self> {
        Source::ALL
            .iter()
            .filter(|s| enabled.contains(s))
            .map(|s| Self::for_source(*s, runner.clone(), privilege))
            .collect()
    }
}

impl<R: CommandRunner> PackageSource for SourceBackend<R> {
    fn source(&self) -> Source {
        match self {
            SourceBackend::Apt(s) => s.source(),
            SourceBackend::Flatpak(s) => s.source(),
        }
    }

    fn is_available(&self) -> bool {
        match self {
            SourceBackend::Apt(s) => s.is_available(),
            SourceBackend::Flatpak(s) => s.is_available(),
        }
    }

    fn scan(&self) -> Result<Vec<ScannedPackage>> {
        match self {
            SourceBackend::Apt(s) => s.scan(),
            SourceBackend::Flatpak(s) => s.scan(),
        }
    }

    fn install(&self, names: &[String], token: &SourceInvokeToken) -> Vec<ActionResult> {
        match self {
            SourceBackend::Apt(s) => s.install(names, token),
            SourceBackend::Flatpak(s) => s.install(names, token),
        }
    }

    fn remove(&self, names: &[String], purge: bool, token: &SourceInvokeToken) -> Vec<ActionResult> {
        match self {
            SourceBackend::Apt(s) => s.remove(names, purge, token),
            SourceBackend::Flatpak(s) => s.remove(names, purge, token),
        }
    }
}
