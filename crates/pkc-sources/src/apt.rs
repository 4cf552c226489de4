use anyhow::{bail, Result};
use pkc_execution::{PackageSource, SourceInvokeToken};
use pkc_schemas::{ActionKind, ActionResult, InstallStatus, ScannedPackage, Source};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::{CommandOutput, CommandRunner};

/// Status abbreviation first so half-removed packages (`rc`) can be dropped.
const DPKG_FORMAT: &str = "${db:Status-Abbrev}\t${Package}\t${Version}\t${Installed-Size}\t${binary:Summary}\n";

/// Debian-style package database via `dpkg-query`, `apt-mark` and `apt-get`.
#[derive(Debug, Clone)]
pub struct AptSource<R> {
    runner: R,
    privilege: Option<String>,
}

impl<R: CommandRunner> AptSource<R> {
    pub fn new(runner: R, privilege: Option<String>) -> Self {
        Self { runner, privilege }
    }

    fn auto_installed(&self) -> Result<BTreeSet<String>> {
        let out = self.runner.run("apt-mark", &["showauto".to_string()])?;
        if !out.success() {
            bail!("apt-mark showauto failed: {}", out.error_text("unknown error"));
        }
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| strip_arch(l).to_string())
            .collect())
    }

    fn apt_get(&self, verb: &str, names: &[String]) -> Result<CommandOutput> {
        let mut args: Vec<String> = vec!["apt-get".into(), verb.into(), "-y".into()];
        args.extend(names.iter().cloned());
        match &self.privilege {
            Some(p) => self.runner.run(p, &args),
            None => self.runner.run(&args[0], &args[1..]),
        }
    }

    fn mutate(&self, kind: ActionKind, names: &[String]) -> Vec<ActionResult> {
        if names.is_empty() {
            return Vec::new();
        }
        info!(kind = %kind, count = names.len(), "apt-get {}", kind);
        // One transaction: every item shares the outcome.
        match self.apt_get(kind.as_str(), names) {
            Ok(out) if out.success() => names
                .iter()
                .map(|n| ActionResult::success(kind, Source::Apt, n.clone()).with_message("apt-get completed"))
                .collect(),
            Ok(out) => {
                let err = out.error_text("apt-get failed");
                warn!(kind = %kind, error = %err, "apt-get failed");
                names
                    .iter()
                    .map(|n| ActionResult::failure(kind, Source::Apt, n.clone(), err.clone()))
                    .collect()
            }
            Err(e) => names
                .iter()
                .map(|n| ActionResult::failure(kind, Source::Apt, n.clone(), format!("{e:#}")))
                .collect(),
        }
    }
}

impl<R: CommandRunner> PackageSource for AptSource<R> {
    fn source(&self) -> Source {
        Source::Apt
    }

    fn is_available(&self) -> bool {
        self.runner.exists("dpkg-query") && self.runner.exists("apt-mark")
    }

    fn scan(&self) -> Result<Vec<ScannedPackage>> {
        let auto = self.auto_installed()?;
        let out = self
            .runner
            .run("dpkg-query", &["-W".into(), "-f".into(), DPKG_FORMAT.into()])?;
        if !out.success() {
            bail!("dpkg-query failed: {}", out.error_text("unknown error"));
        }
        Ok(collapse_arches(out.stdout.lines().filter_map(|l| parse_dpkg_line(l, &auto))))
    }

    fn install(&self, names: &[String], _token: &SourceInvokeToken) -> Vec<ActionResult> {
        self.mutate(ActionKind::Install, names)
    }

    fn remove(&self, names: &[String], purge: bool, _token: &SourceInvokeToken) -> Vec<ActionResult> {
        let kind = if purge { ActionKind::Purge } else { ActionKind::Remove };
        self.mutate(kind, names)
    }
}

/// `apt-mark` prints foreign-architecture packages as `name:arch`.
fn strip_arch(name: &str) -> &str {
    name.split_once(':').map_or(name, |(n, _)| n)
}

/// Multiarch hosts list one row per installed architecture under the same
/// name. Keys are per name, so rows fold into one package: the first row's
/// version and metadata, manual if any architecture is manual.
fn collapse_arches(rows: impl Iterator<Item = ScannedPackage>) -> Vec<ScannedPackage> {
    let mut by_name: BTreeMap<String, ScannedPackage> = BTreeMap::new();
    for pkg in rows {
        match by_name.get_mut(&pkg.name) {
            Some(seen) => {
                if pkg.is_manual() {
                    seen.status = InstallStatus::Manual;
                }
            }
            None => {
                by_name.insert(pkg.name.clone(), pkg);
            }
        }
    }
    by_name.into_values().collect()
}

fn parse_dpkg_line(line: &str, auto: &BTreeSet<String>) -> Option<ScannedPackage> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < 3 {
        return None;
    }
    // Second status letter is the current state; `i` means installed.
    if parts[0].chars().nth(1) != Some('i') {
        return None;
    }
    let (name, version) = (parts[1].trim(), parts[2].trim());
    if name.is_empty() || version.is_empty() {
        return None;
    }

    let status = if auto.contains(name) {
        InstallStatus::AutoInstalled
    } else {
        InstallStatus::Manual
    };
    let mut pkg = ScannedPackage::new(Source::Apt, name, version, status);
    // Installed-Size is KiB.
    pkg.size_bytes = parts
        .get(3)
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|kib| kib * 1024);
    pkg.description = parts
        .get(4)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Some(pkg)
}
