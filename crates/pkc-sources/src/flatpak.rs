use anyhow::{bail, Result};
use pkc_execution::{PackageSource, SourceInvokeToken};
use pkc_schemas::{ActionKind, ActionResult, InstallStatus, ScannedPackage, Source};
use tracing::info;

use crate::CommandRunner;

/// Sandboxed application store via the `flatpak` CLI.
///
/// Only applications are listed; runtimes are dependencies and never
/// surfaced. Every listed app counts as manually installed.
#[derive(Debug, Clone)]
pub struct FlatpakSource<R> {
    runner: R,
}

impl<R: CommandRunner> FlatpakSource<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn one(&self, kind: ActionKind, args: Vec<String>, name: &str) -> ActionResult {
        match self.runner.run("flatpak", &args) {
            Ok(out) if out.success() => ActionResult::success(kind, Source::Flatpak, name),
            Ok(out) => ActionResult::failure(kind, Source::Flatpak, name, out.error_text("flatpak command failed")),
            Err(e) => ActionResult::failure(kind, Source::Flatpak, name, format!("{e:#}")),
        }
    }
}

impl<R: CommandRunner> PackageSource for FlatpakSource<R> {
    fn source(&self) -> Source {
        Source::Flatpak
    }

    fn is_available(&self) -> bool {
        self.runner.exists("flatpak")
    }

    fn scan(&self) -> Result<Vec<ScannedPackage>> {
        let out = self.runner.run(
            "flatpak",
            &[
                "list".into(),
                "--app".into(),
                "--columns=application,version,size,description".into(),
            ],
        )?;
        if !out.success() {
            bail!("flatpak list failed: {}", out.error_text("unknown error"));
        }
        Ok(out.stdout.lines().filter_map(parse_flatpak_line).collect())
    }

    fn install(&self, names: &[String], _token: &SourceInvokeToken) -> Vec<ActionResult> {
        info!(count = names.len(), "flatpak install");
        names
            .iter()
            .map(|n| {
                let args = vec!["install".into(), "-y".into(), "--user".into(), n.clone()];
                self.one(ActionKind::Install, args, n)
            })
            .collect()
    }

    /// Flatpak has no configuration purge; `purge` only changes the reported kind.
    fn remove(&self, names: &[String], purge: bool, _token: &SourceInvokeToken) -> Vec<ActionResult> {
        let kind = if purge { ActionKind::Purge } else { ActionKind::Remove };
        info!(count = names.len(), "flatpak uninstall");
        names
            .iter()
            .map(|n| {
                let args = vec!["uninstall".into(), "-y".into(), n.clone()];
                self.one(kind, args, n)
            })
            .collect()
    }
}

fn parse_flatpak_line(line: &str) -> Option<ScannedPackage> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < 2 {
        return None;
    }
    let (name, version) = (parts[0].trim(), parts[1].trim());
    if name.is_empty() || version.is_empty() {
        return None;
    }
    let mut pkg = ScannedPackage::new(Source::Flatpak, name, version, InstallStatus::Manual);
    pkg.size_bytes = parts.get(2).and_then(|s| parse_human_size(s));
    pkg.description = parts
        .get(3)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Some(pkg)
}

/// `"1.2 GB"` -> bytes (base 1024). Units B, KB, MB, GB, TB, any case.
pub fn parse_human_size(raw: &str) -> Option<u64> {
    let s = raw.trim();
    let split = s.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
    let (num, unit) = s.split_at(split);
    let value: f64 = num.parse().ok()?;
    let mult: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "B" => 1,
        "KB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        "TB" => 1 << 40,
        _ => return None,
    };
    Some((value * mult as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScriptedRunner;

    #[test]
    fn human_sizes() {
        assert_eq!(parse_human_size("1.5 KB"), Some(1536));
        assert_eq!(parse_human_size("2 GB"), Some(2 * 1024 * 1024 * 1024));
        assert_eq!(parse_human_size("700 mb"), Some(700 * 1024 * 1024));
        assert_eq!(parse_human_size("12B"), Some(12));
        assert_eq!(parse_human_size("lots"), None);
        assert_eq!(parse_human_size("3 PB"), None);
        assert_eq!(parse_human_size(""), None);
    }

    #[test]
    fn scan_lists_apps_as_manual() {
        let runner = ScriptedRunner::new(&["flatpak"]).respond(
            "flatpak list --app --columns=application,version,size,description",
            0,
            "org.gimp.GIMP\t2.10.38\t1.2 GB\tGNU Image Manipulation Program\norg.broken.App\t\t1 MB\t\n",
            "",
        );
        let pkgs = FlatpakSource::new(runner).scan().unwrap();

        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].status, InstallStatus::Manual);
        assert_eq!(pkgs[0].size_bytes, Some((1.2 * (1u64 << 30) as f64) as u64));
    }

    #[test]
    fn uninstall_reports_per_item() {
        let runner = ScriptedRunner::new(&["flatpak"])
            .respond("flatpak uninstall -y org.a.A", 0, "", "")
            .respond("flatpak uninstall -y org.b.B", 1, "error: org.b.B not installed", "");
        let src = FlatpakSource::new(runner);
        let results = src.remove(&["org.a.A".into(), "org.b.B".into()], false, &SourceInvokeToken::for_test());

        assert!(results[0].succeeded);
        assert!(!results[1].succeeded);
        // stderr empty, so stdout carries the error text.
        assert_eq!(results[1].error.as_deref(), Some("error: org.b.B not installed"));
    }
}
