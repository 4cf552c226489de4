use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use pkc_schemas::{MalformedInput, Manifest, ManifestEntry, PackageKey, Source};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::write_atomic;

const PACKAGES: &str = "packages";

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            bail!("MANIFEST_NOT_FOUND: {} (run `pkc init` first)", path.display())
        }
        Err(e) => return Err(e).with_context(|| format!("read manifest failed: {}", path.display())),
    };
    let manifest = parse_manifest_toml(&raw).with_context(|| format!("load manifest {}", path.display()))?;
    Ok(manifest)
}

/// Every top-level key except `packages` is metadata and kept as-is.
pub fn parse_manifest_toml(raw: &str) -> Result<Manifest, MalformedInput> {
    let mut root: toml::Table = raw
        .parse()
        .map_err(|e: toml::de::Error| MalformedInput::new("manifest", e.to_string().trim_end().to_string()))?;

    let packages = match root.remove(PACKAGES) {
        None => toml::Table::new(),
        Some(toml::Value::Table(t)) => t,
        Some(other) => {
            return Err(MalformedInput::new(
                "manifest",
                format!("`packages` must be a table, found {}", other.type_str()),
            ))
        }
    };

    let mut manifest = Manifest::with_metadata(root);
    for (source_raw, group) in packages {
        let source: Source = source_raw
            .parse()
            .map_err(|e: MalformedInput| MalformedInput::new("manifest", format!("packages.{source_raw}: {}", e.detail)))?;
        let toml::Value::Table(group) = group else {
            return Err(MalformedInput::new(
                "manifest",
                format!("packages.{source_raw} must be a table"),
            ));
        };
        for (name, value) in group {
            let entry: ManifestEntry = value
                .try_into()
                .map_err(|e: toml::de::Error| {
                    MalformedInput::new("manifest", format!("packages.{source_raw}.{name}: {}", e.message()))
                })?;
            manifest.insert(PackageKey::new(source, name), entry);
        }
    }

    manifest.validate()?;
    Ok(manifest)
}

pub fn render_manifest_toml(manifest: &Manifest) -> Result<String> {
    let mut root = manifest.metadata.clone();
    root.remove(PACKAGES);

    let mut groups: BTreeMap<Source, toml::Table> = BTreeMap::new();
    for (key, entry) in manifest.entries() {
        let value = toml::Value::try_from(entry).with_context(|| format!("serialize manifest entry {key}"))?;
        groups.entry(key.source).or_default().insert(key.name.clone(), value);
    }
    let packages: toml::Table = groups
        .into_iter()
        .map(|(s, t)| (s.as_str().to_string(), toml::Value::Table(t)))
        .collect();
    root.insert(PACKAGES.to_string(), toml::Value::Table(packages));

    toml::to_string(&root).context("serialize manifest failed")
}

pub fn save_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    manifest.validate()?;
    let body = render_manifest_toml(manifest)?;
    write_atomic(path, &body)
}

/// Stamp `meta.updated`. The only metadata key the engine ever writes.
pub fn touch_updated(manifest: &mut Manifest, now: DateTime<Utc>) {
    let stamp = toml::Value::String(now.to_rfc3339_opts(SecondsFormat::Secs, true));
    match manifest.metadata.get_mut("meta") {
        Some(toml::Value::Table(meta)) => {
            meta.insert("updated".to_string(), stamp);
        }
        _ => {
            let mut meta = toml::Table::new();
            meta.insert("updated".to_string(), stamp);
            manifest.metadata.insert("meta".to_string(), toml::Value::Table(meta));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pkc_schemas::ManifestStatus;

    const SAMPLE: &str = r#"
[meta]
version = 1
hostname = "pop-desk"

[system]
distro = "pop"

[packages.apt.vim]
status = "keep"
reason = "editor"

[packages.apt.telnet]
status = "remove"
confidence = 0.9

[packages.flatpak."org.gimp.GIMP"]
status = "keep"
"#;

    #[test]
    fn parse_splits_entries_from_metadata() {
        let m = parse_manifest_toml(SAMPLE).unwrap();
        assert_eq!(m.len(), 3);
        let telnet = m.get(&PackageKey::new(Source::Apt, "telnet")).unwrap();
        assert_eq!(telnet.status, ManifestStatus::Remove);
        assert_eq!(telnet.confidence, Some(0.9));
        assert!(m.contains(&PackageKey::new(Source::Flatpak, "org.gimp.GIMP")));
        assert!(m.metadata.contains_key("meta"));
        assert!(m.metadata.contains_key("system"));
        assert!(!m.metadata.contains_key("packages"));
    }

    #[test]
    fn render_then_parse_preserves_everything() {
        let m = parse_manifest_toml(SAMPLE).unwrap();
        let again = parse_manifest_toml(&render_manifest_toml(&m).unwrap()).unwrap();
        assert_eq!(again, m);
    }

    #[test]
    fn unknown_source_is_malformed() {
        let err = parse_manifest_toml("[packages.snap.core]\nstatus = \"keep\"\n").unwrap_err();
        assert!(err.detail.starts_with("packages.snap:"));
    }

    #[test]
    fn unknown_status_is_malformed() {
        let err = parse_manifest_toml("[packages.apt.vim]\nstatus = \"maybe\"\n").unwrap_err();
        assert!(err.detail.starts_with("packages.apt.vim:"));
    }

    #[test]
    fn confidence_out_of_range_is_malformed() {
        let err = parse_manifest_toml("[packages.apt.vim]\nstatus = \"keep\"\nconfidence = 2.0\n").unwrap_err();
        assert!(err.detail.contains("outside [0, 1]"));
    }

    #[test]
    fn touch_updated_creates_or_updates_meta() {
        let mut m = Manifest::new();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        touch_updated(&mut m, ts);
        let meta = m.metadata.get("meta").and_then(|v| v.as_table()).unwrap();
        assert_eq!(meta.get("updated").and_then(|v| v.as_str()), Some("2024-05-01T09:00:00Z"));

        let mut m = parse_manifest_toml(SAMPLE).unwrap();
        touch_updated(&mut m, ts);
        let meta = m.metadata.get("meta").and_then(|v| v.as_table()).unwrap();
        assert_eq!(meta.get("hostname").and_then(|v| v.as_str()), Some("pop-desk"));
        assert!(meta.contains_key("updated"));
    }
}
