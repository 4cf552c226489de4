//! pkc-artifacts
//!
//! On-disk shapes the engine reads and writes:
//! - manifest TOML: `[packages.<source>.<name>]` entries plus opaque metadata tables
//! - scan export JSON
//!
//! Writes go to a temp file in the target directory and are renamed into
//! place, so a crash never leaves a half-written manifest.

mod atomic;
mod bootstrap;
mod manifest_toml;
mod scan_json;

pub use atomic::write_atomic;
pub use bootstrap::{init_manifest_from_scan, manifest_from_scan, InitManifestResult};
pub use manifest_toml::{
    load_manifest, parse_manifest_toml, render_manifest_toml, save_manifest, touch_updated,
};
pub use scan_json::{read_scan_export, write_scan_export};
