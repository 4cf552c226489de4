//! pkc-schemas
//!
//! Shared data model for the package keeper workspace. Every other crate
//! speaks these types; nothing here performs IO.

mod action;
mod error;
mod manifest;
mod package;
mod scan_export;

pub use action::{Action, ActionKind, ActionResult};
pub use error::MalformedInput;
pub use manifest::{Manifest, ManifestEntry, ManifestStatus};
pub use package::{InstallStatus, PackageKey, ScannedPackage, Source};
pub use scan_export::{ScanExport, ScanSummary};
