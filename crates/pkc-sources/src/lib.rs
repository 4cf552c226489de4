//! pkc-sources
//!
//! Concrete package ecosystems. Each shells out to the ecosystem's own
//! tooling through a [`CommandRunner`]; nothing here reimplements a package
//! manager.
//!
//! Design decisions:
//! - The set of ecosystems is closed: [`SourceBackend`] is an enum with one
//!   variant per ecosystem, and adding an ecosystem means adding a variant
//! - Availability is a PATH lookup, never a call with side effects
//! - apt mutations are transactional per batch, so every item shares the
//!   batch outcome; flatpak mutates one app per call and reports per item

mod apt;
mod backend;
mod flatpak;
mod runner;

pub use apt::AptSource;
pub use backend::SourceBackend;
pub use flatpak::{parse_human_size, FlatpakSource};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
