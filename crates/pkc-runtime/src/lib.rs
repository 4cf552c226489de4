//! pkc-runtime
//!
//! Wires one invocation: scan -> diff -> plan -> execute -> record, plus
//! advisor merges, forced removal and undo.
//!
//! Architectural decisions:
//! - configuration is an explicit [`EngineConfig`](pkc_config::EngineConfig)
//!   value; nothing here reads the environment or the home directory
//! - every mutating operation requires `confirmed` unless it is a dry run;
//!   a dry run never touches the history store
//! - history is written only after execution, one entry per
//!   `(source, kind)` group of succeeded actions
//! - manifest and scan-export I/O stay with the caller

mod engine;
mod error;
mod undo;

pub use engine::{ApplyOutcome, ApplyRequest, Engine, RemoveRequest, RunOutcome, ScanOutcome};
pub use error::{ConfirmationRequired, UndoRefusal};
pub use undo::{UndoOutcome, UndoRequest, UndoScope};
