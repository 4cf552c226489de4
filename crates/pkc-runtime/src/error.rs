use pkc_history::HistoryKind;
use std::fmt;

/// A destructive operation was requested without an explicit confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequired {
    pub operation: &'static str,
}

impl fmt::Display for ConfirmationRequired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "REFUSING {}: destructive operation requires explicit confirmation (--yes) or --dry-run",
            self.operation
        )
    }
}

impl std::error::Error for ConfirmationRequired {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoRefusal {
    /// A selected entry has no compensation. Nothing was executed.
    NotReversible { id: String, kind: HistoryKind },
    NothingToUndo,
}

impl fmt::Display for UndoRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndoRefusal::NotReversible { id, kind } => {
                write!(f, "NOT_REVERSIBLE: history entry {id} ({kind}) cannot be undone")
            }
            UndoRefusal::NothingToUndo => write!(f, "NOTHING_TO_UNDO: no reversible history in scope"),
        }
    }
}

impl std::error::Error for UndoRefusal {}
