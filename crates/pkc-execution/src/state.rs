//! Lifecycle of one action.
//!
//! ```text
//!   Planned ──Filter──► FilteredOut        (terminal)
//!      │
//!      ├──Succeed─────► Succeeded          (terminal)
//!      └──Fail────────► Failed             (terminal)
//! ```
//!
//! There is no edge out of `Failed`: nothing is retried.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ActionState {
    Planned,
    FilteredOut { pattern: String },
    Succeeded,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEvent {
    Filter { pattern: String },
    Succeed,
    Fail { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: ActionState,
    pub event: ActionEvent,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal action transition: {:?} on {:?}", self.event, self.from)
    }
}

impl std::error::Error for TransitionError {}

impl ActionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActionState::Planned)
    }

    pub fn apply(&self, event: ActionEvent) -> Result<ActionState, TransitionError> {
        match (self, event) {
            (ActionState::Planned, ActionEvent::Filter { pattern }) => {
                Ok(ActionState::FilteredOut { pattern })
            }
            (ActionState::Planned, ActionEvent::Succeed) => Ok(ActionState::Succeeded),
            (ActionState::Planned, ActionEvent::Fail { error }) => Ok(ActionState::Failed { error }),
            (from, event) => Err(TransitionError {
                from: from.clone(),
                event,
            }),
        }
    }
}
