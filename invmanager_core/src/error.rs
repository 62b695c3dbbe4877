// Error types for the manager core.
//
// Three failure domains, kept apart because they travel differently:
// - `DispatchError`: rejected synchronously at the call site, before any
//   command is queued (bad method selector, refused attach side).
// - `CommandError`: raised by a command action on the simulation thread.
//   Never propagates out of `CommandBus::drain`; its `Display` text becomes
//   the `message` of a failure envelope (see `envelope.rs`).
// - `RecordError`: a persisted or synced record could not be read.
//
// Gating failures on the plate are not errors at all: gated operations
// return empty results (see `plate.rs`). Detaching an unknown caller is not
// an error either (see `caller.rs`).

use thiserror::Error;

use crate::types::{Direction, InventorySide};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("unknown method")]
    UnknownMethod { selector: usize },
    #[error("cannot attach from side {side}")]
    SideRejected { side: Direction },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("missing argument #{index} ({name})")]
    MissingArgument { index: usize, name: &'static str },
    #[error("bad argument #{index} (expected {expected})")]
    InvalidArgument {
        index: usize,
        expected: &'static str,
    },
    #[error("unknown side '{0}'")]
    UnknownSide(String),
    #[error("no inventory found for side '{0}'")]
    NoInventory(InventorySide),
    #[error("slot {slot} out of range (inventory has {size} slots)")]
    SlotOutOfRange { slot: usize, size: usize },
    #[error("slot {slot} is empty")]
    EmptySlot { slot: usize },
    #[error("target slot {slot} holds a different item")]
    TargetOccupied { slot: usize },
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed manager record: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_method_text_matches_scripts() {
        // Scripts match on this exact string.
        let err = DispatchError::UnknownMethod { selector: 7 };
        assert_eq!(err.to_string(), "unknown method");
    }

    #[test]
    fn command_error_messages_are_readable() {
        let err = CommandError::SlotOutOfRange { slot: 40, size: 36 };
        assert_eq!(err.to_string(), "slot 40 out of range (inventory has 36 slots)");
        let err = CommandError::NoInventory(InventorySide::Player);
        assert_eq!(err.to_string(), "no inventory found for side 'player'");
    }
}
