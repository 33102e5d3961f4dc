// Command errors

use crate::audio::decode::DecodeError;
use crate::project::types::{ClipId, TrackId};
use thiserror::Error;

/// Result type for command operations
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors that can occur during command execution
///
/// None of these leave the document modified: a failing command returns
/// before touching any state.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Track {0} not found")]
    TrackNotFound(TrackId),

    #[error("Clip {0} not found")]
    ClipNotFound(ClipId),

    #[error("Clip {0} does not contain notes")]
    NotMidiClip(ClipId),

    #[error("Clipboard is empty")]
    EmptyClipboard,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("History index {0} out of range")]
    InvalidHistoryIndex(usize),

    #[error("Import failed: {0}")]
    Import(#[from] DecodeError),
}
