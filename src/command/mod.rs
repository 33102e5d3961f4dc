// Document editing and undo/redo
//
// Architecture:
// - DawState: the project document plus editing-side state (clipboards,
//   selection, decoded audio), with a revision counter bumped on change
// - commands: one method on DawState per document mutation
// - HistoryManager: snapshot-before-mutation undo/redo stacks
//
// Callers push a labelled snapshot to the HistoryManager, then run the
// command. Snapshots are cheap because tracks and clips are Arc-shared.

pub mod commands;
pub mod error;
pub mod history;
pub mod state;

pub use error::{CommandError, CommandResult};
pub use history::{HistoryItem, HistoryManager};
pub use state::DawState;
