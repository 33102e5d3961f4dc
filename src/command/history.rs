// HistoryManager - Snapshot-based undo/redo
//
// Snapshots are whole `Project` values. Tracks and clips are `Arc`-shared,
// so a snapshot only costs the spine of the document plus whatever was
// changed after it was taken.

use crate::command::error::{CommandError, CommandResult};
use crate::command::state::DawState;
use crate::project::types::Project;
use std::collections::VecDeque;

/// Default maximum number of snapshots to keep in history
pub const DEFAULT_MAX_HISTORY: usize = 100;

/// Label shown for the state before any recorded action
pub const INITIAL_STATE_LABEL: &str = "Initial State";

/// A captured document plus the label of the action that followed it
#[derive(Debug, Clone)]
struct HistoryEntry {
    project: Project,
    label: String,
}

/// One row of the history timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    pub index: usize,
    pub label: String,
    /// True for the row matching the current document
    pub current: bool,
}

/// Manages snapshot-before-mutation undo/redo
///
/// The manager maintains two stacks:
/// - Undo stack: documents captured before each recorded action
/// - Redo stack: documents displaced by undo
///
/// Before mutating, callers push a snapshot with a label describing the
/// action. Pushing clears the redo stack (new timeline). When the undo
/// stack exceeds its capacity the oldest entry is dropped.
pub struct HistoryManager {
    /// Most recent at the back
    undo_stack: VecDeque<HistoryEntry>,

    /// Most recent at the back
    redo_stack: VecDeque<HistoryEntry>,

    max_history: usize,

    /// Incremented on every push/undo/redo
    version: u64,
}

impl HistoryManager {
    /// Create a new HistoryManager with default settings
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }

    /// Create a new HistoryManager with a custom history limit
    pub fn with_capacity(max_history: usize) -> Self {
        let max_history = max_history.max(1);
        Self {
            undo_stack: VecDeque::with_capacity(max_history),
            redo_stack: VecDeque::with_capacity(max_history),
            max_history,
            version: 0,
        }
    }

    /// Capture the current document before an action labelled `label`
    ///
    /// This will:
    /// 1. Push a snapshot onto the undo stack
    /// 2. Clear the redo stack (new timeline)
    /// 3. Drop the oldest snapshot if over capacity
    pub fn push_snapshot(&mut self, state: &DawState, label: impl Into<String>) {
        self.push_project(state.project().clone(), label);
    }

    /// Record an already captured pre-action document
    ///
    /// Lets callers run a fallible command against the live state and only
    /// record history once it succeeded.
    pub fn push_project(&mut self, project: Project, label: impl Into<String>) {
        let label = label.into();
        log::debug!("History: push '{}'", label);
        self.undo_stack.push_back(HistoryEntry { project, label });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.max_history {
            self.undo_stack.pop_front();
        }
        self.version += 1;
    }

    /// Undo the last recorded action
    ///
    /// Swaps the current document with the most recent snapshot and moves
    /// the displaced document (with the same label) to the redo stack.
    ///
    /// # Returns
    /// The label of the undone action
    pub fn undo(&mut self, state: &mut DawState) -> CommandResult<String> {
        let entry = self
            .undo_stack
            .pop_back()
            .ok_or(CommandError::NothingToUndo)?;
        let current = state.project().clone();
        state.replace_project(entry.project);
        self.redo_stack.push_back(HistoryEntry {
            project: current,
            label: entry.label.clone(),
        });
        self.version += 1;
        log::debug!("History: undo '{}'", entry.label);
        Ok(entry.label)
    }

    /// Redo the last undone action
    ///
    /// # Returns
    /// The label of the redone action
    pub fn redo(&mut self, state: &mut DawState) -> CommandResult<String> {
        let entry = self
            .redo_stack
            .pop_back()
            .ok_or(CommandError::NothingToRedo)?;
        let current = state.project().clone();
        state.replace_project(entry.project);
        self.undo_stack.push_back(HistoryEntry {
            project: current,
            label: entry.label.clone(),
        });
        self.version += 1;
        log::debug!("History: redo '{}'", entry.label);
        Ok(entry.label)
    }

    /// Restore the timeline position `index` (0 = oldest kept state)
    ///
    /// Issues as many undo or redo steps as needed.
    pub fn jump_to(&mut self, index: usize, state: &mut DawState) -> CommandResult<()> {
        if index > self.undo_stack.len() + self.redo_stack.len() {
            return Err(CommandError::InvalidHistoryIndex(index));
        }
        while self.current_index() > index {
            self.undo(state)?;
        }
        while self.current_index() < index {
            self.redo(state)?;
        }
        Ok(())
    }

    /// Position of the current document in the timeline
    pub fn current_index(&self) -> usize {
        self.undo_stack.len()
    }

    /// The full timeline: "Initial State" followed by one row per action
    pub fn history_list(&self) -> Vec<HistoryItem> {
        let current = self.current_index();
        std::iter::once(INITIAL_STATE_LABEL.to_string())
            .chain(self.undo_stack.iter().map(|e| e.label.clone()))
            .chain(self.redo_stack.iter().rev().map(|e| e.label.clone()))
            .enumerate()
            .map(|(index, label)| HistoryItem {
                index,
                label,
                current: index == current,
            })
            .collect()
    }

    /// Check if there are actions that can be undone
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if there are actions that can be redone
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Label of the action `undo` would revert
    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.label.as_str())
    }

    /// Label of the action `redo` would re-apply
    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.label.as_str())
    }

    /// Monotonic change counter
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Forget all history (e.g. after loading a project)
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.version += 1;
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}
