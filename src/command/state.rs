// DawState - Centralized mutable state for the DAW
//
// Holds the project document plus the editing-side state that is not part
// of the document (clipboards, selection, decoded audio). Every successful
// mutation bumps `revision` so observers can detect changes.

use crate::audio::decode::{AudioPool, DecodedAudio};
use crate::project::types::{Clip, ClipId, MidiNote, Project, TrackId};
use std::sync::Arc;

/// Central state of the DAW that can be modified by commands
pub struct DawState {
    pub(crate) project: Project,

    /// Incremented on every document change (edits, undo/redo, load)
    revision: u64,

    /// Decoded audio referenced by audio clips, keyed by file reference
    audio_pool: Arc<AudioPool>,

    /// Copied clip, pasted with `paste_clip`
    pub(crate) clip_clipboard: Option<Clip>,

    /// Copied notes with starts relative to the earliest one
    pub(crate) note_clipboard: Vec<MidiNote>,

    /// Clip targeted by clip-level shortcuts (copy, duplicate, delete)
    pub selected_clip: Option<ClipId>,

    /// Track targeted by paste
    pub selected_track: Option<TrackId>,
}

impl DawState {
    /// Create a new DawState around a project
    pub fn new(project: Project) -> Self {
        Self {
            project,
            revision: 0,
            audio_pool: Arc::new(AudioPool::new()),
            clip_clipboard: None,
            note_clipboard: Vec::new(),
            selected_clip: None,
            selected_track: None,
        }
    }

    /// Read-only view of the document
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Current document revision
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mark the document as changed
    pub(crate) fn touch(&mut self) {
        self.revision += 1;
    }

    /// Replace the whole document (history restore, project load)
    pub fn replace_project(&mut self, project: Project) {
        self.project = project;
        self.drop_stale_selection();
        self.touch();
    }

    /// Pooled audio shared with playback and render
    pub fn audio_pool(&self) -> &Arc<AudioPool> {
        &self.audio_pool
    }

    /// Register decoded audio under a file reference
    pub fn insert_audio(&mut self, file_ref: impl Into<String>, audio: DecodedAudio) {
        Arc::make_mut(&mut self.audio_pool).insert(file_ref.into(), Arc::new(audio));
    }

    pub fn has_clip_in_clipboard(&self) -> bool {
        self.clip_clipboard.is_some()
    }

    pub fn has_notes_in_clipboard(&self) -> bool {
        !self.note_clipboard.is_empty()
    }

    fn drop_stale_selection(&mut self) {
        if let Some(clip) = self.selected_clip {
            if self.project.find_clip(clip).is_none() {
                self.selected_clip = None;
            }
        }
        if let Some(track) = self.selected_track {
            if self.project.track(track).is_none() {
                self.selected_track = None;
            }
        }
    }
}

impl Default for DawState {
    fn default() -> Self {
        Self::new(Project::default())
    }
}
