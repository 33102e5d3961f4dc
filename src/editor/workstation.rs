// Workstation - Ties the document, history, transport and piano roll together
//
// This is the surface a front end drives: it owns the editing-side state,
// records history for every document edit, routes keyboard shortcuts and
// forwards the periodic `tick` to the transport scheduler.

use crate::command::error::{CommandError, CommandResult};
use crate::command::history::{HistoryItem, HistoryManager};
use crate::command::state::DawState;
use crate::config::DawConfig;
use crate::editor::keymap::{EditorAction, KeyPress, action_for};
use crate::editor::piano_roll::{GridPoint, PianoRoll, PointerOutcome};
use crate::project::ProjectError;
use crate::project::serialization::{load_from_file, save_to_file};
use crate::project::types::{ClipId, Project};
use crate::sequencer::scheduler::{AudioHost, TransportScheduler};
use crate::sequencer::transport::SharedTransportState;
use std::path::Path;
use std::sync::Arc;

const TIMELINE_ZOOM_STEP: f64 = 1.25;
const TIMELINE_MIN_ZOOM: f64 = 0.25;
const TIMELINE_MAX_ZOOM: f64 = 4.0;

pub struct Workstation<H: AudioHost> {
    config: DawConfig,
    state: DawState,
    history: HistoryManager,
    scheduler: TransportScheduler<H>,
    piano_roll: Option<PianoRoll>,
    timeline_zoom: f64,
    snap_enabled: bool,
    history_panel_visible: bool,
}

impl<H: AudioHost> Workstation<H> {
    /// Create a workstation around an empty project
    ///
    /// # Arguments
    /// * `config` - Editor, history and render settings
    /// * `host` - Receives schedules (the live engine link in production)
    /// * `transport` - Shared play state, also read by the engine
    pub fn new(config: DawConfig, host: H, transport: Arc<SharedTransportState>) -> Self {
        Self {
            history: HistoryManager::with_capacity(config.history_capacity),
            snap_enabled: config.editor.snap_enabled,
            config,
            state: DawState::default(),
            scheduler: TransportScheduler::new(host, transport),
            piano_roll: None,
            timeline_zoom: 1.0,
            history_panel_visible: false,
        }
    }

    pub fn config(&self) -> &DawConfig {
        &self.config
    }

    pub fn state(&self) -> &DawState {
        &self.state
    }

    pub fn project(&self) -> &Project {
        self.state.project()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn scheduler(&self) -> &TransportScheduler<H> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut TransportScheduler<H> {
        &mut self.scheduler
    }

    // ---------------------------------------------------------------
    // Document edits
    // ---------------------------------------------------------------

    /// Run a document command as one undoable step
    ///
    /// History is only recorded when the command succeeds; a failing command
    /// leaves both the document and the history untouched.
    pub fn perform<T>(
        &mut self,
        label: &str,
        command: impl FnOnce(&mut DawState) -> CommandResult<T>,
    ) -> CommandResult<T> {
        let before = self.state.project().clone();
        let value = command(&mut self.state)?;
        self.history.push_project(before, label);
        Ok(value)
    }

    pub fn undo(&mut self) -> CommandResult<String> {
        let label = self.history.undo(&mut self.state)?;
        self.after_history_move();
        Ok(label)
    }

    pub fn redo(&mut self) -> CommandResult<String> {
        let label = self.history.redo(&mut self.state)?;
        self.after_history_move();
        Ok(label)
    }

    /// Restore a row of the history panel
    pub fn jump_to(&mut self, index: usize) -> CommandResult<()> {
        self.history.jump_to(index, &mut self.state)?;
        self.after_history_move();
        Ok(())
    }

    pub fn history_list(&self) -> Vec<HistoryItem> {
        self.history.history_list()
    }

    fn after_history_move(&mut self) {
        // Restored documents may no longer contain the edited clip
        if let Some(roll) = &self.piano_roll {
            if self.state.project().find_clip(roll.clip()).is_none() {
                self.piano_roll = None;
            }
        }
        if let Some(roll) = &mut self.piano_roll {
            roll.cancel_gesture();
            roll.clear_selection();
        }
    }

    /// Replace the document, forgetting history and stopping playback
    pub fn load_project(&mut self, project: Project) {
        self.scheduler.stop();
        self.piano_roll = None;
        self.state.replace_project(project);
        self.history.clear();
    }

    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        let project = load_from_file(path)?;
        self.load_project(project);
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        save_to_file(self.state.project(), path)
    }

    // ---------------------------------------------------------------
    // Piano roll
    // ---------------------------------------------------------------

    /// Open the note editor on a MIDI clip
    pub fn open_piano_roll(&mut self, clip: ClipId) -> CommandResult<()> {
        let (_, found) = self
            .state
            .project()
            .find_clip(clip)
            .ok_or(CommandError::ClipNotFound(clip))?;
        if found.is_audio() {
            return Err(CommandError::NotMidiClip(clip));
        }
        let mut roll = PianoRoll::new(clip, &self.config.editor);
        roll.set_snap_enabled(self.snap_enabled);
        self.piano_roll = Some(roll);
        self.state.selected_clip = Some(clip);
        Ok(())
    }

    pub fn close_piano_roll(&mut self) {
        self.piano_roll = None;
    }

    pub fn piano_roll(&self) -> Option<&PianoRoll> {
        self.piano_roll.as_ref()
    }

    pub fn pointer_down(&mut self, point: GridPoint) {
        if let Some(roll) = &mut self.piano_roll {
            roll.pointer_down(&self.state, point);
        }
    }

    pub fn pointer_move(&mut self, point: GridPoint) -> CommandResult<()> {
        match &mut self.piano_roll {
            Some(roll) => roll.pointer_move(&mut self.state, &mut self.history, point),
            None => Ok(()),
        }
    }

    pub fn pointer_up(&mut self, point: GridPoint) -> CommandResult<PointerOutcome> {
        match &mut self.piano_roll {
            Some(roll) => roll.pointer_up(&mut self.state, &mut self.history, point),
            None => Ok(PointerOutcome::None),
        }
    }

    // ---------------------------------------------------------------
    // Transport
    // ---------------------------------------------------------------

    pub fn toggle_play(&mut self) {
        self.scheduler.toggle_play(&self.state);
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// Periodic update (UI frame or timer)
    pub fn tick(&mut self) {
        self.scheduler.tick(&self.state);
    }

    // ---------------------------------------------------------------
    // View state
    // ---------------------------------------------------------------

    pub fn snap_enabled(&self) -> bool {
        self.snap_enabled
    }

    pub fn timeline_zoom(&self) -> f64 {
        self.timeline_zoom
    }

    pub fn history_panel_visible(&self) -> bool {
        self.history_panel_visible
    }

    // ---------------------------------------------------------------
    // Keyboard
    // ---------------------------------------------------------------

    /// Route a key press; returns the action that ran, if any
    ///
    /// Shortcuts target the piano roll when it is open and the selected
    /// clip otherwise.
    pub fn handle_key(
        &mut self,
        press: KeyPress,
        text_input_focused: bool,
    ) -> CommandResult<Option<EditorAction>> {
        let Some(action) = action_for(press, text_input_focused) else {
            return Ok(None);
        };

        match action {
            EditorAction::TogglePlay => self.toggle_play(),
            EditorAction::Undo => match self.undo() {
                Err(CommandError::NothingToUndo) => log::debug!("Nothing to undo"),
                other => {
                    other?;
                }
            },
            EditorAction::Redo => match self.redo() {
                Err(CommandError::NothingToRedo) => log::debug!("Nothing to redo"),
                other => {
                    other?;
                }
            },
            EditorAction::Copy => self.copy()?,
            EditorAction::Paste => self.paste()?,
            EditorAction::Duplicate => self.duplicate()?,
            EditorAction::Delete => self.delete()?,
            EditorAction::ZoomIn => self.zoom_by(TIMELINE_ZOOM_STEP),
            EditorAction::ZoomOut => self.zoom_by(1.0 / TIMELINE_ZOOM_STEP),
            EditorAction::ZoomReset => match &mut self.piano_roll {
                Some(roll) => roll.zoom_reset(),
                None => self.timeline_zoom = 1.0,
            },
            EditorAction::ToggleSnap => {
                self.snap_enabled = !self.snap_enabled;
                if let Some(roll) = &mut self.piano_roll {
                    roll.set_snap_enabled(self.snap_enabled);
                }
            }
            EditorAction::ToggleHistoryPanel => {
                self.history_panel_visible = !self.history_panel_visible;
            }
            EditorAction::Dismiss => self.close_piano_roll(),
        }
        Ok(Some(action))
    }

    fn zoom_by(&mut self, factor: f64) {
        match &mut self.piano_roll {
            Some(roll) if factor > 1.0 => roll.zoom_in(),
            Some(roll) => roll.zoom_out(),
            None => {
                self.timeline_zoom =
                    (self.timeline_zoom * factor).clamp(TIMELINE_MIN_ZOOM, TIMELINE_MAX_ZOOM);
            }
        }
    }

    /// Playhead in beats relative to `clip`'s start, never negative
    fn playhead_in_clip(&self, clip: ClipId) -> f64 {
        let clip_start = self
            .state
            .project()
            .find_clip(clip)
            .map_or(0.0, |(_, c)| c.start_beat);
        (self.scheduler.position_beats() - clip_start).max(0.0)
    }

    fn copy(&mut self) -> CommandResult<()> {
        if let Some(roll) = &self.piano_roll {
            roll.copy_selected(&mut self.state)?;
        } else if let Some(clip) = self.state.selected_clip {
            self.state.copy_clip(clip)?;
        }
        Ok(())
    }

    fn paste(&mut self) -> CommandResult<()> {
        if let Some(clip) = self.piano_roll.as_ref().map(|r| r.clip()) {
            let at = self.playhead_in_clip(clip);
            if let Some(roll) = &mut self.piano_roll {
                roll.paste(&mut self.state, &mut self.history, at)?;
            }
            return Ok(());
        }
        let Some(track) = self.state.selected_track else {
            log::debug!("Paste ignored: no target track selected");
            return Ok(());
        };
        let at = self.scheduler.position_beats();
        let clip = self.perform("Paste Clip", |state| state.paste_clip(track, at))?;
        self.state.selected_clip = Some(clip);
        Ok(())
    }

    fn duplicate(&mut self) -> CommandResult<()> {
        if let Some(roll) = &mut self.piano_roll {
            roll.duplicate_selected(&mut self.state, &mut self.history)?;
        } else if let Some(clip) = self.state.selected_clip {
            let copy = self.perform("Duplicate Clip", |state| state.duplicate_clip(clip))?;
            self.state.selected_clip = Some(copy);
        }
        Ok(())
    }

    fn delete(&mut self) -> CommandResult<()> {
        if let Some(roll) = &mut self.piano_roll {
            roll.delete_selected(&mut self.state, &mut self.history)?;
        } else if let Some(clip) = self.state.selected_clip {
            self.perform("Delete Clip", |state| state.delete_clip(clip))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::keymap::Key;
    use crate::messaging::command::ScheduleBatch;
    use crate::project::types::{TrackId, TrackType};

    #[derive(Default)]
    struct NullHost {
        loads: usize,
        cancels: usize,
    }

    impl AudioHost for NullHost {
        fn load(&mut self, _batch: ScheduleBatch) {
            self.loads += 1;
        }

        fn set_track_gain(&mut self, _generation: u64, _track: TrackId, _gain: f32) {}

        fn cancel(&mut self, _generation: u64) {
            self.cancels += 1;
        }
    }

    fn workstation() -> Workstation<NullHost> {
        Workstation::new(
            DawConfig::default(),
            NullHost::default(),
            SharedTransportState::new(44100),
        )
    }

    fn with_clip(ws: &mut Workstation<NullHost>) -> (TrackId, ClipId) {
        let track = ws
            .perform("Add Track", |s| Ok(s.add_track(TrackType::Instrument)))
            .unwrap();
        let clip = ws
            .perform("Add Clip", |s| s.add_clip(track, "Clip", 0.0, 4.0))
            .unwrap();
        (track, clip)
    }

    #[test]
    fn test_failed_command_records_no_history() {
        let mut ws = workstation();
        let result = ws.perform("Delete Clip", |s| s.delete_clip(999));
        assert!(matches!(result, Err(CommandError::ClipNotFound(999))));
        assert_eq!(ws.history_list().len(), 1);
    }

    #[test]
    fn test_perform_then_undo_redo() {
        let mut ws = workstation();
        with_clip(&mut ws);
        assert_eq!(ws.project().tracks.len(), 1);
        assert_eq!(ws.undo().unwrap(), "Add Clip");
        assert_eq!(ws.undo().unwrap(), "Add Track");
        assert!(ws.project().tracks.is_empty());
        ws.redo().unwrap();
        assert_eq!(ws.project().tracks.len(), 1);
    }

    #[test]
    fn test_undo_shortcut_with_empty_history_is_quiet() {
        let mut ws = workstation();
        let action = ws
            .handle_key(KeyPress::command(Key::Char('z')), false)
            .unwrap();
        assert_eq!(action, Some(EditorAction::Undo));
    }

    #[test]
    fn test_space_toggles_transport() {
        let mut ws = workstation();
        ws.handle_key(KeyPress::plain(Key::Space), false).unwrap();
        assert!(ws.scheduler().is_playing());
        ws.handle_key(KeyPress::plain(Key::Space), false).unwrap();
        assert!(!ws.scheduler().is_playing());
        // Typing a space into a text field does nothing
        ws.handle_key(KeyPress::plain(Key::Space), true).unwrap();
        assert!(!ws.scheduler().is_playing());
        assert_eq!(ws.scheduler().host().loads, 1);
        assert_eq!(ws.scheduler().host().cancels, 1);
    }

    #[test]
    fn test_delete_key_targets_piano_roll_selection() {
        let mut ws = workstation();
        let (_, clip) = with_clip(&mut ws);
        ws.perform("Add Note", |s| s.add_note(clip, 60, 0.0, 1.0, 100))
            .unwrap();
        ws.open_piano_roll(clip).unwrap();

        // Press the note body and release without moving
        let point = GridPoint::new(10.0, (108.0 - 60.0) * 14.0 + 7.0);
        ws.pointer_down(point);
        ws.pointer_up(point).unwrap();
        ws.handle_key(KeyPress::plain(Key::Delete), false).unwrap();

        let (_, edited) = ws.project().find_clip(clip).unwrap();
        assert!(edited.notes().is_empty());
        assert_eq!(ws.history().undo_label(), Some("Delete Notes"));
    }

    #[test]
    fn test_delete_key_removes_selected_clip_without_roll() {
        let mut ws = workstation();
        let (_, clip) = with_clip(&mut ws);
        ws.open_piano_roll(clip).unwrap();
        ws.handle_key(KeyPress::plain(Key::Escape), false).unwrap();
        assert!(ws.piano_roll().is_none());

        ws.handle_key(KeyPress::plain(Key::Backspace), false).unwrap();
        assert!(ws.project().find_clip(clip).is_none());
        assert_eq!(ws.history().undo_label(), Some("Delete Clip"));
    }

    #[test]
    fn test_undo_closes_roll_on_vanished_clip() {
        let mut ws = workstation();
        let (_, clip) = with_clip(&mut ws);
        ws.open_piano_roll(clip).unwrap();
        ws.undo().unwrap();
        assert!(ws.piano_roll().is_none());
    }

    #[test]
    fn test_snap_and_zoom_shortcuts() {
        let mut ws = workstation();
        let (_, clip) = with_clip(&mut ws);

        ws.handle_key(KeyPress::command(Key::Char('=')), false).unwrap();
        assert!(ws.timeline_zoom() > 1.0);
        ws.handle_key(KeyPress::command(Key::Char('0')), false).unwrap();
        assert_eq!(ws.timeline_zoom(), 1.0);

        ws.open_piano_roll(clip).unwrap();
        ws.handle_key(KeyPress::command(Key::Char('g')), false).unwrap();
        assert!(!ws.snap_enabled());
        assert_eq!(ws.piano_roll().map(|r| r.snap_enabled()), Some(false));

        ws.handle_key(KeyPress::command(Key::Char('h')), false).unwrap();
        assert!(ws.history_panel_visible());
    }

    #[test]
    fn test_load_project_clears_history() {
        let mut ws = workstation();
        with_clip(&mut ws);
        ws.load_project(Project::new("Fresh"));
        assert_eq!(ws.history_list().len(), 1);
        assert_eq!(ws.project().name, "Fresh");
    }
}
