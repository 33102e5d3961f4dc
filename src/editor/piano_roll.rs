// Piano Roll - Note editing gestures over a single MIDI clip
//
// Pointer input arrives in grid pixels (x from the clip start, y from the
// top row). The editor turns it into gestures:
//
//   Idle -> Marquee (press on empty space)
//   Idle -> Move    (press on a note body)
//   Idle -> Resize  (press on a note's right-edge handle)
//
// A gesture only becomes a drag once the pointer travels past the drag
// threshold; releasing before that is a click. Each drag records exactly one
// history snapshot, taken when the threshold is crossed.

use crate::command::error::{CommandError, CommandResult};
use crate::command::history::HistoryManager;
use crate::command::state::DawState;
use crate::config::EditorSettings;
use crate::project::types::{Clip, ClipId, MidiNote, NoteId};
use crate::sequencer::timeline::{floor_to_grid, snap_to_grid};
use std::collections::HashSet;

/// Lowest pitch shown on the grid (A0)
pub const MIN_PITCH: u8 = 21;
/// Highest pitch shown on the grid (C8)
pub const MAX_PITCH: u8 = 108;
/// Shortest duration a resize can produce (beats)
pub const MIN_RESIZE_DURATION: f64 = 0.25;

const ZOOM_STEP: f64 = 1.25;
const MIN_ZOOM: f64 = 0.25;
const MAX_ZOOM: f64 = 4.0;

/// A pointer position in grid pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
}

impl GridPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance_to(self, other: GridPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Which part of a note a point lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitZone {
    Body,
    ResizeHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Idle,
    Marquee,
    Move,
    Resize,
}

#[derive(Debug, Clone, Copy)]
enum Gesture {
    Idle,
    Marquee {
        origin: GridPoint,
        current: GridPoint,
        dragging: bool,
    },
    Move {
        origin: GridPoint,
        note: NoteId,
        dragging: bool,
        /// Beat offset already applied to the selection
        applied_beats: f64,
        /// Semitone offset already applied to the selection
        applied_pitch: i32,
    },
    Resize {
        origin: GridPoint,
        note: NoteId,
        dragging: bool,
        original_duration: f64,
    },
}

/// What a pointer release did
#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    None,
    /// Click on empty space created a note
    NoteAdded(NoteId),
    /// Click on a note selected it alone
    NoteSelected(NoteId),
    Moved,
    Resized,
    /// Marquee drag finished with this many notes selected
    MarqueeSelected(usize),
}

/// Gesture state machine for one MIDI clip
pub struct PianoRoll {
    clip: ClipId,
    settings: EditorSettings,
    snap_enabled: bool,
    zoom: f64,
    selection: HashSet<NoteId>,
    gesture: Gesture,
    /// History version right after this drag pushed its snapshot
    snapshot_version: Option<u64>,
    /// Pitch a host may audition while the pointer holds a note
    preview: Option<u8>,
}

impl PianoRoll {
    pub fn new(clip: ClipId, settings: &EditorSettings) -> Self {
        Self {
            clip,
            snap_enabled: settings.snap_enabled,
            settings: settings.clone(),
            zoom: 1.0,
            selection: HashSet::new(),
            gesture: Gesture::Idle,
            snapshot_version: None,
            preview: None,
        }
    }

    pub fn clip(&self) -> ClipId {
        self.clip
    }

    pub fn gesture(&self) -> GestureKind {
        match self.gesture {
            Gesture::Idle => GestureKind::Idle,
            Gesture::Marquee { .. } => GestureKind::Marquee,
            Gesture::Move { .. } => GestureKind::Move,
            Gesture::Resize { .. } => GestureKind::Resize,
        }
    }

    /// Pitch under the active press, for auditioning
    pub fn preview_pitch(&self) -> Option<u8> {
        self.preview
    }

    // ---------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------

    /// Selected note ids in ascending order
    pub fn selection(&self) -> Vec<NoteId> {
        let mut ids: Vec<NoteId> = self.selection.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_selected(&self, note: NoteId) -> bool {
        self.selection.contains(&note)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn select_all(&mut self, state: &DawState) {
        self.selection = self
            .notes(state)
            .map(|notes| notes.iter().map(|n| n.id).collect())
            .unwrap_or_default();
    }

    /// Marquee rectangle in grid pixels (min corner, max corner)
    pub fn marquee_rect(&self) -> Option<(GridPoint, GridPoint)> {
        match self.gesture {
            Gesture::Marquee {
                origin,
                current,
                dragging: true,
            } => Some(normalize_rect(origin, current)),
            _ => None,
        }
    }

    // ---------------------------------------------------------------
    // Geometry
    // ---------------------------------------------------------------

    pub fn snap_enabled(&self) -> bool {
        self.snap_enabled
    }

    pub fn set_snap_enabled(&mut self, enabled: bool) {
        self.snap_enabled = enabled;
    }

    pub fn toggle_snap(&mut self) -> bool {
        self.snap_enabled = !self.snap_enabled;
        self.snap_enabled
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * ZOOM_STEP).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / ZOOM_STEP).max(MIN_ZOOM);
    }

    pub fn zoom_reset(&mut self) {
        self.zoom = 1.0;
    }

    pub fn pixels_per_beat(&self) -> f64 {
        self.settings.pixels_per_beat * self.zoom
    }

    pub fn beat_at(&self, x: f64) -> f64 {
        x / self.pixels_per_beat()
    }

    pub fn x_of(&self, beat: f64) -> f64 {
        beat * self.pixels_per_beat()
    }

    /// Pitch of the row containing `y` (top row is MAX_PITCH)
    pub fn pitch_at(&self, y: f64) -> i32 {
        MAX_PITCH as i32 - (y / self.settings.note_height).floor() as i32
    }

    /// Top edge of a pitch row
    pub fn y_of(&self, pitch: u8) -> f64 {
        (MAX_PITCH as f64 - pitch as f64) * self.settings.note_height
    }

    /// Topmost note under a point and the zone that was hit
    pub fn hit_test(&self, state: &DawState, point: GridPoint) -> Option<(NoteId, HitZone)> {
        let notes = self.notes(state)?;
        // Later notes draw on top
        notes.iter().rev().find_map(|note| {
            let left = self.x_of(note.start_beat);
            let right = self.x_of(note.end_beat());
            let top = self.y_of(note.pitch);
            let bottom = top + self.settings.note_height;
            let inside =
                point.x >= left && point.x < right && point.y >= top && point.y < bottom;
            if !inside {
                return None;
            }
            let zone = if point.x >= right - self.settings.resize_handle_px {
                HitZone::ResizeHandle
            } else {
                HitZone::Body
            };
            Some((note.id, zone))
        })
    }

    // ---------------------------------------------------------------
    // Pointer gestures
    // ---------------------------------------------------------------

    /// Start a gesture at `point`
    pub fn pointer_down(&mut self, state: &DawState, point: GridPoint) {
        self.snapshot_version = None;
        self.gesture = match self.hit_test(state, point) {
            Some((note_id, zone)) => {
                // Pressing an unselected note replaces the selection
                if !self.selection.contains(&note_id) {
                    self.selection.clear();
                    self.selection.insert(note_id);
                }
                let note = self.find_note(state, note_id);
                self.preview = note.map(|n| n.pitch);
                match zone {
                    HitZone::Body => Gesture::Move {
                        origin: point,
                        note: note_id,
                        dragging: false,
                        applied_beats: 0.0,
                        applied_pitch: 0,
                    },
                    HitZone::ResizeHandle => Gesture::Resize {
                        origin: point,
                        note: note_id,
                        dragging: false,
                        original_duration: note.map_or(MIN_RESIZE_DURATION, |n| n.duration),
                    },
                }
            }
            None => Gesture::Marquee {
                origin: point,
                current: point,
                dragging: false,
            },
        };
    }

    /// Update the active gesture
    ///
    /// Below the drag threshold nothing changes. The first update past it
    /// records the gesture's history snapshot.
    pub fn pointer_move(
        &mut self,
        state: &mut DawState,
        history: &mut HistoryManager,
        point: GridPoint,
    ) -> CommandResult<()> {
        let threshold = self.settings.drag_threshold_px;
        match self.gesture {
            Gesture::Idle => Ok(()),
            Gesture::Marquee {
                origin, dragging, ..
            } => {
                let dragging = dragging || origin.distance_to(point) >= threshold;
                self.gesture = Gesture::Marquee {
                    origin,
                    current: point,
                    dragging,
                };
                Ok(())
            }
            Gesture::Move {
                origin,
                note,
                dragging,
                applied_beats,
                applied_pitch,
            } => {
                if !dragging && origin.distance_to(point) < threshold {
                    return Ok(());
                }
                self.ensure_snapshot(state, history, "Move Notes");
                let (applied_beats, applied_pitch) =
                    self.drag_selection(state, origin, point, applied_beats, applied_pitch)?;
                self.preview = self.find_note(state, note).map(|n| n.pitch);
                self.gesture = Gesture::Move {
                    origin,
                    note,
                    dragging: true,
                    applied_beats,
                    applied_pitch,
                };
                Ok(())
            }
            Gesture::Resize {
                origin,
                note,
                dragging,
                original_duration,
            } => {
                if !dragging && origin.distance_to(point) < threshold {
                    return Ok(());
                }
                self.ensure_snapshot(state, history, "Resize Note");

                let mut duration = original_duration + self.beat_at(point.x - origin.x);
                if self.snap_enabled {
                    duration = snap_to_grid(duration, self.settings.snap_beats);
                }
                state.set_note_duration(self.clip, note, duration.max(MIN_RESIZE_DURATION))?;
                self.gesture = Gesture::Resize {
                    origin,
                    note,
                    dragging: true,
                    original_duration,
                };
                Ok(())
            }
        }
    }

    /// Finish the active gesture
    pub fn pointer_up(
        &mut self,
        state: &mut DawState,
        history: &mut HistoryManager,
        point: GridPoint,
    ) -> CommandResult<PointerOutcome> {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        // The release point is the final frame of a move
        let last_frame = match gesture {
            Gesture::Move {
                origin,
                dragging: true,
                applied_beats,
                applied_pitch,
                ..
            } => {
                self.ensure_snapshot(state, history, "Move Notes");
                self.drag_selection(state, origin, point, applied_beats, applied_pitch)
                    .map(|_| ())
            }
            _ => Ok(()),
        };
        self.snapshot_version = None;
        self.preview = None;
        last_frame?;

        match gesture {
            Gesture::Idle => Ok(PointerOutcome::None),
            Gesture::Marquee {
                origin, dragging, ..
            } => {
                if dragging || origin.distance_to(point) >= self.settings.drag_threshold_px {
                    let count = self.select_in_rect(state, origin, point);
                    Ok(PointerOutcome::MarqueeSelected(count))
                } else {
                    self.add_note_at(state, history, origin)
                }
            }
            Gesture::Move { note, dragging, .. } | Gesture::Resize { note, dragging, .. }
                if !dragging =>
            {
                self.selection.clear();
                self.selection.insert(note);
                Ok(PointerOutcome::NoteSelected(note))
            }
            Gesture::Move { .. } => Ok(PointerOutcome::Moved),
            Gesture::Resize { .. } => Ok(PointerOutcome::Resized),
        }
    }

    /// Abandon the active gesture without further edits
    pub fn cancel_gesture(&mut self) {
        self.gesture = Gesture::Idle;
        self.snapshot_version = None;
        self.preview = None;
    }

    // ---------------------------------------------------------------
    // Selection edits
    // ---------------------------------------------------------------

    /// Delete every selected note as one undo step
    pub fn delete_selected(
        &mut self,
        state: &mut DawState,
        history: &mut HistoryManager,
    ) -> CommandResult<usize> {
        if self.selection.is_empty() {
            return Ok(0);
        }
        self.require_clip(state)?;
        let ids = self.selection();
        history.push_snapshot(state, "Delete Notes");
        let removed = state.delete_notes(self.clip, &ids)?;
        self.selection.clear();
        Ok(removed)
    }

    /// Copy the selection to the note clipboard
    pub fn copy_selected(&self, state: &mut DawState) -> CommandResult<usize> {
        let ids = self.selection();
        state.copy_notes(self.clip, &ids)
    }

    /// Paste the note clipboard at `at_beat`; the pasted notes become the selection
    pub fn paste(
        &mut self,
        state: &mut DawState,
        history: &mut HistoryManager,
        at_beat: f64,
    ) -> CommandResult<Vec<NoteId>> {
        self.require_clip(state)?;
        if !state.has_notes_in_clipboard() {
            return Err(CommandError::EmptyClipboard);
        }
        history.push_snapshot(state, "Paste Notes");
        let ids = state.paste_notes(self.clip, at_beat)?;
        self.selection = ids.iter().copied().collect();
        Ok(ids)
    }

    /// Copy the selection and paste it right after its last note
    pub fn duplicate_selected(
        &mut self,
        state: &mut DawState,
        history: &mut HistoryManager,
    ) -> CommandResult<Vec<NoteId>> {
        let Some(notes) = self.notes(state) else {
            return Err(CommandError::ClipNotFound(self.clip));
        };
        let (start, end) = notes
            .iter()
            .filter(|n| self.selection.contains(&n.id))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(s, e), n| {
                (s.min(n.start_beat), e.max(n.end_beat()))
            });
        if !start.is_finite() {
            return Ok(Vec::new());
        }
        self.copy_selected(state)?;
        self.paste(state, history, end.max(start))
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn clip_ref<'a>(&self, state: &'a DawState) -> Option<&'a Clip> {
        state.project().find_clip(self.clip).map(|(_, clip)| clip)
    }

    fn notes<'a>(&self, state: &'a DawState) -> Option<&'a [MidiNote]> {
        self.clip_ref(state).map(|clip| clip.notes())
    }

    fn find_note(&self, state: &DawState, id: NoteId) -> Option<MidiNote> {
        self.notes(state)?.iter().find(|n| n.id == id).copied()
    }

    fn require_clip(&self, state: &DawState) -> CommandResult<()> {
        match self.clip_ref(state) {
            Some(_) => Ok(()),
            None => Err(CommandError::ClipNotFound(self.clip)),
        }
    }

    /// Move the selection toward the offset `point` asks for, relative to
    /// `origin`, and return the total offset now applied
    ///
    /// Every selected note moves by the same step. The step is limited so the
    /// whole selection stays inside the clip and on the visible pitch rows.
    fn drag_selection(
        &self,
        state: &mut DawState,
        origin: GridPoint,
        point: GridPoint,
        applied_beats: f64,
        applied_pitch: i32,
    ) -> CommandResult<(f64, i32)> {
        let raw_beats = self.beat_at(point.x - origin.x);
        let total_beats = if self.snap_enabled {
            snap_to_grid(raw_beats, self.settings.snap_beats)
        } else {
            raw_beats
        };
        let total_pitch = -((point.y - origin.y) / self.settings.note_height).round() as i32;

        let (step_beats, step_pitch) = self.clamp_step(
            state,
            total_beats - applied_beats,
            total_pitch - applied_pitch,
        )?;
        if step_beats != 0.0 || step_pitch != 0 {
            let ids = self.selection();
            state.move_notes(self.clip, &ids, step_beats, step_pitch)?;
        }
        Ok((applied_beats + step_beats, applied_pitch + step_pitch))
    }

    /// Limit a move step to `[0, clip end - duration]` on the beat axis and
    /// `MIN_PITCH..=MAX_PITCH` on the pitch axis for every selected note
    fn clamp_step(
        &self,
        state: &DawState,
        step_beats: f64,
        step_pitch: i32,
    ) -> CommandResult<(f64, i32)> {
        let Some(clip) = self.clip_ref(state) else {
            return Err(CommandError::ClipNotFound(self.clip));
        };
        let mut beats = (f64::NEG_INFINITY, f64::INFINITY);
        let mut pitch = (i32::MIN, i32::MAX);
        for note in clip.notes().iter().filter(|n| self.selection.contains(&n.id)) {
            beats.0 = beats.0.max(-note.start_beat);
            beats.1 = beats.1.min(clip.duration - note.duration - note.start_beat);
            pitch.0 = pitch.0.max(MIN_PITCH as i32 - note.pitch as i32);
            pitch.1 = pitch.1.min(MAX_PITCH as i32 - note.pitch as i32);
        }
        if beats.0 > beats.1 {
            // Longer than the clip: only the left edge can be honoured
            beats.1 = beats.0;
        }
        if pitch.0 > pitch.1 {
            pitch.1 = pitch.0;
        }
        Ok((
            step_beats.clamp(beats.0, beats.1),
            step_pitch.clamp(pitch.0, pitch.1),
        ))
    }

    /// Push this drag's snapshot unless it is still the latest history entry
    fn ensure_snapshot(&mut self, state: &DawState, history: &mut HistoryManager, label: &str) {
        if self.snapshot_version != Some(history.version()) {
            history.push_snapshot(state, label);
            self.snapshot_version = Some(history.version());
        }
    }

    fn add_note_at(
        &mut self,
        state: &mut DawState,
        history: &mut HistoryManager,
        point: GridPoint,
    ) -> CommandResult<PointerOutcome> {
        let Some(clip) = self.clip_ref(state) else {
            return Err(CommandError::ClipNotFound(self.clip));
        };
        let clip_duration = clip.duration;

        let pitch = self.pitch_at(point.y);
        let mut beat = self.beat_at(point.x);
        if self.snap_enabled {
            beat = floor_to_grid(beat, self.settings.snap_beats);
        }
        if !(MIN_PITCH as i32..=MAX_PITCH as i32).contains(&pitch)
            || beat < 0.0
            || beat >= clip_duration
        {
            return Ok(PointerOutcome::None);
        }

        history.push_snapshot(state, "Add Note");
        let id = state.add_note(
            self.clip,
            pitch,
            beat,
            self.settings.default_note_duration,
            self.settings.default_velocity as i32,
        )?;
        self.selection.clear();
        self.selection.insert(id);
        Ok(PointerOutcome::NoteAdded(id))
    }

    /// Select notes whose rectangles overlap the marquee (touching edges excluded)
    fn select_in_rect(&mut self, state: &DawState, a: GridPoint, b: GridPoint) -> usize {
        let (min, max) = normalize_rect(a, b);
        let start_beat = self.beat_at(min.x);
        let end_beat = self.beat_at(max.x);
        let height = self.settings.note_height;

        self.selection = self
            .notes(state)
            .map(|notes| {
                notes
                    .iter()
                    .filter(|n| {
                        let top = self.y_of(n.pitch);
                        n.start_beat < end_beat
                            && n.end_beat() > start_beat
                            && top < max.y
                            && top + height > min.y
                    })
                    .map(|n| n.id)
                    .collect()
            })
            .unwrap_or_default();
        self.selection.len()
    }
}

fn normalize_rect(a: GridPoint, b: GridPoint) -> (GridPoint, GridPoint) {
    (
        GridPoint::new(a.x.min(b.x), a.y.min(b.y)),
        GridPoint::new(a.x.max(b.x), a.y.max(b.y)),
    )
}
