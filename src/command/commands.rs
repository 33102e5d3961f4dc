// Concrete commands - one method per document mutation
//
// Every command clamps its numeric input to the valid domain, addresses
// entities by id, and returns a typed error (without touching the document)
// when an id is missing. Successful mutations bump the document revision.

use crate::audio::decode::decode_audio;
use crate::command::error::{CommandError, CommandResult};
use crate::command::state::DawState;
use crate::midi::smf::parse_midi;
use crate::project::types::{
    AutomationPoint, Clip, ClipContent, ClipId, MidiNote, NoteId, TRACK_COLORS, Track,
    TrackEffects, TrackId, TrackType, clamp_beat, clamp_clip_duration, clamp_note_duration,
    clamp_pan, clamp_pitch, clamp_velocity, clamp_volume, normalize_automation,
};
use crate::project::{generate_clip_id, generate_note_id, generate_track_id};
use crate::sequencer::timeline::{Tempo, TimeSignature, clamp_bpm, snap_to_grid};
use std::sync::Arc;

/// Copy of a clip with fresh clip and note ids
fn clone_with_new_ids(clip: &Clip) -> Clip {
    let mut copy = clip.clone();
    copy.id = generate_clip_id();
    if let Some(notes) = copy.notes_mut() {
        for note in notes.iter_mut() {
            note.id = generate_note_id();
        }
    }
    copy
}

impl DawState {
    // ---------------------------------------------------------------
    // Project
    // ---------------------------------------------------------------

    pub fn set_project_name(&mut self, name: &str) {
        self.project.name = name.to_string();
        self.touch();
    }

    /// Set the tempo (clamped to 20-300 BPM)
    pub fn set_bpm(&mut self, bpm: f64) {
        self.project.bpm = clamp_bpm(bpm);
        self.touch();
    }

    pub fn set_musical_key(&mut self, key: &str) {
        self.project.musical_key = key.to_string();
        self.touch();
    }

    pub fn set_time_signature(&mut self, numerator: u8, denominator: u8) {
        self.project.time_signature = TimeSignature::new(numerator, denominator);
        self.touch();
    }

    // ---------------------------------------------------------------
    // Tracks
    // ---------------------------------------------------------------

    fn track_mut_or_err(&mut self, id: TrackId) -> CommandResult<&mut Track> {
        self.project
            .track_mut(id)
            .ok_or(CommandError::TrackNotFound(id))
    }

    /// Append a new empty track named "Track N"
    pub fn add_track(&mut self, track_type: TrackType) -> TrackId {
        let name = format!("Track {}", self.project.tracks.len() + 1);
        self.add_named_track(&name, track_type)
    }

    /// Append a new empty track with the given name
    pub fn add_named_track(&mut self, name: &str, track_type: TrackType) -> TrackId {
        let id = generate_track_id();
        let mut track = Track::new(id, name, track_type);
        track.color = TRACK_COLORS[self.project.tracks.len() % TRACK_COLORS.len()].to_string();
        self.project.tracks.push(Arc::new(track));
        self.touch();
        id
    }

    pub fn delete_track(&mut self, id: TrackId) -> CommandResult<()> {
        let index = self
            .project
            .track_index(id)
            .ok_or(CommandError::TrackNotFound(id))?;
        self.project.tracks.remove(index);
        if self.selected_track == Some(id) {
            self.selected_track = None;
        }
        self.touch();
        Ok(())
    }

    pub fn rename_track(&mut self, id: TrackId, name: &str) -> CommandResult<()> {
        self.track_mut_or_err(id)?.name = name.to_string();
        self.touch();
        Ok(())
    }

    /// Duplicate a track (with all its clips) right after the original
    pub fn duplicate_track(&mut self, id: TrackId) -> CommandResult<TrackId> {
        let index = self
            .project
            .track_index(id)
            .ok_or(CommandError::TrackNotFound(id))?;
        let source = &self.project.tracks[index];
        let mut copy = Track::clone(source);
        copy.id = generate_track_id();
        copy.name = format!("{} (copy)", source.name);
        copy.solo = false;
        copy.clips = source
            .clips
            .iter()
            .map(|c| Arc::new(clone_with_new_ids(c)))
            .collect();
        let new_id = copy.id;
        self.project.tracks.insert(index + 1, Arc::new(copy));
        self.touch();
        Ok(new_id)
    }

    /// Move a track to `new_index` (clamped to the track list)
    pub fn reorder_track(&mut self, id: TrackId, new_index: usize) -> CommandResult<()> {
        let index = self
            .project
            .track_index(id)
            .ok_or(CommandError::TrackNotFound(id))?;
        let track = self.project.tracks.remove(index);
        let new_index = new_index.min(self.project.tracks.len());
        self.project.tracks.insert(new_index, track);
        self.touch();
        Ok(())
    }

    /// Set track volume (0-100)
    pub fn set_track_volume(&mut self, id: TrackId, volume: f64) -> CommandResult<()> {
        self.track_mut_or_err(id)?.volume = clamp_volume(volume);
        self.touch();
        Ok(())
    }

    /// Set track pan (-100..100)
    pub fn set_track_pan(&mut self, id: TrackId, pan: f64) -> CommandResult<()> {
        self.track_mut_or_err(id)?.pan = clamp_pan(pan);
        self.touch();
        Ok(())
    }

    pub fn set_track_muted(&mut self, id: TrackId, muted: bool) -> CommandResult<()> {
        self.track_mut_or_err(id)?.muted = muted;
        self.touch();
        Ok(())
    }

    pub fn toggle_mute(&mut self, id: TrackId) -> CommandResult<bool> {
        let track = self.track_mut_or_err(id)?;
        track.muted = !track.muted;
        let muted = track.muted;
        self.touch();
        Ok(muted)
    }

    pub fn set_track_solo(&mut self, id: TrackId, solo: bool) -> CommandResult<()> {
        self.track_mut_or_err(id)?.solo = solo;
        self.touch();
        Ok(())
    }

    pub fn toggle_solo(&mut self, id: TrackId) -> CommandResult<bool> {
        let track = self.track_mut_or_err(id)?;
        track.solo = !track.solo;
        let solo = track.solo;
        self.touch();
        Ok(solo)
    }

    /// Replace the track's effect settings (each field clamped)
    pub fn set_track_effects(&mut self, id: TrackId, effects: TrackEffects) -> CommandResult<()> {
        self.track_mut_or_err(id)?.effects = effects.clamped();
        self.touch();
        Ok(())
    }

    /// Select the instrument preset used to voice the track's notes
    pub fn set_track_instrument(&mut self, id: TrackId, preset: &str) -> CommandResult<()> {
        self.track_mut_or_err(id)?.instrument = preset.to_string();
        self.touch();
        Ok(())
    }

    pub fn set_track_color(&mut self, id: TrackId, color: &str) -> CommandResult<()> {
        self.track_mut_or_err(id)?.color = color.to_string();
        self.touch();
        Ok(())
    }

    // ---------------------------------------------------------------
    // Volume automation
    // ---------------------------------------------------------------

    /// Replace a track's automation curve (sorted, deduplicated, clamped)
    pub fn set_volume_automation(
        &mut self,
        id: TrackId,
        mut points: Vec<AutomationPoint>,
    ) -> CommandResult<()> {
        normalize_automation(&mut points);
        self.track_mut_or_err(id)?.volume_automation = points;
        self.touch();
        Ok(())
    }

    /// Add a control point; an existing point at the same beat is replaced
    pub fn add_automation_point(&mut self, id: TrackId, beat: f64, value: f64) -> CommandResult<()> {
        let track = self.track_mut_or_err(id)?;
        track.volume_automation.push(AutomationPoint::new(beat, value));
        normalize_automation(&mut track.volume_automation);
        self.touch();
        Ok(())
    }

    /// Move the control point at `index`; out-of-range indices are ignored
    pub fn move_automation_point(
        &mut self,
        id: TrackId,
        index: usize,
        beat: f64,
        value: f64,
    ) -> CommandResult<()> {
        let track = self.track_mut_or_err(id)?;
        if index < track.volume_automation.len() {
            track.volume_automation.remove(index);
            track.volume_automation.push(AutomationPoint::new(beat, value));
            normalize_automation(&mut track.volume_automation);
            self.touch();
        }
        Ok(())
    }

    /// Remove the control point at `index`; out-of-range indices are ignored
    pub fn remove_automation_point(&mut self, id: TrackId, index: usize) -> CommandResult<()> {
        let track = self.track_mut_or_err(id)?;
        if index < track.volume_automation.len() {
            track.volume_automation.remove(index);
            self.touch();
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Clips
    // ---------------------------------------------------------------

    fn locate_clip(&self, clip_id: ClipId) -> CommandResult<(usize, usize)> {
        self.project
            .tracks
            .iter()
            .enumerate()
            .find_map(|(ti, track)| {
                track
                    .clips
                    .iter()
                    .position(|c| c.id == clip_id)
                    .map(|ci| (ti, ci))
            })
            .ok_or(CommandError::ClipNotFound(clip_id))
    }

    fn clip_mut_or_err(&mut self, clip_id: ClipId) -> CommandResult<&mut Clip> {
        let (ti, ci) = self.locate_clip(clip_id)?;
        let track = Arc::make_mut(&mut self.project.tracks[ti]);
        Ok(Arc::make_mut(&mut track.clips[ci]))
    }

    fn notes_mut_or_err(&mut self, clip_id: ClipId) -> CommandResult<&mut Vec<MidiNote>> {
        let (ti, ci) = self.locate_clip(clip_id)?;
        if self.project.tracks[ti].clips[ci].is_audio() {
            return Err(CommandError::NotMidiClip(clip_id));
        }
        let track = Arc::make_mut(&mut self.project.tracks[ti]);
        Arc::make_mut(&mut track.clips[ci])
            .notes_mut()
            .ok_or(CommandError::NotMidiClip(clip_id))
    }

    /// Insert a clip into a track, keeping clip order
    fn insert_clip(&mut self, track_id: TrackId, clip: Clip) -> CommandResult<ClipId> {
        let id = clip.id;
        self.track_mut_or_err(track_id)?.insert_clip(clip);
        self.touch();
        Ok(id)
    }

    /// Add an empty MIDI clip
    pub fn add_clip(
        &mut self,
        track_id: TrackId,
        name: &str,
        start_beat: f64,
        duration: f64,
    ) -> CommandResult<ClipId> {
        let clip = Clip::new_midi(generate_clip_id(), name, start_beat, duration);
        self.insert_clip(track_id, clip)
    }

    /// Add an audio clip referencing pooled audio
    pub fn add_audio_clip(
        &mut self,
        track_id: TrackId,
        name: &str,
        start_beat: f64,
        duration: f64,
        file_ref: &str,
    ) -> CommandResult<ClipId> {
        let clip = Clip::new_audio(generate_clip_id(), name, start_beat, duration, file_ref);
        self.insert_clip(track_id, clip)
    }

    /// Move a clip to `start_beat` (>= 0), optionally onto another track
    pub fn move_clip(
        &mut self,
        clip_id: ClipId,
        start_beat: f64,
        target_track: Option<TrackId>,
    ) -> CommandResult<()> {
        let (ti, _) = self.locate_clip(clip_id)?;
        let source_track = self.project.tracks[ti].id;
        let target = target_track.unwrap_or(source_track);
        if self.project.track(target).is_none() {
            return Err(CommandError::TrackNotFound(target));
        }

        let start_beat = clamp_beat(start_beat);
        if target == source_track {
            let track = Arc::make_mut(&mut self.project.tracks[ti]);
            if let Some(clip) = track.clip_mut(clip_id) {
                clip.start_beat = start_beat;
            }
            track.sort_clips();
        } else {
            let removed = Arc::make_mut(&mut self.project.tracks[ti]).remove_clip(clip_id);
            if let (Some(clip), Some(track)) = (removed, self.project.track_mut(target)) {
                let mut clip = Arc::unwrap_or_clone(clip);
                clip.start_beat = start_beat;
                track.insert_clip(clip);
            }
        }
        self.touch();
        Ok(())
    }

    /// Set a clip's length in beats (clamped to the minimum clip length)
    pub fn resize_clip(&mut self, clip_id: ClipId, duration: f64) -> CommandResult<()> {
        self.clip_mut_or_err(clip_id)?.duration = clamp_clip_duration(duration);
        self.touch();
        Ok(())
    }

    pub fn rename_clip(&mut self, clip_id: ClipId, name: &str) -> CommandResult<()> {
        self.clip_mut_or_err(clip_id)?.name = name.to_string();
        self.touch();
        Ok(())
    }

    /// Set the trim offset of an audio clip (beats, >= 0)
    pub fn set_audio_offset(&mut self, clip_id: ClipId, offset_beats: f64) -> CommandResult<()> {
        let clip = self.clip_mut_or_err(clip_id)?;
        if let ClipContent::Audio(audio) = &mut clip.content {
            audio.offset_beats = clamp_beat(offset_beats);
        }
        self.touch();
        Ok(())
    }

    pub fn delete_clip(&mut self, clip_id: ClipId) -> CommandResult<()> {
        let (ti, ci) = self.locate_clip(clip_id)?;
        Arc::make_mut(&mut self.project.tracks[ti]).clips.remove(ci);
        if self.selected_clip == Some(clip_id) {
            self.selected_clip = None;
        }
        self.touch();
        Ok(())
    }

    /// Copy a clip to the clip clipboard (does not modify the document)
    pub fn copy_clip(&mut self, clip_id: ClipId) -> CommandResult<()> {
        let (_, clip) = self
            .project
            .find_clip(clip_id)
            .ok_or(CommandError::ClipNotFound(clip_id))?;
        self.clip_clipboard = Some(clip.clone());
        Ok(())
    }

    /// Paste the clipboard clip onto a track at `start_beat`
    pub fn paste_clip(&mut self, track_id: TrackId, start_beat: f64) -> CommandResult<ClipId> {
        let source = self
            .clip_clipboard
            .as_ref()
            .ok_or(CommandError::EmptyClipboard)?;
        if self.project.track(track_id).is_none() {
            return Err(CommandError::TrackNotFound(track_id));
        }
        let mut clip = clone_with_new_ids(source);
        clip.start_beat = clamp_beat(start_beat);
        self.insert_clip(track_id, clip)
    }

    /// Duplicate a clip, placing the copy right after the original
    pub fn duplicate_clip(&mut self, clip_id: ClipId) -> CommandResult<ClipId> {
        let (track_id, clip) = self
            .project
            .find_clip(clip_id)
            .ok_or(CommandError::ClipNotFound(clip_id))?;
        let mut copy = clone_with_new_ids(clip);
        copy.start_beat = clip.end_beat();
        self.insert_clip(track_id, copy)
    }

    // ---------------------------------------------------------------
    // Notes
    // ---------------------------------------------------------------

    /// Add a note to a MIDI clip (every field clamped)
    pub fn add_note(
        &mut self,
        clip_id: ClipId,
        pitch: i32,
        start_beat: f64,
        duration: f64,
        velocity: i32,
    ) -> CommandResult<NoteId> {
        let note = MidiNote::new(generate_note_id(), pitch, start_beat, duration, velocity);
        self.notes_mut_or_err(clip_id)?.push(note);
        self.touch();
        Ok(note.id)
    }

    /// Shift notes by a beat/pitch delta
    ///
    /// Each note is clamped individually (start >= 0, pitch 0-127). Unknown
    /// note ids are ignored.
    pub fn move_notes(
        &mut self,
        clip_id: ClipId,
        note_ids: &[NoteId],
        delta_beats: f64,
        delta_pitch: i32,
    ) -> CommandResult<()> {
        let notes = self.notes_mut_or_err(clip_id)?;
        for note in notes.iter_mut().filter(|n| note_ids.contains(&n.id)) {
            note.start_beat = clamp_beat(note.start_beat + delta_beats);
            note.pitch = clamp_pitch(note.pitch as i32 + delta_pitch);
        }
        self.touch();
        Ok(())
    }

    /// Set the duration of a single note
    pub fn set_note_duration(
        &mut self,
        clip_id: ClipId,
        note_id: NoteId,
        duration: f64,
    ) -> CommandResult<()> {
        let notes = self.notes_mut_or_err(clip_id)?;
        if let Some(note) = notes.iter_mut().find(|n| n.id == note_id) {
            note.duration = clamp_note_duration(duration);
        }
        self.touch();
        Ok(())
    }

    /// Lengthen/shorten notes by a delta, never below `min_duration`
    pub fn resize_notes(
        &mut self,
        clip_id: ClipId,
        note_ids: &[NoteId],
        delta_beats: f64,
        min_duration: f64,
    ) -> CommandResult<()> {
        let notes = self.notes_mut_or_err(clip_id)?;
        for note in notes.iter_mut().filter(|n| note_ids.contains(&n.id)) {
            note.duration = clamp_note_duration((note.duration + delta_beats).max(min_duration));
        }
        self.touch();
        Ok(())
    }

    pub fn set_note_velocity(
        &mut self,
        clip_id: ClipId,
        note_id: NoteId,
        velocity: i32,
    ) -> CommandResult<()> {
        let notes = self.notes_mut_or_err(clip_id)?;
        if let Some(note) = notes.iter_mut().find(|n| n.id == note_id) {
            note.velocity = clamp_velocity(velocity);
        }
        self.touch();
        Ok(())
    }

    /// Remove notes from a clip; returns how many were removed
    pub fn delete_notes(&mut self, clip_id: ClipId, note_ids: &[NoteId]) -> CommandResult<usize> {
        let notes = self.notes_mut_or_err(clip_id)?;
        let before = notes.len();
        notes.retain(|n| !note_ids.contains(&n.id));
        let removed = before - notes.len();
        self.touch();
        Ok(removed)
    }

    /// Snap note starts to `grid` (all notes when `note_ids` is None)
    pub fn quantize_notes(
        &mut self,
        clip_id: ClipId,
        note_ids: Option<&[NoteId]>,
        grid: f64,
    ) -> CommandResult<()> {
        let notes = self.notes_mut_or_err(clip_id)?;
        for note in notes
            .iter_mut()
            .filter(|n| note_ids.is_none_or(|ids| ids.contains(&n.id)))
        {
            note.start_beat = clamp_beat(snap_to_grid(note.start_beat, grid));
        }
        self.touch();
        Ok(())
    }

    /// Copy notes to the note clipboard; returns how many were copied
    pub fn copy_notes(&mut self, clip_id: ClipId, note_ids: &[NoteId]) -> CommandResult<usize> {
        let (_, clip) = self
            .project
            .find_clip(clip_id)
            .ok_or(CommandError::ClipNotFound(clip_id))?;
        let mut copied: Vec<MidiNote> = clip
            .notes()
            .iter()
            .filter(|n| note_ids.contains(&n.id))
            .copied()
            .collect();
        let origin = copied
            .iter()
            .map(|n| n.start_beat)
            .fold(f64::INFINITY, f64::min);
        for note in &mut copied {
            note.start_beat -= origin;
        }
        let count = copied.len();
        if count > 0 {
            self.note_clipboard = copied;
        }
        Ok(count)
    }

    /// Paste the note clipboard into a clip at `at_beat` (clip-relative)
    pub fn paste_notes(&mut self, clip_id: ClipId, at_beat: f64) -> CommandResult<Vec<NoteId>> {
        if self.note_clipboard.is_empty() {
            return Err(CommandError::EmptyClipboard);
        }
        let pasted: Vec<MidiNote> = self
            .note_clipboard
            .iter()
            .map(|n| {
                MidiNote::new(
                    generate_note_id(),
                    n.pitch as i32,
                    at_beat + n.start_beat,
                    n.duration,
                    n.velocity as i32,
                )
            })
            .collect();
        let ids = pasted.iter().map(|n| n.id).collect();
        self.notes_mut_or_err(clip_id)?.extend(pasted);
        self.touch();
        Ok(ids)
    }

    // ---------------------------------------------------------------
    // Import
    // ---------------------------------------------------------------

    /// Import a Standard MIDI File as new instrument tracks
    ///
    /// Each MIDI track with notes becomes one track holding one clip at
    /// `at_beat`. The file is fully parsed before the document is touched,
    /// so a decode failure leaves the project unchanged.
    pub fn import_midi(&mut self, bytes: &[u8], at_beat: f64) -> CommandResult<Vec<TrackId>> {
        let import = parse_midi(bytes)?;
        let mut created = Vec::with_capacity(import.tracks.len());
        for imported in import.tracks {
            let mut clip = Clip::new_midi(
                generate_clip_id(),
                &imported.name,
                at_beat,
                imported.duration_beats,
            );
            if let Some(notes) = clip.notes_mut() {
                notes.extend(imported.notes.iter().map(|n| {
                    MidiNote::new(
                        generate_note_id(),
                        n.pitch as i32,
                        n.start_beat,
                        n.duration,
                        n.velocity as i32,
                    )
                }));
            }
            let track_id = self.add_named_track(&imported.name, TrackType::Instrument);
            self.insert_clip(track_id, clip)?;
            created.push(track_id);
        }
        log::info!("Imported {} MIDI track(s)", created.len());
        Ok(created)
    }

    /// Decode an audio file and place it as a clip
    ///
    /// When `track_id` is None a new audio track is created. The clip length
    /// is the decoded duration converted to beats at the project tempo.
    /// Decoding happens first; a failure leaves the project unchanged.
    pub fn import_audio(
        &mut self,
        track_id: Option<TrackId>,
        file_ref: &str,
        bytes: &[u8],
        extension: Option<&str>,
        start_beat: f64,
        sample_rate: u32,
    ) -> CommandResult<ClipId> {
        if let Some(id) = track_id {
            if self.project.track(id).is_none() {
                return Err(CommandError::TrackNotFound(id));
            }
        }
        let audio = decode_audio(bytes, extension, sample_rate)?;
        let duration_beats = Tempo::new(self.project.bpm).seconds_to_beats(audio.duration_seconds());
        let name = file_ref
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_ref)
            .to_string();
        self.insert_audio(file_ref, audio);

        let track_id = match track_id {
            Some(id) => id,
            None => self.add_named_track(&name, TrackType::Audio),
        };
        self.add_audio_clip(track_id, &name, start_beat, duration_beats, file_ref)
    }
}
