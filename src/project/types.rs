// Types for the project document
//
// Tracks and clips are held behind `Arc` so that history snapshots share
// unchanged parts of the tree with the live document. Mutation goes through
// `Arc::make_mut` (copy-on-write).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::sequencer::timeline::{TimeSignature, clamp_bpm};

pub type TrackId = u64;
pub type ClipId = u64;
pub type NoteId = u64;

/// Shortest note the editor and importers will create (beats)
pub const MIN_NOTE_DURATION: f64 = 0.0625;
/// Shortest clip length (beats)
pub const MIN_CLIP_DURATION: f64 = 0.25;

/// Palette cycled through by newly created tracks
pub const TRACK_COLORS: [&str; 7] = [
    "#e74c3c", "#9b59b6", "#3498db", "#2ecc71", "#f1c40f", "#e67e22", "#1abc9c",
];

/// Finite-or-default helper used by every clamp below
fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

/// Clamp a track volume to [0, 100]
pub fn clamp_volume(volume: f64) -> f64 {
    finite_or(volume, 75.0).clamp(0.0, 100.0)
}

/// Clamp a track pan to [-100, 100]
pub fn clamp_pan(pan: f64) -> f64 {
    finite_or(pan, 0.0).clamp(-100.0, 100.0)
}

/// Clamp a beat position to be non-negative
pub fn clamp_beat(beat: f64) -> f64 {
    finite_or(beat, 0.0).max(0.0)
}

/// Clamp a MIDI pitch into 0..=127
pub fn clamp_pitch(pitch: i32) -> u8 {
    pitch.clamp(0, 127) as u8
}

/// Clamp a MIDI velocity into 1..=127
pub fn clamp_velocity(velocity: i32) -> u8 {
    velocity.clamp(1, 127) as u8
}

/// The whole document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    /// Tempo in BPM, kept within [20, 300]
    pub bpm: f64,
    #[serde(default)]
    pub time_signature: TimeSignature,
    #[serde(default = "default_key")]
    pub musical_key: String,
    #[serde(default)]
    pub tracks: Vec<Arc<Track>>,
}

fn default_key() -> String {
    "C".to_string()
}

impl Default for Project {
    fn default() -> Self {
        Self::new("Untitled Project")
    }
}

impl Project {
    /// Create an empty project at 120 BPM in 4/4
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bpm: 120.0,
            time_signature: TimeSignature::four_four(),
            musical_key: default_key(),
            tracks: Vec::new(),
        }
    }

    /// Find a track by id
    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id).map(Arc::as_ref)
    }

    /// Index of a track in the ordered track list
    pub fn track_index(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Mutable access to a track (copy-on-write)
    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .map(Arc::make_mut)
    }

    /// Locate a clip anywhere in the project
    ///
    /// # Returns
    /// The owning track id and the clip
    pub fn find_clip(&self, clip_id: ClipId) -> Option<(TrackId, &Clip)> {
        self.tracks.iter().find_map(|track| {
            track
                .clip(clip_id)
                .map(|clip| (track.id, clip))
        })
    }

    /// Whether any track is soloed
    pub fn any_solo(&self) -> bool {
        self.tracks.iter().any(|t| t.solo)
    }

    /// Whether a track takes part in playback/render
    ///
    /// When any track is soloed only soloed tracks are audible (solo
    /// overrides mute); otherwise every non-muted track is.
    pub fn is_audible(&self, track: &Track) -> bool {
        if self.any_solo() {
            track.solo
        } else {
            !track.muted
        }
    }

    /// Iterator over audible tracks, in track order
    pub fn audible_tracks(&self) -> impl Iterator<Item = &Track> {
        let any_solo = self.any_solo();
        self.tracks
            .iter()
            .map(Arc::as_ref)
            .filter(move |t| if any_solo { t.solo } else { !t.muted })
    }

    /// Latest clip end (beats) across non-muted tracks, or None if there is
    /// nothing to play
    pub fn content_end_beat(&self) -> Option<f64> {
        self.tracks
            .iter()
            .filter(|t| !t.muted)
            .flat_map(|t| t.clips.iter())
            .map(|c| c.end_beat())
            .fold(None, |acc: Option<f64>, end| Some(acc.map_or(end, |a| a.max(end))))
    }

    /// Highest id of any entity in the document (tracks, clips, notes)
    pub fn max_ids(&self) -> (TrackId, ClipId, NoteId) {
        let mut max = (0, 0, 0);
        for track in &self.tracks {
            max.0 = max.0.max(track.id);
            for clip in &track.clips {
                max.1 = max.1.max(clip.id);
                for note in clip.notes() {
                    max.2 = max.2.max(note.id);
                }
            }
        }
        max
    }

    /// Clamp every field to its domain and restore ordering invariants
    ///
    /// Used after deserialization; commands clamp at their own boundary.
    pub fn sanitize(&mut self) {
        self.bpm = clamp_bpm(self.bpm);
        self.time_signature = self.time_signature.sanitized();
        for track in &mut self.tracks {
            Arc::make_mut(track).sanitize();
        }
    }
}

/// Kind of track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Audio,
    #[default]
    Instrument,
    Drums,
}

/// Filter modes available as a track insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
}

/// Per-track effect settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackEffects {
    /// Reverb send level (0-100)
    pub reverb_mix: f64,
    /// Reverb decay time in seconds (0.1-10)
    pub reverb_decay: f64,
    /// Delay send level (0-100)
    pub delay_mix: f64,
    /// Delay time in seconds (0.01-1)
    pub delay_time: f64,
    /// Delay feedback in percent (0-90)
    pub delay_feedback: f64,
    /// Filter cutoff in Hz (20-20000)
    pub filter_freq: f64,
    pub filter_type: FilterType,
    pub filter_enabled: bool,
}

impl Default for TrackEffects {
    fn default() -> Self {
        Self {
            reverb_mix: 0.0,
            reverb_decay: 2.0,
            delay_mix: 0.0,
            delay_time: 0.25,
            delay_feedback: 30.0,
            filter_freq: 20000.0,
            filter_type: FilterType::Lowpass,
            filter_enabled: false,
        }
    }
}

impl TrackEffects {
    /// Copy with every numeric field clamped to its range
    pub fn clamped(self) -> Self {
        let d = Self::default();
        Self {
            reverb_mix: finite_or(self.reverb_mix, d.reverb_mix).clamp(0.0, 100.0),
            reverb_decay: finite_or(self.reverb_decay, d.reverb_decay).clamp(0.1, 10.0),
            delay_mix: finite_or(self.delay_mix, d.delay_mix).clamp(0.0, 100.0),
            delay_time: finite_or(self.delay_time, d.delay_time).clamp(0.01, 1.0),
            delay_feedback: finite_or(self.delay_feedback, d.delay_feedback).clamp(0.0, 90.0),
            filter_freq: finite_or(self.filter_freq, d.filter_freq).clamp(20.0, 20000.0),
            filter_type: self.filter_type,
            filter_enabled: self.filter_enabled,
        }
    }
}

/// One control point of a volume automation curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutomationPoint {
    pub beat: f64,
    /// Level in percent (0-100)
    pub value: f64,
}

impl AutomationPoint {
    /// Create a point with clamped beat and value
    pub fn new(beat: f64, value: f64) -> Self {
        Self {
            beat: clamp_beat(beat),
            value: finite_or(value, 100.0).clamp(0.0, 100.0),
        }
    }
}

/// Sort an automation curve by beat and drop duplicate beats (last wins)
pub fn normalize_automation(points: &mut Vec<AutomationPoint>) {
    for p in points.iter_mut() {
        *p = AutomationPoint::new(p.beat, p.value);
    }
    // Stable sort keeps insertion order among equal beats, so the last
    // duplicate is the most recently written one.
    points.sort_by(|a, b| a.beat.total_cmp(&b.beat));
    let mut out: Vec<AutomationPoint> = Vec::with_capacity(points.len());
    for p in points.drain(..) {
        match out.last_mut() {
            Some(last) if last.beat == p.beat => *last = p,
            _ => out.push(p),
        }
    }
    *points = out;
}

/// A track: an ordered lane of clips with mixer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    #[serde(rename = "type", default)]
    pub track_type: TrackType,
    /// Instrument preset id (ignored by audio tracks)
    #[serde(default = "default_instrument")]
    pub instrument: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub solo: bool,
    /// Volume in percent (0-100)
    #[serde(default = "default_volume")]
    pub volume: f64,
    /// Pan (-100 left .. 100 right)
    #[serde(default)]
    pub pan: f64,
    #[serde(default)]
    pub effects: TrackEffects,
    /// Sorted ascending by beat, unique beats
    #[serde(default)]
    pub volume_automation: Vec<AutomationPoint>,
    /// Sorted ascending by start beat
    #[serde(default)]
    pub clips: Vec<Arc<Clip>>,
}

fn default_instrument() -> String {
    "triangle".to_string()
}

fn default_color() -> String {
    TRACK_COLORS[0].to_string()
}

fn default_volume() -> f64 {
    75.0
}

impl Track {
    /// Create an empty track with default mixer settings
    pub fn new(id: TrackId, name: impl Into<String>, track_type: TrackType) -> Self {
        Self {
            id,
            name: name.into(),
            track_type,
            instrument: match track_type {
                TrackType::Drums => "membrane".to_string(),
                _ => default_instrument(),
            },
            color: default_color(),
            muted: false,
            solo: false,
            volume: default_volume(),
            pan: 0.0,
            effects: TrackEffects::default(),
            volume_automation: Vec::new(),
            clips: Vec::new(),
        }
    }

    /// Find a clip on this track
    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id).map(Arc::as_ref)
    }

    /// Mutable access to a clip (copy-on-write)
    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.clips
            .iter_mut()
            .find(|c| c.id == id)
            .map(Arc::make_mut)
    }

    /// Insert a clip keeping the lane ordered by start beat
    ///
    /// Clips with equal start keep insertion order.
    pub fn insert_clip(&mut self, clip: Clip) {
        let at = self
            .clips
            .partition_point(|c| c.start_beat <= clip.start_beat);
        self.clips.insert(at, Arc::new(clip));
    }

    /// Remove a clip, returning it if it was present
    pub fn remove_clip(&mut self, id: ClipId) -> Option<Arc<Clip>> {
        let index = self.clips.iter().position(|c| c.id == id)?;
        Some(self.clips.remove(index))
    }

    /// Restore start-beat ordering after a clip moved
    pub fn sort_clips(&mut self) {
        self.clips
            .sort_by(|a, b| a.start_beat.total_cmp(&b.start_beat));
    }

    /// Volume as a linear factor (0.0 - 1.0)
    pub fn volume_gain(&self) -> f64 {
        self.volume / 100.0
    }

    fn sanitize(&mut self) {
        self.volume = clamp_volume(self.volume);
        self.pan = clamp_pan(self.pan);
        self.effects = self.effects.clamped();
        normalize_automation(&mut self.volume_automation);
        for clip in &mut self.clips {
            Arc::make_mut(clip).sanitize();
        }
        self.sort_clips();
    }
}

/// Reference to decoded audio material used by an audio clip
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRef {
    /// Opaque key into the audio pool (file name, URL, ...)
    pub file_ref: String,
    /// Trim offset into the source, in beats
    pub offset_beats: f64,
}

/// What a clip plays
#[derive(Debug, Clone, PartialEq)]
pub enum ClipContent {
    Notes(Vec<MidiNote>),
    Audio(AudioRef),
}

/// A region on a track's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ClipRepr", into = "ClipRepr")]
pub struct Clip {
    pub id: ClipId,
    pub name: String,
    /// Absolute start on the timeline (beats, >= 0)
    pub start_beat: f64,
    /// Length in beats (> 0)
    pub duration: f64,
    pub content: ClipContent,
}

impl Clip {
    /// Create an empty MIDI clip
    pub fn new_midi(id: ClipId, name: impl Into<String>, start_beat: f64, duration: f64) -> Self {
        Self {
            id,
            name: name.into(),
            start_beat: clamp_beat(start_beat),
            duration: clamp_clip_duration(duration),
            content: ClipContent::Notes(Vec::new()),
        }
    }

    /// Create an audio clip referencing pooled audio
    pub fn new_audio(
        id: ClipId,
        name: impl Into<String>,
        start_beat: f64,
        duration: f64,
        file_ref: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            start_beat: clamp_beat(start_beat),
            duration: clamp_clip_duration(duration),
            content: ClipContent::Audio(AudioRef {
                file_ref: file_ref.into(),
                offset_beats: 0.0,
            }),
        }
    }

    /// End position on the timeline (beats)
    pub fn end_beat(&self) -> f64 {
        self.start_beat + self.duration
    }

    /// Notes of a MIDI clip (empty for audio clips)
    pub fn notes(&self) -> &[MidiNote] {
        match &self.content {
            ClipContent::Notes(notes) => notes,
            ClipContent::Audio(_) => &[],
        }
    }

    /// Mutable notes of a MIDI clip, None for audio clips
    pub fn notes_mut(&mut self) -> Option<&mut Vec<MidiNote>> {
        match &mut self.content {
            ClipContent::Notes(notes) => Some(notes),
            ClipContent::Audio(_) => None,
        }
    }

    /// Audio reference of an audio clip
    pub fn audio(&self) -> Option<&AudioRef> {
        match &self.content {
            ClipContent::Audio(audio) => Some(audio),
            ClipContent::Notes(_) => None,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self.content, ClipContent::Audio(_))
    }

    fn sanitize(&mut self) {
        self.start_beat = clamp_beat(self.start_beat);
        self.duration = clamp_clip_duration(self.duration);
        match &mut self.content {
            ClipContent::Notes(notes) => {
                for note in notes.iter_mut() {
                    note.sanitize();
                }
            }
            ClipContent::Audio(audio) => audio.offset_beats = clamp_beat(audio.offset_beats),
        }
    }
}

/// Clamp a clip length to the minimum clip duration
pub fn clamp_clip_duration(duration: f64) -> f64 {
    finite_or(duration, 4.0).max(MIN_CLIP_DURATION)
}

/// Clamp a note length to the minimum note duration
pub fn clamp_note_duration(duration: f64) -> f64 {
    finite_or(duration, 1.0).max(MIN_NOTE_DURATION)
}

/// A note inside a MIDI clip, positioned relative to the clip start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidiNote {
    pub id: NoteId,
    /// MIDI note number (0-127)
    pub pitch: u8,
    /// Start relative to the clip (beats, >= 0)
    pub start_beat: f64,
    /// Length in beats (> 0), may extend past the clip end
    pub duration: f64,
    /// MIDI velocity (1-127)
    pub velocity: u8,
}

impl MidiNote {
    /// Create a note with every field clamped to its domain
    pub fn new(id: NoteId, pitch: i32, start_beat: f64, duration: f64, velocity: i32) -> Self {
        Self {
            id,
            pitch: clamp_pitch(pitch),
            start_beat: clamp_beat(start_beat),
            duration: clamp_note_duration(duration),
            velocity: clamp_velocity(velocity),
        }
    }

    /// End position relative to the clip (beats)
    pub fn end_beat(&self) -> f64 {
        self.start_beat + self.duration
    }

    fn sanitize(&mut self) {
        *self = Self::new(
            self.id,
            self.pitch as i32,
            self.start_beat,
            self.duration,
            self.velocity as i32,
        );
    }
}

/// Flat wire representation of a clip (camelCase, optional audio fields)
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClipRepr {
    id: ClipId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    start_beat: f64,
    #[serde(default = "default_clip_duration")]
    duration: f64,
    #[serde(default)]
    notes: Vec<MidiNote>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio_file_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio_offset: Option<f64>,
}

fn default_clip_duration() -> f64 {
    4.0
}

impl From<ClipRepr> for Clip {
    fn from(repr: ClipRepr) -> Self {
        let content = match repr.audio_file_ref {
            Some(file_ref) => ClipContent::Audio(AudioRef {
                file_ref,
                offset_beats: repr.audio_offset.unwrap_or(0.0),
            }),
            None => ClipContent::Notes(repr.notes),
        };
        Self {
            id: repr.id,
            name: repr.name,
            start_beat: repr.start_beat,
            duration: repr.duration,
            content,
        }
    }
}

impl From<Clip> for ClipRepr {
    fn from(clip: Clip) -> Self {
        let (notes, audio_file_ref, audio_offset) = match clip.content {
            ClipContent::Notes(notes) => (notes, None, None),
            ClipContent::Audio(audio) => (Vec::new(), Some(audio.file_ref), Some(audio.offset_beats)),
        };
        Self {
            id: clip.id,
            name: clip.name,
            start_beat: clip.start_beat,
            duration: clip.duration,
            notes,
            audio_file_ref,
            audio_offset,
        }
    }
}
