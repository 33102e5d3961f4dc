// Events - Converts the project timeline into absolute-time playback events
//
// Live playback and offline render both derive their event lists here, so a
// project sounds the same in both paths.

use crate::midi::event::MidiEvent;
use crate::project::types::{ClipContent, ClipId, Project, Track, TrackId, TrackType};
use crate::sequencer::automation::track_gain;
use crate::sequencer::timeline::Tempo;
use std::sync::Arc;

/// What happens at an event
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Midi(MidiEvent),
    /// Start streaming pooled audio; `source_offset` is seconds into the file
    AudioStart {
        clip: ClipId,
        file_ref: Arc<str>,
        source_offset: f64,
    },
    AudioStop {
        clip: ClipId,
    },
    /// Set the track's linear gain (volume x automation)
    SetGain(f32),
}

impl EventKind {
    /// Ordering among simultaneous events: releases before attacks so a
    /// note retriggered on the same pitch is not cut by its predecessor.
    fn priority(&self) -> u8 {
        match self {
            EventKind::Midi(MidiEvent::NoteOff { .. }) | EventKind::AudioStop { .. } => 0,
            EventKind::SetGain(_) => 1,
            EventKind::Midi(MidiEvent::NoteOn { .. }) | EventKind::AudioStart { .. } => 2,
        }
    }
}

/// An event at an absolute timeline position (seconds from beat 0)
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub time: f64,
    pub track: TrackId,
    pub kind: EventKind,
}

impl ScheduledEvent {
    /// Absolute sample index of the event at `sample_rate`
    pub fn sample_index(&self, sample_rate: f64) -> u64 {
        (self.time * sample_rate).round().max(0.0) as u64
    }
}

/// Sort events by time, releases first on ties (stable otherwise)
pub fn sort_events(events: &mut [ScheduledEvent]) {
    events.sort_by(|a, b| {
        a.time
            .total_cmp(&b.time)
            .then(a.kind.priority().cmp(&b.kind.priority()))
    });
}

/// Derive every note and audio event audible from `from_seconds` onwards
///
/// Solo/mute eligibility is applied. Material that has already ended before
/// `from_seconds` is skipped; material in progress at `from_seconds` starts
/// immediately (notes play their remaining part, audio clips start with the
/// elapsed time added to their trim offset). Notes starting at or after
/// their clip's end are not played; notes extending past the clip end play
/// in full.
pub fn derive_events(project: &Project, from_seconds: f64) -> Vec<ScheduledEvent> {
    let tempo = Tempo::new(project.bpm);
    let from_seconds = from_seconds.max(0.0);
    let mut events = Vec::new();

    for track in project.audible_tracks() {
        derive_track_events(track, &tempo, from_seconds, &mut events);
    }

    sort_events(&mut events);
    events
}

fn derive_track_events(
    track: &Track,
    tempo: &Tempo,
    from_seconds: f64,
    events: &mut Vec<ScheduledEvent>,
) {
    for clip in &track.clips {
        match &clip.content {
            ClipContent::Notes(notes) => {
                if track.track_type == TrackType::Audio {
                    continue;
                }
                for note in notes {
                    if note.start_beat >= clip.duration {
                        continue;
                    }
                    let start = tempo.beats_to_seconds(clip.start_beat + note.start_beat);
                    let end = tempo.beats_to_seconds(clip.start_beat + note.end_beat());
                    if end <= from_seconds {
                        continue;
                    }
                    events.push(ScheduledEvent {
                        time: start.max(from_seconds),
                        track: track.id,
                        kind: EventKind::Midi(MidiEvent::note_on(note.pitch, note.velocity)),
                    });
                    events.push(ScheduledEvent {
                        time: end,
                        track: track.id,
                        kind: EventKind::Midi(MidiEvent::NoteOff { note: note.pitch }),
                    });
                }
            }
            ClipContent::Audio(audio) => {
                let start = tempo.beats_to_seconds(clip.start_beat);
                let end = tempo.beats_to_seconds(clip.end_beat());
                if end <= from_seconds {
                    continue;
                }
                let trim = tempo.beats_to_seconds(audio.offset_beats);
                let elapsed = (from_seconds - start).max(0.0);
                events.push(ScheduledEvent {
                    time: start.max(from_seconds),
                    track: track.id,
                    kind: EventKind::AudioStart {
                        clip: clip.id,
                        file_ref: Arc::from(audio.file_ref.as_str()),
                        source_offset: trim + elapsed,
                    },
                });
                events.push(ScheduledEvent {
                    time: end,
                    track: track.id,
                    kind: EventKind::AudioStop { clip: clip.id },
                });
            }
        }
    }
}

/// Pre-sample every audible track's gain at a fixed period
///
/// Produces one `SetGain` event per track every `interval` seconds over
/// `[0, duration_seconds]`, used by offline render in place of the live
/// per-tick automation updates.
pub fn sample_automation(
    project: &Project,
    duration_seconds: f64,
    interval: f64,
) -> Vec<ScheduledEvent> {
    let tempo = Tempo::new(project.bpm);
    let interval = if interval > 0.0 { interval } else { 0.05 };
    let steps = (duration_seconds.max(0.0) / interval).ceil() as usize;
    let mut events = Vec::new();

    for track in project.audible_tracks() {
        for step in 0..=steps {
            let time = step as f64 * interval;
            let beat = tempo.seconds_to_beats(time);
            events.push(ScheduledEvent {
                time,
                track: track.id,
                kind: EventKind::SetGain(track_gain(track, beat) as f32),
            });
        }
    }
    events
}
