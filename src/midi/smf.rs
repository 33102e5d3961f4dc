// Standard MIDI File import
//
// Parses a .mid file into per-track note lists in beats. Only metrical
// (ticks-per-quarter) timing is supported; SMPTE timecode files are
// rejected. Note-on with velocity 0 is treated as note-off.

use crate::audio::decode::DecodeError;
use crate::project::types::MIN_NOTE_DURATION;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;

/// Clip length used when a track's notes end at beat 0
const DEFAULT_CLIP_BEATS: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportedNote {
    pub pitch: u8,
    /// Beats from the start of the clip
    pub start_beat: f64,
    pub duration: f64,
    pub velocity: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedTrack {
    pub name: String,
    /// Sorted by start
    pub notes: Vec<ImportedNote>,
    /// Whole beats covering every note
    pub duration_beats: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MidiImport {
    /// Tempo from the first tempo meta event, if any
    pub tempo_bpm: Option<f64>,
    /// Only tracks that contain notes
    pub tracks: Vec<ImportedTrack>,
}

/// Parse a Standard MIDI File held in memory
pub fn parse_midi(bytes: &[u8]) -> Result<MidiImport, DecodeError> {
    let smf = Smf::parse(bytes)?;
    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) if tpb.as_int() > 0 => tpb.as_int() as f64,
        Timing::Metrical(_) => {
            return Err(DecodeError::UnsupportedMidi(
                "zero ticks per quarter note".to_string(),
            ));
        }
        Timing::Timecode(..) => {
            return Err(DecodeError::UnsupportedMidi(
                "SMPTE timecode timing".to_string(),
            ));
        }
    };

    let mut tempo_bpm = None;
    let mut tracks = Vec::new();

    for (index, events) in smf.tracks.iter().enumerate() {
        let mut tick: u64 = 0;
        let mut name = None;
        // Open notes per (channel, key), oldest first
        let mut open: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();
        let mut spans: Vec<(u8, u64, u64, u8)> = Vec::new();

        for event in events {
            tick += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            open.entry((channel, key.as_int()))
                                .or_default()
                                .push((tick, vel.as_int()));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            let key = key.as_int();
                            if let Some(stack) = open.get_mut(&(channel, key)) {
                                if !stack.is_empty() {
                                    let (start, velocity) = stack.remove(0);
                                    spans.push((key, start, tick, velocity));
                                }
                            }
                        }
                        _ => {}
                    }
                }
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_beat)) => {
                    let us = us_per_beat.as_int();
                    if tempo_bpm.is_none() && us > 0 {
                        tempo_bpm = Some(60_000_000.0 / us as f64);
                    }
                }
                TrackEventKind::Meta(MetaMessage::TrackName(raw)) => {
                    let text = String::from_utf8_lossy(raw).trim().to_string();
                    if !text.is_empty() {
                        name = Some(text);
                    }
                }
                _ => {}
            }
        }

        // Notes never released end with the track
        for ((_, key), stack) in open {
            for (start, velocity) in stack {
                spans.push((key, start, tick, velocity));
            }
        }

        if spans.is_empty() {
            continue;
        }

        let first_tick = spans.iter().map(|s| s.1).min().unwrap_or(0);
        let mut notes: Vec<ImportedNote> = spans
            .into_iter()
            .map(|(pitch, start, end, velocity)| ImportedNote {
                pitch: pitch.min(127),
                start_beat: (start - first_tick) as f64 / ticks_per_beat,
                duration: ((end.saturating_sub(start)) as f64 / ticks_per_beat)
                    .max(MIN_NOTE_DURATION),
                velocity: velocity.clamp(1, 127),
            })
            .collect();
        notes.sort_by(|a, b| a.start_beat.total_cmp(&b.start_beat).then(a.pitch.cmp(&b.pitch)));

        let last_end = notes
            .iter()
            .map(|n| n.start_beat + n.duration)
            .fold(0.0_f64, f64::max);
        let duration_beats = if last_end > 0.0 {
            last_end.ceil()
        } else {
            DEFAULT_CLIP_BEATS
        };

        tracks.push(ImportedTrack {
            name: name.unwrap_or_else(|| format!("MIDI Track {}", index + 1)),
            notes,
            duration_beats,
        });
    }

    log::debug!(
        "Parsed MIDI file: {} track(s) with notes, tempo {:?}",
        tracks.len(),
        tempo_bpm
    );
    Ok(MidiImport { tempo_bpm, tracks })
}
