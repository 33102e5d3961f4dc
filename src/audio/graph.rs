// Mix graph - Per-track signal chains summed to a stereo bus
//
// Chain per track:
//   source -> gain -> [filter] -> dry ---------------------> pan -> bus
//                                 dry -> reverb send -> reverb -> pan -> bus
//                                 dry -> delay send  -> delay  -> pan -> bus
//
// Sources are a polyphonic synth (instrument/drum tracks) and any number
// of audio clip players. The same graph renders live playback and offline
// export.

use crate::audio::decode::{AudioPool, DecodedAudio};
use crate::audio::dsp_utils::{OnePoleSmoother, equal_power_pan, flush_denormals_to_zero};
use crate::midi::event::MidiEvent;
use crate::project::types::{ClipId, Track, TrackEffects, TrackId, TrackType};
use crate::sequencer::events::{EventKind, ScheduledEvent};
use crate::synth::delay::{Delay, DelayParams};
use crate::synth::filter::{FilterParams, StateVariableFilter};
use crate::synth::instrument::InstrumentPatch;
use crate::synth::reverb::{Reverb, ReverbParams};
use crate::synth::voice_manager::VoiceManager;
use std::sync::Arc;

/// Gain smoothing time constant (avoids zipper noise on automation)
const GAIN_SMOOTHING_MS: f32 = 5.0;

/// Static description of one track's chain
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSetup {
    pub track: TrackId,
    pub track_type: TrackType,
    pub instrument: String,
    /// -1.0 (left) .. 1.0 (right)
    pub pan: f32,
    pub effects: TrackEffects,
    /// Linear gain at the start of playback
    pub initial_gain: f32,
}

impl TrackSetup {
    pub fn from_track(track: &Track, initial_gain: f32) -> Self {
        Self {
            track: track.id,
            track_type: track.track_type,
            instrument: track.instrument.clone(),
            pan: (track.pan / 100.0) as f32,
            effects: track.effects.clamped(),
            initial_gain,
        }
    }
}

/// Streams one audio clip from the pool
struct AudioPlayer {
    clip: ClipId,
    audio: Arc<DecodedAudio>,
    /// Read position in source frames
    position: f64,
    /// Source frames per output frame
    step: f64,
}

impl AudioPlayer {
    #[inline]
    fn next_frame(&mut self) -> Option<(f32, f32)> {
        if self.position >= self.audio.frames() as f64 {
            return None;
        }
        let frame = (
            self.audio.sample_at(0, self.position),
            self.audio.sample_at(1, self.position),
        );
        self.position += self.step;
        Some(frame)
    }
}

struct TrackStrip {
    track: TrackId,
    voices: Option<VoiceManager>,
    players: Vec<AudioPlayer>,
    gain_target: f32,
    gain: OnePoleSmoother,
    filters: Option<[StateVariableFilter; 2]>,
    reverb: Option<(Reverb, f32)>,
    delay: Option<(Delay, f32)>,
    pan_gains: (f32, f32),
}

impl TrackStrip {
    fn new(setup: &TrackSetup, sample_rate: f32) -> Self {
        let effects = &setup.effects;
        let voices = (setup.track_type != TrackType::Audio).then(|| {
            VoiceManager::with_patch(sample_rate, InstrumentPatch::for_preset(&setup.instrument))
        });

        let filters = effects.filter_enabled.then(|| {
            let params = FilterParams::new(effects.filter_freq as f32, effects.filter_type);
            [
                StateVariableFilter::new(params, sample_rate),
                StateVariableFilter::new(params, sample_rate),
            ]
        });

        let reverb = (effects.reverb_mix > 0.0).then(|| {
            let params = ReverbParams::new(effects.reverb_decay as f32, 0.5);
            (
                Reverb::new(params, sample_rate),
                (effects.reverb_mix / 100.0) as f32,
            )
        });

        let delay = (effects.delay_mix > 0.0).then(|| {
            let params = DelayParams::new(
                effects.delay_time as f32,
                (effects.delay_feedback / 100.0) as f32,
            );
            (
                Delay::new(params, sample_rate),
                (effects.delay_mix / 100.0) as f32,
            )
        });

        Self {
            track: setup.track,
            voices,
            players: Vec::new(),
            gain_target: setup.initial_gain,
            gain: OnePoleSmoother::new(setup.initial_gain, GAIN_SMOOTHING_MS, sample_rate),
            filters,
            reverb,
            delay,
            pan_gains: equal_power_pan(setup.pan),
        }
    }

    #[inline]
    fn next_frame(&mut self) -> (f32, f32) {
        let mut left = 0.0;
        let mut right = 0.0;

        if let Some(voices) = self.voices.as_mut() {
            let s = voices.next_sample();
            left += s;
            right += s;
        }

        let mut finished = false;
        for player in &mut self.players {
            match player.next_frame() {
                Some((l, r)) => {
                    left += l;
                    right += r;
                }
                None => finished = true,
            }
        }
        if finished {
            self.players
                .retain(|p| p.position < p.audio.frames() as f64);
        }

        let gain = self.gain.process(self.gain_target);
        left *= gain;
        right *= gain;

        if let Some([fl, fr]) = self.filters.as_mut() {
            left = fl.process(left);
            right = fr.process(right);
        }

        let mono = (left + right) * 0.5;
        let mut wet = 0.0;
        if let Some((reverb, send)) = self.reverb.as_mut() {
            wet += reverb.process(mono * *send);
        }
        if let Some((delay, send)) = self.delay.as_mut() {
            wet += delay.process(mono * *send);
        }

        let (pan_l, pan_r) = self.pan_gains;
        (
            flush_denormals_to_zero((left + wet) * pan_l),
            flush_denormals_to_zero((right + wet) * pan_r),
        )
    }
}

/// All track strips of a schedule, mixed to stereo
pub struct MixGraph {
    sample_rate: f32,
    strips: Vec<TrackStrip>,
    pool: Arc<AudioPool>,
}

impl MixGraph {
    /// Build one strip per track setup
    ///
    /// # Arguments
    /// * `sample_rate` - Output sample rate in Hz
    /// * `tracks` - Chains to build
    /// * `pool` - Decoded audio referenced by audio-start events
    pub fn new(sample_rate: f32, tracks: &[TrackSetup], pool: Arc<AudioPool>) -> Self {
        Self {
            sample_rate,
            strips: tracks
                .iter()
                .map(|setup| TrackStrip::new(setup, sample_rate))
                .collect(),
            pool,
        }
    }

    /// An empty graph that renders silence
    pub fn silent(sample_rate: f32) -> Self {
        Self::new(sample_rate, &[], Arc::new(AudioPool::new()))
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn track_count(&self) -> usize {
        self.strips.len()
    }

    fn strip_mut(&mut self, track: TrackId) -> Option<&mut TrackStrip> {
        self.strips.iter_mut().find(|s| s.track == track)
    }

    /// Apply one event to its track; events for unknown tracks are ignored
    pub fn handle(&mut self, track: TrackId, kind: &EventKind) {
        let sample_rate = self.sample_rate as f64;
        let audio = match kind {
            EventKind::AudioStart { file_ref, .. } => self.pool.get(file_ref.as_ref()).cloned(),
            _ => None,
        };
        let Some(strip) = self.strip_mut(track) else {
            return;
        };

        match kind {
            EventKind::Midi(MidiEvent::NoteOn { note, velocity }) => {
                if let Some(voices) = strip.voices.as_mut() {
                    voices.note_on(*note, *velocity);
                }
            }
            EventKind::Midi(MidiEvent::NoteOff { note }) => {
                if let Some(voices) = strip.voices.as_mut() {
                    voices.note_off(*note);
                }
            }
            EventKind::AudioStart {
                clip,
                file_ref,
                source_offset,
            } => {
                let Some(audio) = audio else {
                    log::warn!("Audio '{}' is not loaded; clip {} stays silent", file_ref, clip);
                    return;
                };
                strip.players.retain(|p| p.clip != *clip);
                let source_rate = audio.sample_rate as f64;
                strip.players.push(AudioPlayer {
                    clip: *clip,
                    position: source_offset.max(0.0) * source_rate,
                    step: source_rate / sample_rate,
                    audio,
                });
            }
            EventKind::AudioStop { clip } => {
                strip.players.retain(|p| p.clip != *clip);
            }
            EventKind::SetGain(gain) => {
                strip.gain_target = gain.max(0.0);
            }
        }
    }

    pub fn set_gain(&mut self, track: TrackId, gain: f32) {
        self.handle(track, &EventKind::SetGain(gain));
    }

    /// Release held notes and stop audio clips; effect tails keep ringing
    pub fn release_all(&mut self) {
        for strip in &mut self.strips {
            if let Some(voices) = strip.voices.as_mut() {
                voices.release_all();
            }
            strip.players.clear();
        }
    }

    /// Render the next `left.len()` frames into the buffers (overwrites)
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        for i in 0..frames {
            let mut l = 0.0;
            let mut r = 0.0;
            for strip in &mut self.strips {
                let (sl, sr) = strip.next_frame();
                l += sl;
                r += sr;
            }
            left[i] = l;
            right[i] = r;
        }
    }
}

/// Time-ordered events consumed block by block
///
/// Blocks are split at event positions so every event takes effect on its
/// exact sample.
pub struct EventQueue {
    events: Vec<ScheduledEvent>,
    next: usize,
    sample_rate: f64,
}

impl EventQueue {
    /// # Arguments
    /// * `events` - Events sorted by time (see `sort_events`)
    /// * `sample_rate` - Rate used to turn event times into sample indices
    pub fn new(events: Vec<ScheduledEvent>, sample_rate: f64) -> Self {
        Self {
            events,
            next: 0,
            sample_rate,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next >= self.events.len()
    }

    pub fn remaining(&self) -> usize {
        self.events.len() - self.next
    }

    /// Render one block that starts at absolute sample `block_start`
    ///
    /// Events scheduled before `block_start` (late) fire at the block's
    /// first sample.
    pub fn render_block(
        &mut self,
        graph: &mut MixGraph,
        block_start: u64,
        left: &mut [f32],
        right: &mut [f32],
    ) {
        let frames = left.len().min(right.len());
        let block_end = block_start + frames as u64;
        let mut cursor = 0usize;

        while let Some(event) = self.events.get(self.next) {
            let at = event.sample_index(self.sample_rate);
            if at >= block_end {
                break;
            }
            let offset = (at.saturating_sub(block_start) as usize).min(frames);
            if offset > cursor {
                graph.render(&mut left[cursor..offset], &mut right[cursor..offset]);
                cursor = offset;
            }
            graph.handle(event.track, &event.kind);
            self.next += 1;
        }

        if cursor < frames {
            graph.render(&mut left[cursor..frames], &mut right[cursor..frames]);
        }
    }
}
