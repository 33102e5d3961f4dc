// Transport scheduler - Drives live playback from the document
//
// Runs on the editing thread. Each `play` derives a complete schedule from
// the document and hands it to the audio host; `tick` (called once per UI
// frame or timer) coalesces edits into a single reschedule, handles tempo
// changes and looping, and pushes the automation gain for the true current
// beat.

use crate::audio::graph::TrackSetup;
use crate::command::DawState;
use crate::messaging::command::ScheduleBatch;
use crate::project::types::TrackId;
use crate::sequencer::automation::track_gain;
use crate::sequencer::events::derive_events;
use crate::sequencer::timeline::Tempo;
use crate::sequencer::transport::{SharedTransportState, TransportState};
use std::sync::Arc;

/// Where schedules go: the live engine, or a recorder in tests
pub trait AudioHost {
    /// Replace whatever is playing with `batch`
    fn load(&mut self, batch: ScheduleBatch);

    /// Apply a track gain immediately
    fn set_track_gain(&mut self, generation: u64, track: TrackId, gain: f32);

    /// Drop pending events and release voices; `generation` is the new current one
    fn cancel(&mut self, generation: u64);
}

/// Loop region in beats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopRegion {
    pub start_beat: f64,
    pub end_beat: f64,
}

impl LoopRegion {
    pub fn new(start_beat: f64, end_beat: f64) -> Self {
        Self {
            start_beat: start_beat.max(0.0),
            end_beat: end_beat.max(0.0),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.start_beat < self.end_beat
    }
}

impl Default for LoopRegion {
    fn default() -> Self {
        Self::new(0.0, 16.0)
    }
}

/// Re-express a position after a tempo change so the beat is preserved
///
/// # Returns
/// The new position in seconds: `seconds * old_bpm / new_bpm`
pub fn retime_position(seconds: f64, old_bpm: f64, new_bpm: f64) -> f64 {
    let beats = Tempo::new(old_bpm).seconds_to_beats(seconds);
    Tempo::new(new_bpm).beats_to_seconds(beats)
}

/// Build the schedule for playing `state` from `from_seconds`
///
/// Every track gets a strip; tracks that are not audible start at zero gain
/// and have no events.
pub fn build_schedule(state: &DawState, from_seconds: f64, generation: u64) -> ScheduleBatch {
    let project = state.project();
    let from_beat = Tempo::new(project.bpm).seconds_to_beats(from_seconds);
    let tracks = project
        .tracks
        .iter()
        .map(|track| {
            let gain = if project.is_audible(track) {
                track_gain(track, from_beat) as f32
            } else {
                0.0
            };
            TrackSetup::from_track(track, gain)
        })
        .collect();

    ScheduleBatch {
        generation,
        origin_seconds: from_seconds,
        events: derive_events(project, from_seconds),
        tracks,
        pool: Arc::clone(state.audio_pool()),
    }
}

pub struct TransportScheduler<H: AudioHost> {
    host: H,
    transport: Arc<SharedTransportState>,
    /// Position while stopped or paused (seconds)
    cursor_seconds: f64,
    /// Tempo the current schedule was built with
    bpm: f64,
    loop_enabled: bool,
    loop_region: LoopRegion,
    /// Document revision the current schedule reflects
    last_revision: u64,
    reschedule_pending: bool,
    reschedule_count: u64,
}

impl<H: AudioHost> TransportScheduler<H> {
    pub fn new(host: H, transport: Arc<SharedTransportState>) -> Self {
        Self {
            host,
            transport,
            cursor_seconds: 0.0,
            bpm: 120.0,
            loop_enabled: false,
            loop_region: LoopRegion::default(),
            last_revision: 0,
            reschedule_pending: false,
            reschedule_count: 0,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn transport(&self) -> &Arc<SharedTransportState> {
        &self.transport
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    /// Current position in seconds
    pub fn position_seconds(&self) -> f64 {
        if self.is_playing() {
            self.transport.position_seconds()
        } else {
            self.cursor_seconds
        }
    }

    /// Current position in beats at the schedule's tempo
    pub fn position_beats(&self) -> f64 {
        Tempo::new(self.bpm).seconds_to_beats(self.position_seconds())
    }

    /// Number of schedules built since creation (initial plays included)
    pub fn reschedule_count(&self) -> u64 {
        self.reschedule_count
    }

    pub fn set_loop(&mut self, enabled: bool, region: LoopRegion) {
        self.loop_enabled = enabled;
        self.loop_region = region;
    }

    pub fn loop_enabled(&self) -> bool {
        self.loop_enabled
    }

    pub fn loop_region(&self) -> LoopRegion {
        self.loop_region
    }

    fn start(&mut self, state: &DawState, from_seconds: f64) {
        let from_seconds = from_seconds.max(0.0);
        let generation = self.transport.bump_generation();
        self.transport.set_position_seconds(from_seconds);
        let batch = build_schedule(state, from_seconds, generation);
        log::debug!(
            "Scheduling {} events from {:.3}s (generation {})",
            batch.events.len(),
            from_seconds,
            generation
        );
        self.host.load(batch);
        self.transport.set_state(TransportState::Playing);

        self.cursor_seconds = from_seconds;
        self.bpm = state.project().bpm;
        self.last_revision = state.revision();
        self.reschedule_pending = false;
        self.reschedule_count += 1;
    }

    /// Cancel everything in flight and release voices
    fn halt(&mut self, next_state: TransportState) {
        let generation = self.transport.bump_generation();
        self.host.cancel(generation);
        self.transport.set_state(next_state);
    }

    /// Start playback at `from_seconds`
    pub fn play(&mut self, state: &DawState, from_seconds: f64) {
        log::info!("Transport: play from {:.3}s", from_seconds.max(0.0));
        self.start(state, from_seconds);
    }

    /// Start playback from the cursor
    pub fn resume(&mut self, state: &DawState) {
        let from = self.cursor_seconds;
        self.play(state, from);
    }

    /// Stop playback and keep the cursor
    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.cursor_seconds = self.transport.position_seconds();
        self.halt(TransportState::Paused);
        log::info!("Transport: paused at {:.3}s", self.cursor_seconds);
    }

    /// Stop playback and return the cursor to zero
    pub fn stop(&mut self) {
        self.halt(TransportState::Stopped);
        self.cursor_seconds = 0.0;
        self.transport.set_position_seconds(0.0);
        self.reschedule_pending = false;
        log::info!("Transport: stopped");
    }

    pub fn toggle_play(&mut self, state: &DawState) {
        if self.is_playing() {
            self.pause();
        } else {
            self.resume(state);
        }
    }

    /// Move the cursor; rebuilds the schedule when playing
    pub fn seek(&mut self, state: &DawState, seconds: f64) {
        let seconds = seconds.max(0.0);
        if self.is_playing() {
            self.start(state, seconds);
        } else {
            self.cursor_seconds = seconds;
            self.transport.set_position_seconds(seconds);
        }
    }

    pub fn rewind(&mut self, state: &DawState) {
        self.seek(state, 0.0);
    }

    /// Ask for a rebuild at the next tick; ignored unless playing
    pub fn request_reschedule(&mut self) {
        if self.is_playing() {
            self.reschedule_pending = true;
        }
    }

    /// Periodic update
    ///
    /// Order: tempo change, document edits (coalesced), loop wrap, then
    /// per-track automation gains at the current beat.
    pub fn tick(&mut self, state: &DawState) {
        let bpm = state.project().bpm;

        if !self.is_playing() {
            if (bpm - self.bpm).abs() > f64::EPSILON {
                self.cursor_seconds = retime_position(self.cursor_seconds, self.bpm, bpm);
                self.transport.set_position_seconds(self.cursor_seconds);
                self.bpm = bpm;
            }
            self.last_revision = state.revision();
            return;
        }

        if (bpm - self.bpm).abs() > f64::EPSILON {
            let now = self.transport.position_seconds();
            let retimed = retime_position(now, self.bpm, bpm);
            log::debug!("Tempo {} -> {}: {:.3}s -> {:.3}s", self.bpm, bpm, now, retimed);
            self.start(state, retimed);
        } else if self.reschedule_pending || state.revision() != self.last_revision {
            let now = self.transport.position_seconds();
            self.start(state, now);
        }

        if self.loop_enabled && self.loop_region.is_valid() {
            let tempo = Tempo::new(bpm);
            let beat = tempo.seconds_to_beats(self.transport.position_seconds());
            if beat >= self.loop_region.end_beat {
                self.halt(TransportState::Stopped);
                self.start(state, tempo.beats_to_seconds(self.loop_region.start_beat));
            }
        }

        self.apply_automation(state);
    }

    fn apply_automation(&mut self, state: &DawState) {
        let project = state.project();
        let beat = Tempo::new(project.bpm).seconds_to_beats(self.transport.position_seconds());
        let generation = self.transport.generation();
        for track in &project.tracks {
            let gain = if project.is_audible(track) {
                track_gain(track, beat) as f32
            } else {
                0.0
            };
            self.host.set_track_gain(generation, track.id, gain);
        }
    }
}
