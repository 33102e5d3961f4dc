// Integration test: transport scheduler driving the live engine
//
// The scheduler and engine are wired exactly as in the application: through
// the lock-free command channel and the shared transport state. The engine is
// pulled block by block the way an audio callback would.

use std::sync::Arc;
use tracklab::audio::engine::{AudioEngine, EngineLink};
use tracklab::command::DawState;
use tracklab::messaging::create_command_channel;
use tracklab::project::types::{ClipId, TrackId, TrackType};
use tracklab::project::Project;
use tracklab::sequencer::{LoopRegion, SharedTransportState, TransportScheduler, TransportState};

const SAMPLE_RATE: u32 = 44100;
const BLOCK: usize = 512;

struct Rig {
    state: DawState,
    scheduler: TransportScheduler<EngineLink>,
    engine: AudioEngine,
    transport: Arc<SharedTransportState>,
}

impl Rig {
    fn new(state: DawState) -> Self {
        let transport = SharedTransportState::new(SAMPLE_RATE);
        let (tx, rx) = create_command_channel(64);
        Self {
            state,
            scheduler: TransportScheduler::new(EngineLink::new(tx), Arc::clone(&transport)),
            engine: AudioEngine::new(Arc::clone(&transport), rx, BLOCK),
            transport,
        }
    }

    /// Pull `blocks` audio blocks and return the peak level
    fn pull(&mut self, blocks: usize) -> f32 {
        let mut left = vec![0.0; BLOCK];
        let mut right = vec![0.0; BLOCK];
        let mut peak = 0.0_f32;
        for _ in 0..blocks {
            self.engine.process(&mut left, &mut right);
            for (l, r) in left.iter().zip(right.iter()) {
                peak = peak.max(l.abs()).max(r.abs());
            }
        }
        peak
    }
}

fn one_track_project() -> (DawState, TrackId, ClipId) {
    let mut state = DawState::new(Project::new("Playback"));
    let track = state.add_track(TrackType::Instrument);
    let clip = state.add_clip(track, "Clip", 0.0, 16.0).unwrap();
    state.add_note(clip, 57, 0.0, 16.0, 110).unwrap();
    (state, track, clip)
}

#[test]
fn test_playback_produces_audio_and_advances() {
    let (state, _, _) = one_track_project();
    let mut rig = Rig::new(state);
    rig.scheduler.play(&rig.state, 0.0);

    let peak = rig.pull(20);
    assert!(peak > 0.01, "expected audible output, peak {}", peak);
    assert_eq!(rig.transport.position_samples(), (20 * BLOCK) as u64);
}

#[test]
fn test_tempo_change_keeps_beat_position() {
    let (state, _, _) = one_track_project();
    let mut rig = Rig::new(state);
    rig.scheduler.play(&rig.state, 0.0);
    rig.pull(1);

    // Beat 4 at 120 bpm
    rig.transport.set_position_seconds(2.0);
    rig.state.set_bpm(90.0);
    rig.scheduler.tick(&rig.state);

    let seconds = rig.transport.position_seconds();
    assert!((seconds - 8.0 / 3.0).abs() < 1.0 / SAMPLE_RATE as f64, "{}", seconds);
    assert!((rig.scheduler.position_beats() - 4.0).abs() < 1e-3);
    assert!(rig.scheduler.is_playing());
}

#[test]
fn test_deleting_playing_clip_silences_track() {
    let (state, _, clip) = one_track_project();
    let mut rig = Rig::new(state);
    rig.scheduler.play(&rig.state, 0.0);
    assert!(rig.pull(10) > 0.01);

    rig.state.delete_clip(clip).unwrap();
    rig.scheduler.tick(&rig.state);
    assert_eq!(rig.pull(4), 0.0);
    assert!(rig.scheduler.is_playing());
}

#[test]
fn test_stop_drops_pending_events() {
    let (mut state, track, _) = one_track_project();
    let late = state.add_clip(track, "Late", 8.0, 4.0).unwrap();
    state.add_note(late, 64, 0.0, 1.0, 100).unwrap();

    let mut rig = Rig::new(state);
    rig.scheduler.play(&rig.state, 0.0);
    rig.pull(2);
    assert!(rig.engine.pending_events() > 0);

    rig.scheduler.stop();
    rig.pull(1);
    assert_eq!(rig.engine.pending_events(), 0);
    assert_eq!(rig.transport.position_samples(), 0);
    assert_eq!(rig.transport.state(), TransportState::Stopped);

    // A reschedule request after stop does nothing
    rig.scheduler.request_reschedule();
    rig.scheduler.tick(&rig.state);
    rig.pull(1);
    assert_eq!(rig.engine.pending_events(), 0);
    assert_eq!(rig.transport.position_samples(), 0);
}

#[test]
fn test_pause_and_resume_continue_from_cursor() {
    let (state, _, _) = one_track_project();
    let mut rig = Rig::new(state);
    rig.scheduler.play(&rig.state, 0.0);
    rig.pull(8);
    let paused_at = rig.transport.position_samples();

    rig.scheduler.pause();
    rig.pull(8);
    assert_eq!(rig.transport.position_samples(), paused_at);

    rig.scheduler.resume(&rig.state);
    rig.pull(2);
    assert_eq!(rig.transport.position_samples(), paused_at + (2 * BLOCK) as u64);
}

#[test]
fn test_loop_wraps_to_region_start() {
    let (state, _, _) = one_track_project();
    let mut rig = Rig::new(state);
    rig.scheduler.set_loop(true, LoopRegion::new(1.0, 2.0));
    rig.scheduler.play(&rig.state, 0.5);

    // Past beat 2 at 120 bpm
    rig.transport.set_position_seconds(1.01);
    rig.scheduler.tick(&rig.state);
    assert!((rig.scheduler.position_beats() - 1.0).abs() < 1e-3);
    assert!(rig.scheduler.is_playing());
}

#[test]
fn test_muted_track_is_silent() {
    let (mut state, track, _) = one_track_project();
    state.set_track_muted(track, true).unwrap();
    let mut rig = Rig::new(state);
    rig.scheduler.play(&rig.state, 0.0);
    assert_eq!(rig.pull(10), 0.0);
}
