// Integration test: offline render and file export
//
// Renders small projects end to end and checks length, solo/mute handling,
// automation and the written WAV file.

use tempfile::tempdir;
use tracklab::audio::export::{
    AudioExporter, CancelToken, ExportError, ExportFormat, OfflineRenderer, RenderedAudio,
    render_duration_seconds,
};
use tracklab::command::DawState;
use tracklab::config::{ExportSettings, RenderSettings};
use tracklab::project::types::{AutomationPoint, TrackId, TrackType};

const SAMPLE_RATE: u32 = 44100;

fn renderer() -> OfflineRenderer {
    OfflineRenderer::new(SAMPLE_RATE, RenderSettings::default())
}

fn render(state: &DawState) -> RenderedAudio {
    renderer()
        .render_state(state, &CancelToken::new(), None)
        .unwrap()
}

fn add_note_track(state: &mut DawState, pitch: i32, start: f64, length: f64) -> TrackId {
    let track = state.add_track(TrackType::Instrument);
    let clip = state.add_clip(track, "Clip", start, length).unwrap();
    state.add_note(clip, pitch, 0.0, length, 100).unwrap();
    track
}

/// Peak of both channels inside a time window
fn window_peak(audio: &RenderedAudio, from_seconds: f64, to_seconds: f64) -> f32 {
    let rate = audio.sample_rate as f64;
    let from = (from_seconds * rate) as usize;
    let to = ((to_seconds * rate) as usize).min(audio.frames());
    audio.left[from..to]
        .iter()
        .chain(audio.right[from..to].iter())
        .fold(0.0_f32, |p, s| p.max(s.abs()))
}

#[test]
fn test_single_note_render_covers_content_and_tail() {
    let mut state = DawState::default();
    // 4 beats at 120 bpm = 2 s of content
    add_note_track(&mut state, 60, 0.0, 4.0);

    let audio = render(&state);
    // 2 s + 2 tail beats (1 s)
    assert!(audio.duration_seconds() >= 3.0);
    assert!(audio.duration_seconds() < 3.0 + 1.0 / SAMPLE_RATE as f64 * 2.0);
    assert!(window_peak(&audio, 0.1, 1.9) > 0.01);
    assert!(audio.peak() <= 1.5);
}

#[test]
fn test_duration_ignores_muted_tracks() {
    let mut state = DawState::default();
    add_note_track(&mut state, 60, 0.0, 4.0);
    let long = add_note_track(&mut state, 48, 0.0, 32.0);
    state.set_track_muted(long, true).unwrap();

    let seconds = render_duration_seconds(state.project(), 2.0).unwrap();
    assert!((seconds - 3.0).abs() < 1e-9);
}

#[test]
fn test_solo_silences_other_tracks() {
    let mut state = DawState::default();
    let early = add_note_track(&mut state, 60, 0.0, 2.0);
    add_note_track(&mut state, 72, 4.0, 2.0);
    state.set_track_solo(early, true).unwrap();

    let audio = render(&state);
    assert!(window_peak(&audio, 0.1, 0.9) > 0.01);
    // The second track (beats 4-6 = 2 s - 3 s) is not soloed
    assert!(window_peak(&audio, 2.3, 2.9) < 1e-4);

    state.set_track_solo(early, false).unwrap();
    let unsoloed = render(&state);
    assert!(window_peak(&unsoloed, 2.3, 2.9) > 0.01);
}

#[test]
fn test_automation_silences_second_half() {
    let mut state = DawState::default();
    let track = add_note_track(&mut state, 60, 0.0, 8.0);
    state
        .set_volume_automation(
            track,
            vec![
                AutomationPoint::new(0.0, 100.0),
                AutomationPoint::new(4.0, 100.0),
                AutomationPoint::new(4.5, 0.0),
            ],
        )
        .unwrap();

    let audio = render(&state);
    assert!(window_peak(&audio, 0.5, 1.9) > 0.01);
    assert!(window_peak(&audio, 2.6, 3.9) < 1e-4);
}

#[test]
fn test_empty_project_is_an_error() {
    let state = DawState::default();
    assert!(matches!(
        renderer().render_state(&state, &CancelToken::new(), None),
        Err(ExportError::EmptyProject)
    ));
}

#[test]
fn test_render_runs_off_thread() {
    let mut state = DawState::default();
    add_note_track(&mut state, 64, 0.0, 2.0);
    let project = state.project().clone();
    let pool = std::sync::Arc::clone(state.audio_pool());

    let handle = std::thread::spawn(move || {
        renderer().render(&project, pool, &CancelToken::new(), None)
    });
    let audio = handle.join().unwrap().unwrap();
    assert!(audio.peak() > 0.01);
}

#[test]
fn test_wav_file_layout() {
    let mut state = DawState::default();
    add_note_track(&mut state, 60, 0.0, 1.0);

    let dir = tempdir().unwrap();
    let path = dir.path().join("mix.wav");
    let exporter = AudioExporter::new(renderer(), ExportSettings::default());
    let outcome = exporter
        .export(&state, &path, ExportFormat::Wav, &CancelToken::new(), None)
        .unwrap();
    assert_eq!(outcome.path, path);

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(&bytes[12..16], b"fmt ");
    assert_eq!(&bytes[36..40], b"data");
    let data_len = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]) as usize;
    assert_eq!(bytes.len(), 44 + data_len);

    // 1.5 s of 16-bit stereo
    let frames = (1.5 * SAMPLE_RATE as f64).ceil() as usize;
    assert_eq!(data_len, frames * 4);

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().channels, 2);
    assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    assert_eq!(reader.spec().bits_per_sample, 16);
}
