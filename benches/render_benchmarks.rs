use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use tracklab::MidiEvent;
use tracklab::audio::decode::AudioPool;
use tracklab::audio::export::{CancelToken, OfflineRenderer};
use tracklab::audio::graph::{MixGraph, TrackSetup};
use tracklab::command::DawState;
use tracklab::config::RenderSettings;
use tracklab::project::types::{Track, TrackType};
use tracklab::sequencer::{EventKind, derive_events};
use tracklab::synth::voice_manager::VoiceManager;

const SAMPLE_RATE: u32 = 44100;
const BLOCK: usize = 512;

/// `tracks` instrument tracks, each playing `bars` bars of eighth notes
fn busy_project(tracks: usize, bars: usize) -> DawState {
    let mut state = DawState::default();
    for t in 0..tracks {
        let track = state.add_track(TrackType::Instrument);
        let clip = match state.add_clip(track, "Pattern", 0.0, bars as f64 * 4.0) {
            Ok(clip) => clip,
            Err(_) => continue,
        };
        for step in 0..bars * 8 {
            let pitch = 48 + ((step * 5 + t * 7) % 24) as i32;
            let _ = state.add_note(clip, pitch, step as f64 * 0.5, 0.45, 100);
        }
    }
    state
}

/// Full offline render of a short project (the export path)
fn bench_offline_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("offline_render");
    group.sample_size(10);

    for tracks in [1, 4, 8] {
        let state = busy_project(tracks, 2);
        let renderer = OfflineRenderer::new(SAMPLE_RATE, RenderSettings::default());

        group.bench_with_input(BenchmarkId::from_parameter(tracks), &tracks, |b, _| {
            b.iter(|| {
                let audio = renderer
                    .render_state(black_box(&state), &CancelToken::new(), None)
                    .ok();
                black_box(audio);
            });
        });
    }
    group.finish();
}

/// One engine block with every track sounding a chord
fn bench_mix_graph_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("mix_graph_block");

    for tracks in [1, 4, 16] {
        let setups: Vec<TrackSetup> = (0..tracks as u64)
            .map(|id| {
                let mut track = Track::new(id + 1, "Synth", TrackType::Instrument);
                track.effects.reverb_mix = 30.0;
                TrackSetup::from_track(&track, 0.8)
            })
            .collect();
        let mut graph = MixGraph::new(SAMPLE_RATE as f32, &setups, Arc::new(AudioPool::new()));
        for setup in &setups {
            for note in [60, 64, 67] {
                graph.handle(setup.track, &EventKind::Midi(MidiEvent::note_on(note, 100)));
            }
        }

        let mut left = vec![0.0; BLOCK];
        let mut right = vec![0.0; BLOCK];
        group.bench_with_input(BenchmarkId::from_parameter(tracks), &tracks, |b, _| {
            b.iter(|| {
                graph.render(&mut left, &mut right);
                black_box(left[0]);
            });
        });
    }
    group.finish();
}

/// Polyphonic voice allocation and rendering
fn bench_voice_manager(c: &mut Criterion) {
    let mut group = c.benchmark_group("voice_manager");

    for polyphony in [1, 4, 8, 16] {
        let mut vm = VoiceManager::new(SAMPLE_RATE as f32);
        for i in 0..polyphony {
            vm.note_on(48 + i as u8, 100);
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(polyphony),
            &polyphony,
            |b, _| {
                b.iter(|| {
                    for _ in 0..BLOCK {
                        black_box(vm.next_sample());
                    }
                });
            },
        );
    }
    group.finish();
}

/// Event derivation from the document (runs on every reschedule)
fn bench_derive_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive_events");

    for tracks in [4, 16] {
        let state = busy_project(tracks, 16);
        group.bench_with_input(BenchmarkId::from_parameter(tracks), &tracks, |b, _| {
            b.iter(|| black_box(derive_events(black_box(state.project()), 0.0)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_offline_render,
    bench_mix_graph_block,
    bench_voice_manager,
    bench_derive_events
);
criterion_main!(benches);
