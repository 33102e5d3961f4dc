// Integration test: undo/redo over randomized edit sequences
//
// Every edit is wrapped with a snapshot; undoing all of them must restore
// the initial document exactly, and redoing all must restore the final one.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracklab::command::{DawState, HistoryManager};
use tracklab::project::types::{AutomationPoint, ClipId, TrackId, TrackType};
use tracklab::project::Project;

/// Apply one random edit, recording a snapshot first
fn random_edit(
    rng: &mut StdRng,
    state: &mut DawState,
    history: &mut HistoryManager,
    tracks: &mut Vec<TrackId>,
    clips: &mut Vec<ClipId>,
) {
    let choice = if tracks.is_empty() { 0 } else { rng.gen_range(0..7) };
    match choice {
        0 => {
            history.push_snapshot(state, "Add Track");
            tracks.push(state.add_track(TrackType::Instrument));
        }
        1 => {
            let track = tracks[rng.gen_range(0..tracks.len())];
            history.push_snapshot(state, "Add Clip");
            let start = rng.gen_range(0..16) as f64;
            if let Ok(clip) = state.add_clip(track, "Clip", start, 4.0) {
                clips.push(clip);
            }
        }
        2 if !clips.is_empty() => {
            let clip = clips[rng.gen_range(0..clips.len())];
            history.push_snapshot(state, "Add Note");
            let _ = state.add_note(
                clip,
                rng.gen_range(36..84),
                rng.gen_range(0..16) as f64 * 0.25,
                0.5,
                rng.gen_range(1..128),
            );
        }
        3 => {
            let track = tracks[rng.gen_range(0..tracks.len())];
            history.push_snapshot(state, "Set Volume");
            let _ = state.set_track_volume(track, rng.gen_range(0.0..100.0));
        }
        4 => {
            let track = tracks[rng.gen_range(0..tracks.len())];
            history.push_snapshot(state, "Edit Automation");
            let points = (0..4)
                .map(|i| AutomationPoint::new(i as f64 * 2.0, rng.gen_range(0.0..100.0)))
                .collect();
            let _ = state.set_volume_automation(track, points);
        }
        5 => {
            history.push_snapshot(state, "Change Tempo");
            state.set_bpm(rng.gen_range(60.0..180.0));
        }
        _ => {
            let track = tracks[rng.gen_range(0..tracks.len())];
            history.push_snapshot(state, "Toggle Mute");
            let _ = state.toggle_mute(track);
        }
    }
}

#[test]
fn test_undo_all_then_redo_all_restores_exactly() {
    for seed in 0..8 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = DawState::new(Project::new("Roundtrip"));
        let mut history = HistoryManager::new();
        let initial = state.project().clone();
        let mut tracks = Vec::new();
        let mut clips = Vec::new();

        let steps = 40;
        for _ in 0..steps {
            random_edit(&mut rng, &mut state, &mut history, &mut tracks, &mut clips);
        }
        let final_project = state.project().clone();

        for _ in 0..steps {
            history.undo(&mut state).unwrap();
        }
        assert_eq!(state.project(), &initial, "seed {}", seed);
        assert!(!history.can_undo());

        for _ in 0..steps {
            history.redo(&mut state).unwrap();
        }
        assert_eq!(state.project(), &final_project, "seed {}", seed);
        assert!(!history.can_redo());
    }
}

#[test]
fn test_capacity_drops_oldest() {
    let mut state = DawState::default();
    let mut history = HistoryManager::new();
    for i in 0..130 {
        history.push_snapshot(&state, format!("Rename {}", i));
        state.set_project_name(&format!("Name {}", i));
    }
    assert_eq!(history.undo_count(), 100);

    let mut undone = 0;
    while history.undo(&mut state).is_ok() {
        undone += 1;
    }
    assert_eq!(undone, 100);
    // The oldest 30 states were discarded
    assert_eq!(state.project().name, "Name 29");
}

#[test]
fn test_jump_to_and_new_edit_discards_redo() {
    let mut state = DawState::default();
    let mut history = HistoryManager::new();
    for bpm in [100.0, 110.0, 120.0, 130.0] {
        history.push_snapshot(&state, "Change Tempo");
        state.set_bpm(bpm);
    }

    history.jump_to(2, &mut state).unwrap();
    assert_eq!(state.project().bpm, 110.0);
    let list = history.history_list();
    assert_eq!(list.len(), 5);
    assert!(list[2].current);

    history.jump_to(4, &mut state).unwrap();
    assert_eq!(state.project().bpm, 130.0);

    history.jump_to(1, &mut state).unwrap();
    history.push_snapshot(&state, "Change Tempo");
    state.set_bpm(90.0);
    assert!(!history.can_redo());
    assert_eq!(history.history_list().len(), 3);
    assert!(history.jump_to(7, &mut state).is_err());
}

#[test]
fn test_version_changes_on_every_move() {
    let mut state = DawState::default();
    let mut history = HistoryManager::new();
    let v0 = history.version();
    history.push_snapshot(&state, "Change Tempo");
    state.set_bpm(140.0);
    let v1 = history.version();
    history.undo(&mut state).unwrap();
    let v2 = history.version();
    history.redo(&mut state).unwrap();
    let v3 = history.version();
    assert!(v0 < v1 && v1 < v2 && v2 < v3);
}
