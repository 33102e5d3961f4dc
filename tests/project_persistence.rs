// Integration test: saving and reopening projects
//
// Files are written to a temporary directory through the workstation and read
// back, checking the on-disk field names as well as what a reload restores.

use serde_json::Value;
use tempfile::tempdir;
use tracklab::config::DawConfig;
use tracklab::editor::Workstation;
use tracklab::messaging::command::ScheduleBatch;
use tracklab::project::ProjectError;
use tracklab::project::types::{AutomationPoint, ClipContent, TrackId, TrackType};
use tracklab::sequencer::{AudioHost, SharedTransportState};

struct SilentHost;

impl AudioHost for SilentHost {
    fn load(&mut self, _batch: ScheduleBatch) {}

    fn set_track_gain(&mut self, _generation: u64, _track: TrackId, _gain: f32) {}

    fn cancel(&mut self, _generation: u64) {}
}

fn workstation() -> Workstation<SilentHost> {
    Workstation::new(
        DawConfig::default(),
        SilentHost,
        SharedTransportState::new(44100),
    )
}

/// A project with one instrument track and one audio track
fn populated() -> Workstation<SilentHost> {
    let mut ws = workstation();
    ws.perform("Rename Project", |s| {
        s.set_project_name("Saved Song");
        s.set_bpm(96.0);
        Ok(())
    })
    .unwrap();
    let keys = ws
        .perform("Add Track", |s| Ok(s.add_track(TrackType::Instrument)))
        .unwrap();
    ws.perform("Add Clip", |s| {
        let clip = s.add_clip(keys, "Chords", 4.0, 8.0)?;
        s.add_note(clip, 64, 0.5, 1.5, 90)?;
        s.set_volume_automation(
            keys,
            vec![AutomationPoint::new(0.0, 80.0), AutomationPoint::new(8.0, 20.0)],
        )
    })
    .unwrap();
    let drums = ws
        .perform("Add Track", |s| Ok(s.add_track(TrackType::Audio)))
        .unwrap();
    ws.perform("Add Clip", |s| {
        s.add_audio_clip(drums, "Loop", 0.0, 4.0, "loop.wav")
    })
    .unwrap();
    ws
}

#[test]
fn test_save_and_open_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.json");
    let source = populated();
    source.save(&path).unwrap();

    let mut reopened = workstation();
    reopened.open(&path).unwrap();
    assert_eq!(reopened.project(), source.project());

    // A freshly opened project starts with a clean history
    assert_eq!(reopened.history_list().len(), 1);
    assert!(!reopened.history().can_undo());
}

#[test]
fn test_saved_file_uses_camel_case_fields() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("song.json");
    populated().save(&path).unwrap();

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["name"], "Saved Song");
    assert_eq!(json["bpm"], 96.0);
    assert!(json.get("timeSignature").is_some());
    assert!(json.get("musicalKey").is_some());

    let keys = &json["tracks"][0];
    assert_eq!(keys["type"], "instrument");
    assert!(keys.get("volumeAutomation").is_some());
    assert_eq!(keys["clips"][0]["startBeat"], 4.0);
    assert_eq!(keys["clips"][0]["notes"][0]["startBeat"], 0.5);
    assert!(keys["clips"][0].get("audioFileRef").is_none());

    let drums = &json["tracks"][1];
    assert_eq!(drums["type"], "audio");
    assert_eq!(drums["clips"][0]["audioFileRef"], "loop.wav");
}

#[test]
fn test_open_clamps_out_of_range_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wild.json");
    std::fs::write(
        &path,
        r#"{
            "name": "Wild",
            "bpm": 10,
            "tracks": [{
                "id": 1, "name": "Lead", "type": "instrument",
                "volume": 250, "pan": 400,
                "clips": [{"id": 1, "name": "A", "startBeat": -3, "duration": 4,
                           "notes": [{"id": 1, "pitch": 200, "startBeat": 0,
                                      "duration": 1, "velocity": 300}]}]
            }]
        }"#,
    )
    .unwrap();

    let mut ws = workstation();
    ws.open(&path).unwrap();
    let project = ws.project();
    assert_eq!(project.bpm, 20.0);
    let track = &project.tracks[0];
    assert_eq!(track.volume, 100.0);
    assert_eq!(track.pan, 100.0);
    assert_eq!(track.clips[0].start_beat, 0.0);
    let note = track.clips[0].notes()[0];
    assert_eq!((note.pitch, note.velocity), (127, 127));
}

#[test]
fn test_new_ids_never_collide_with_loaded_ones() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ids.json");
    std::fs::write(
        &path,
        r#"{"name": "Ids", "bpm": 120, "tracks": [
            {"id": 700000, "name": "T", "type": "instrument",
             "clips": [{"id": 700000, "name": "C", "startBeat": 0, "duration": 4}]}
        ]}"#,
    )
    .unwrap();

    let mut ws = workstation();
    ws.open(&path).unwrap();
    let track = ws
        .perform("Add Track", |s| Ok(s.add_track(TrackType::Instrument)))
        .unwrap();
    let clip = ws
        .perform("Add Clip", |s| s.add_clip(track, "New", 0.0, 4.0))
        .unwrap();
    assert!(track > 700000);
    assert!(clip > 700000);
}

#[test]
fn test_failed_open_leaves_workstation_untouched() {
    let dir = tempdir().unwrap();
    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{\"name\": \"Half\", \"tracks\": [").unwrap();

    let mut ws = populated();
    let before = ws.project().clone();
    let undo_depth = ws.history().undo_count();

    assert!(matches!(ws.open(&broken), Err(ProjectError::Json(_))));
    assert!(matches!(
        ws.open(dir.path().join("missing.json")),
        Err(ProjectError::Io(_))
    ));
    assert_eq!(ws.project(), &before);
    assert_eq!(ws.history().undo_count(), undo_depth);
}

#[test]
fn test_audio_clip_survives_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audio.json");
    populated().save(&path).unwrap();

    let mut ws = workstation();
    ws.open(&path).unwrap();
    let clip = &ws.project().tracks[1].clips[0];
    match &clip.content {
        ClipContent::Audio(audio) => {
            assert_eq!(audio.file_ref, "loop.wav");
            assert_eq!(audio.offset_beats, 0.0);
        }
        ClipContent::Notes(_) => panic!("audio clip reloaded as MIDI"),
    }
}
