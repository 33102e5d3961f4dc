// Serialization utilities for project persistence (JSON)

use crate::project::types::Project;
use crate::project::{ProjectError, reserve_ids};
use std::path::Path;

/// Serialize a project to pretty-printed JSON
pub fn serialize_to_json(project: &Project) -> Result<String, ProjectError> {
    Ok(serde_json::to_string_pretty(project)?)
}

/// Deserialize a project from JSON
///
/// Every numeric field is clamped to its domain and ordering invariants
/// (clips by start, automation by beat) are restored. The id generators are
/// advanced past every id found so newly created entities never collide with
/// loaded ones.
pub fn deserialize_from_json(json_data: &str) -> Result<Project, ProjectError> {
    let mut project: Project = serde_json::from_str(json_data)?;
    project.sanitize();
    reserve_ids(&project);
    Ok(project)
}

/// Write a project to disk
pub fn save_to_file(project: &Project, path: impl AsRef<Path>) -> Result<(), ProjectError> {
    let path = path.as_ref();
    let json = serialize_to_json(project)?;
    std::fs::write(path, json)?;
    log::info!("Saved project '{}' to {}", project.name, path.display());
    Ok(())
}

/// Read a project from disk
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Project, ProjectError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let project = deserialize_from_json(&json)?;
    log::info!(
        "Loaded project '{}' ({} tracks) from {}",
        project.name,
        project.tracks.len(),
        path.display()
    );
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::generate_track_id;

    const SAMPLE: &str = r##"{
        "name": "Demo",
        "bpm": 500,
        "timeSignature": {"numerator": 3, "denominator": 4},
        "musicalKey": "Am",
        "tracks": [{
            "id": 900001,
            "name": "Keys",
            "type": "instrument",
            "instrument": "sawtooth",
            "color": "#9b59b6",
            "muted": false,
            "solo": false,
            "volume": 180,
            "pan": -20,
            "effects": {"reverbMix": 30, "filterType": "highpass", "filterEnabled": true},
            "volumeAutomation": [{"beat": 8, "value": 20}, {"beat": 0, "value": 100}],
            "clips": [
                {"id": 2, "name": "B", "startBeat": 8, "duration": 4, "notes": []},
                {"id": 1, "name": "A", "startBeat": 0, "duration": 4,
                 "notes": [{"id": 5, "pitch": 60, "startBeat": 0, "duration": 1, "velocity": 0}]}
            ]
        }]
    }"##;

    #[test]
    fn test_load_clamps_and_sorts() {
        let project = deserialize_from_json(SAMPLE).unwrap();
        assert_eq!(project.bpm, 300.0);
        assert_eq!(project.time_signature.numerator, 3);
        let track = &project.tracks[0];
        assert_eq!(track.volume, 100.0);
        assert_eq!(track.effects.reverb_mix, 30.0);
        assert_eq!(track.effects.delay_time, 0.25);
        assert_eq!(track.volume_automation[0].beat, 0.0);
        assert_eq!(track.clips[0].id, 1);
        assert_eq!(track.clips[0].notes()[0].velocity, 1);
    }

    #[test]
    fn test_load_reserves_ids() {
        deserialize_from_json(SAMPLE).unwrap();
        assert!(generate_track_id() > 900001);
    }

    #[test]
    fn test_malformed_json_is_error() {
        assert!(matches!(
            deserialize_from_json("{\"name\": 3"),
            Err(ProjectError::Json(_))
        ));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.json");
        let project = deserialize_from_json(SAMPLE).unwrap();
        save_to_file(&project, &path).unwrap();
        assert_eq!(load_from_file(&path).unwrap(), project);
    }
}
