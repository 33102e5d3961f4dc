// Project document model and JSON persistence

pub mod serialization;
pub mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub use serialization::{deserialize_from_json, load_from_file, save_to_file, serialize_to_json};
pub use types::{
    AudioRef, AutomationPoint, Clip, ClipContent, ClipId, FilterType, MidiNote, NoteId, Project,
    Track, TrackEffects, TrackId, TrackType,
};

/// Error type for project persistence
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_CLIP_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_NOTE_ID: AtomicU64 = AtomicU64::new(1);

/// Helper function to generate unique track IDs
pub fn generate_track_id() -> TrackId {
    NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed)
}

/// Helper function to generate unique clip IDs
pub fn generate_clip_id() -> ClipId {
    NEXT_CLIP_ID.fetch_add(1, Ordering::Relaxed)
}

/// Helper function to generate unique note IDs
pub fn generate_note_id() -> NoteId {
    NEXT_NOTE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Advance the id generators past every id used by `project`
pub fn reserve_ids(project: &Project) {
    let (track, clip, note) = project.max_ids();
    NEXT_TRACK_ID.fetch_max(track + 1, Ordering::Relaxed);
    NEXT_CLIP_ID.fetch_max(clip + 1, Ordering::Relaxed);
    NEXT_NOTE_ID.fetch_max(note + 1, Ordering::Relaxed);
}
