// Config - Engine, editor and export settings
//
// Every field has a default so a partial JSON file (or none at all) yields a
// usable configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DawConfig {
    /// Engine sample rate (Hz), used by live playback and offline render
    pub sample_rate: u32,
    /// Maximum number of snapshots kept on each history stack
    pub history_capacity: usize,
    /// Capacity of the scheduler -> engine ring buffer
    pub engine_queue_capacity: usize,
    pub editor: EditorSettings,
    pub render: RenderSettings,
    pub export: ExportSettings,
}

impl Default for DawConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            history_capacity: 100,
            engine_queue_capacity: 64,
            editor: EditorSettings::default(),
            render: RenderSettings::default(),
            export: ExportSettings::default(),
        }
    }
}

impl DawConfig {
    /// Load a configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save the configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Piano roll geometry and gesture tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorSettings {
    /// Horizontal zoom: pixels per beat
    pub pixels_per_beat: f64,
    /// Height of one semitone row in pixels
    pub note_height: f64,
    /// Pointer travel (px) below which a press/release is a click
    pub drag_threshold_px: f64,
    /// Width of the right-edge resize handle (px)
    pub resize_handle_px: f64,
    /// Grid resolution in beats used when snapping
    pub snap_beats: f64,
    pub snap_enabled: bool,
    /// Duration (beats) of notes created by clicking empty space
    pub default_note_duration: f64,
    pub default_velocity: u8,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            pixels_per_beat: 80.0,
            note_height: 14.0,
            drag_threshold_px: 4.0,
            resize_handle_px: 6.0,
            snap_beats: 0.25,
            snap_enabled: true,
            default_note_duration: 1.0,
            default_velocity: 100,
        }
    }
}

/// Offline render parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderSettings {
    /// Silence appended after the last clip, in beats
    pub tail_beats: f64,
    /// Automation sampling period in seconds
    pub automation_interval: f64,
    /// Frames processed per render block
    pub block_size: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            tail_beats: 2.0,
            automation_interval: 0.05,
            block_size: 512,
        }
    }
}

/// File export parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportSettings {
    /// MP3 constant bitrate in kbps
    pub mp3_bitrate_kbps: u32,
    /// Encoder executable used for MP3 export
    pub ffmpeg_path: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            mp3_bitrate_kbps: 192,
            ffmpeg_path: "ffmpeg".to_string(),
        }
    }
}
