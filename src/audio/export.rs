// Audio Export - Offline rendering to WAV/MP3 files
//
// Offline render walks the same event derivation and mix graph as live
// playback, but on its own graph instance and as fast as possible. The live
// engine is never touched, so a render can run on another thread while
// editing continues.

use crate::audio::decode::AudioPool;
use crate::audio::dsp_utils::{f32_to_i16, flush_denormals_to_zero};
use crate::audio::graph::{EventQueue, MixGraph, TrackSetup};
use crate::command::state::DawState;
use crate::config::{ExportSettings, RenderSettings};
use crate::project::types::Project;
use crate::sequencer::automation::track_gain;
use crate::sequencer::events::{derive_events, sample_automation, sort_events};
use crate::sequencer::timeline::Tempo;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Audio export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// 16-bit PCM WAV
    Wav,
    /// Constant bitrate MP3 (external encoder)
    Mp3,
}

impl ExportFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
        }
    }

    /// Pick the format from a file extension (anything but .mp3 is WAV)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("mp3") => ExportFormat::Mp3,
            _ => ExportFormat::Wav,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Nothing to export: no clips on unmuted tracks")]
    EmptyProject,

    #[error("Export cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("MP3 encoder failed: {0}")]
    Encoder(String),
}

/// Progress callback for export (reports 0.0 to 1.0)
pub type ProgressCallback = Box<dyn FnMut(f32) + Send>;

/// Shared flag that aborts a running render
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Planar stereo render result
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl RenderedAudio {
    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Largest absolute sample on either side
    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(self.right.iter())
            .fold(0.0_f32, |p, s| p.max(s.abs()))
    }
}

/// Length of an offline render: content end plus the tail
///
/// Returns None when no unmuted track holds a clip.
pub fn render_duration_seconds(project: &Project, tail_beats: f64) -> Option<f64> {
    let end = project.content_end_beat()?;
    Some(Tempo::new(project.bpm).beats_to_seconds(end + tail_beats.max(0.0)))
}

/// Offline renderer
pub struct OfflineRenderer {
    sample_rate: u32,
    settings: RenderSettings,
}

impl OfflineRenderer {
    pub fn new(sample_rate: u32, settings: RenderSettings) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            settings,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Render the document held by `state`
    pub fn render_state(
        &self,
        state: &DawState,
        cancel: &CancelToken,
        progress: Option<ProgressCallback>,
    ) -> Result<RenderedAudio, ExportError> {
        self.render(state.project(), Arc::clone(state.audio_pool()), cancel, progress)
    }

    /// Render a project to planar stereo
    ///
    /// # Arguments
    /// * `project` - Document to render (solo/mute applied)
    /// * `pool` - Decoded audio for audio clips
    /// * `cancel` - Checked between blocks
    /// * `progress` - Called roughly once per rendered second and at the end
    pub fn render(
        &self,
        project: &Project,
        pool: Arc<AudioPool>,
        cancel: &CancelToken,
        mut progress: Option<ProgressCallback>,
    ) -> Result<RenderedAudio, ExportError> {
        let duration = render_duration_seconds(project, self.settings.tail_beats)
            .ok_or(ExportError::EmptyProject)?;
        let sample_rate = self.sample_rate as f64;
        let total_frames = (duration * sample_rate).ceil() as usize;

        log::info!(
            "Rendering '{}': {:.2}s ({} frames) at {} Hz",
            project.name,
            duration,
            total_frames,
            self.sample_rate
        );

        let tracks: Vec<TrackSetup> = project
            .tracks
            .iter()
            .map(|track| {
                let gain = if project.is_audible(track) {
                    track_gain(track, 0.0) as f32
                } else {
                    0.0
                };
                TrackSetup::from_track(track, gain)
            })
            .collect();

        let mut events = derive_events(project, 0.0);
        events.extend(sample_automation(
            project,
            duration,
            self.settings.automation_interval,
        ));
        sort_events(&mut events);

        let mut graph = MixGraph::new(self.sample_rate as f32, &tracks, pool);
        let mut queue = EventQueue::new(events, sample_rate);

        let mut left = vec![0.0_f32; total_frames];
        let mut right = vec![0.0_f32; total_frames];
        let block_size = self.settings.block_size.max(1);
        let progress_interval = self.sample_rate as usize;
        let mut next_progress = progress_interval;

        let mut position = 0usize;
        while position < total_frames {
            if cancel.is_cancelled() {
                log::info!("Render cancelled at {:.2}s", position as f64 / sample_rate);
                return Err(ExportError::Cancelled);
            }
            let end = (position + block_size).min(total_frames);
            queue.render_block(
                &mut graph,
                position as u64,
                &mut left[position..end],
                &mut right[position..end],
            );
            position = end;

            if position >= next_progress {
                next_progress += progress_interval;
                if let Some(callback) = progress.as_mut() {
                    callback(position as f32 / total_frames as f32);
                }
            }
        }

        for sample in left.iter_mut().chain(right.iter_mut()) {
            *sample = flush_denormals_to_zero(*sample);
        }
        if let Some(callback) = progress.as_mut() {
            callback(1.0);
        }
        log::info!("Render complete");

        Ok(RenderedAudio {
            sample_rate: self.sample_rate,
            left,
            right,
        })
    }
}

/// Encode a render as an in-memory 16-bit stereo WAV file
pub fn encode_wav(audio: &RenderedAudio) -> Result<Vec<u8>, ExportError> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for (l, r) in audio.left.iter().zip(audio.right.iter()) {
            writer.write_sample(f32_to_i16(*l))?;
            writer.write_sample(f32_to_i16(*r))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Where an export ended up
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub format: ExportFormat,
    /// True when MP3 was requested but WAV was written instead
    pub fell_back: bool,
}

/// Audio exporter - renders the project and writes a file
pub struct AudioExporter {
    renderer: OfflineRenderer,
    settings: ExportSettings,
}

impl AudioExporter {
    pub fn new(renderer: OfflineRenderer, settings: ExportSettings) -> Self {
        Self { renderer, settings }
    }

    pub fn renderer(&self) -> &OfflineRenderer {
        &self.renderer
    }

    /// Render `state` and write it to `path` in `format`
    ///
    /// MP3 goes through the configured external encoder. If the encoder is
    /// missing or fails, a WAV file is written next to the requested path
    /// and the outcome reports `fell_back`.
    pub fn export(
        &self,
        state: &DawState,
        path: impl AsRef<Path>,
        format: ExportFormat,
        cancel: &CancelToken,
        progress: Option<ProgressCallback>,
    ) -> Result<ExportOutcome, ExportError> {
        let path = path.as_ref();
        let audio = self.renderer.render_state(state, cancel, progress)?;
        let wav = encode_wav(&audio)?;

        if format == ExportFormat::Mp3 {
            match encode_mp3(&wav, path, &self.settings) {
                Ok(()) => {
                    log::info!("Exported MP3 to {}", path.display());
                    return Ok(ExportOutcome {
                        path: path.to_path_buf(),
                        format: ExportFormat::Mp3,
                        fell_back: false,
                    });
                }
                Err(e) => {
                    log::warn!("{}; falling back to WAV", e);
                    let wav_path = path.with_extension(ExportFormat::Wav.extension());
                    std::fs::write(&wav_path, &wav)?;
                    return Ok(ExportOutcome {
                        path: wav_path,
                        format: ExportFormat::Wav,
                        fell_back: true,
                    });
                }
            }
        }

        std::fs::write(path, &wav)?;
        log::info!("Exported WAV to {}", path.display());
        Ok(ExportOutcome {
            path: path.to_path_buf(),
            format: ExportFormat::Wav,
            fell_back: false,
        })
    }
}

/// Pipe a WAV file through the external encoder into `path`
fn encode_mp3(wav: &[u8], path: &Path, settings: &ExportSettings) -> Result<(), ExportError> {
    let bitrate = format!("{}k", settings.mp3_bitrate_kbps);
    let mut child = Command::new(&settings.ffmpeg_path)
        .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "wav", "-i", "pipe:0"])
        .args(["-codec:a", "libmp3lame", "-b:a", bitrate.as_str()])
        .arg(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ExportError::Encoder(format!("cannot start {}: {}", settings.ffmpeg_path, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(wav)?;
    }
    let output = child.wait_with_output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(ExportError::Encoder(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}
