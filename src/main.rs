// tracklab - Render a saved project to WAV or MP3
//
// Usage: tracklab <project.json> [--out file.wav|file.mp3] [--config cfg.json] [--info]

use clap::Parser;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracklab::audio::decode::decode_audio;
use tracklab::audio::export::{
    AudioExporter, CancelToken, ExportFormat, OfflineRenderer, render_duration_seconds,
};
use tracklab::project::load_from_file;
use tracklab::project::types::ClipContent;
use tracklab::sequencer::timeline::BarBeat;
use tracklab::{DawConfig, DawState, Project, Tempo};

/// Render a saved tracklab project to WAV or MP3
#[derive(Parser, Debug)]
#[command(name = "tracklab", version, long_about = None)]
struct CliArgs {
    /// Project file (.json)
    project: PathBuf,

    /// Output file; the extension picks WAV or MP3 (default: next to the project)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Configuration file (.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the project summary without rendering
    #[arg(long = "info")]
    info_only: bool,
}

fn print_summary(project: &Project, config: &DawConfig) {
    println!("=== {} ===", project.name);
    println!(
        "Tempo {} bpm, {} in {}",
        project.bpm, project.time_signature, project.musical_key
    );
    for track in &project.tracks {
        let mut flags = Vec::new();
        if track.muted {
            flags.push("muted");
        }
        if track.solo {
            flags.push("solo");
        }
        println!(
            "  [{}] {} ({:?}, {}) - {} clip(s) {}",
            track.id,
            track.name,
            track.track_type,
            track.instrument,
            track.clips.len(),
            flags.join(" ")
        );
    }
    match render_duration_seconds(project, config.render.tail_beats) {
        Some(seconds) => {
            let beats = Tempo::new(project.bpm).seconds_to_beats(seconds);
            let end = BarBeat::from_beats(beats, &project.time_signature);
            println!("Render length: {:.2}s (ends at {})", seconds, end);
        }
        None => println!("Render length: nothing to render"),
    }
}

/// Decode audio files referenced by clips, looked up next to the project
fn load_audio_refs(state: &mut DawState, base_dir: &Path, sample_rate: u32) {
    let refs: HashSet<String> = state
        .project()
        .tracks
        .iter()
        .flat_map(|t| t.clips.iter())
        .filter_map(|c| match &c.content {
            ClipContent::Audio(audio) => Some(audio.file_ref.clone()),
            ClipContent::Notes(_) => None,
        })
        .collect();

    for file_ref in refs {
        let path = base_dir.join(&file_ref);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Audio '{}' not loaded ({}); clip will be silent", file_ref, e);
                continue;
            }
        };
        let extension = path.extension().and_then(|e| e.to_str());
        match decode_audio(&bytes, extension, sample_rate) {
            Ok(audio) => state.insert_audio(file_ref, audio),
            Err(e) => log::warn!("Audio '{}' could not be decoded: {}", file_ref, e),
        }
    }
}

fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => DawConfig::load(path)?,
        None => DawConfig::default(),
    };

    let project = load_from_file(&args.project)?;
    print_summary(&project, &config);
    if args.info_only {
        return Ok(());
    }

    let mut state = DawState::new(project);
    let base_dir = args.project.parent().unwrap_or(Path::new("."));
    load_audio_refs(&mut state, base_dir, config.sample_rate);

    let out = args
        .out
        .unwrap_or_else(|| args.project.with_extension(ExportFormat::Wav.extension()));
    let format = ExportFormat::from_path(&out);

    let renderer = OfflineRenderer::new(config.sample_rate, config.render.clone());
    let exporter = AudioExporter::new(renderer, config.export.clone());
    let outcome = exporter.export(
        &state,
        &out,
        format,
        &CancelToken::new(),
        Some(Box::new(|progress: f32| log::debug!("Render {:.0}%", progress * 100.0))),
    )?;

    if outcome.fell_back {
        println!(
            "MP3 encoder unavailable, wrote WAV instead: {}",
            outcome.path.display()
        );
    } else {
        println!("Wrote {}", outcome.path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run(CliArgs::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}
