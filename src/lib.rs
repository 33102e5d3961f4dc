// Tracklab - Library exports for the CLI, tests and benchmarks

pub mod audio;
pub mod command;
pub mod config;
pub mod editor;
pub mod messaging;
pub mod midi;
pub mod project;
pub mod sequencer;
pub mod synth;

// Re-export commonly used types for convenience
pub use audio::engine::{AudioEngine, EngineLink};
pub use audio::export::{AudioExporter, CancelToken, ExportError, ExportFormat, OfflineRenderer};
pub use command::{CommandError, CommandResult, DawState, HistoryManager};
pub use config::DawConfig;
pub use editor::{PianoRoll, Workstation};
pub use messaging::channels::create_command_channel;
pub use midi::event::MidiEvent;
pub use project::{Project, ProjectError, Track, TrackType};
pub use sequencer::{
    AudioHost, LoopRegion, SharedTransportState, Tempo, TimeSignature, TransportScheduler,
    TransportState,
};
