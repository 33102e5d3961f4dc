// Engine commands - Scheduler -> audio engine

use crate::audio::decode::AudioPool;
use crate::audio::graph::TrackSetup;
use crate::project::types::TrackId;
use crate::sequencer::events::ScheduledEvent;
use std::sync::Arc;

/// Everything the engine needs to play from one position
#[derive(Debug, Clone)]
pub struct ScheduleBatch {
    /// Playback generation the batch belongs to; older generations are dropped
    pub generation: u64,
    /// Timeline position (seconds) the events were derived from
    pub origin_seconds: f64,
    /// Sorted events at absolute timeline times
    pub events: Vec<ScheduledEvent>,
    pub tracks: Vec<TrackSetup>,
    pub pool: Arc<AudioPool>,
}

#[derive(Debug)]
pub enum EngineCommand {
    /// Replace the playing schedule
    Load(Box<ScheduleBatch>),
    /// Per-tick automation update
    SetGain {
        generation: u64,
        track: TrackId,
        gain: f32,
    },
    /// Drop pending events and release sounding notes
    ReleaseAll { generation: u64 },
}

impl EngineCommand {
    pub fn generation(&self) -> u64 {
        match self {
            EngineCommand::Load(batch) => batch.generation,
            EngineCommand::SetGain { generation, .. } | EngineCommand::ReleaseAll { generation } => {
                *generation
            }
        }
    }
}
