// Transport - Playback state shared between the editing and audio domains
// The audio engine advances the playhead; the scheduler and UI observe it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Transport state (play/pause/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    /// Check if transport is playing
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    /// Check if transport is stopped or paused
    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped | TransportState::Paused)
    }
}

/// Shared transport state
/// Thread-safe via atomics for communication with audio thread
#[derive(Debug)]
pub struct SharedTransportState {
    playing: AtomicBool,
    paused: AtomicBool,
    position_samples: AtomicU64,
    /// Bumped on every stop/pause/reschedule; engine work tagged with an
    /// older generation is stale and must not fire.
    generation: AtomicU64,
    sample_rate: u32,
}

impl SharedTransportState {
    /// Create new shared transport state
    pub fn new(sample_rate: u32) -> Arc<Self> {
        Arc::new(Self {
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            position_samples: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            sample_rate: sample_rate.max(1),
        })
    }

    /// Get current transport state
    pub fn state(&self) -> TransportState {
        if self.playing.load(Ordering::Acquire) {
            TransportState::Playing
        } else if self.paused.load(Ordering::Acquire) {
            TransportState::Paused
        } else {
            TransportState::Stopped
        }
    }

    pub fn set_state(&self, state: TransportState) {
        self.paused
            .store(state == TransportState::Paused, Ordering::Release);
        self.playing
            .store(state == TransportState::Playing, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get current position in samples
    pub fn position_samples(&self) -> u64 {
        self.position_samples.load(Ordering::Acquire)
    }

    /// Set position in samples
    pub fn set_position_samples(&self, samples: u64) {
        self.position_samples.store(samples, Ordering::Release);
    }

    /// Current position in seconds
    pub fn position_seconds(&self) -> f64 {
        self.position_samples() as f64 / self.sample_rate as f64
    }

    /// Set position in seconds (negative values clamp to 0)
    pub fn set_position_seconds(&self, seconds: f64) {
        let samples = (seconds.max(0.0) * self.sample_rate as f64).round() as u64;
        self.set_position_samples(samples);
    }

    /// Advance position by given number of samples
    /// Returns new position
    pub fn advance_position(&self, delta_samples: u64) -> u64 {
        self.position_samples
            .fetch_add(delta_samples, Ordering::AcqRel)
            + delta_samples
    }

    /// Current cancellation generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Invalidate all outstanding engine work; returns the new generation
    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Playhead position as observed by a UI frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playhead {
    pub seconds: f64,
    pub beat: f64,
}

/// Polls the shared playhead once per UI frame
///
/// Sampling can be suspended (e.g. while a view is hidden) without touching
/// playback.
pub struct PlayheadSampler {
    transport: Arc<SharedTransportState>,
    suspended: bool,
    last: Option<Playhead>,
}

impl PlayheadSampler {
    pub fn new(transport: Arc<SharedTransportState>) -> Self {
        Self {
            transport,
            suspended: false,
            last: None,
        }
    }

    /// Read the playhead, or None while suspended
    pub fn sample(&mut self, bpm: f64) -> Option<Playhead> {
        if self.suspended {
            return None;
        }
        let seconds = self.transport.position_seconds();
        let playhead = Playhead {
            seconds,
            beat: seconds * bpm / 60.0,
        };
        self.last = Some(playhead);
        Some(playhead)
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Last value returned by `sample`
    pub fn last(&self) -> Option<Playhead> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let shared = SharedTransportState::new(48000);
        assert_eq!(shared.state(), TransportState::Stopped);
        shared.set_state(TransportState::Playing);
        assert!(shared.state().is_playing());
        shared.set_state(TransportState::Paused);
        assert_eq!(shared.state(), TransportState::Paused);
        assert!(shared.state().is_stopped());
    }

    #[test]
    fn test_position_seconds() {
        let shared = SharedTransportState::new(48000);
        shared.set_position_seconds(1.5);
        assert_eq!(shared.position_samples(), 72000);
        assert_eq!(shared.advance_position(24000), 96000);
        assert_eq!(shared.position_seconds(), 2.0);
    }

    #[test]
    fn test_generation_bumps() {
        let shared = SharedTransportState::new(44100);
        assert_eq!(shared.bump_generation(), 1);
        assert_eq!(shared.bump_generation(), 2);
        assert_eq!(shared.generation(), 2);
    }

    #[test]
    fn test_playhead_sampler_suspend() {
        let shared = SharedTransportState::new(1000);
        let mut sampler = PlayheadSampler::new(shared.clone());
        shared.set_position_samples(2000);
        assert_eq!(
            sampler.sample(120.0),
            Some(Playhead {
                seconds: 2.0,
                beat: 4.0
            })
        );
        sampler.suspend();
        shared.set_position_samples(3000);
        assert_eq!(sampler.sample(120.0), None);
        assert_eq!(sampler.last().map(|p| p.seconds), Some(2.0));
        sampler.resume();
        assert_eq!(sampler.sample(120.0).map(|p| p.beat), Some(6.0));
    }
}
