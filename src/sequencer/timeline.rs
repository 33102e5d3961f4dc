// Timeline - Musical time representation
// Handles conversion between beats, seconds and samples, plus grid snapping

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest accepted tempo (BPM)
pub const MIN_BPM: f64 = 20.0;
/// Highest accepted tempo (BPM)
pub const MAX_BPM: f64 = 300.0;
/// Default editing grid: a sixteenth note in 4/4
pub const SNAP_GRID: f64 = 0.25;

/// Time signature (numerator/denominator)
/// Example: 4/4 time = TimeSignature { numerator: 4, denominator: 4 }
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,   // Beats per bar
    pub denominator: u8, // Note value (4 = quarter note, 8 = eighth note)
}

impl TimeSignature {
    /// Creates a new time signature
    ///
    /// The numerator is clamped to 1..=32 and the denominator is rounded up to
    /// the next power of two (max 32).
    pub fn new(numerator: u8, denominator: u8) -> Self {
        Self {
            numerator: numerator.clamp(1, 32),
            denominator: denominator.clamp(1, 32).next_power_of_two(),
        }
    }

    /// Common 4/4 time signature
    pub fn four_four() -> Self {
        Self::new(4, 4)
    }

    /// Number of beats per bar
    pub fn beats_per_bar(&self) -> f64 {
        self.numerator as f64
    }

    /// Re-apply the domain constraints to a deserialized value
    pub fn sanitized(self) -> Self {
        Self::new(self.numerator, self.denominator)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    /// Creates a new tempo, clamped to [MIN_BPM, MAX_BPM]
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm: clamp_bpm(bpm),
        }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Set BPM value (clamped)
    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = clamp_bpm(bpm);
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Convert a beat position into seconds
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * 60.0 / self.bpm
    }

    /// Convert a time in seconds into a beat position
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        seconds * self.bpm / 60.0
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Clamp a tempo to the supported range; NaN falls back to 120
pub fn clamp_bpm(bpm: f64) -> f64 {
    if bpm.is_nan() {
        120.0
    } else {
        bpm.clamp(MIN_BPM, MAX_BPM)
    }
}

/// Snap a beat position to the nearest multiple of `grid`
///
/// Idempotent: `snap(snap(b)) == snap(b)`.
pub fn snap_to_grid(beat: f64, grid: f64) -> f64 {
    if grid <= 0.0 {
        return beat;
    }
    (beat / grid).round() * grid
}

/// Snap a beat position down to the grid line at or before it
pub fn floor_to_grid(beat: f64, grid: f64) -> f64 {
    if grid <= 0.0 {
        return beat;
    }
    (beat / grid).floor() * grid
}

/// Musical position derived from a beat count (bars and beats are 1-based)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarBeat {
    pub bar: u32,
    pub beat: u32,
    /// Fraction of the current beat in [0, 1)
    pub fraction: f64,
}

impl BarBeat {
    /// Split an absolute beat position into bar/beat
    pub fn from_beats(beats: f64, time_signature: &TimeSignature) -> Self {
        let beats = beats.max(0.0);
        let per_bar = time_signature.beats_per_bar();
        let whole = beats.floor();
        Self {
            bar: (whole / per_bar).floor() as u32 + 1,
            beat: (whole % per_bar) as u32 + 1,
            fraction: beats - whole,
        }
    }
}

impl fmt::Display for BarBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{:03}", self.bar, self.beat, (self.fraction * 1000.0) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_clamps() {
        assert_eq!(Tempo::new(5.0).bpm(), MIN_BPM);
        assert_eq!(Tempo::new(1000.0).bpm(), MAX_BPM);
        assert_eq!(Tempo::new(f64::NAN).bpm(), 120.0);
    }

    #[test]
    fn test_beat_duration() {
        let tempo = Tempo::new(120.0);
        assert_eq!(tempo.beat_duration_seconds(), 0.5);
    }

    #[test]
    fn test_beats_seconds_roundtrip() {
        for bpm in [20.0, 60.0, 97.5, 120.0, 187.0, 300.0] {
            let tempo = Tempo::new(bpm);
            for beats in [0.0, 0.25, 1.0, 7.75, 128.0, 1000.125] {
                let back = tempo.seconds_to_beats(tempo.beats_to_seconds(beats));
                assert!((back - beats).abs() < 1e-9, "bpm {} beats {}", bpm, beats);
            }
        }
    }

    #[test]
    fn test_snap_idempotent() {
        for beat in [0.0, 0.1, 0.124, 0.126, 1.37, 2.875, 15.99, 1234.5678] {
            let once = snap_to_grid(beat, SNAP_GRID);
            assert_eq!(snap_to_grid(once, SNAP_GRID), once);
        }
        assert_eq!(snap_to_grid(1.37, SNAP_GRID), 1.25);
        assert_eq!(snap_to_grid(1.38, SNAP_GRID), 1.5);
    }

    #[test]
    fn test_floor_to_grid() {
        assert_eq!(floor_to_grid(1.49, SNAP_GRID), 1.25);
        assert_eq!(floor_to_grid(1.5, SNAP_GRID), 1.5);
    }

    #[test]
    fn test_time_signature_sanitized() {
        assert_eq!(TimeSignature::new(0, 3), TimeSignature::new(1, 4));
        assert_eq!(TimeSignature::new(7, 8).to_string(), "7/8");
    }

    #[test]
    fn test_bar_beat() {
        let pos = BarBeat::from_beats(5.5, &TimeSignature::four_four());
        assert_eq!(pos.bar, 2);
        assert_eq!(pos.beat, 2);
        assert_eq!(pos.to_string(), "2.2.500");
    }
}
