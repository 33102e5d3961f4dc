// Oscillators - Waveform generators

use std::f32::consts::PI;

pub trait Oscillator {
    fn next_sample(&mut self) -> f32;
    fn set_frequency(&mut self, freq: f32);
    fn reset(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveformType {
    Sine,
    Square,
    Saw,
    Triangle,
}

pub struct SimpleOscillator {
    waveform: WaveformType,
    phase: f32,
    phase_increment: f32,
    sample_rate: f32,
}

impl SimpleOscillator {
    pub fn new(waveform: WaveformType, sample_rate: f32) -> Self {
        Self {
            waveform,
            phase: 0.0,
            phase_increment: 0.0,
            sample_rate,
        }
    }

    pub fn set_waveform(&mut self, waveform: WaveformType) {
        self.waveform = waveform;
    }

    /// Next sample with the read phase shifted by `offset` cycles
    ///
    /// Used for phase modulation (FM voices).
    pub fn next_sample_with_offset(&mut self, offset: f32) -> f32 {
        let phase = (self.phase + offset).rem_euclid(1.0);
        let sample = shape(self.waveform, phase);
        self.advance();
        sample
    }

    fn advance(&mut self) {
        self.phase += self.phase_increment;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
    }
}

#[inline]
fn shape(waveform: WaveformType, phase: f32) -> f32 {
    match waveform {
        WaveformType::Sine => (phase * 2.0 * PI).sin(),
        WaveformType::Square => {
            if phase < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        WaveformType::Saw => (phase * 2.0) - 1.0,
        WaveformType::Triangle => {
            if phase < 0.5 {
                (phase * 4.0) - 1.0
            } else {
                3.0 - (phase * 4.0)
            }
        }
    }
}

impl Oscillator for SimpleOscillator {
    fn next_sample(&mut self) -> f32 {
        let sample = shape(self.waveform, self.phase);
        self.advance();
        sample
    }

    fn set_frequency(&mut self, freq: f32) {
        // Keep the increment below 1 so a single wrap is always enough
        self.phase_increment = (freq / self.sample_rate).clamp(0.0, 0.999);
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;
    const EPSILON: f32 = 0.001;

    #[test]
    fn test_oscillator_frequency() {
        let mut osc = SimpleOscillator::new(WaveformType::Sine, SAMPLE_RATE);
        osc.set_frequency(440.0);
        assert!((osc.phase_increment - 440.0 / SAMPLE_RATE).abs() < EPSILON);
    }

    #[test]
    fn test_oscillator_reset() {
        let mut osc = SimpleOscillator::new(WaveformType::Sine, SAMPLE_RATE);
        osc.set_frequency(440.0);
        for _ in 0..100 {
            osc.next_sample();
        }
        assert!(osc.phase > 0.0);
        osc.reset();
        assert_eq!(osc.phase, 0.0);
    }

    #[test]
    fn test_waveform_ranges() {
        for waveform in [
            WaveformType::Sine,
            WaveformType::Square,
            WaveformType::Saw,
            WaveformType::Triangle,
        ] {
            let mut osc = SimpleOscillator::new(waveform, SAMPLE_RATE);
            osc.set_frequency(440.0);
            for _ in 0..1000 {
                let sample = osc.next_sample();
                assert!((-1.0..=1.0).contains(&sample), "{:?}: {}", waveform, sample);
            }
        }
    }

    #[test]
    fn test_sine_starts_at_zero() {
        let mut osc = SimpleOscillator::new(WaveformType::Sine, SAMPLE_RATE);
        osc.set_frequency(440.0);
        assert!(osc.next_sample().abs() < EPSILON);
    }

    #[test]
    fn test_phase_offset_wraps() {
        let mut osc = SimpleOscillator::new(WaveformType::Sine, SAMPLE_RATE);
        osc.set_frequency(440.0);
        // A whole-cycle offset is the same as no offset
        let shifted = osc.next_sample_with_offset(-3.0);
        assert!(shifted.abs() < EPSILON);
        assert!(osc.phase > 0.0 && osc.phase < 1.0);
    }

    #[test]
    fn test_phase_wrapping() {
        let mut osc = SimpleOscillator::new(WaveformType::Sine, SAMPLE_RATE);
        osc.set_frequency(440.0);
        for _ in 0..10000 {
            osc.next_sample();
            assert!(osc.phase >= 0.0 && osc.phase < 1.0);
        }
    }
}
