// Reverb - Freeverb-style send reverb
//
// Based on the Freeverb algorithm by Jezar at Dreampoint (public domain).
//
// Architecture:
// - 4 parallel comb filters with damping in the feedback loop
// - 2 series allpass filters
// - Comb feedback derived from the decay time (RT60)
//
// The output is fully wet; the track strip controls the send level.

use crate::audio::dsp_utils::flush_denormals_to_zero;

/// Reverb parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    /// Time for the tail to fall by 60 dB, in seconds (0.1 - 10)
    pub decay_seconds: f32,
    /// Damping (0.0 - 1.0, where 1.0 is maximum damping of high frequencies)
    pub damping: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            decay_seconds: 2.0,
            damping: 0.5,
        }
    }
}

impl ReverbParams {
    /// Create new reverb parameters with clamping
    pub fn new(decay_seconds: f32, damping: f32) -> Self {
        Self {
            decay_seconds: decay_seconds.clamp(0.1, 10.0),
            damping: damping.clamp(0.0, 1.0),
        }
    }
}

/// Comb filter with damping
struct CombFilter {
    buffer: Vec<f32>,
    buffer_index: usize,
    feedback: f32,
    damping: f32,
    filter_state: f32,
}

impl CombFilter {
    fn new(buffer_size: usize) -> Self {
        Self {
            buffer: vec![0.0; buffer_size.max(1)],
            buffer_index: 0,
            feedback: 0.5,
            damping: 0.5,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.buffer_index];

        self.filter_state = flush_denormals_to_zero(
            output * (1.0 - self.damping) + self.filter_state * self.damping,
        );
        self.buffer[self.buffer_index] = input + self.filter_state * self.feedback;

        self.buffer_index = (self.buffer_index + 1) % self.buffer.len();
        output
    }

    fn mute(&mut self) {
        self.buffer.fill(0.0);
        self.buffer_index = 0;
        self.filter_state = 0.0;
    }
}

struct AllpassFilter {
    buffer: Vec<f32>,
    buffer_index: usize,
}

impl AllpassFilter {
    fn new(buffer_size: usize) -> Self {
        Self {
            buffer: vec![0.0; buffer_size.max(1)],
            buffer_index: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let bufout = self.buffer[self.buffer_index];
        let output = -input + bufout;
        self.buffer[self.buffer_index] = flush_denormals_to_zero(input + bufout * 0.5);
        self.buffer_index = (self.buffer_index + 1) % self.buffer.len();
        output
    }

    fn mute(&mut self) {
        self.buffer.fill(0.0);
        self.buffer_index = 0;
    }
}

pub struct Reverb {
    params: ReverbParams,
    sample_rate: f32,
    comb_filters: Vec<CombFilter>,
    allpass_filters: Vec<AllpassFilter>,
}

impl Reverb {
    // Freeverb tunings at 44.1kHz
    const COMB_TUNINGS: [usize; 4] = [1116, 1188, 1277, 1356];
    const ALLPASS_TUNINGS: [usize; 2] = [556, 441];

    const FIXED_GAIN: f32 = 0.015;
    const SCALE_WET: f32 = 3.0;
    const SCALE_DAMPING: f32 = 0.4;

    /// Create a new reverb
    ///
    /// # Arguments
    /// * `params` - Initial reverb parameters
    /// * `sample_rate` - Audio sample rate in Hz
    pub fn new(params: ReverbParams, sample_rate: f32) -> Self {
        let scale = sample_rate / 44100.0;

        let comb_filters = Self::COMB_TUNINGS
            .iter()
            .map(|&tuning| CombFilter::new((tuning as f32 * scale) as usize))
            .collect();
        let allpass_filters = Self::ALLPASS_TUNINGS
            .iter()
            .map(|&tuning| AllpassFilter::new((tuning as f32 * scale) as usize))
            .collect();

        let mut reverb = Self {
            params,
            sample_rate,
            comb_filters,
            allpass_filters,
        };
        reverb.update();
        reverb
    }

    pub fn set_params(&mut self, params: ReverbParams) {
        self.params = params;
        self.update();
    }

    pub fn params(&self) -> ReverbParams {
        self.params
    }

    fn update(&mut self) {
        let damp = self.params.damping * Self::SCALE_DAMPING;
        let decay = self.params.decay_seconds.max(0.1);
        for comb in &mut self.comb_filters {
            // Each loop pass must lose 60 dB * (loop time / decay time)
            let loop_seconds = comb.buffer.len() as f32 / self.sample_rate;
            comb.feedback = 10.0_f32.powf(-3.0 * loop_seconds / decay).min(0.98);
            comb.damping = damp;
        }
    }

    /// Clear all delayed samples
    pub fn reset(&mut self) {
        for comb in &mut self.comb_filters {
            comb.mute();
        }
        for allpass in &mut self.allpass_filters {
            allpass.mute();
        }
    }

    /// Process one sample, returning the wet signal only
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let input = input * Self::FIXED_GAIN;
        let mut output: f32 = self.comb_filters.iter_mut().map(|c| c.process(input)).sum();
        for allpass in &mut self.allpass_filters {
            output = allpass.process(output);
        }
        output * Self::SCALE_WET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    fn tail_energy(decay: f32) -> f32 {
        let mut reverb = Reverb::new(ReverbParams::new(decay, 0.5), SAMPLE_RATE);
        reverb.process(1.0);
        for _ in 0..22050 {
            reverb.process(0.0);
        }
        (0..4410).map(|_| reverb.process(0.0).powi(2)).sum()
    }

    #[test]
    fn test_params_clamping() {
        let params = ReverbParams::new(50.0, -1.0);
        assert_eq!(params.decay_seconds, 10.0);
        assert_eq!(params.damping, 0.0);
    }

    #[test]
    fn test_silence_in_silence_out() {
        let mut reverb = Reverb::new(ReverbParams::default(), SAMPLE_RATE);
        for _ in 0..1000 {
            assert_eq!(reverb.process(0.0), 0.0);
        }
    }

    #[test]
    fn test_longer_decay_rings_longer() {
        assert!(tail_energy(5.0) > tail_energy(0.3));
    }

    #[test]
    fn test_reset_clears_tail() {
        let mut reverb = Reverb::new(ReverbParams::default(), SAMPLE_RATE);
        for _ in 0..2000 {
            reverb.process(0.5);
        }
        reverb.reset();
        assert_eq!(reverb.process(0.0), 0.0);
    }

    #[test]
    fn test_output_bounded_under_sustained_input() {
        let mut reverb = Reverb::new(ReverbParams::new(10.0, 0.0), SAMPLE_RATE);
        for i in 0..88200 {
            let x = if (i / 100) % 2 == 0 { 1.0 } else { -1.0 };
            let y = reverb.process(x);
            assert!(y.is_finite());
            assert!(y.abs() < 10.0);
        }
    }
}
