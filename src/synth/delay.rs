// Delay - Feedback delay used as a send effect
//
// Circular buffer delay line. The output is fully wet; the track strip
// controls the send level.
//
// Real-time constraints:
// - Buffer sized for the maximum delay time at creation
// - No allocations during processing

use crate::audio::dsp_utils::OnePoleSmoother;

/// Longest supported delay time in seconds
pub const MAX_DELAY_SECONDS: f32 = 1.0;

/// Highest feedback fraction
pub const MAX_FEEDBACK: f32 = 0.9;

/// Delay parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayParams {
    /// Delay time in seconds (0.01 - 1.0)
    pub time_seconds: f32,
    /// Fraction of the delayed signal fed back (0.0 - 0.9)
    pub feedback: f32,
}

impl Default for DelayParams {
    fn default() -> Self {
        Self {
            time_seconds: 0.25,
            feedback: 0.3,
        }
    }
}

impl DelayParams {
    /// Create new delay parameters with clamping
    pub fn new(time_seconds: f32, feedback: f32) -> Self {
        Self {
            time_seconds: time_seconds.clamp(0.01, MAX_DELAY_SECONDS),
            feedback: feedback.clamp(0.0, MAX_FEEDBACK),
        }
    }
}

pub struct Delay {
    params: DelayParams,
    sample_rate: f32,
    buffer: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
    feedback_smoother: OnePoleSmoother,
}

impl Delay {
    /// Create a new delay
    ///
    /// # Arguments
    /// * `params` - Initial delay parameters
    /// * `sample_rate` - Audio sample rate in Hz
    pub fn new(params: DelayParams, sample_rate: f32) -> Self {
        let max_samples = (MAX_DELAY_SECONDS * sample_rate) as usize + 1;
        let mut delay = Self {
            params,
            sample_rate,
            buffer: vec![0.0; max_samples],
            write_pos: 0,
            delay_samples: 0,
            feedback_smoother: OnePoleSmoother::new(params.feedback, 10.0, sample_rate),
        };
        delay.set_params(params);
        delay
    }

    pub fn set_params(&mut self, params: DelayParams) {
        self.params = DelayParams::new(params.time_seconds, params.feedback);
        let samples = (self.params.time_seconds * self.sample_rate) as usize;
        self.delay_samples = samples.clamp(1, self.buffer.len() - 1);
    }

    pub fn params(&self) -> DelayParams {
        self.params
    }

    /// Clear all delayed samples
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Process one sample, returning the wet signal only
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let feedback = self.feedback_smoother.process(self.params.feedback);

        let read_pos = if self.write_pos >= self.delay_samples {
            self.write_pos - self.delay_samples
        } else {
            self.buffer.len() + self.write_pos - self.delay_samples
        };
        let delayed = self.buffer[read_pos];

        // Clamp to prevent runaway feedback
        self.buffer[self.write_pos] = (input + feedback * delayed).clamp(-2.0, 2.0);
        self.write_pos = (self.write_pos + 1) % self.buffer.len();

        delayed
    }

    /// Delay time in samples
    pub fn latency_samples(&self) -> usize {
        self.delay_samples
    }
}
