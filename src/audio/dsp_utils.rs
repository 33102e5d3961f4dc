// DSP utilities - Audio hygiene, smoothing and sample conversion
//
// Shared by the live engine and the offline renderer so both paths produce
// identical output.

use std::f32::consts::FRAC_PI_4;

/// Flush denormals to zero
///
/// Denormal numbers (very close to 0) can cause severe CPU slowdowns on
/// some processors.
///
/// Threshold: 1e-15 (well below 32-bit float numeric noise)
#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// Equal-power pan law
///
/// # Arguments
/// * `pan` - Position from -1.0 (hard left) to 1.0 (hard right)
///
/// # Returns
/// `(left_gain, right_gain)`; both are ~0.707 at center
#[inline]
pub fn equal_power_pan(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

/// Convert a float sample to signed 16-bit PCM
///
/// The sample is clamped to [-1, 1]; negative values scale by 32768 and
/// positive values by 32767, so both extremes map exactly onto the i16
/// range.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// One-pole smoother (first-order low-pass)
///
/// Smooths abrupt parameter changes to avoid clicks/pops.
///
/// Formula: y[n] = y[n-1] + α * (x[n] - y[n-1])
pub struct OnePoleSmoother {
    current: f32,
    coefficient: f32,
}

impl OnePoleSmoother {
    /// Create a new smoother
    ///
    /// # Arguments
    /// * `initial_value` - Starting value
    /// * `time_constant_ms` - Time to reach ~63% of the target (milliseconds)
    /// * `sample_rate` - Sample rate in Hz
    pub fn new(initial_value: f32, time_constant_ms: f32, sample_rate: f32) -> Self {
        let time_constant_samples = (time_constant_ms * 0.001 * sample_rate).max(1.0);
        Self {
            current: initial_value,
            coefficient: (1.0 / time_constant_samples).min(1.0),
        }
    }

    /// Advance one sample towards `target`
    #[inline]
    pub fn process(&mut self, target: f32) -> f32 {
        self.current += self.coefficient * (target - self.current);
        self.current = flush_denormals_to_zero(self.current);
        self.current
    }

    /// Jump to a value without smoothing
    #[inline]
    pub fn reset(&mut self, value: f32) {
        self.current = value;
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }
}
