// Filter - State Variable Filter (topology-preserving transform)
//
// 2-pole filter with low-pass, high-pass and band-pass outputs.
//
// References:
// - Andrew Simper, "Linear Trapezoidal Integrated State Variable Filter" (2011)
// - Vadim Zavalishin, "The Art of VA Filter Design"
//
// Characteristics:
// - 12dB/octave slope (2-pole)
// - Stable for any cutoff below Nyquist
// - Cutoff changes are smoothed to avoid zipper noise

use crate::audio::dsp_utils::{OnePoleSmoother, flush_denormals_to_zero};
use crate::project::FilterType;
use std::f32::consts::PI;

/// Filter parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Cutoff frequency in Hz (20Hz - 20kHz)
    pub cutoff: f32,
    /// Resonance (Q factor: 0.5 - 20.0)
    pub resonance: f32,
    pub filter_type: FilterType,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            cutoff: 1000.0,
            // Butterworth response
            resonance: std::f32::consts::FRAC_1_SQRT_2,
            filter_type: FilterType::Lowpass,
        }
    }
}

impl FilterParams {
    pub fn new(cutoff: f32, filter_type: FilterType) -> Self {
        Self {
            cutoff: cutoff.clamp(20.0, 20000.0),
            filter_type,
            ..Self::default()
        }
    }
}

pub struct StateVariableFilter {
    params: FilterParams,
    sample_rate: f32,

    // Integrator states
    ic1eq: f32,
    ic2eq: f32,

    // Coefficients
    a1: f32,
    a2: f32,
    a3: f32,
    k: f32,
    coefficient_cutoff: f32,

    cutoff_smoother: OnePoleSmoother,
}

impl StateVariableFilter {
    /// Create a new filter
    ///
    /// # Arguments
    /// * `params` - Initial filter parameters
    /// * `sample_rate` - Audio sample rate in Hz
    pub fn new(params: FilterParams, sample_rate: f32) -> Self {
        let mut filter = Self {
            params,
            sample_rate,
            ic1eq: 0.0,
            ic2eq: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
            k: 0.0,
            coefficient_cutoff: 0.0,
            cutoff_smoother: OnePoleSmoother::new(params.cutoff, 5.0, sample_rate),
        };
        filter.update_coefficients(params.cutoff);
        filter
    }

    pub fn set_params(&mut self, params: FilterParams) {
        self.params = params;
    }

    pub fn params(&self) -> FilterParams {
        self.params
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
        self.cutoff_smoother.reset(self.params.cutoff);
        self.update_coefficients(self.params.cutoff);
    }

    fn update_coefficients(&mut self, cutoff: f32) {
        // Keep the pre-warped frequency strictly below Nyquist
        let nyquist_guard = self.sample_rate * 0.49;
        let cutoff = cutoff.clamp(20.0, nyquist_guard);
        let g = (PI * cutoff / self.sample_rate).tan();
        self.k = 1.0 / self.params.resonance.clamp(0.5, 20.0);
        self.a1 = 1.0 / (1.0 + g * (g + self.k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
        self.coefficient_cutoff = cutoff;
    }

    /// Process one sample
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let cutoff = self.cutoff_smoother.process(self.params.cutoff);
        if (cutoff - self.coefficient_cutoff).abs() > 0.01 {
            self.update_coefficients(cutoff);
        }

        let v3 = input - self.ic2eq;
        let v1 = self.a1 * self.ic1eq + self.a2 * v3;
        let v2 = self.ic2eq + self.a2 * self.ic1eq + self.a3 * v3;
        self.ic1eq = flush_denormals_to_zero(2.0 * v1 - self.ic1eq);
        self.ic2eq = flush_denormals_to_zero(2.0 * v2 - self.ic2eq);

        match self.params.filter_type {
            FilterType::Lowpass => v2,
            FilterType::Bandpass => v1,
            FilterType::Highpass => input - self.k * v1 - v2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    fn sine_rms(filter: &mut StateVariableFilter, freq: f32) -> f32 {
        let n = 8820;
        let mut sum = 0.0;
        for i in 0..n {
            let x = (2.0 * PI * freq * i as f32 / SAMPLE_RATE).sin();
            let y = filter.process(x);
            // Skip the settling period
            if i >= n / 2 {
                sum += y * y;
            }
        }
        (sum / (n / 2) as f32).sqrt()
    }

    #[test]
    fn test_lowpass_attenuates_highs() {
        let mut low = StateVariableFilter::new(FilterParams::new(500.0, FilterType::Lowpass), SAMPLE_RATE);
        let passed = sine_rms(&mut low, 100.0);
        low.reset();
        let blocked = sine_rms(&mut low, 8000.0);
        assert!(passed > 0.6);
        assert!(blocked < 0.05);
    }

    #[test]
    fn test_highpass_attenuates_lows() {
        let mut high =
            StateVariableFilter::new(FilterParams::new(4000.0, FilterType::Highpass), SAMPLE_RATE);
        let blocked = sine_rms(&mut high, 100.0);
        high.reset();
        let passed = sine_rms(&mut high, 15000.0);
        assert!(blocked < 0.05);
        assert!(passed > 0.6);
    }

    #[test]
    fn test_bandpass_peaks_at_cutoff() {
        let mut band =
            StateVariableFilter::new(FilterParams::new(1000.0, FilterType::Bandpass), SAMPLE_RATE);
        let center = sine_rms(&mut band, 1000.0);
        band.reset();
        let far = sine_rms(&mut band, 50.0);
        assert!(center > far * 4.0);
    }

    #[test]
    fn test_stable_at_max_cutoff() {
        let mut filter =
            StateVariableFilter::new(FilterParams::new(20000.0, FilterType::Lowpass), SAMPLE_RATE);
        for i in 0..44100 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            assert!(filter.process(x).is_finite());
        }
    }
}
