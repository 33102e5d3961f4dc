// Voice - One playing note

use super::envelope::AdsrEnvelope;
use super::instrument::{InstrumentPatch, VoiceModel};
use super::oscillator::{Oscillator, SimpleOscillator, WaveformType};
use crate::midi::event::note_to_frequency;
use std::f32::consts::PI;

/// Frequency ratios of the metal model's partials
const METAL_RATIOS: [f32; 6] = [1.0, 1.483, 1.932, 2.546, 2.630, 3.897];

/// Oscillators available to a voice; models use as many as they need
const OSCILLATOR_COUNT: usize = 6;

pub struct Voice {
    oscillators: [SimpleOscillator; OSCILLATOR_COUNT],
    envelope: AdsrEnvelope,
    model: VoiceModel,
    note: u8,
    frequency: f32,
    velocity: f32,
    active: bool,
    sample_rate: f32,
    /// Samples since note-on (pitch sweeps)
    elapsed: u32,
    /// Age counter for voice stealing priority (higher = newer)
    age: u64,
}

impl Voice {
    pub fn new(sample_rate: f32) -> Self {
        let patch = InstrumentPatch::default();
        let mut voice = Self {
            oscillators: std::array::from_fn(|_| {
                SimpleOscillator::new(WaveformType::Sine, sample_rate)
            }),
            envelope: AdsrEnvelope::new(patch.adsr, sample_rate),
            model: patch.model,
            note: 0,
            frequency: 0.0,
            velocity: 0.0,
            active: false,
            sample_rate,
            elapsed: 0,
            age: 0,
        };
        voice.set_patch(patch);
        voice
    }

    /// Switch the voice model and envelope
    pub fn set_patch(&mut self, patch: InstrumentPatch) {
        self.model = patch.model;
        self.envelope.set_params(patch.adsr);
        let waveform = match patch.model {
            VoiceModel::Basic(waveform) => waveform,
            VoiceModel::Fat { .. } => WaveformType::Saw,
            VoiceModel::Metal => WaveformType::Square,
            _ => WaveformType::Sine,
        };
        for osc in &mut self.oscillators {
            osc.set_waveform(waveform);
        }
        if self.active {
            self.tune(self.frequency);
        }
    }

    fn tune(&mut self, frequency: f32) {
        match self.model {
            VoiceModel::Basic(_) | VoiceModel::Membrane { .. } => {
                self.oscillators[0].set_frequency(frequency);
            }
            VoiceModel::Fat {
                count,
                spread_cents,
            } => {
                let count = count.clamp(1, OSCILLATOR_COUNT);
                for (i, osc) in self.oscillators.iter_mut().take(count).enumerate() {
                    // Spread evenly across [-spread, +spread]
                    let position = if count == 1 {
                        0.0
                    } else {
                        i as f32 / (count - 1) as f32 * 2.0 - 1.0
                    };
                    let cents = position * spread_cents;
                    osc.set_frequency(frequency * 2.0_f32.powf(cents / 1200.0));
                }
            }
            VoiceModel::Fm { ratio, .. } | VoiceModel::Am { ratio } => {
                self.oscillators[0].set_frequency(frequency);
                self.oscillators[1].set_frequency(frequency * ratio);
            }
            VoiceModel::Metal => {
                for (osc, ratio) in self.oscillators.iter_mut().zip(METAL_RATIOS) {
                    osc.set_frequency(frequency * ratio);
                }
            }
        }
    }

    pub fn note_on(&mut self, note: u8, velocity: u8, age: u64) {
        self.note = note;
        self.velocity = velocity as f32 / 127.0;
        self.active = true;
        self.age = age;
        self.elapsed = 0;
        self.frequency = note_to_frequency(note);
        self.tune(self.frequency);
        for osc in &mut self.oscillators {
            osc.reset();
        }
        self.envelope.note_on();
    }

    pub fn note_off(&mut self) {
        self.active = false;
        self.envelope.note_off();
    }

    /// Silence immediately, skipping the release
    pub fn kill(&mut self) {
        self.active = false;
        self.envelope.reset();
    }

    pub fn is_active(&self) -> bool {
        // Voice is active if envelope is still running (even during release)
        self.envelope.is_active()
    }

    pub fn get_note(&self) -> u8 {
        self.note
    }

    pub fn get_age(&self) -> u64 {
        self.age
    }

    /// Check if the voice is in release phase (note off but still sounding)
    pub fn is_releasing(&self) -> bool {
        !self.active && self.envelope.is_releasing()
    }

    /// Whether the voice is held by a note-on (not yet released)
    pub fn is_held(&self) -> bool {
        self.active
    }

    fn raw_sample(&mut self) -> f32 {
        match self.model {
            VoiceModel::Basic(_) => self.oscillators[0].next_sample(),
            VoiceModel::Fat { count, .. } => {
                let count = count.clamp(1, OSCILLATOR_COUNT);
                let sum: f32 = self
                    .oscillators
                    .iter_mut()
                    .take(count)
                    .map(|o| o.next_sample())
                    .sum();
                sum / count as f32
            }
            VoiceModel::Fm { index, .. } => {
                let modulator = self.oscillators[1].next_sample();
                self.oscillators[0].next_sample_with_offset(modulator * index / (2.0 * PI))
            }
            VoiceModel::Am { .. } => {
                let modulator = self.oscillators[1].next_sample();
                self.oscillators[0].next_sample() * (0.5 + 0.5 * modulator)
            }
            VoiceModel::Membrane {
                octaves,
                pitch_decay,
            } => {
                let t = self.elapsed as f32 / self.sample_rate;
                let sweep = octaves * (-t / pitch_decay.max(1e-4)).exp();
                self.oscillators[0].set_frequency(self.frequency * 2.0_f32.powf(sweep));
                self.oscillators[0].next_sample()
            }
            VoiceModel::Metal => {
                let sum: f32 = self.oscillators.iter_mut().map(|o| o.next_sample()).sum();
                sum / OSCILLATOR_COUNT as f32
            }
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        if !self.envelope.is_active() {
            return 0.0;
        }
        let envelope_value = self.envelope.process();
        let sample = self.raw_sample() * self.velocity * envelope_value;
        self.elapsed = self.elapsed.saturating_add(1);
        sample
    }
}
