// Voice Manager - Polyphony for one instrument track
//
// Sequenced material can hold the same pitch twice (overlapping clips or
// notes), so every note-off releases only the oldest held voice for its
// pitch. On-off pairs then match up first in, first out.

use super::instrument::InstrumentPatch;
use super::voice::Voice;

const MAX_VOICES: usize = 16;
/// Headroom so a full chord stays below clipping before the track gain
const MIX_SCALE: f32 = 0.25;

pub struct VoiceManager {
    voices: [Voice; MAX_VOICES],
    /// Bumped on every note-on; lower age means an older voice
    age_counter: u64,
}

impl VoiceManager {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            voices: std::array::from_fn(|_| Voice::new(sample_rate)),
            age_counter: 0,
        }
    }

    /// Create a manager whose voices all use `patch`
    pub fn with_patch(sample_rate: f32, patch: InstrumentPatch) -> Self {
        let mut manager = Self::new(sample_rate);
        manager.set_patch(patch);
        manager
    }

    pub fn note_on(&mut self, note: u8, velocity: u8) {
        self.age_counter = self.age_counter.wrapping_add(1);
        let index = self
            .voices
            .iter()
            .position(|v| !v.is_active())
            .unwrap_or_else(|| self.steal_index());
        self.voices[index].note_on(note, velocity, self.age_counter);
    }

    /// Voice to reuse when all are busy: releasing voices before held
    /// ones, then the oldest
    fn steal_index(&self) -> usize {
        self.voices
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| (!v.is_releasing(), v.get_age()))
            .map_or(0, |(i, _)| i)
    }

    /// Release the oldest held voice playing `note`
    pub fn note_off(&mut self, note: u8) {
        let oldest = self
            .voices
            .iter_mut()
            .filter(|v| v.is_held() && v.get_note() == note)
            .min_by_key(|v| v.get_age());
        if let Some(voice) = oldest {
            voice.note_off();
        }
    }

    /// Release every held voice (tails still ring out)
    pub fn release_all(&mut self) {
        for voice in self.voices.iter_mut().filter(|v| v.is_held()) {
            voice.note_off();
        }
    }

    /// Silence every voice immediately
    pub fn kill_all(&mut self) {
        for voice in &mut self.voices {
            voice.kill();
        }
    }

    pub fn set_patch(&mut self, patch: InstrumentPatch) {
        for voice in &mut self.voices {
            voice.set_patch(patch);
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        self.voices.iter_mut().map(|v| v.next_sample()).sum::<f32>() * MIX_SCALE
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }
}
