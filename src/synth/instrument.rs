// Instrument presets - Maps a track's preset name to a voice model + envelope

use super::envelope::AdsrParams;
use super::oscillator::WaveformType;

/// How a voice produces its raw signal
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceModel {
    /// Single oscillator
    Basic(WaveformType),
    /// Several detuned saws
    Fat { count: usize, spread_cents: f32 },
    /// Sine carrier phase-modulated by a sine at `ratio` x frequency
    Fm { ratio: f32, index: f32 },
    /// Sine carrier amplitude-modulated by a sine at `ratio` x frequency
    Am { ratio: f32 },
    /// Sine with a fast downward pitch sweep (kick/tom)
    Membrane { octaves: f32, pitch_decay: f32 },
    /// Inharmonic square partials (cymbal/bell)
    Metal,
}

/// Everything needed to configure the voices of one track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentPatch {
    pub model: VoiceModel,
    pub adsr: AdsrParams,
}

/// Names accepted by `InstrumentPatch::for_preset`
pub const PRESET_NAMES: [&str; 10] = [
    "triangle", "sawtooth", "square", "sine", "fm", "am", "fat", "membrane", "metal", "pluck",
];

impl InstrumentPatch {
    /// Look up a preset by name; unknown names fall back to "triangle"
    pub fn for_preset(name: &str) -> Self {
        let (model, adsr) = match name {
            "sawtooth" => (
                VoiceModel::Basic(WaveformType::Saw),
                AdsrParams::new(0.01, 0.2, 0.2, 0.4),
            ),
            "square" => (
                VoiceModel::Basic(WaveformType::Square),
                AdsrParams::new(0.01, 0.15, 0.3, 0.3),
            ),
            "sine" => (
                VoiceModel::Basic(WaveformType::Sine),
                AdsrParams::new(0.05, 0.2, 0.5, 0.8),
            ),
            "fm" => (
                VoiceModel::Fm {
                    ratio: 3.0,
                    index: 3.0,
                },
                AdsrParams::new(0.01, 0.2, 0.3, 0.4),
            ),
            "am" => (
                VoiceModel::Am { ratio: 3.0 },
                AdsrParams::new(0.02, 0.2, 0.3, 0.4),
            ),
            "membrane" => (
                VoiceModel::Membrane {
                    octaves: 4.0,
                    pitch_decay: 0.05,
                },
                AdsrParams::new(0.001, 0.3, 0.0, 0.1),
            ),
            "metal" => (VoiceModel::Metal, AdsrParams::new(0.001, 0.4, 0.0, 0.2)),
            "pluck" => (
                VoiceModel::Basic(WaveformType::Triangle),
                AdsrParams::new(0.001, 0.4, 0.0, 0.1),
            ),
            "fat" => (
                VoiceModel::Fat {
                    count: 3,
                    spread_cents: 20.0,
                },
                AdsrParams::new(0.03, 0.2, 0.4, 0.5),
            ),
            _ => (
                VoiceModel::Basic(WaveformType::Triangle),
                AdsrParams::new(0.02, 0.1, 0.3, 0.4),
            ),
        };
        Self { model, adsr }
    }
}

impl Default for InstrumentPatch {
    fn default() -> Self {
        Self::for_preset("triangle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_preset_falls_back_to_triangle() {
        assert_eq!(InstrumentPatch::for_preset("kazoo"), InstrumentPatch::default());
        assert_eq!(
            InstrumentPatch::default().model,
            VoiceModel::Basic(WaveformType::Triangle)
        );
    }

    #[test]
    fn test_every_named_preset_is_distinct_from_fallback_or_is_triangle() {
        for name in PRESET_NAMES {
            let patch = InstrumentPatch::for_preset(name);
            if name != "triangle" {
                assert_ne!(patch, InstrumentPatch::default(), "{}", name);
            }
        }
    }

    #[test]
    fn test_percussive_presets_have_no_sustain() {
        for name in ["membrane", "metal", "pluck"] {
            assert_eq!(InstrumentPatch::for_preset(name).adsr.sustain, 0.0);
        }
    }
}
