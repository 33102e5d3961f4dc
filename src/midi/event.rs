// MIDI types events

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
}

impl MidiEvent {
    /// Build a note-on; velocity 0 is treated as note-off
    pub fn note_on(note: u8, velocity: u8) -> Self {
        if velocity == 0 {
            MidiEvent::NoteOff { note }
        } else {
            MidiEvent::NoteOn { note, velocity }
        }
    }

    /// MIDI note number carried by the event
    pub fn note(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { note, .. } | MidiEvent::NoteOff { note } => note,
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self, MidiEvent::NoteOn { .. })
    }
}

/// Convert a MIDI note number to its frequency in Hz (A4 = 440 Hz)
pub fn note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_velocity_zero() {
        assert_eq!(MidiEvent::note_on(64, 0), MidiEvent::NoteOff { note: 64 });
        assert!(MidiEvent::note_on(64, 1).is_note_on());
    }

    #[test]
    fn test_note_accessor() {
        assert_eq!(MidiEvent::NoteOff { note: 12 }.note(), 12);
    }

    #[test]
    fn test_note_to_frequency() {
        assert!((note_to_frequency(69) - 440.0).abs() < 1e-3);
        assert!((note_to_frequency(57) - 220.0).abs() < 1e-3);
        assert!((note_to_frequency(60) - 261.626).abs() < 1e-2);
    }
}
