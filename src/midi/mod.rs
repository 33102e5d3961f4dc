// MIDI - Note events and Standard MIDI File import

pub mod event;
pub mod smf;

pub use event::{MidiEvent, note_to_frequency};
pub use smf::{ImportedNote, ImportedTrack, MidiImport, parse_midi};
