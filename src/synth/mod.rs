// Synthesis - Oscillators, voices and track effects

pub mod delay;
pub mod envelope;
pub mod filter;
pub mod instrument;
pub mod oscillator;
pub mod reverb;
pub mod voice;
pub mod voice_manager;

pub use instrument::InstrumentPatch;
pub use voice_manager::VoiceManager;
