// Editing front: piano roll gestures, keyboard shortcuts and the workstation
// facade that wires them to the document, history and transport.

pub mod keymap;
pub mod piano_roll;
pub mod workstation;

pub use keymap::{EditorAction, Key, KeyPress, action_for};
pub use piano_roll::{GestureKind, GridPoint, HitZone, PianoRoll, PointerOutcome};
pub use workstation::Workstation;
