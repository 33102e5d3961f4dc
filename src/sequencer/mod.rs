// Sequencer module
// Musical time, automation, event derivation and the transport scheduler

pub mod automation;
pub mod events;
pub mod scheduler;
pub mod timeline;
pub mod transport;

pub use events::{EventKind, ScheduledEvent, derive_events};
pub use scheduler::{AudioHost, LoopRegion, TransportScheduler};
pub use timeline::{Tempo, TimeSignature};
pub use transport::{PlayheadSampler, SharedTransportState, TransportState};
