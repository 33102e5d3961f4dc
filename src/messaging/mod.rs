// Messaging - Lock-free scheduler -> engine communication

pub mod channels;
pub mod command;

pub use channels::{CommandConsumer, CommandProducer, create_command_channel};
pub use command::{EngineCommand, ScheduleBatch};
