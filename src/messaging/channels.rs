// Communication channels lock-free

use crate::messaging::command::EngineCommand;
use ringbuf::{HeapRb, traits::Split};

pub type CommandProducer = ringbuf::HeapProd<EngineCommand>;
pub type CommandConsumer = ringbuf::HeapCons<EngineCommand>;

pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<EngineCommand>::new(capacity);
    rb.split()
}
