// Audio engine - Real-time rendering of the scheduled timeline
//
// The engine owns the mix graph and the pending event queue. It is driven by
// the host's audio callback through `process` / `process_interleaved` and
// receives schedules over a lock-free ringbuffer; nothing in the render path
// blocks or performs I/O.
//
// Generations: every stop/pause/reschedule bumps the shared generation.
// Commands tagged with an older generation are dropped, so a late batch can
// never resurrect a cancelled schedule.

use crate::audio::graph::{EventQueue, MixGraph};
use crate::messaging::channels::{CommandConsumer, CommandProducer};
use crate::messaging::command::{EngineCommand, ScheduleBatch};
use crate::project::types::TrackId;
use crate::sequencer::scheduler::AudioHost;
use crate::sequencer::transport::SharedTransportState;
use ringbuf::traits::{Consumer, Producer};
use std::sync::Arc;

pub struct AudioEngine {
    sample_rate: f32,
    transport: Arc<SharedTransportState>,
    commands: CommandConsumer,
    graph: MixGraph,
    queue: EventQueue,
    /// Generation of the loaded schedule
    generation: u64,
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
}

impl AudioEngine {
    /// Create an engine
    ///
    /// # Arguments
    /// * `transport` - Shared play state and position
    /// * `commands` - Consumer end of the engine command channel
    /// * `max_block` - Largest block the host will request (scratch buffer size)
    pub fn new(
        transport: Arc<SharedTransportState>,
        commands: CommandConsumer,
        max_block: usize,
    ) -> Self {
        let sample_rate = transport.sample_rate() as f32;
        Self {
            sample_rate,
            graph: MixGraph::silent(sample_rate),
            queue: EventQueue::new(Vec::new(), sample_rate as f64),
            generation: transport.generation(),
            transport,
            commands,
            scratch_left: vec![0.0; max_block.max(1)],
            scratch_right: vec![0.0; max_block.max(1)],
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Generation of the schedule currently loaded
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Events of the loaded schedule not yet played
    pub fn pending_events(&self) -> usize {
        self.queue.remaining()
    }

    fn load(&mut self, batch: ScheduleBatch) {
        log::debug!(
            "Engine: loading generation {} ({} events from {:.3}s)",
            batch.generation,
            batch.events.len(),
            batch.origin_seconds
        );
        self.graph = MixGraph::new(self.sample_rate, &batch.tracks, batch.pool);
        self.queue = EventQueue::new(batch.events, self.sample_rate as f64);
        self.generation = batch.generation;
    }

    /// Drain pending commands (called at the start of every block)
    pub fn process_commands(&mut self) {
        while let Some(command) = self.commands.try_pop() {
            // Anything older than the shared generation was cancelled
            if command.generation() < self.transport.generation() {
                continue;
            }
            match command {
                EngineCommand::Load(batch) => self.load(*batch),
                EngineCommand::SetGain {
                    generation,
                    track,
                    gain,
                } => {
                    if generation == self.generation {
                        self.graph.set_gain(track, gain);
                    }
                }
                EngineCommand::ReleaseAll { generation } => {
                    self.graph.release_all();
                    self.queue = EventQueue::new(Vec::new(), self.sample_rate as f64);
                    self.generation = generation;
                }
            }
        }
    }

    /// Render one stereo block (planar)
    ///
    /// While playing, scheduled events fire at their sample positions and the
    /// shared position advances. When stopped the graph still renders so
    /// released notes and effect tails ring out.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.process_commands();

        let frames = left.len().min(right.len());
        if self.transport.is_playing() && self.generation == self.transport.generation() {
            let block_start = self.transport.position_samples();
            self.queue
                .render_block(&mut self.graph, block_start, &mut left[..frames], &mut right[..frames]);
            self.transport.advance_position(frames as u64);
        } else {
            self.graph.render(&mut left[..frames], &mut right[..frames]);
        }
    }

    /// Render into an interleaved device buffer with `channels` channels
    ///
    /// Mono devices get the average of both sides; channels beyond the
    /// second are silent.
    pub fn process_interleaved(&mut self, output: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let total_frames = output.len() / channels;
        let mut done = 0;

        while done < total_frames {
            let frames = (total_frames - done).min(self.scratch_left.len());
            let mut left = std::mem::take(&mut self.scratch_left);
            let mut right = std::mem::take(&mut self.scratch_right);
            self.process(&mut left[..frames], &mut right[..frames]);

            let out = &mut output[done * channels..(done + frames) * channels];
            for (i, frame) in out.chunks_exact_mut(channels).enumerate() {
                match frame {
                    [mono] => *mono = (left[i] + right[i]) * 0.5,
                    [l, r, rest @ ..] => {
                        *l = left[i];
                        *r = right[i];
                        rest.fill(0.0);
                    }
                    [] => {}
                }
            }

            self.scratch_left = left;
            self.scratch_right = right;
            done += frames;
        }
    }
}

/// Scheduler-side handle that forwards to the engine over the ringbuffer
pub struct EngineLink {
    producer: CommandProducer,
}

impl EngineLink {
    pub fn new(producer: CommandProducer) -> Self {
        Self { producer }
    }

    fn send(&mut self, command: EngineCommand) {
        if let Err(command) = self.producer.try_push(command) {
            log::warn!(
                "Engine command queue full; dropped command for generation {}",
                command.generation()
            );
        }
    }
}

impl AudioHost for EngineLink {
    fn load(&mut self, batch: ScheduleBatch) {
        self.send(EngineCommand::Load(Box::new(batch)));
    }

    fn set_track_gain(&mut self, generation: u64, track: TrackId, gain: f32) {
        self.send(EngineCommand::SetGain {
            generation,
            track,
            gain,
        });
    }

    fn cancel(&mut self, generation: u64) {
        self.send(EngineCommand::ReleaseAll { generation });
    }
}
