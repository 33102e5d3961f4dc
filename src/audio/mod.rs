// Module audio - Render graph, live engine, offline export and file decoding

pub mod decode;
pub mod dsp_utils;
pub mod engine;
pub mod export;
pub mod graph;

pub use engine::{AudioEngine, EngineLink};
pub use export::{AudioExporter, CancelToken, ExportError, ExportFormat, OfflineRenderer};
