//! Incremental Conway's Game of Life (B3/S23) on a toroidal grid.
//!
//! An engine on a worker thread produces per-generation diffs in batches; a
//! governor buffers them and replays them at a steady rate onto a display.

pub mod engine;
pub mod governor;
pub mod pattern;
pub mod topology;
pub mod transport;
pub mod view;

pub use engine::{
    EngineBackend, EngineConfig, EngineError, FrontierEngine, GenerationDiff, LifeEngine,
    ReferenceEngine, build_engine,
};
pub use governor::{DisplaySurface, DisplayUpdate, Governor, GovernorConfig, GovernorStatus};
pub use pattern::{Pattern, Preset};
pub use transport::{BatchTransport, Request, Response, ResultsBatch, SimulationWorker, connect};
pub use view::Viewport;
