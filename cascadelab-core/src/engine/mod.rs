//! Simulation engine: tick scheduler, cascade resolution and output recording.

pub mod cascade;
pub mod recorder;
pub mod simulation;

pub use cascade::{resolve, CascadeOutcome};
pub use recorder::{AssetSeries, KindSummary, OrderCounts, Recorder, RunOutput, TickStats};
pub use simulation::Simulation;
