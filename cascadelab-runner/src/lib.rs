//! CascadeLab Runner — config files, batch runs, sweeps and artifact export.
//!
//! This crate builds on `cascadelab-core` to provide:
//! - TOML config parsing with validation and content hashing
//! - Single runs and parallel multi-run batches
//! - One-parameter sweeps with cross-run aggregate statistics
//! - CSV series, JSON manifests and sweep tables on disk

pub mod config;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{config_hash, load_config, parse_config, save_config, to_toml};
pub use export::{load_manifest, save_artifacts, save_sweep, Manifest, RunSummary};
pub use metrics::{Aggregate, RunMetrics};
pub use runner::{run_batch, run_single, RunError};
pub use sweep::{ParamSweep, SweepGrid, SweepParam, SweepPoint, SweepResults};
