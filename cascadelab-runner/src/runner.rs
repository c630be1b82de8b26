//! Run orchestration — single runs and parallel batches.
//!
//! Runs share nothing mutable: each builds a fresh `Simulation` whose random
//! streams are keyed by `(seed, run_index)`, so a batch gives the same
//! outputs whether it runs on one thread or many.

use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use cascadelab_core::{ConfigError, RunOutput, Simulation, SimulationConfig};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown sweep parameter: {0}")]
    UnknownSweepParam(String),
    #[error("invalid value {value} for sweep parameter {param}")]
    InvalidSweepValue { param: &'static str, value: f64 },
}

/// Run one simulation to completion.
pub fn run_single(config: &SimulationConfig, run_index: u64) -> Result<RunOutput, RunError> {
    let simulation = Simulation::new(config, run_index)?;
    Ok(simulation.run())
}

/// Run `config.num_runs` independent runs, optionally in parallel.
///
/// Outputs are ordered by run index either way.
pub fn run_batch(config: &SimulationConfig, parallel: bool) -> Result<Vec<RunOutput>, RunError> {
    config.validate()?;
    info!(runs = config.num_runs, ticks = config.num_ticks, parallel, "batch started");
    let indices: Vec<u64> = (0..config.num_runs as u64).collect();
    let outputs = if parallel {
        indices
            .par_iter()
            .map(|&i| run_single(config, i))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        indices
            .iter()
            .map(|&i| run_single(config, i))
            .collect::<Result<Vec<_>, _>>()?
    };
    info!(runs = outputs.len(), "batch finished");
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascadelab_core::config::TraderCounts;

    fn small() -> SimulationConfig {
        SimulationConfig {
            num_ticks: 40,
            num_runs: 3,
            traders: TraderCounts {
                trend: 2,
                value: 2,
                long_short: 1,
            },
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn batch_is_ordered_by_run_index() {
        let outputs = run_batch(&small(), true).unwrap();
        let indices: Vec<u64> = outputs.iter().map(|o| o.run_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn parallel_matches_sequential() {
        let parallel = run_batch(&small(), true).unwrap();
        let sequential = run_batch(&small(), false).unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn invalid_config_is_reported() {
        let mut config = small();
        config.num_ticks = 0;
        assert!(matches!(
            run_batch(&config, false),
            Err(RunError::Config(ConfigError::ZeroTicks))
        ));
    }
}
