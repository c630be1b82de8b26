//! CascadeLab CLI — run simulations, sweep parameters, write starter configs.
//!
//! Commands:
//! - `run` — execute one or more runs from a TOML config and save artifacts
//! - `sweep` — vary one config parameter over a grid and save aggregate tables
//! - `init-config` — print or write the default configuration

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cascadelab_core::SimulationConfig;
use cascadelab_runner::{
    load_config, run_batch, save_artifacts, save_config, save_sweep, to_toml, ParamSweep,
    RunMetrics, SweepGrid, SweepParam, SweepResults,
};

#[derive(Parser)]
#[command(
    name = "cascadelab",
    about = "CascadeLab CLI — risk-constrained multi-agent market simulator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run simulations from a TOML config file.
    Run {
        /// Path to a TOML config file. Defaults to the built-in baseline.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the number of runs.
        #[arg(long)]
        runs: Option<usize>,

        /// Override the number of ticks per run.
        #[arg(long)]
        ticks: Option<usize>,

        /// Override the master seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Run sequentially instead of across threads.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Print per-run metrics as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Sweep one parameter over a grid of values.
    Sweep {
        /// Path to a TOML config file. Defaults to the built-in baseline.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Parameter to vary: liquidity, risk.limit, risk.var_confidence,
        /// risk.stress_volatility, max_selloff_fraction, max_cascade_iterations,
        /// traders.trend, traders.value, traders.long_short.
        #[arg(long)]
        param: String,

        /// Comma-separated grid values (e.g. 100,200,400).
        #[arg(long, value_delimiter = ',', conflicts_with = "linear")]
        values: Option<Vec<f64>>,

        /// Evenly spaced grid: START END STEPS.
        #[arg(long, num_args = 3, value_names = ["START", "END", "STEPS"])]
        linear: Option<Vec<f64>>,

        /// Override the number of runs per grid point.
        #[arg(long)]
        runs: Option<usize>,

        /// Evaluate grid points sequentially.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Output directory for the sweep table.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Print the default configuration as TOML, or write it to a file.
    InitConfig {
        /// Destination file. Prints to stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cascadelab=info,cascadelab_core=info,cascadelab_runner=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            runs,
            ticks,
            seed,
            sequential,
            json,
            output_dir,
        } => {
            let mut config = resolve_config(config.as_deref())?;
            if let Some(runs) = runs {
                config.num_runs = runs;
            }
            if let Some(ticks) = ticks {
                config.num_ticks = ticks;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }
            run_cmd(&config, !sequential, json, &output_dir)
        }
        Commands::Sweep {
            config,
            param,
            values,
            linear,
            runs,
            sequential,
            output_dir,
        } => {
            let mut config = resolve_config(config.as_deref())?;
            if let Some(runs) = runs {
                config.num_runs = runs;
            }
            let grid = build_grid(&param, values, linear)?;
            sweep_cmd(&config, &grid, !sequential, &output_dir)
        }
        Commands::InitConfig { output, force } => init_config_cmd(output.as_deref(), force),
    }
}

fn resolve_config(path: Option<&Path>) -> Result<SimulationConfig> {
    match path {
        Some(path) => load_config(path),
        None => {
            info!("no config given, using built-in baseline");
            Ok(SimulationConfig::default())
        }
    }
}

fn build_grid(
    param: &str,
    values: Option<Vec<f64>>,
    linear: Option<Vec<f64>>,
) -> Result<SweepGrid> {
    let param: SweepParam = param.parse()?;
    match (values, linear) {
        (Some(values), None) => {
            if values.is_empty() {
                bail!("--values must list at least one value");
            }
            Ok(SweepGrid::new(param, values))
        }
        (None, Some(linear)) => match linear.as_slice() {
            &[start, end, steps] if steps >= 1.0 && steps.fract() == 0.0 => {
                Ok(SweepGrid::linear(param, start, end, steps as usize))
            }
            _ => bail!("--linear expects START END STEPS with STEPS a positive integer"),
        },
        _ => bail!("one of --values or --linear is required"),
    }
}

fn run_cmd(config: &SimulationConfig, parallel: bool, json: bool, output_dir: &Path) -> Result<()> {
    let outputs = run_batch(config, parallel)?;
    let metrics: Vec<RunMetrics> = outputs.iter().map(RunMetrics::compute).collect();

    if json {
        let text = serde_json::to_string_pretty(&metrics).context("failed to serialize metrics")?;
        println!("{text}");
    } else {
        print_run_table(&metrics);
    }

    let dir = save_artifacts(config, &outputs, output_dir)?;
    println!("Artifacts saved to: {}", dir.display());
    Ok(())
}

fn sweep_cmd(
    config: &SimulationConfig,
    grid: &SweepGrid,
    parallel: bool,
    output_dir: &Path,
) -> Result<()> {
    let results = ParamSweep::new()
        .with_parallelism(parallel)
        .sweep(grid, config)?;

    print_sweep_table(&results);

    let dir = save_sweep(config, &results, output_dir)?;
    println!("Sweep saved to: {}", dir.display());
    Ok(())
}

fn init_config_cmd(output: Option<&Path>, force: bool) -> Result<()> {
    let config = SimulationConfig::default();
    match output {
        None => {
            print!("{}", to_toml(&config)?);
            Ok(())
        }
        Some(path) => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            save_config(&config, path)?;
            println!("Wrote default config to: {}", path.display());
            Ok(())
        }
    }
}

fn print_run_table(metrics: &[RunMetrics]) {
    println!(
        "{:>4}  {:>10}  {:>10}  {:>10}  {:>9}  {:>7}  {:>9}",
        "run", "vol", "max_dd", "mispricing", "breaches", "rounds", "selloffs"
    );
    for m in metrics {
        println!(
            "{:>4}  {:>10.5}  {:>9.2}%  {:>10.4}  {:>9}  {:>7}  {:>9}",
            m.run_index,
            m.price_volatility,
            m.max_drawdown * 100.0,
            m.mean_mispricing,
            m.total_breaches,
            m.max_cascade_rounds,
            m.forced_selloffs,
        );
    }
}

fn print_sweep_table(results: &SweepResults) {
    println!(
        "{:>12}  {:>10}  {:>10}  {:>12}  {:>10}",
        results.param.as_str(),
        "vol",
        "max_dd",
        "breaches",
        "selloffs"
    );
    for p in results.all() {
        println!(
            "{:>12}  {:>10.5}  {:>9.2}%  {:>12.1}  {:>10.1}",
            p.value,
            p.price_volatility.mean,
            p.max_drawdown.mean * 100.0,
            p.total_breaches.mean,
            p.forced_selloffs.mean,
        );
    }
}
