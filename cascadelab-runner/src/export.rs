//! Artifact export: CSV series, JSON manifest, sweep tables.
//!
//! A run directory holds:
//! - `prices.csv`, `values.csv`, `order_flow.csv`: `tick` then one column per asset
//! - `wealth.csv`: `tick` then one column per trader
//! - `risk.csv`: cross-trader risk statistics per tick
//! - `wealth_by_kind.csv`: mean one-tick wealth change per trader kind
//!
//! Batches write one `run_{i}` subdirectory per run next to a single
//! `manifest.json` and the `config.toml` that produced them. The manifest
//! carries a `schema_version`; unknown versions are rejected on load.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use cascadelab_core::engine::{AssetSeries, OrderCounts, TickStats};
use cascadelab_core::{RunOutput, SimulationConfig};

use crate::config::{config_hash, save_config};
use crate::metrics::{Aggregate, RunMetrics};
use crate::sweep::{SweepParam, SweepResults};

pub const SCHEMA_VERSION: u32 = 1;

// ─── Manifest ───────────────────────────────────────────────────────

/// Per-run entry of the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_index: u64,
    pub seed: u64,
    pub num_ticks: usize,
    pub metrics: RunMetrics,
    pub orders: OrderCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub created_at: String,
    pub config_hash: String,
    pub config: SimulationConfig,
    pub runs: Vec<RunSummary>,
    /// Sweep parameter, when the directory holds a sweep.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_param: Option<SweepParam>,
}

impl Manifest {
    pub fn new(config: &SimulationConfig, outputs: &[RunOutput]) -> Result<Self> {
        let runs = outputs
            .iter()
            .map(|o| RunSummary {
                run_index: o.run_index,
                seed: o.seed,
                num_ticks: o.num_ticks,
                metrics: RunMetrics::compute(o),
                orders: o.orders,
            })
            .collect();
        Ok(Self {
            schema_version: SCHEMA_VERSION,
            created_at: chrono::Local::now().to_rfc3339(),
            config_hash: config_hash(config)?,
            config: config.clone(),
            runs,
            sweep_param: None,
        })
    }
}

pub fn export_manifest_json(manifest: &Manifest) -> Result<String> {
    serde_json::to_string_pretty(manifest).context("failed to serialize manifest to JSON")
}

/// Parse a manifest, rejecting unknown schema versions.
pub fn import_manifest_json(json: &str) -> Result<Manifest> {
    let manifest: Manifest =
        serde_json::from_str(json).context("failed to deserialize manifest from JSON")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

// ─── CSV export ─────────────────────────────────────────────────────

fn asset_series_csv(assets: &[AssetSeries], select: fn(&AssetSeries) -> &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["tick".to_string()];
    header.extend(assets.iter().map(|a| a.name.clone()));
    wtr.write_record(&header)?;

    let len = assets.iter().map(|a| select(a).len()).max().unwrap_or(0);
    for tick in 0..len {
        let mut row = vec![tick.to_string()];
        row.extend(
            assets
                .iter()
                .map(|a| select(a).get(tick).map_or(String::new(), |v| format!("{v:.6}"))),
        );
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: tick, then one price column per asset.
pub fn export_prices_csv(output: &RunOutput) -> Result<String> {
    asset_series_csv(&output.assets, |a| &a.price)
}

/// Columns: tick, then one fundamental-value column per asset.
pub fn export_values_csv(output: &RunOutput) -> Result<String> {
    asset_series_csv(&output.assets, |a| &a.value)
}

/// Columns: tick, then one net-flow column per asset.
pub fn export_order_flow_csv(output: &RunOutput) -> Result<String> {
    asset_series_csv(&output.assets, |a| &a.flow)
}

/// Columns: tick, then one wealth column per trader (by name).
pub fn export_wealth_csv(output: &RunOutput) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["tick".to_string()];
    header.extend(output.traders.iter().map(|t| t.name.clone()));
    wtr.write_record(&header)?;

    let len = output.traders.iter().map(|t| t.wealth.len()).max().unwrap_or(0);
    for tick in 0..len {
        let mut row = vec![tick.to_string()];
        row.extend(
            output
                .traders
                .iter()
                .map(|t| t.wealth.get(tick).map_or(String::new(), |w| format!("{w:.6}"))),
        );
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: tick, mean_pre_var, mean_pre_es, mean_post_var, mean_post_es,
/// breaches, cascade_rounds
pub fn export_risk_csv(ticks: &[TickStats]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "tick",
        "mean_pre_var",
        "mean_pre_es",
        "mean_post_var",
        "mean_post_es",
        "breaches",
        "cascade_rounds",
    ])?;

    for t in ticks {
        wtr.write_record(&[
            t.tick.to_string(),
            format!("{:.6}", t.mean_pre_var),
            format!("{:.6}", t.mean_pre_es),
            format!("{:.6}", t.mean_post_var),
            format!("{:.6}", t.mean_post_es),
            t.breaches.to_string(),
            t.cascade_rounds.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: tick, then one mean wealth-increment column per trader kind.
///
/// Rows start at tick 1; a kind with no traders reads 0.
pub fn export_wealth_by_kind_csv(output: &RunOutput) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["tick".to_string()];
    header.extend(output.kinds.iter().map(|k| k.kind.as_str().to_string()));
    wtr.write_record(&header)?;

    for tick in 1..=output.num_ticks {
        let mut row = vec![tick.to_string()];
        row.extend(output.kinds.iter().map(|k| {
            k.wealth_increment
                .get(tick - 1)
                .map_or(String::new(), |w| format!("{w:.6}"))
        }));
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per grid point; each aggregated metric expands to
/// `{metric}_mean`, `{metric}_std`, `{metric}_min`, `{metric}_max`.
pub fn export_sweep_csv(results: &SweepResults) -> Result<String> {
    const METRICS: [&str; 7] = [
        "price_volatility",
        "max_drawdown",
        "mean_mispricing",
        "total_breaches",
        "max_cascade_rounds",
        "forced_selloffs",
        "forced_selloff_volume",
    ];

    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec![results.param.as_str().to_string(), "runs".to_string()];
    for m in METRICS {
        for stat in ["mean", "std", "min", "max"] {
            header.push(format!("{m}_{stat}"));
        }
    }
    wtr.write_record(&header)?;

    for p in results.all() {
        let aggregates: [&Aggregate; 7] = [
            &p.price_volatility,
            &p.max_drawdown,
            &p.mean_mispricing,
            &p.total_breaches,
            &p.max_cascade_rounds,
            &p.forced_selloffs,
            &p.forced_selloff_volume,
        ];
        let mut row = vec![p.value.to_string(), p.runs.to_string()];
        for a in aggregates {
            row.push(format!("{:.6}", a.mean));
            row.push(format!("{:.6}", a.std_dev));
            row.push(format!("{:.6}", a.min));
            row.push(format!("{:.6}", a.max));
        }
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact persistence ───────────────────────────────────────────

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
}

fn create_timestamped_dir(output_dir: &Path, prefix: &str) -> Result<PathBuf> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let dir = output_dir.join(format!("{prefix}_{timestamp}"));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create artifact directory {}", dir.display()))?;
    Ok(dir)
}

/// Write the CSV series of one run into `dir`.
pub fn save_run_series(output: &RunOutput, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    write_file(dir, "prices.csv", &export_prices_csv(output)?)?;
    write_file(dir, "values.csv", &export_values_csv(output)?)?;
    write_file(dir, "order_flow.csv", &export_order_flow_csv(output)?)?;
    write_file(dir, "wealth.csv", &export_wealth_csv(output)?)?;
    write_file(dir, "risk.csv", &export_risk_csv(&output.ticks)?)?;
    write_file(dir, "wealth_by_kind.csv", &export_wealth_by_kind_csv(output)?)?;
    Ok(())
}

/// Save a batch to a new timestamped directory under `output_dir`.
///
/// A single run writes its series at the top level; several runs get one
/// `run_{i}` subdirectory each. Returns the directory created.
pub fn save_artifacts(
    config: &SimulationConfig,
    outputs: &[RunOutput],
    output_dir: &Path,
) -> Result<PathBuf> {
    let dir = create_timestamped_dir(output_dir, "run")?;

    match outputs {
        [single] => save_run_series(single, &dir)?,
        many => {
            for output in many {
                save_run_series(output, &dir.join(format!("run_{}", output.run_index)))?;
            }
        }
    }

    let manifest = Manifest::new(config, outputs)?;
    write_file(&dir, "manifest.json", &export_manifest_json(&manifest)?)?;
    save_config(config, &dir.join("config.toml"))?;

    tracing::info!(dir = %dir.display(), runs = outputs.len(), "artifacts saved");
    Ok(dir)
}

/// Save a sweep table, its manifest and the base config.
pub fn save_sweep(
    config: &SimulationConfig,
    results: &SweepResults,
    output_dir: &Path,
) -> Result<PathBuf> {
    let dir = create_timestamped_dir(output_dir, "sweep")?;

    write_file(&dir, "sweep.csv", &export_sweep_csv(results)?)?;
    let mut manifest = Manifest::new(config, &[])?;
    manifest.sweep_param = Some(results.param);
    write_file(&dir, "manifest.json", &export_manifest_json(&manifest)?)?;
    save_config(config, &dir.join("config.toml"))?;

    tracing::info!(dir = %dir.display(), points = results.len(), "sweep saved");
    Ok(dir)
}

/// Load the manifest from an artifact directory.
pub fn load_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join("manifest.json");
    let json = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_manifest_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_schema_is_rejected() {
        let config = SimulationConfig::default();
        let mut manifest = Manifest::new(&config, &[]).unwrap();
        manifest.schema_version = SCHEMA_VERSION + 1;
        let json = export_manifest_json(&manifest).unwrap();
        let err = import_manifest_json(&json).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn manifest_round_trips() {
        let config = SimulationConfig::default();
        let manifest = Manifest::new(&config, &[]).unwrap();
        let json = export_manifest_json(&manifest).unwrap();
        assert_eq!(import_manifest_json(&json).unwrap(), manifest);
    }

    #[test]
    fn ragged_series_leave_blank_cells() {
        let assets = vec![
            AssetSeries {
                name: "a".into(),
                price: vec![1.0, 2.0],
                value: vec![],
                flow: vec![],
            },
            AssetSeries {
                name: "b".into(),
                price: vec![3.0],
                value: vec![],
                flow: vec![],
            },
        ];
        let csv = asset_series_csv(&assets, |a| &a.price).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["tick,a,b", "0,1.000000,3.000000", "1,2.000000,"]);
    }
}
