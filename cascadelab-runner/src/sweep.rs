//! Parameter sweeps: one base config, one varied parameter, many runs per point.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use cascadelab_core::config::ParamRange;
use cascadelab_core::SimulationConfig;

use crate::metrics::{Aggregate, RunMetrics};
use crate::runner::{run_batch, RunError};

/// A single scalar of the config that a sweep can vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepParam {
    /// Liquidity of every asset.
    Liquidity,
    /// Fixed risk limit for every trader.
    RiskLimit,
    /// Fixed VaR confidence level for every trader.
    VarConfidence,
    /// Stress volatility; also switches stressed estimation on.
    StressVolatility,
    MaxSelloffFraction,
    MaxCascadeIterations,
    TrendTraders,
    ValueTraders,
    LongShortTraders,
}

impl SweepParam {
    pub const ALL: [SweepParam; 9] = [
        SweepParam::Liquidity,
        SweepParam::RiskLimit,
        SweepParam::VarConfidence,
        SweepParam::StressVolatility,
        SweepParam::MaxSelloffFraction,
        SweepParam::MaxCascadeIterations,
        SweepParam::TrendTraders,
        SweepParam::ValueTraders,
        SweepParam::LongShortTraders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SweepParam::Liquidity => "liquidity",
            SweepParam::RiskLimit => "risk.limit",
            SweepParam::VarConfidence => "risk.var_confidence",
            SweepParam::StressVolatility => "risk.stress_volatility",
            SweepParam::MaxSelloffFraction => "max_selloff_fraction",
            SweepParam::MaxCascadeIterations => "max_cascade_iterations",
            SweepParam::TrendTraders => "traders.trend",
            SweepParam::ValueTraders => "traders.value",
            SweepParam::LongShortTraders => "traders.long_short",
        }
    }

    fn is_count(&self) -> bool {
        matches!(
            self,
            SweepParam::MaxCascadeIterations
                | SweepParam::TrendTraders
                | SweepParam::ValueTraders
                | SweepParam::LongShortTraders
        )
    }

    /// Write `value` into a copy of `base`.
    pub fn apply(&self, base: &SimulationConfig, value: f64) -> Result<SimulationConfig, RunError> {
        if !value.is_finite() || (self.is_count() && (value < 0.0 || value.fract() != 0.0)) {
            return Err(RunError::InvalidSweepValue {
                param: self.as_str(),
                value,
            });
        }
        let mut config = base.clone();
        let count = value as usize;
        match self {
            SweepParam::Liquidity => {
                for asset in &mut config.assets {
                    asset.liquidity = value;
                }
            }
            SweepParam::RiskLimit => config.risk.limit = ParamRange::fixed(value),
            SweepParam::VarConfidence => config.risk.var_confidence = ParamRange::fixed(value),
            SweepParam::StressVolatility => {
                config.risk.stressed = true;
                config.risk.stress_volatility = value;
            }
            SweepParam::MaxSelloffFraction => config.max_selloff_fraction = value,
            SweepParam::MaxCascadeIterations => config.max_cascade_iterations = count,
            SweepParam::TrendTraders => config.traders.trend = count,
            SweepParam::ValueTraders => config.traders.value = count,
            SweepParam::LongShortTraders => config.traders.long_short = count,
        }
        Ok(config)
    }
}

impl fmt::Display for SweepParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SweepParam {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        SweepParam::ALL
            .iter()
            .copied()
            .find(|p| {
                let full = p.as_str();
                // Accept both "risk.limit" and the bare "limit".
                full == name || full.rsplit('.').next() == Some(name)
            })
            .ok_or_else(|| RunError::UnknownSweepParam(name.to_string()))
    }
}

/// The varied parameter and the values it takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepGrid {
    pub param: SweepParam,
    pub values: Vec<f64>,
}

impl SweepGrid {
    pub fn new(param: SweepParam, values: Vec<f64>) -> Self {
        Self { param, values }
    }

    /// `steps` evenly spaced values from `start` to `end` inclusive.
    pub fn linear(param: SweepParam, start: f64, end: f64, steps: usize) -> Self {
        let values = match steps {
            0 => Vec::new(),
            1 => vec![start],
            n => (0..n)
                .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
                .collect(),
        };
        Self { param, values }
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// One validated config per grid value, in grid order.
    pub fn generate_configs(
        &self,
        base: &SimulationConfig,
    ) -> Result<Vec<SimulationConfig>, RunError> {
        self.values
            .iter()
            .map(|&v| {
                let config = self.param.apply(base, v)?;
                config.validate()?;
                Ok(config)
            })
            .collect()
    }
}

/// Aggregated statistics over every run at one grid value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub value: f64,
    pub runs: usize,
    pub price_volatility: Aggregate,
    pub max_drawdown: Aggregate,
    pub mean_mispricing: Aggregate,
    pub total_breaches: Aggregate,
    pub max_cascade_rounds: Aggregate,
    pub forced_selloffs: Aggregate,
    pub forced_selloff_volume: Aggregate,
}

impl SweepPoint {
    pub fn from_metrics(value: f64, metrics: &[RunMetrics]) -> Self {
        let agg = |f: fn(&RunMetrics) -> f64| {
            Aggregate::from_values(&metrics.iter().map(f).collect::<Vec<_>>())
        };
        Self {
            value,
            runs: metrics.len(),
            price_volatility: agg(|m| m.price_volatility),
            max_drawdown: agg(|m| m.max_drawdown),
            mean_mispricing: agg(|m| m.mean_mispricing),
            total_breaches: agg(|m| m.total_breaches as f64),
            max_cascade_rounds: agg(|m| m.max_cascade_rounds as f64),
            forced_selloffs: agg(|m| m.forced_selloffs as f64),
            forced_selloff_volume: agg(|m| m.forced_selloff_volume),
        }
    }
}

/// Sweep executor. Grid points run in parallel unless disabled.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    parallel: bool,
}

impl Default for ParamSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamSweep {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every grid point with `base.num_runs` runs each.
    ///
    /// All configs are validated before any run starts.
    pub fn sweep(
        &self,
        grid: &SweepGrid,
        base: &SimulationConfig,
    ) -> Result<SweepResults, RunError> {
        let configs = grid.generate_configs(base)?;
        info!(param = %grid.param, points = configs.len(), "sweep started");

        let run_point = |(value, config): (&f64, &SimulationConfig)| -> Result<SweepPoint, RunError> {
            let outputs = run_batch(config, false)?;
            let metrics: Vec<RunMetrics> = outputs.iter().map(RunMetrics::compute).collect();
            Ok(SweepPoint::from_metrics(*value, &metrics))
        };

        let points = if self.parallel {
            grid.values
                .par_iter()
                .zip(configs.par_iter())
                .map(run_point)
                .collect::<Result<Vec<_>, RunError>>()?
        } else {
            grid.values
                .iter()
                .zip(configs.iter())
                .map(run_point)
                .collect::<Result<Vec<_>, RunError>>()?
        };

        info!(param = %grid.param, points = points.len(), "sweep finished");
        Ok(SweepResults {
            param: grid.param,
            points,
        })
    }
}

/// Sweep output, one point per grid value in grid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    pub param: SweepParam,
    pub points: Vec<SweepPoint>,
}

impl SweepResults {
    pub fn all(&self) -> &[SweepPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
