//! Simulation configuration bundle and its validation.
//!
//! Everything a run needs is described here and checked once, before the
//! first tick, by [`SimulationConfig::validate`]. Per-trader parameters are
//! given as `{ min, max }` ranges and sampled from each trader's own stream
//! when the trader is built.

use std::collections::HashSet;
use std::fmt;

use rand::distributions::uniform::SampleUniform;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Asset, AssetId};
use crate::exogenous::ExogenousParams;
use crate::risk::{LimitPolicy, RiskFactors, RiskMeasure, RiskProfile};
use crate::strategy::{
    Emission, LongShortConfig, PositionMode, TrendConfig, TrendSignal, ValueConfig,
};

/// Fatal configuration problems, detected before any tick runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("asset {asset}: liquidity must be positive (got {liquidity})")]
    NonPositiveLiquidity { asset: String, liquidity: f64 },

    #[error("asset {asset}: initial price must be positive (got {price})")]
    NonPositivePrice { asset: String, price: f64 },

    #[error("{field}: expected {expected} entries (one per asset), got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("no traders configured")]
    NoTraders,

    #[error("no assets configured")]
    NoAssets,

    #[error("duplicate asset name: {0}")]
    DuplicateAsset(String),

    #[error("num_ticks must be at least 1")]
    ZeroTicks,

    #[error("{field}: min {min} is greater than max {max}")]
    InvertedRange {
        field: &'static str,
        min: String,
        max: String,
    },

    #[error("{field}: every {upper} must lie above every {lower}")]
    ThresholdOverlap {
        field: &'static str,
        lower: &'static str,
        upper: &'static str,
    },

    #[error("{field}: {value} is out of bounds, expected {expected}")]
    OutOfBounds {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("asset {asset}: unknown spread partner {partner}")]
    UnknownPartner { asset: String, partner: String },

    #[error("asset {0} cannot be its own spread partner")]
    SelfPartner(String),

    #[error("long-short traders configured but no asset declares a spread partner")]
    NoSpreadPairs,

    #[error("distribution setup failed: {0}")]
    Distribution(String),
}

/// Inclusive `{ min, max }` range, sampled uniformly per trader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange<T> {
    pub min: T,
    pub max: T,
}

impl<T> ParamRange<T>
where
    T: SampleUniform + PartialOrd + Copy + fmt::Display,
{
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// A degenerate range that always samples `value`.
    pub fn fixed(value: T) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        if self.min == self.max {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    fn check(&self, field: &'static str) -> Result<(), ConfigError> {
        // Also rejects NaN bounds, which compare false both ways.
        if !(self.min <= self.max) {
            return Err(ConfigError::InvertedRange {
                field,
                min: self.min.to_string(),
                max: self.max.to_string(),
            });
        }
        Ok(())
    }
}

/// How traded flow reaches the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceFormation {
    /// Exogenous increments plus linear impact of agent order flow.
    #[default]
    Impact,
    /// Price is the exogenous series; agent flow is recorded but has no impact.
    Surrogate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitMode {
    #[default]
    Constant,
    Countercyclical,
}

/// Number of traders of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraderCounts {
    pub trend: usize,
    pub value: usize,
    pub long_short: usize,
}

impl TraderCounts {
    pub fn total(&self) -> usize {
        self.trend + self.value + self.long_short
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub name: String,
    pub price0: f64,
    pub liquidity: f64,
    /// Name of the asset this one is paired with for spread trading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_partner: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendParams {
    pub short_window: ParamRange<usize>,
    pub long_window: ParamRange<usize>,
    pub exit_channel: ParamRange<usize>,
    pub cap_factor: ParamRange<f64>,
    pub signal: TrendSignal,
    pub normalize_by_volatility: bool,
    pub position_mode: PositionMode,
    pub emission: Emission,
    pub short_selling_probability: f64,
}

impl TrendParams {
    /// Draw one trader's concrete parameters.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> TrendConfig {
        let long_window = self.long_window.sample(rng);
        TrendConfig {
            short_window: self.short_window.sample(rng),
            long_window,
            exit_channel: self.exit_channel.sample(rng),
            cap_factor: self.cap_factor.sample(rng),
            signal: self.signal,
            normalize_by_volatility: self.normalize_by_volatility,
            volatility_window: long_window,
            position_mode: self.position_mode,
            emission: self.emission,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.short_window.check("trend.short_window")?;
        self.long_window.check("trend.long_window")?;
        self.exit_channel.check("trend.exit_channel")?;
        self.cap_factor.check("trend.cap_factor")?;
        positive_usize("trend.short_window", self.short_window.min)?;
        positive_usize("trend.exit_channel", self.exit_channel.min)?;
        if self.short_window.max >= self.long_window.min {
            return Err(ConfigError::ThresholdOverlap {
                field: "trend",
                lower: "short_window",
                upper: "long_window",
            });
        }
        non_negative("trend.cap_factor", self.cap_factor.min)?;
        probability("trend.short_selling_probability", self.short_selling_probability)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueParams {
    pub entry_threshold: ParamRange<f64>,
    pub exit_threshold: ParamRange<f64>,
    pub exit_channel: ParamRange<usize>,
    pub cap_factor: ParamRange<f64>,
    /// Range of the constant bias each trader adds to the fundamental value.
    pub bias: ParamRange<f64>,
    pub position_mode: PositionMode,
    pub emission: Emission,
    pub short_selling_probability: f64,
}

impl ValueParams {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ValueConfig {
        ValueConfig {
            entry_threshold: self.entry_threshold.sample(rng),
            exit_threshold: self.exit_threshold.sample(rng),
            exit_channel: self.exit_channel.sample(rng),
            cap_factor: self.cap_factor.sample(rng),
            bias: self.bias.sample(rng),
            position_mode: self.position_mode,
            emission: self.emission,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.entry_threshold.check("value.entry_threshold")?;
        self.exit_threshold.check("value.exit_threshold")?;
        self.exit_channel.check("value.exit_channel")?;
        self.cap_factor.check("value.cap_factor")?;
        self.bias.check("value.bias")?;
        positive_usize("value.exit_channel", self.exit_channel.min)?;
        non_negative("value.exit_threshold", self.exit_threshold.min)?;
        if self.entry_threshold.min <= self.exit_threshold.max {
            return Err(ConfigError::ThresholdOverlap {
                field: "value",
                lower: "exit_threshold",
                upper: "entry_threshold",
            });
        }
        non_negative("value.cap_factor", self.cap_factor.min)?;
        probability("value.short_selling_probability", self.short_selling_probability)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongShortParams {
    pub window: ParamRange<usize>,
    pub entry_sigmas: ParamRange<f64>,
    pub exit_sigmas: ParamRange<f64>,
    pub stop_loss_sigmas: ParamRange<f64>,
    pub cap_factor: ParamRange<f64>,
    pub short_selling_probability: f64,
}

impl LongShortParams {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> LongShortConfig {
        LongShortConfig {
            window: self.window.sample(rng),
            entry_sigmas: self.entry_sigmas.sample(rng),
            exit_sigmas: self.exit_sigmas.sample(rng),
            stop_loss_sigmas: self.stop_loss_sigmas.sample(rng),
            cap_factor: self.cap_factor.sample(rng),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.window.check("long_short.window")?;
        self.entry_sigmas.check("long_short.entry_sigmas")?;
        self.exit_sigmas.check("long_short.exit_sigmas")?;
        self.stop_loss_sigmas.check("long_short.stop_loss_sigmas")?;
        self.cap_factor.check("long_short.cap_factor")?;
        if self.window.min < 2 {
            return Err(ConfigError::OutOfBounds {
                field: "long_short.window",
                value: self.window.min as f64,
                expected: "at least 2",
            });
        }
        if self.exit_sigmas.max >= self.entry_sigmas.min {
            return Err(ConfigError::ThresholdOverlap {
                field: "long_short",
                lower: "exit_sigmas",
                upper: "entry_sigmas",
            });
        }
        if self.entry_sigmas.max >= self.stop_loss_sigmas.min {
            return Err(ConfigError::ThresholdOverlap {
                field: "long_short",
                lower: "entry_sigmas",
                upper: "stop_loss_sigmas",
            });
        }
        non_negative("long_short.cap_factor", self.cap_factor.min)?;
        probability(
            "long_short.short_selling_probability",
            self.short_selling_probability,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParams {
    pub var_confidence: ParamRange<f64>,
    pub es_confidence: ParamRange<f64>,
    pub limit: ParamRange<f64>,
    pub volatility_window: ParamRange<usize>,
    /// Share of traders whose limit binds on VaR.
    pub probability_var: f64,
    /// Share of traders whose limit binds on ES. The rest are unconstrained.
    pub probability_es: f64,
    pub stressed: bool,
    pub stress_volatility: f64,
    pub limit_mode: LimitMode,
    pub reference_volatility: f64,
}

impl RiskParams {
    /// Draw one trader's risk profile.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RiskProfile, ConfigError> {
        let u: f64 = rng.gen();
        let measure = if u < self.probability_var {
            RiskMeasure::ValueAtRisk
        } else if u < self.probability_var + self.probability_es {
            RiskMeasure::ExpectedShortfall
        } else {
            RiskMeasure::Unconstrained
        };
        let factors = RiskFactors::from_confidence(
            self.var_confidence.sample(rng),
            self.es_confidence.sample(rng),
        )?;
        let base = self.limit.sample(rng);
        let limit = match self.limit_mode {
            LimitMode::Constant => LimitPolicy::Constant { limit: base },
            LimitMode::Countercyclical => LimitPolicy::Countercyclical {
                base,
                reference_volatility: self.reference_volatility,
            },
        };
        Ok(RiskProfile {
            measure,
            limit,
            window: self.volatility_window.sample(rng),
            factors,
            stress_volatility: self.stressed.then_some(self.stress_volatility),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.var_confidence.check("risk.var_confidence")?;
        self.es_confidence.check("risk.es_confidence")?;
        self.limit.check("risk.limit")?;
        self.volatility_window.check("risk.volatility_window")?;
        for (field, c) in [
            ("risk.var_confidence", self.var_confidence.min),
            ("risk.var_confidence", self.var_confidence.max),
            ("risk.es_confidence", self.es_confidence.min),
            ("risk.es_confidence", self.es_confidence.max),
        ] {
            if !(c > 0.0 && c < 1.0) {
                return Err(ConfigError::OutOfBounds {
                    field,
                    value: c,
                    expected: "strictly between 0 and 1",
                });
            }
        }
        non_negative("risk.limit", self.limit.min)?;
        if self.volatility_window.min < 2 {
            return Err(ConfigError::OutOfBounds {
                field: "risk.volatility_window",
                value: self.volatility_window.min as f64,
                expected: "at least 2",
            });
        }
        probability("risk.probability_var", self.probability_var)?;
        probability("risk.probability_es", self.probability_es)?;
        probability(
            "risk.probability_var + risk.probability_es",
            self.probability_var + self.probability_es,
        )?;
        if self.stressed {
            non_negative("risk.stress_volatility", self.stress_volatility)?;
        }
        if self.limit_mode == LimitMode::Countercyclical && !(self.reference_volatility > 0.0) {
            return Err(ConfigError::OutOfBounds {
                field: "risk.reference_volatility",
                value: self.reference_volatility,
                expected: "positive for countercyclical limits",
            });
        }
        Ok(())
    }
}

/// The complete input of a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub num_ticks: usize,
    pub num_runs: usize,
    pub seed: u64,
    #[serde(default)]
    pub price_formation: PriceFormation,
    pub max_cascade_iterations: usize,
    pub max_selloff_fraction: f64,
    pub initial_wealth: f64,
    pub traders: TraderCounts,
    pub assets: Vec<AssetConfig>,
    pub price_processes: Vec<ExogenousParams>,
    pub value_processes: Vec<ExogenousParams>,
    pub trend: TrendParams,
    pub value: ValueParams,
    pub long_short: LongShortParams,
    pub risk: RiskParams,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let price = ExogenousParams {
            shift: 100.0,
            amplitude: 0.0,
            lag: 0.0,
            wavelength: 0.0,
            mu: 0.0,
            sigma: 0.5,
        };
        let value = ExogenousParams {
            shift: 100.0,
            amplitude: 5.0,
            lag: 0.0,
            wavelength: 250.0,
            mu: 0.0,
            sigma: 0.5,
        };
        Self {
            num_ticks: 1000,
            num_runs: 4,
            seed: 42,
            price_formation: PriceFormation::Impact,
            max_cascade_iterations: 20,
            max_selloff_fraction: 1.0,
            initial_wealth: 0.0,
            traders: TraderCounts {
                trend: 20,
                value: 20,
                long_short: 10,
            },
            assets: vec![
                AssetConfig {
                    name: "alpha".to_string(),
                    price0: 100.0,
                    liquidity: 400.0,
                    spread_partner: Some("beta".to_string()),
                },
                AssetConfig {
                    name: "beta".to_string(),
                    price0: 100.0,
                    liquidity: 400.0,
                    spread_partner: None,
                },
            ],
            price_processes: vec![price; 2],
            value_processes: vec![value; 2],
            trend: TrendParams {
                short_window: ParamRange::new(3, 10),
                long_window: ParamRange::new(20, 60),
                exit_channel: ParamRange::new(10, 30),
                cap_factor: ParamRange::new(5.0, 15.0),
                signal: TrendSignal::Difference,
                normalize_by_volatility: false,
                position_mode: PositionMode::Continuous,
                emission: Emission::Target,
                short_selling_probability: 0.8,
            },
            value: ValueParams {
                entry_threshold: ParamRange::new(1.5, 3.0),
                exit_threshold: ParamRange::new(0.2, 0.8),
                exit_channel: ParamRange::new(10, 30),
                cap_factor: ParamRange::new(5.0, 15.0),
                bias: ParamRange::new(-1.0, 1.0),
                position_mode: PositionMode::Continuous,
                emission: Emission::Target,
                short_selling_probability: 0.8,
            },
            long_short: LongShortParams {
                window: ParamRange::new(20, 50),
                entry_sigmas: ParamRange::new(1.5, 2.5),
                exit_sigmas: ParamRange::new(0.25, 0.75),
                stop_loss_sigmas: ParamRange::new(3.5, 5.0),
                cap_factor: ParamRange::new(5.0, 15.0),
                short_selling_probability: 1.0,
            },
            risk: RiskParams {
                var_confidence: ParamRange::fixed(0.95),
                es_confidence: ParamRange::fixed(0.975),
                limit: ParamRange::new(20.0, 40.0),
                volatility_window: ParamRange::new(20, 40),
                probability_var: 0.4,
                probability_es: 0.4,
                stressed: false,
                stress_volatility: 0.02,
                limit_mode: LimitMode::Constant,
                reference_volatility: 0.005,
            },
        }
    }
}

impl SimulationConfig {
    /// Check every constraint a run relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_ticks == 0 {
            return Err(ConfigError::ZeroTicks);
        }
        if self.assets.is_empty() {
            return Err(ConfigError::NoAssets);
        }
        if self.traders.total() == 0 {
            return Err(ConfigError::NoTraders);
        }
        let n = self.assets.len();
        for (field, actual) in [
            ("price_processes", self.price_processes.len()),
            ("value_processes", self.value_processes.len()),
        ] {
            if actual != n {
                return Err(ConfigError::LengthMismatch {
                    field,
                    expected: n,
                    actual,
                });
            }
        }
        for process in &self.price_processes {
            process.validate("price_processes")?;
        }
        for process in &self.value_processes {
            process.validate("value_processes")?;
        }
        if !(self.max_selloff_fraction > 0.0 && self.max_selloff_fraction <= 1.0) {
            return Err(ConfigError::OutOfBounds {
                field: "max_selloff_fraction",
                value: self.max_selloff_fraction,
                expected: "in (0, 1]",
            });
        }

        let mut seen = HashSet::new();
        for a in &self.assets {
            if !seen.insert(a.name.as_str()) {
                return Err(ConfigError::DuplicateAsset(a.name.clone()));
            }
            if !a.liquidity.is_finite() || a.liquidity <= 0.0 {
                return Err(ConfigError::NonPositiveLiquidity {
                    asset: a.name.clone(),
                    liquidity: a.liquidity,
                });
            }
            if !a.price0.is_finite() || a.price0 <= 0.0 {
                return Err(ConfigError::NonPositivePrice {
                    asset: a.name.clone(),
                    price: a.price0,
                });
            }
        }
        let pairs = self.spread_pairs()?;
        if self.traders.long_short > 0 && pairs.is_empty() {
            return Err(ConfigError::NoSpreadPairs);
        }

        self.trend.validate()?;
        self.value.validate()?;
        self.long_short.validate()?;
        self.risk.validate()
    }

    /// Assets with ids assigned in declaration order and partners resolved.
    pub fn resolve_assets(&self) -> Result<Vec<Asset>, ConfigError> {
        self.assets
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let spread_partner = match &a.spread_partner {
                    Some(partner) => Some(self.asset_id(&a.name, partner)?),
                    None => None,
                };
                Ok(Asset {
                    id: AssetId(i),
                    name: a.name.clone(),
                    price0: a.price0,
                    liquidity: a.liquidity,
                    spread_partner,
                })
            })
            .collect()
    }

    /// `(leg, partner)` for every asset that declares a spread partner.
    pub fn spread_pairs(&self) -> Result<Vec<(AssetId, AssetId)>, ConfigError> {
        Ok(self
            .resolve_assets()?
            .into_iter()
            .filter_map(|a| a.spread_partner.map(|p| (a.id, p)))
            .collect())
    }

    fn asset_id(&self, owner: &str, name: &str) -> Result<AssetId, ConfigError> {
        if owner == name {
            return Err(ConfigError::SelfPartner(owner.to_string()));
        }
        self.assets
            .iter()
            .position(|a| a.name == name)
            .map(AssetId)
            .ok_or_else(|| ConfigError::UnknownPartner {
                asset: owner.to_string(),
                partner: name.to_string(),
            })
    }
}

fn positive_usize(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::OutOfBounds {
            field,
            value: 0.0,
            expected: "at least 1",
        });
    }
    Ok(())
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value >= 0.0) || !value.is_finite() {
        return Err(ConfigError::OutOfBounds {
            field,
            value,
            expected: "finite and non-negative",
        });
    }
    Ok(())
}

fn probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfBounds {
            field,
            value,
            expected: "a probability in [0, 1]",
        });
    }
    Ok(())
}
