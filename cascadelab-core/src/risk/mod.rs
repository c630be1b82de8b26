//! Risk estimation and limit enforcement.
//!
//! Risk is parametric: every asset contributes `|position| × unit volatility`
//! where unit volatility is `price × σ(log returns)` over the trader's own
//! estimation window. Contributions are aggregated as uncorrelated
//! (`sqrt(Σ c²)`), then scaled by the normal quantile for VaR or by the
//! normal tail expectation for ES.

pub mod estimator;
pub mod manager;

pub use estimator::{exposure, VolatilityEstimate};
pub use manager::{RiskManager, Sizing};

use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

use crate::config::ConfigError;

/// Relative slack when comparing risk to a limit, absorbing float noise for
/// books sitting exactly at the limit.
pub const LIMIT_TOLERANCE: f64 = 1e-9;

/// Which estimate a trader's limit is enforced against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMeasure {
    ValueAtRisk,
    ExpectedShortfall,
    /// Risk is estimated and recorded but never enforced.
    Unconstrained,
}

/// How the active limit is derived each tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LimitPolicy {
    Constant { limit: f64 },
    /// `base × reference_volatility / max(realized, reference_volatility)`:
    /// never looser than `base`, tightening as realized volatility rises.
    Countercyclical { base: f64, reference_volatility: f64 },
}

impl LimitPolicy {
    pub fn active_limit(&self, realized_volatility: f64) -> f64 {
        match *self {
            LimitPolicy::Constant { limit } => limit,
            LimitPolicy::Countercyclical {
                base,
                reference_volatility,
            } => {
                let denom = realized_volatility.max(reference_volatility);
                if denom <= 0.0 {
                    base
                } else {
                    base * reference_volatility / denom
                }
            }
        }
    }
}

/// Distribution constants for one trader's confidence levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    /// Standard normal quantile at the VaR confidence level.
    pub z_var: f64,
    /// `φ(z) / (1 − c)` at the ES confidence level.
    pub es_factor: f64,
}

impl RiskFactors {
    pub fn from_confidence(var_confidence: f64, es_confidence: f64) -> Result<Self, ConfigError> {
        for (field, c) in [("risk.var_confidence", var_confidence), ("risk.es_confidence", es_confidence)] {
            if !(c > 0.0 && c < 1.0) {
                return Err(ConfigError::OutOfBounds {
                    field,
                    value: c,
                    expected: "strictly between 0 and 1",
                });
            }
        }
        let normal = Normal::new(0.0, 1.0).map_err(|e| ConfigError::Distribution(e.to_string()))?;
        let z_var = normal.inverse_cdf(var_confidence);
        let z_es = normal.inverse_cdf(es_confidence);
        let es_factor = normal.pdf(z_es) / (1.0 - es_confidence);
        Ok(Self { z_var, es_factor })
    }
}

/// Risk settings of one trader.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub measure: RiskMeasure,
    pub limit: LimitPolicy,
    /// Number of log returns in the volatility estimate.
    pub window: usize,
    pub factors: RiskFactors,
    /// Stressed variant: fixed σ substituted for the rolling estimate.
    pub stress_volatility: Option<f64>,
}

/// VaR and ES of one book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskEstimate {
    pub var: f64,
    pub es: f64,
}

impl RiskEstimate {
    /// The value the limit is enforced against, or `None` when unconstrained.
    pub fn measured(&self, measure: RiskMeasure) -> Option<f64> {
        match measure {
            RiskMeasure::ValueAtRisk => Some(self.var),
            RiskMeasure::ExpectedShortfall => Some(self.es),
            RiskMeasure::Unconstrained => None,
        }
    }
}

/// True when `risk` exceeds `limit` beyond float tolerance.
pub fn exceeds(risk: f64, limit: f64) -> bool {
    risk > limit * (1.0 + LIMIT_TOLERANCE) + f64::EPSILON
}
