//! Per-trader volatility and risk estimates.

use crate::indicators::{log_returns, sample_std};

use super::{RiskEstimate, RiskProfile};

/// Volatility of every asset as seen through one trader's estimation window.
#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityEstimate {
    /// σ of log returns per asset.
    pub sigma: Vec<f64>,
    /// `price × σ` per asset: the one-tick price standard deviation.
    pub unit: Vec<f64>,
}

impl VolatilityEstimate {
    /// Estimate from published price histories, optionally extended by one
    /// tentative price per asset that has not been published yet.
    ///
    /// Only the supplied history is read, so the estimate at tick t cannot see
    /// later prices. A partial window (fewer than `window` returns) or a flat
    /// window gives σ = 0.
    pub fn from_histories(
        histories: &[&[f64]],
        tentative: Option<&[f64]>,
        window: usize,
        stress_volatility: Option<f64>,
    ) -> Self {
        let mut sigma = Vec::with_capacity(histories.len());
        let mut unit = Vec::with_capacity(histories.len());
        for (i, history) in histories.iter().enumerate() {
            let next = tentative.map(|t| t[i]);
            let price = next.or_else(|| history.last().copied()).unwrap_or(0.0);
            let s = match stress_volatility {
                Some(stressed) => stressed,
                None => windowed_sigma(history, next, window),
            };
            sigma.push(s);
            unit.push(price * s);
        }
        Self { sigma, unit }
    }

    /// Unit volatilities given directly (prices already folded in).
    pub fn from_unit(unit: Vec<f64>) -> Self {
        Self {
            sigma: vec![0.0; unit.len()],
            unit,
        }
    }

    /// Mean σ over the given asset indices (realized volatility for limits).
    pub fn mean_sigma(&self, assets: &[usize]) -> f64 {
        if assets.is_empty() {
            return 0.0;
        }
        assets.iter().map(|&i| self.sigma[i]).sum::<f64>() / assets.len() as f64
    }
}

fn windowed_sigma(history: &[f64], next: Option<f64>, window: usize) -> f64 {
    let keep = window + 1;
    let mut tail: Vec<f64> = Vec::with_capacity(keep + 1);
    match next {
        Some(p) => {
            let start = history.len().saturating_sub(keep.saturating_sub(1));
            tail.extend_from_slice(&history[start..]);
            tail.push(p);
        }
        None => {
            let start = history.len().saturating_sub(keep);
            tail.extend_from_slice(&history[start..]);
        }
    }
    if tail.len() < keep {
        return 0.0;
    }
    sample_std(&log_returns(&tail)).unwrap_or(0.0)
}

/// Uncorrelated book exposure: `sqrt(Σ (|position| × unit volatility)²)`.
pub fn exposure(positions: &[f64], unit: &[f64]) -> f64 {
    positions
        .iter()
        .zip(unit)
        .map(|(p, u)| (p * u).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// VaR and ES of a book under a trader's profile.
pub fn estimate(profile: &RiskProfile, positions: &[f64], vols: &VolatilityEstimate) -> RiskEstimate {
    let e = exposure(positions, &vols.unit);
    RiskEstimate {
        var: profile.factors.z_var * e,
        es: profile.factors.es_factor * e,
    }
}
