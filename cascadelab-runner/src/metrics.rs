//! Run metrics — pure functions from run outputs to scalars.
//!
//! No dependencies on the runner or export code.

use serde::{Deserialize, Serialize};

use cascadelab_core::domain::TraderKind;
use cascadelab_core::RunOutput;

/// Scalar summary of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub run_index: u64,
    /// Mean over assets of the log-return volatility of the price path.
    pub price_volatility: f64,
    /// Worst peak-to-trough price decline over all assets, as a negative fraction.
    pub max_drawdown: f64,
    /// Mean over assets of the absolute gap between price and fundamental value.
    pub mean_mispricing: f64,
    pub total_breaches: usize,
    pub breach_ticks: usize,
    pub max_cascade_rounds: usize,
    pub forced_selloffs: usize,
    pub forced_selloff_volume: f64,
    pub risk_reductions: usize,
    pub mean_pre_var: f64,
    pub trend_wealth_increment: f64,
    pub value_wealth_increment: f64,
    pub long_short_wealth_increment: f64,
}

impl RunMetrics {
    pub fn compute(output: &RunOutput) -> Self {
        let n_assets = output.assets.len().max(1) as f64;
        let price_volatility = output
            .assets
            .iter()
            .map(|a| path_volatility(&a.price))
            .sum::<f64>()
            / n_assets;
        let max_drawdown = output
            .assets
            .iter()
            .map(|a| max_drawdown(&a.price))
            .fold(0.0_f64, f64::min);
        let mean_mispricing = output
            .assets
            .iter()
            .map(|a| mean_abs_gap(&a.price, &a.value))
            .sum::<f64>()
            / n_assets;
        let n_ticks = output.ticks.len().max(1) as f64;
        let increment = |kind| output.kind(kind).map_or(0.0, |k| k.mean_wealth_increment);

        Self {
            run_index: output.run_index,
            price_volatility,
            max_drawdown,
            mean_mispricing,
            total_breaches: output.total_breaches(),
            breach_ticks: output.ticks.iter().filter(|t| t.breaches > 0).count(),
            max_cascade_rounds: output.max_cascade_rounds(),
            forced_selloffs: output.orders.forced_selloff,
            forced_selloff_volume: output.orders.forced_selloff_volume,
            risk_reductions: output.orders.risk_reduction,
            mean_pre_var: output.ticks.iter().map(|t| t.mean_pre_var).sum::<f64>() / n_ticks,
            trend_wealth_increment: increment(TraderKind::Trend),
            value_wealth_increment: increment(TraderKind::Value),
            long_short_wealth_increment: increment(TraderKind::LongShort),
        }
    }
}

/// Mean, dispersion and range of one metric across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub mean: f64,
    /// Sample standard deviation; 0.0 for fewer than two values.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Aggregate {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std_dev = if values.len() < 2 {
            0.0
        } else {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        };
        Self {
            mean,
            std_dev,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Sample standard deviation of the log returns of a price path.
pub fn path_volatility(prices: &[f64]) -> f64 {
    let returns: Vec<f64> = prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    (returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
}

/// Maximum peak-to-trough decline as a fraction (negative or zero).
pub fn max_drawdown(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }
    let mut peak = prices[0];
    let mut max_dd = 0.0_f64;
    for &p in prices {
        if p > peak {
            peak = p;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((p - peak) / peak);
        }
    }
    max_dd
}

/// Mean absolute difference between two aligned series.
pub fn mean_abs_gap(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum::<f64>() / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawdown_of_rise_fall() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 110.0]);
        assert!((dd - (-0.25)).abs() < 1e-12);
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn flat_path_has_no_volatility() {
        assert_eq!(path_volatility(&[50.0; 10]), 0.0);
        assert!(path_volatility(&[50.0, 51.0, 49.0, 52.0]) > 0.0);
    }

    #[test]
    fn aggregate_statistics() {
        let agg = Aggregate::from_values(&[1.0, 2.0, 3.0]);
        assert_eq!(agg.mean, 2.0);
        assert_eq!(agg.std_dev, 1.0);
        assert_eq!((agg.min, agg.max), (1.0, 3.0));
        assert_eq!(Aggregate::from_values(&[4.0]).std_dev, 0.0);
        assert_eq!(Aggregate::from_values(&[]), Aggregate::default());
    }

    #[test]
    fn gap_uses_common_length() {
        assert_eq!(mean_abs_gap(&[1.0, 2.0, 3.0], &[2.0, 2.0]), 0.5);
    }

    proptest::proptest! {
        #[test]
        fn drawdown_is_a_fraction(prices in proptest::collection::vec(0.01f64..1000.0, 0..200)) {
            let dd = max_drawdown(&prices);
            proptest::prop_assert!((-1.0..=0.0).contains(&dd));
        }

        #[test]
        fn aggregate_mean_within_range(values in proptest::collection::vec(-1e6f64..1e6, 1..50)) {
            let agg = Aggregate::from_values(&values);
            proptest::prop_assert!(agg.min <= agg.mean + 1e-6);
            proptest::prop_assert!(agg.mean <= agg.max + 1e-6);
            proptest::prop_assert!(agg.std_dev >= 0.0);
        }
    }
}
