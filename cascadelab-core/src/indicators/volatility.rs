//! Rolling log-return volatility.
//!
//! The estimate at tick t uses the last `window` log returns of the series up
//! to and including t; callers pass the series truncated at t, so no later
//! value can leak in.

/// Log returns of consecutive positive prices. Non-positive pairs are skipped.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect()
}

/// Sample standard deviation (n − 1 denominator). `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    Some(var.sqrt())
}

/// Standard deviation of the last `window` log returns of `prices`.
///
/// Returns 0.0 until `window` returns are available, which callers treat as
/// "no risk signal yet".
pub fn rolling_log_volatility(prices: &[f64], window: usize) -> f64 {
    if prices.len() < window + 1 {
        return 0.0;
    }
    let start = prices.len().saturating_sub(window + 1);
    let returns = log_returns(&prices[start..]);
    sample_std(&returns).unwrap_or(0.0)
}
