//! Incremental rolling statistics.
//!
//! Strategies and the risk layer see prices one tick at a time, so every
//! statistic here is fed by `push` and only ever reflects values already
//! pushed. A window that is not yet full reports `None` and callers fall back
//! to a neutral signal.

pub mod rolling;
pub mod volatility;

pub use rolling::RollingWindow;
pub use volatility::{log_returns, rolling_log_volatility, sample_std};

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
