//! Fixed-capacity rolling window.
//!
//! Mean and standard deviation are recomputed from the buffered values on
//! demand rather than from running sums, so long runs do not accumulate
//! cancellation error.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "rolling window capacity must be >= 1");
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// Append a value, evicting the oldest once full. NaN is ignored.
    pub fn push(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Mean of a full window.
    pub fn mean(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.capacity as f64)
    }

    /// Population standard deviation of a full window.
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let var = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / self.capacity as f64;
        Some(var.sqrt())
    }

    /// Lowest value of a full window.
    pub fn min(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        self.values.iter().copied().reduce(f64::min)
    }

    /// Highest value of a full window.
    pub fn max(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        self.values.iter().copied().reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn mean_requires_full_window() {
        let mut w = RollingWindow::new(3);
        w.push(1.0);
        w.push(2.0);
        assert_eq!(w.mean(), None);
        w.push(3.0);
        assert_approx(w.mean().unwrap(), 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn oldest_value_is_evicted() {
        let mut w = RollingWindow::new(3);
        for v in [10.0, 11.0, 12.0, 13.0, 14.0] {
            w.push(v);
        }
        assert_eq!(w.len(), 3);
        assert_approx(w.mean().unwrap(), 13.0, DEFAULT_EPSILON);
        assert_eq!(w.min(), Some(12.0));
        assert_eq!(w.max(), Some(14.0));
    }

    #[test]
    fn std_dev_of_constant_window_is_zero() {
        let mut w = RollingWindow::new(4);
        for _ in 0..4 {
            w.push(5.0);
        }
        assert_eq!(w.std_dev(), Some(0.0));
    }

    #[test]
    fn std_dev_population() {
        let mut w = RollingWindow::new(2);
        w.push(1.0);
        w.push(3.0);
        assert_approx(w.std_dev().unwrap(), 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn nan_is_skipped() {
        let mut w = RollingWindow::new(2);
        w.push(1.0);
        w.push(f64::NAN);
        assert_eq!(w.len(), 1);
    }
}
