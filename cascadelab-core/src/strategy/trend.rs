//! Trend following — moving-average crossover with an exit channel.
//!
//! The signal is either the gap between a short and a long simple moving
//! average of price, or the one-tick slope of the long average, optionally
//! divided by the rolling standard deviation of price changes. Positions are
//! sized `cap_factor × tanh(signal)` (continuous) or `±cap_factor` (binary).
//!
//! Exits:
//! - price touches the rolling [min, max] of the previous `exit_channel`
//!   prices against the position (the same direction is then not re-entered
//!   until the signal changes sign);
//! - the signal reverses against the position.

use serde::{Deserialize, Serialize};

use crate::domain::{AssetId, ProposedOrder};
use crate::indicators::RollingWindow;

use super::{emit, Direction, Emission, PositionMode, StrategyInput};

/// Which trend measure drives the position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendSignal {
    /// `shortMA − longMA`
    Difference,
    /// `longMA(t) − longMA(t−1)`
    Slope,
}

/// Concrete parameters of one trend strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendConfig {
    pub short_window: usize,
    pub long_window: usize,
    pub exit_channel: usize,
    pub cap_factor: f64,
    pub signal: TrendSignal,
    pub normalize_by_volatility: bool,
    pub volatility_window: usize,
    pub position_mode: PositionMode,
    pub emission: Emission,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 20,
            exit_channel: 10,
            cap_factor: 10.0,
            signal: TrendSignal::Difference,
            normalize_by_volatility: false,
            volatility_window: 20,
            position_mode: PositionMode::Continuous,
            emission: Emission::Target,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrendStrategy {
    asset: AssetId,
    config: TrendConfig,
    short: RollingWindow,
    long: RollingWindow,
    channel: RollingWindow,
    changes: RollingWindow,
    last_price: Option<f64>,
    prev_long_ma: Option<f64>,
    /// Direction closed by a channel exit; blocks re-entry until the signal flips.
    blocked: Option<Direction>,
    last_signal: Option<f64>,
}

impl TrendStrategy {
    pub fn new(asset: AssetId, config: TrendConfig) -> Self {
        assert!(config.short_window >= 1, "short_window must be >= 1");
        assert!(
            config.long_window > config.short_window,
            "long_window must be > short_window"
        );
        Self {
            asset,
            config,
            short: RollingWindow::new(config.short_window),
            long: RollingWindow::new(config.long_window),
            channel: RollingWindow::new(config.exit_channel.max(1)),
            changes: RollingWindow::new(config.volatility_window.max(2)),
            last_price: None,
            prev_long_ma: None,
            blocked: None,
            last_signal: None,
        }
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn config(&self) -> &TrendConfig {
        &self.config
    }

    /// Signal computed on the most recent tick, if the windows were warm.
    pub fn last_signal(&self) -> Option<f64> {
        self.last_signal
    }

    /// Push the new price into every window and compute the raw signal.
    fn observe(&mut self, price: f64) -> Option<f64> {
        if let Some(prev) = self.last_price {
            self.changes.push(price - prev);
        }
        self.last_price = Some(price);
        self.short.push(price);
        self.long.push(price);

        let long_ma = self.long.mean();
        let raw = match self.config.signal {
            TrendSignal::Difference => match (self.short.mean(), long_ma) {
                (Some(s), Some(l)) => Some(s - l),
                _ => None,
            },
            TrendSignal::Slope => match (long_ma, self.prev_long_ma) {
                (Some(l), Some(p)) => Some(l - p),
                _ => None,
            },
        };
        self.prev_long_ma = long_ma;

        let raw = raw?;
        if !self.config.normalize_by_volatility {
            return Some(raw);
        }
        // Zero or unknown variance gives a neutral signal for this tick.
        match self.changes.std_dev() {
            Some(sd) if sd > 0.0 => Some(raw / sd),
            _ => Some(0.0),
        }
    }

    fn size(&self, signal: f64) -> f64 {
        match self.config.position_mode {
            PositionMode::Binary => self.config.cap_factor * signal.signum(),
            PositionMode::Continuous => self.config.cap_factor * signal.tanh(),
        }
    }

    pub fn evaluate(&mut self, input: &StrategyInput<'_>) -> Option<ProposedOrder> {
        let price = input.prices[self.asset.index()];
        let position = input.positions[self.asset.index()];

        // The channel covers previous prices only.
        let channel_low = self.channel.min();
        let channel_high = self.channel.max();
        let signal = self.observe(price);
        self.channel.push(price);
        self.last_signal = signal;

        let signal = signal?;
        let signal_dir = Direction::of(signal);
        if self.blocked.is_some() && signal_dir != self.blocked {
            self.blocked = None;
        }

        let held = Direction::of(position);
        let (target, opening) = match held {
            Some(dir) => {
                let channel_hit = match dir {
                    Direction::Long => channel_low.is_some_and(|low| price <= low),
                    Direction::Short => channel_high.is_some_and(|high| price >= high),
                };
                let reversed = signal * dir.sign() < 0.0;
                if channel_hit {
                    self.blocked = Some(dir);
                    (0.0, false)
                } else if reversed {
                    (0.0, false)
                } else {
                    match self.config.position_mode {
                        PositionMode::Binary => (self.config.cap_factor * dir.sign(), false),
                        PositionMode::Continuous => (self.size(signal), false),
                    }
                }
            }
            None => match signal_dir {
                Some(dir) if self.blocked != Some(dir) => (self.size(signal), true),
                _ => (0.0, false),
            },
        };

        let size = emit(
            target,
            position,
            self.config.position_mode,
            self.config.emission,
            opening,
        );
        if size == 0.0 {
            return None;
        }
        Some(ProposedOrder::new(self.asset, size))
    }
}
