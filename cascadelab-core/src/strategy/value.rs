//! Fundamental value — trade price convergence toward a biased value estimate.
//!
//! Each trader perceives the fundamental value with its own constant bias.
//! Divergence `value + bias − price` above `entry_threshold` opens a position
//! toward convergence, sized `cap_factor × tanh(divergence)`; divergence below
//! `exit_threshold` (or flipped sign) closes it. An exit channel over recent
//! prices acts as a stop against the position.

use serde::{Deserialize, Serialize};

use crate::domain::{AssetId, ProposedOrder};
use crate::indicators::RollingWindow;

use super::{emit, Direction, Emission, PositionMode, StrategyInput};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueConfig {
    pub entry_threshold: f64,
    pub exit_threshold: f64,
    pub exit_channel: usize,
    pub cap_factor: f64,
    pub bias: f64,
    pub position_mode: PositionMode,
    pub emission: Emission,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            entry_threshold: 2.0,
            exit_threshold: 0.5,
            exit_channel: 20,
            cap_factor: 10.0,
            bias: 0.0,
            position_mode: PositionMode::Continuous,
            emission: Emission::Target,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValueStrategy {
    asset: AssetId,
    config: ValueConfig,
    channel: RollingWindow,
    blocked: Option<Direction>,
}

impl ValueStrategy {
    pub fn new(asset: AssetId, config: ValueConfig) -> Self {
        assert!(
            config.entry_threshold > config.exit_threshold,
            "entry_threshold must be > exit_threshold"
        );
        Self {
            asset,
            config,
            channel: RollingWindow::new(config.exit_channel.max(1)),
            blocked: None,
        }
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn config(&self) -> &ValueConfig {
        &self.config
    }

    fn size(&self, divergence: f64) -> f64 {
        match self.config.position_mode {
            PositionMode::Binary => self.config.cap_factor * divergence.signum(),
            PositionMode::Continuous => self.config.cap_factor * divergence.tanh(),
        }
    }

    pub fn evaluate(&mut self, input: &StrategyInput<'_>) -> Option<ProposedOrder> {
        let i = self.asset.index();
        let price = input.prices[i];
        let value = input.values[i] + self.config.bias;
        let position = input.positions[i];

        let channel_low = self.channel.min();
        let channel_high = self.channel.max();
        self.channel.push(price);

        if price.is_nan() || value.is_nan() {
            return None;
        }
        let divergence = value - price;
        if divergence.abs() < self.config.exit_threshold {
            self.blocked = None;
        }

        let (target, opening) = match Direction::of(position) {
            Some(dir) => {
                let stopped = match dir {
                    Direction::Long => channel_low.is_some_and(|low| price < low),
                    Direction::Short => channel_high.is_some_and(|high| price > high),
                };
                let converged = divergence.abs() < self.config.exit_threshold
                    || divergence * dir.sign() <= 0.0;
                if stopped {
                    self.blocked = Some(dir);
                    (0.0, false)
                } else if converged {
                    (0.0, false)
                } else {
                    match self.config.position_mode {
                        PositionMode::Binary => (self.config.cap_factor * dir.sign(), false),
                        PositionMode::Continuous => (self.size(divergence), false),
                    }
                }
            }
            None => {
                let dir = Direction::of(divergence);
                if divergence.abs() > self.config.entry_threshold && dir != self.blocked {
                    (self.size(divergence), true)
                } else {
                    (0.0, false)
                }
            }
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
