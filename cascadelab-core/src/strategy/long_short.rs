//! Spread arbitrage between two assets.
//!
//! Tracks the spread `price(leg) − price(partner)` against its rolling mean
//! and standard deviation over the previous `window` ticks. A z-score beyond
//! `entry_sigmas` opens a market-neutral pair (short the rich leg, long the
//! cheap one, `cap_factor` units each). The pair is closed when |z| falls
//! below `exit_sigmas`, or stopped out when the spread keeps running past
//! `stop_loss_sigmas`; after a stop-loss the pair is not re-opened until the
//! spread has converged once.

use serde::{Deserialize, Serialize};

use crate::domain::{AssetId, ProposedOrder};
use crate::indicators::RollingWindow;

use super::StrategyInput;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongShortConfig {
    pub window: usize,
    pub entry_sigmas: f64,
    pub exit_sigmas: f64,
    pub stop_loss_sigmas: f64,
    pub cap_factor: f64,
}

impl Default for LongShortConfig {
    fn default() -> Self {
        Self {
            window: 30,
            entry_sigmas: 2.0,
            exit_sigmas: 0.5,
            stop_loss_sigmas: 4.0,
            cap_factor: 10.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LongShortStrategy {
    leg: AssetId,
    partner: AssetId,
    config: LongShortConfig,
    spreads: RollingWindow,
    stopped_out: bool,
    last_z: Option<f64>,
}

impl LongShortStrategy {
    pub fn new(leg: AssetId, partner: AssetId, config: LongShortConfig) -> Self {
        assert!(leg != partner, "spread legs must differ");
        assert!(
            config.exit_sigmas < config.entry_sigmas && config.entry_sigmas < config.stop_loss_sigmas,
            "sigmas must satisfy exit < entry < stop_loss"
        );
        Self {
            leg,
            partner,
            config,
            spreads: RollingWindow::new(config.window.max(2)),
            stopped_out: false,
            last_z: None,
        }
    }

    pub fn leg(&self) -> AssetId {
        self.leg
    }

    pub fn partner(&self) -> AssetId {
        self.partner
    }

    pub fn config(&self) -> &LongShortConfig {
        &self.config
    }

    /// Z-score of the spread on the most recent tick.
    pub fn last_z(&self) -> Option<f64> {
        self.last_z
    }

    fn z_score(&self, spread: f64) -> Option<f64> {
        let mean = self.spreads.mean()?;
        let sd = self.spreads.std_dev()?;
        if sd <= 0.0 {
            return None;
        }
        Some((spread - mean) / sd)
    }

    pub fn evaluate(&mut self, input: &StrategyInput<'_>) -> Vec<ProposedOrder> {
        let spread = input.prices[self.leg.index()] - input.prices[self.partner.index()];
        let z = self.z_score(spread);
        self.spreads.push(spread);
        self.last_z = z;

        // Window not full or flat spread history: neutral, hold what we have.
        let Some(z) = z else {
            return Vec::new();
        };

        let leg_pos = input.positions[self.leg.index()];
        let partner_pos = input.positions[self.partner.index()];
        let cap = self.config.cap_factor;

        if z.abs() < self.config.exit_sigmas {
            self.stopped_out = false;
        }

        let held = if leg_pos > 0.0 {
            1.0
        } else if leg_pos < 0.0 {
            -1.0
        } else if partner_pos != 0.0 {
            // Leg was clipped away (e.g. no short selling): infer from partner.
            -partner_pos.signum()
        } else {
            0.0
        };

        let (leg_target, partner_target) = if held == 0.0 {
            if self.stopped_out || z.abs() <= self.config.entry_sigmas {
                return Vec::new();
            }
            // Rich leg (positive z) is sold, cheap partner bought.
            let side = -z.signum();
            (side * cap, -side * cap)
        } else {
            // held = +1 means long the spread, which loses when z keeps falling.
            let adverse = -z * held;
            if adverse > self.config.stop_loss_sigmas {
                self.stopped_out = true;
                (0.0, 0.0)
            } else if z.abs() < self.config.exit_sigmas {
                (0.0, 0.0)
            } else {
                (held * cap, -held * cap)
            }
        };

        [
            ProposedOrder::new(self.leg, leg_target - leg_pos),
            ProposedOrder::new(self.partner, partner_target - partner_pos),
        ]
        .into_iter()
        .filter(|o| o.size != 0.0)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> LongShortConfig {
        LongShortConfig {
            window: 4,
            entry_sigmas: 1.5,
            exit_sigmas: 0.5,
            stop_loss_sigmas: 6.0,
            cap_factor: 5.0,
        }
    }

    fn step(s: &mut LongShortStrategy, a: f64, b: f64, pos: &mut [f64; 2]) -> Vec<ProposedOrder> {
        let input = StrategyInput {
            tick: 0,
            prices: &[a, b],
            values: &[a, b],
            positions: &pos[..],
        };
        let orders = s.evaluate(&input);
        for o in &orders {
            pos[o.asset.index()] += o.size;
        }
        orders
    }

    fn warm(s: &mut LongShortStrategy, pos: &mut [f64; 2]) {
        // Spread alternates 0, 2 → mean 1, sd 1.
        for spread in [0.0, 2.0, 0.0, 2.0] {
            assert!(step(s, 100.0 + spread, 100.0, pos).is_empty());
        }
    }

    #[test]
    fn wide_spread_sells_rich_leg() {
        let mut s = LongShortStrategy::new(AssetId(0), AssetId(1), cfg());
        let mut pos = [0.0, 0.0];
        warm(&mut s, &mut pos);
        let orders = step(&mut s, 104.0, 100.0, &mut pos);
        assert_eq!(orders.len(), 2);
        assert_eq!(pos, [-5.0, 5.0]);
        assert!(s.last_z().unwrap() > 1.5);
    }

    #[test]
    fn narrow_spread_buys_leg() {
        let mut s = LongShortStrategy::new(AssetId(0), AssetId(1), cfg());
        let mut pos = [0.0, 0.0];
        warm(&mut s, &mut pos);
        step(&mut s, 98.0, 100.0, &mut pos);
        assert_eq!(pos, [5.0, -5.0]);
    }

    #[test]
    fn convergence_closes_pair() {
        let mut s = LongShortStrategy::new(AssetId(0), AssetId(1), cfg());
        let mut pos = [0.0, 0.0];
        warm(&mut s, &mut pos);
        step(&mut s, 104.0, 100.0, &mut pos);
        assert_eq!(pos, [-5.0, 5.0]);
        // Window is now [2, 0, 2, 4]: mean 2, sd sqrt(2); spread 2 gives z = 0.
        step(&mut s, 102.0, 100.0, &mut pos);
        assert_eq!(pos, [0.0, 0.0]);
    }

    #[test]
    fn stop_loss_then_no_reentry() {
        let config = LongShortConfig {
            stop_loss_sigmas: 2.5,
            ..cfg()
        };
        let mut s = LongShortStrategy::new(AssetId(0), AssetId(1), config);
        let mut pos = [0.0, 0.0];
        warm(&mut s, &mut pos);
        step(&mut s, 104.0, 100.0, &mut pos);
        assert_eq!(pos, [-5.0, 5.0]);
        // Window [2, 0, 2, 4]: mean 2, sd ~1.414; spread 8 gives z ~4.2.
        step(&mut s, 108.0, 100.0, &mut pos);
        assert_eq!(pos, [0.0, 0.0]);
        // Still wide, but stopped out: no re-entry.
        assert!(step(&mut s, 112.0, 100.0, &mut pos).is_empty());
    }

    #[test]
    fn flat_history_is_neutral() {
        let mut s = LongShortStrategy::new(AssetId(0), AssetId(1), cfg());
        let mut pos = [0.0, 0.0];
        for _ in 0..6 {
            assert!(step(&mut s, 100.0, 100.0, &mut pos).is_empty());
        }
        assert_eq!(s.last_z(), None);
    }
}
