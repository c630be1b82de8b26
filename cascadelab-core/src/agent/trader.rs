//! A single trading agent: strategies, book, wealth and risk history.

use serde::{Deserialize, Serialize};

use crate::domain::{AssetId, Order, ProposedOrder, RiskSnapshot, Tick, TraderId, TraderKind};
use crate::risk::{RiskMeasure, RiskProfile, VolatilityEstimate};
use crate::strategy::{clip_short, Strategy, StrategyInput};

#[derive(Debug, Clone)]
pub struct Trader {
    id: TraderId,
    kind: TraderKind,
    strategies: Vec<Strategy>,
    /// Assets any of the strategies trade, ascending.
    assets: Vec<usize>,
    positions: Vec<f64>,
    wealth: f64,
    risk: RiskProfile,
    allow_short: bool,
    /// Wealth after every tick; index 0 is the initial wealth.
    wealth_history: Vec<f64>,
    /// Book after every tick; index 0 is the initial (flat) book.
    position_history: Vec<Vec<f64>>,
    snapshots: Vec<RiskSnapshot>,
}

impl Trader {
    pub fn new(
        id: TraderId,
        kind: TraderKind,
        strategies: Vec<Strategy>,
        num_assets: usize,
        initial_wealth: f64,
        risk: RiskProfile,
        allow_short: bool,
    ) -> Self {
        let mut assets: Vec<usize> = strategies
            .iter()
            .flat_map(|s| s.assets())
            .map(AssetId::index)
            .collect();
        assets.sort_unstable();
        assets.dedup();
        let positions = vec![0.0; num_assets];
        Self {
            id,
            kind,
            strategies,
            assets,
            position_history: vec![positions.clone()],
            positions,
            wealth: initial_wealth,
            risk,
            allow_short,
            wealth_history: vec![initial_wealth],
            snapshots: Vec::new(),
        }
    }

    pub fn id(&self) -> TraderId {
        self.id
    }

    pub fn kind(&self) -> TraderKind {
        self.kind
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn position_history(&self) -> &[Vec<f64>] {
        &self.position_history
    }

    pub fn wealth(&self) -> f64 {
        self.wealth
    }

    pub fn wealth_history(&self) -> &[f64] {
        &self.wealth_history
    }

    pub fn risk_profile(&self) -> &RiskProfile {
        &self.risk
    }

    pub fn allow_short(&self) -> bool {
        self.allow_short
    }

    pub fn snapshots(&self) -> &[RiskSnapshot] {
        &self.snapshots
    }

    /// Query every strategy against the shared snapshot and net the result
    /// per asset.
    ///
    /// Orders that would open or extend a short are clipped when this trader
    /// may not sell short.
    pub fn propose(&mut self, tick: Tick, prices: &[f64], values: &[f64]) -> Vec<ProposedOrder> {
        let input = StrategyInput {
            tick,
            prices,
            values,
            positions: &self.positions,
        };
        let mut wanted = vec![0.0; self.positions.len()];
        for strategy in &mut self.strategies {
            for order in strategy.evaluate(&input) {
                wanted[order.asset.index()] += order.size;
            }
        }
        wanted
            .into_iter()
            .enumerate()
            .map(|(i, size)| {
                let size = clip_short(size, self.positions[i], self.allow_short);
                ProposedOrder::new(AssetId(i), size)
            })
            .filter(|o| o.size != 0.0)
            .collect()
    }

    /// Volatility of every asset through this trader's estimation window.
    pub fn volatility(&self, histories: &[&[f64]], tentative: Option<&[f64]>) -> VolatilityEstimate {
        VolatilityEstimate::from_histories(
            histories,
            tentative,
            self.risk.window,
            self.risk.stress_volatility,
        )
    }

    /// The limit in force given current volatility.
    ///
    /// Realized volatility for countercyclical limits is the mean σ over the
    /// assets this trader actually trades.
    pub fn active_limit(&self, vols: &VolatilityEstimate) -> f64 {
        self.risk.limit.active_limit(vols.mean_sigma(&self.assets))
    }

    /// Close the tick: mark the book held into the clear to market, then
    /// apply this tick's executed orders.
    ///
    /// `wealth += Σ previous_position × price_change`.
    pub fn settle(&mut self, orders: &[Order], price_change: &[f64]) {
        let pnl: f64 = self
            .positions
            .iter()
            .zip(price_change)
            .map(|(p, dp)| p * dp)
            .sum();
        self.wealth += pnl;
        for order in orders {
            debug_assert_eq!(order.trader, self.id);
            self.positions[order.asset.index()] += order.size;
        }
        self.wealth_history.push(self.wealth);
        self.position_history.push(self.positions.clone());
    }

    pub fn record(&mut self, snapshot: RiskSnapshot) {
        self.snapshots.push(snapshot);
    }
}

/// Reporting view of a trader at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderReport {
    pub id: TraderId,
    pub name: String,
    pub kind: TraderKind,
    pub measure: RiskMeasure,
    pub allow_short: bool,
    pub final_positions: Vec<f64>,
    pub wealth: Vec<f64>,
    pub snapshots: Vec<RiskSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderReason;
    use crate::risk::{LimitPolicy, RiskFactors};
    use crate::strategy::{ValueConfig, ValueStrategy};

    fn profile() -> RiskProfile {
        RiskProfile {
            measure: RiskMeasure::ValueAtRisk,
            limit: LimitPolicy::Constant { limit: 50.0 },
            window: 5,
            factors: RiskFactors {
                z_var: 1.65,
                es_factor: 2.0,
            },
            stress_volatility: None,
        }
    }

    fn value_trader(allow_short: bool) -> Trader {
        let strategies = vec![Strategy::Value(ValueStrategy::new(
            AssetId(1),
            ValueConfig::default(),
        ))];
        Trader::new(
            TraderId(0),
            TraderKind::Value,
            strategies,
            2,
            100.0,
            profile(),
            allow_short,
        )
    }

    #[test]
    fn proposes_only_for_traded_assets() {
        let mut t = value_trader(true);
        let orders = t.propose(1, &[100.0, 100.0], &[90.0, 104.0]);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].asset, AssetId(1));
        assert!(orders[0].size > 0.0);
    }

    #[test]
    fn short_opening_is_clipped_without_permission() {
        let mut t = value_trader(false);
        assert!(t.propose(1, &[100.0, 100.0], &[100.0, 90.0]).is_empty());
        let mut t = value_trader(true);
        assert_eq!(t.propose(1, &[100.0, 100.0], &[100.0, 90.0]).len(), 1);
    }

    #[test]
    fn wealth_uses_position_held_into_the_clear() {
        let mut t = value_trader(true);
        let buy = Order::new(AssetId(1), TraderId(0), 4.0, OrderReason::Strategy);
        t.settle(&[buy], &[0.0, 2.5]);
        // Flat going into the first clear: no pnl.
        assert_eq!(t.wealth(), 100.0);
        t.settle(&[], &[1.0, -0.5]);
        assert_eq!(t.wealth(), 98.0);
        assert_eq!(t.wealth_history(), &[100.0, 100.0, 98.0]);
        assert_eq!(t.position_history()[1], vec![0.0, 4.0]);
    }

    #[test]
    fn countercyclical_limit_reads_traded_assets_only() {
        let mut t = value_trader(true);
        t.risk.limit = LimitPolicy::Countercyclical {
            base: 10.0,
            reference_volatility: 0.01,
        };
        let vols = VolatilityEstimate {
            sigma: vec![0.5, 0.02],
            unit: vec![0.0, 0.0],
        };
        assert!((t.active_limit(&vols) - 5.0).abs() < 1e-12);
    }
}
