//! Same-tick resolution of forced sell-off chains.
//!
//! Sizing is done against the pre-clear snapshot. The tick's total flow then
//! implies tentative prices; every trader's book (including the orders it has
//! already been assigned this tick) is re-checked at those prices and traders
//! that now breach add a reduce-only sell-off. The new flow implies new
//! tentative prices, and so on until a round adds nothing or the iteration
//! cap is hit. The market is cleared once afterwards from the accumulated
//! flow.
//!
//! Every sell-off scales a book toward zero, so each trader's cumulative
//! reduction is monotone and bounded by its position.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::agent::Trader;
use crate::domain::{net_flow, AssetId, Order, Tick, TraderId};
use crate::market::Market;
use crate::risk::RiskManager;

/// Result of resolving one tick's flow.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeOutcome {
    /// Sized orders followed by the sell-offs of every round, in round order.
    pub orders: Vec<Order>,
    /// Net flow per asset of `orders`.
    pub flow: Vec<f64>,
    /// Rounds that added at least one sell-off.
    pub rounds: usize,
    /// Traders that breached at tentative prices in some round.
    pub breached: BTreeSet<TraderId>,
    /// Breaches were still present when the iteration cap stopped resolution.
    pub unresolved: bool,
}

/// Re-check books at tentative prices until no trader breaches.
///
/// With `impact == false` (surrogate pricing) flow does not move price, so
/// the re-check runs at the current prices.
pub fn resolve(
    tick: Tick,
    market: &Market,
    traders: &[Trader],
    manager: &RiskManager,
    orders: Vec<Order>,
    max_iterations: usize,
    impact: bool,
) -> CascadeOutcome {
    let num_assets = market.num_assets();
    let mut books: Vec<Vec<f64>> = traders.iter().map(|t| t.positions().to_vec()).collect();
    for order in &orders {
        books[order.trader.index()][order.asset.index()] += order.size;
    }
    let mut flow = net_flow(&orders, num_assets);
    let mut outcome = CascadeOutcome {
        orders,
        flow: Vec::new(),
        rounds: 0,
        breached: BTreeSet::new(),
        unresolved: false,
    };

    while outcome.rounds < max_iterations {
        let selloffs = round(market, traders, manager, &books, &flow, impact);
        if selloffs.is_empty() {
            break;
        }
        outcome.rounds += 1;
        debug!(
            tick,
            round = outcome.rounds,
            orders = selloffs.len(),
            "cascade round added forced sell-offs"
        );
        for order in &selloffs {
            books[order.trader.index()][order.asset.index()] += order.size;
            flow[order.asset.index()] += order.size;
            outcome.breached.insert(order.trader);
        }
        outcome.orders.extend(selloffs);
    }

    if max_iterations > 0 && outcome.rounds == max_iterations {
        let remaining = round(market, traders, manager, &books, &flow, impact);
        if !remaining.is_empty() {
            let traders: BTreeSet<TraderId> = remaining.iter().map(|o| o.trader).collect();
            warn!(
                tick,
                rounds = outcome.rounds,
                breaching = traders.len(),
                "cascade iteration cap reached; remaining breaches carry to next tick"
            );
            outcome.unresolved = true;
        }
    }

    outcome.flow = flow;
    outcome
}

/// Sell-offs every trader would emit at the prices implied by `flow`.
fn round(
    market: &Market,
    traders: &[Trader],
    manager: &RiskManager,
    books: &[Vec<f64>],
    flow: &[f64],
    impact: bool,
) -> Vec<Order> {
    let tentative = if impact {
        market.tentative_prices(flow)
    } else {
        market.prices()
    };
    let histories: Vec<&[f64]> = (0..market.num_assets())
        .map(|i| market.history(AssetId(i)))
        .collect();

    let mut orders = Vec::new();
    for (trader, book) in traders.iter().zip(books) {
        let vols = trader.volatility(&histories, Some(tentative.as_slice()));
        let limit = trader.active_limit(&vols);
        orders.extend(manager.recheck(trader.id(), trader.risk_profile(), book, &vols, limit));
    }
    orders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderReason, TraderKind};
    use crate::risk::{LimitPolicy, RiskFactors, RiskMeasure, RiskProfile};

    fn holder(id: u32, position: f64, limit: f64, measure: RiskMeasure) -> Trader {
        let profile = RiskProfile {
            measure,
            limit: LimitPolicy::Constant { limit },
            window: 3,
            factors: RiskFactors {
                z_var: 1.0,
                es_factor: 1.0,
            },
            stress_volatility: Some(0.01),
        };
        let mut t = Trader::new(TraderId(id), TraderKind::Value, Vec::new(), 1, 0.0, profile, true);
        t.settle(
            &[Order::new(AssetId(0), TraderId(id), position, OrderReason::Strategy)],
            &[0.0],
        );
        t
    }

    fn market() -> Market {
        let mut m = Market::new();
        m.add_asset("x", 100.0, 100.0).unwrap();
        m
    }

    #[test]
    fn quiet_books_need_no_rounds() {
        let traders = vec![holder(0, 10.0, 50.0, RiskMeasure::ValueAtRisk)];
        let out = resolve(1, &market(), &traders, &RiskManager::default(), Vec::new(), 10, true);
        assert_eq!(out.rounds, 0);
        assert!(out.orders.is_empty());
        assert_eq!(out.flow, vec![0.0]);
    }

    #[test]
    fn unconstrained_books_never_sell() {
        let traders = vec![holder(0, 1000.0, 1.0, RiskMeasure::Unconstrained)];
        let sell = Order::new(AssetId(0), TraderId(0), -10.0, OrderReason::Strategy);
        let out = resolve(1, &market(), &traders, &RiskManager::default(), vec![sell], 10, true);
        assert_eq!(out.rounds, 0);
        assert_eq!(out.orders.len(), 1);
    }

    #[test]
    fn zero_iterations_skips_rechecks() {
        let traders = vec![holder(0, 1000.0, 1.0, RiskMeasure::ValueAtRisk)];
        let out = resolve(1, &market(), &traders, &RiskManager::default(), Vec::new(), 0, true);
        assert_eq!(out.rounds, 0);
        assert!(!out.unresolved);
    }
}
