//! Contagion: one trader's forced sell-off pushes another past its limit
//! within the same tick.

use cascadelab_core::agent::Trader;
use cascadelab_core::domain::{AssetId, Order, OrderReason, TraderId, TraderKind};
use cascadelab_core::engine::resolve;
use cascadelab_core::market::Market;
use cascadelab_core::risk::{LimitPolicy, RiskFactors, RiskManager, RiskMeasure, RiskProfile};

fn trader(id: u32, position: f64, limit: f64, stress: Option<f64>) -> Trader {
    let profile = RiskProfile {
        measure: RiskMeasure::ValueAtRisk,
        limit: LimitPolicy::Constant { limit },
        window: 3,
        factors: RiskFactors {
            z_var: 1.0,
            es_factor: 1.2,
        },
        stress_volatility: stress,
    };
    let mut t = Trader::new(TraderId(id), TraderKind::Trend, Vec::new(), 1, 0.0, profile, true);
    t.settle(
        &[Order::new(AssetId(0), TraderId(id), position, OrderReason::Strategy)],
        &[0.0],
    );
    t
}

/// Flat market at 100 with liquidity 100 and a few quiet ticks of history.
fn quiet_market() -> Market {
    let mut m = Market::new();
    m.add_asset("x", 100.0, 100.0).unwrap();
    for t in 1..=3 {
        m.clear(t, &[0.0]);
    }
    m
}

#[test]
fn selloff_of_fifty_moves_price_half_a_point() {
    let m = quiet_market();
    assert_eq!(m.impact(AssetId(0), -50.0), -0.5);
    assert_eq!(m.tentative_prices(&[-50.0]), vec![99.5]);
}

#[test]
fn forced_selloff_cascades_to_second_trader() {
    let market = quiet_market();
    let manager = RiskManager::default();
    // A runs a stressed estimate: unit volatility 1.0 at 100, risk 100 vs limit 50.
    let a = trader(0, 100.0, 50.0, Some(0.01));
    // B sees zero volatility on the flat history and is within its limit.
    let b = trader(1, 100.0, 10.0, None);
    let histories = [market.history(AssetId(0))];
    let prices = market.prices();

    let vols_a = a.volatility(&histories, Some(prices.as_slice()));
    let sizing_a = manager.size_orders(
        a.id(),
        a.risk_profile(),
        a.positions(),
        &[],
        &vols_a,
        a.active_limit(&vols_a),
    );
    assert!(sizing_a.breached);
    assert_eq!(sizing_a.orders.len(), 1);
    assert_eq!(sizing_a.orders[0].size, -50.0);
    assert_eq!(sizing_a.orders[0].reason, OrderReason::ForcedSelloff);

    let vols_b = b.volatility(&histories, Some(prices.as_slice()));
    let sizing_b = manager.size_orders(
        b.id(),
        b.risk_profile(),
        b.positions(),
        &[],
        &vols_b,
        b.active_limit(&vols_b),
    );
    assert!(!sizing_b.breached);
    assert!(sizing_b.orders.is_empty());

    let max_iterations = 20;
    let traders = [a, b];
    let outcome = resolve(4, &market, &traders, &manager, sizing_a.orders, max_iterations, true);

    assert!(outcome.rounds >= 1);
    assert!(outcome.rounds <= max_iterations);
    assert!(outcome.breached.contains(&TraderId(1)));
    assert!(!outcome.breached.contains(&TraderId(0)));

    let b_orders: Vec<&Order> = outcome.orders.iter().filter(|o| o.trader == TraderId(1)).collect();
    assert!(!b_orders.is_empty());
    assert!(b_orders
        .iter()
        .all(|o| o.reason == OrderReason::ForcedSelloff && o.size < 0.0));
    let b_total: f64 = b_orders.iter().map(|o| o.size).sum();
    assert!(b_total > -100.0, "reduction bounded by the position");

    // A sold exactly once; the rest of the flow is B.
    let a_orders = outcome.orders.iter().filter(|o| o.trader == TraderId(0)).count();
    assert_eq!(a_orders, 1);
    assert!((outcome.flow[0] - (-50.0 + b_total)).abs() < 1e-9);
}

#[test]
fn iteration_cap_bounds_resolution() {
    let market = quiet_market();
    let manager = RiskManager::new(0.05);
    let a = trader(0, 100.0, 50.0, Some(0.01));
    let b = trader(1, 100.0, 1.0, None);
    let seed = Order::new(AssetId(0), TraderId(0), -50.0, OrderReason::ForcedSelloff);
    let outcome = resolve(4, &market, &[a, b], &manager, vec![seed], 2, true);
    assert_eq!(outcome.rounds, 2);
    assert!(outcome.unresolved);
}

#[test]
fn cleared_price_reflects_whole_cascade() {
    let mut market = quiet_market();
    let manager = RiskManager::default();
    let traders = [
        trader(0, 100.0, 50.0, Some(0.01)),
        trader(1, 100.0, 10.0, None),
    ];
    let seed = Order::new(AssetId(0), TraderId(0), -50.0, OrderReason::ForcedSelloff);
    let outcome = resolve(4, &market, &traders, &manager, vec![seed], 20, true);
    let cleared = market.clear(4, &outcome.flow);
    assert!(cleared[0] < 99.5);
    assert_eq!(cleared[0], 100.0 + outcome.flow[0] / 100.0);
}
