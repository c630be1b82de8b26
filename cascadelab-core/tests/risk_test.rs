//! Order sizing and de-leveraging through the public risk API.

use cascadelab_core::domain::{AssetId, OrderReason, ProposedOrder, TraderId};
use cascadelab_core::risk::{
    LimitPolicy, RiskFactors, RiskManager, RiskMeasure, RiskProfile, VolatilityEstimate,
};

fn profile(measure: RiskMeasure, limit: f64) -> RiskProfile {
    RiskProfile {
        measure,
        limit: LimitPolicy::Constant { limit },
        window: 10,
        factors: RiskFactors {
            z_var: 1.65,
            es_factor: 2.06,
        },
        stress_volatility: None,
    }
}

#[test]
fn max_position_at_limit_ten_unit_vol_two() {
    let rm = RiskManager::default();
    let sizing = rm.size_orders(
        TraderId(0),
        &profile(RiskMeasure::ValueAtRisk, 10.0),
        &[0.0],
        &[ProposedOrder::new(AssetId(0), 8.0)],
        &VolatilityEstimate::from_unit(vec![2.0]),
        10.0,
    );
    assert_eq!(sizing.orders.len(), 1);
    assert!((sizing.orders[0].size - 3.03).abs() < 0.01);
    assert_eq!(sizing.orders[0].reason, OrderReason::RiskReduction);
}

#[test]
fn at_limit_trader_cannot_extend() {
    let rm = RiskManager::default();
    let at_limit = 10.0 / (1.65 * 2.0);
    let sizing = rm.size_orders(
        TraderId(0),
        &profile(RiskMeasure::ValueAtRisk, 10.0),
        &[at_limit],
        &[ProposedOrder::new(AssetId(0), 1.0)],
        &VolatilityEstimate::from_unit(vec![2.0]),
        10.0,
    );
    assert!(!sizing.breached);
    assert!(sizing.orders.iter().all(|o| o.size.abs() < 1e-9));
}

#[test]
fn unconstrained_trader_keeps_full_order_and_records_risk() {
    let rm = RiskManager::default();
    let sizing = rm.size_orders(
        TraderId(2),
        &profile(RiskMeasure::Unconstrained, 1.0),
        &[0.0, 0.0],
        &[
            ProposedOrder::new(AssetId(0), 40.0),
            ProposedOrder::new(AssetId(1), -40.0),
        ],
        &VolatilityEstimate::from_unit(vec![1.0, 1.0]),
        1.0,
    );
    assert_eq!(sizing.scale, 1.0);
    assert_eq!(sizing.orders[0].size, 40.0);
    assert_eq!(sizing.orders[1].size, -40.0);
    assert!(sizing.post.var > 1.0);
    assert!(sizing.post.es > sizing.post.var);
}

#[test]
fn breaching_book_drops_strategy_orders_and_reduces() {
    let rm = RiskManager::new(1.0);
    let positions = [30.0, -20.0];
    let sizing = rm.size_orders(
        TraderId(1),
        &profile(RiskMeasure::ExpectedShortfall, 10.0),
        &positions,
        &[ProposedOrder::new(AssetId(0), 5.0)],
        &VolatilityEstimate::from_unit(vec![1.0, 1.0]),
        10.0,
    );
    assert!(sizing.breached);
    assert!(sizing
        .orders
        .iter()
        .all(|o| o.reason == OrderReason::ForcedSelloff));
    for o in &sizing.orders {
        let p = positions[o.asset.index()];
        assert!(o.size * p < 0.0, "sell-off must reduce, not extend");
        assert!(o.size.abs() <= p.abs());
    }
    assert!((sizing.post.es - 10.0).abs() < 1e-9);
}

#[test]
fn es_exceeds_var_at_equal_confidence() {
    let factors = RiskFactors::from_confidence(0.99, 0.99).unwrap();
    assert!(factors.es_factor > factors.z_var);
}
