//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Prices stay positive under arbitrary order flow
//! 2. Risk-sized orders never leave post-trade risk above the limit
//! 3. Forced sell-offs only ever reduce positions
//! 4. Volatility at tick t ignores prices published after t

use proptest::prelude::*;

use cascadelab_core::domain::{AssetId, ProposedOrder, TraderId};
use cascadelab_core::indicators::rolling_log_volatility;
use cascadelab_core::market::Market;
use cascadelab_core::risk::{
    exceeds, LimitPolicy, RiskFactors, RiskManager, RiskMeasure, RiskProfile, VolatilityEstimate,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_flow() -> impl Strategy<Value = f64> {
    -5_000.0..5_000.0_f64
}

fn arb_prices(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..200.0_f64, len)
}

fn profile(measure: RiskMeasure) -> RiskProfile {
    RiskProfile {
        measure,
        limit: LimitPolicy::Constant { limit: 10.0 },
        window: 20,
        factors: RiskFactors::from_confidence(0.95, 0.975).unwrap(),
        stress_volatility: None,
    }
}

// ── 1. Positive prices ───────────────────────────────────────────────

proptest! {
    #[test]
    fn prices_stay_positive(
        liquidity in 1.0..500.0_f64,
        flows in prop::collection::vec(arb_flow(), 1..60),
    ) {
        let mut market = Market::new();
        market.add_asset("x", 50.0, liquidity).unwrap();
        for (t, flow) in flows.iter().enumerate() {
            let prices = market.clear(t + 1, &[*flow]);
            prop_assert!(prices[0] > 0.0);
        }
        prop_assert!(market.history(AssetId(0)).iter().all(|p| *p > 0.0));
    }
}

// ── 2. Sizing respects the limit ─────────────────────────────────────

proptest! {
    #[test]
    fn sized_orders_stay_within_limit(
        positions in prop::collection::vec(-3.0..3.0_f64, 3),
        proposed in prop::collection::vec(-50.0..50.0_f64, 3),
        unit in prop::collection::vec(0.01..2.0_f64, 3),
        var in any::<bool>(),
    ) {
        let measure = if var { RiskMeasure::ValueAtRisk } else { RiskMeasure::ExpectedShortfall };
        let profile = profile(measure);
        let vols = VolatilityEstimate::from_unit(unit);
        let rm = RiskManager::default();
        let pre = rm.estimate(&profile, &positions, &vols).measured(measure).unwrap();
        prop_assume!(!exceeds(pre, 10.0));

        let orders: Vec<ProposedOrder> = proposed
            .iter()
            .enumerate()
            .map(|(i, s)| ProposedOrder::new(AssetId(i), *s))
            .collect();
        let sizing = rm.size_orders(TraderId(0), &profile, &positions, &orders, &vols, 10.0);
        let post = sizing.post.measured(measure).unwrap();
        prop_assert!(!exceeds(post, 10.0), "post-trade risk {} above limit", post);
        prop_assert!((0.0..=1.0).contains(&sizing.scale));
        for o in &sizing.orders {
            let original = proposed[o.asset.index()];
            prop_assert!(o.size * original >= 0.0, "sign preserved");
            prop_assert!(o.size.abs() <= original.abs() + 1e-12);
        }
    }
}

// ── 3. Sell-offs are reduce-only ─────────────────────────────────────

proptest! {
    #[test]
    fn selloffs_reduce_only(
        positions in prop::collection::vec(-100.0..100.0_f64, 1..5),
        risk in 0.1..1_000.0_f64,
        limit in 0.0..1_000.0_f64,
        cap in 0.01..1.0_f64,
    ) {
        let rm = RiskManager::new(cap);
        for o in rm.forced_selloff(TraderId(0), &positions, risk, limit) {
            let p = positions[o.asset.index()];
            prop_assert!(o.size * p <= 0.0);
            prop_assert!(o.size.abs() <= p.abs() * cap + 1e-12);
        }
    }
}

// ── 4. No lookahead in volatility ────────────────────────────────────

proptest! {
    #[test]
    fn volatility_ignores_future_prices(
        prices in arb_prices(2..80),
        future in arb_prices(1..40),
        window in 2usize..30,
        cut in 0usize..80,
    ) {
        let t = cut % prices.len();
        let mut extended = prices.clone();
        extended.extend(future);

        let seen = VolatilityEstimate::from_histories(&[&prices[..=t]], None, window, None);
        let replay = VolatilityEstimate::from_histories(&[&extended[..=t]], None, window, None);
        prop_assert_eq!(seen.sigma[0], replay.sigma[0]);
        prop_assert_eq!(seen.sigma[0], rolling_log_volatility(&prices[..=t], window));
    }

    #[test]
    fn tentative_price_equals_published_price(
        prices in arb_prices(1..60),
        next in 1.0..200.0_f64,
        window in 2usize..30,
    ) {
        let mut published = prices.clone();
        published.push(next);
        let tentative = VolatilityEstimate::from_histories(&[prices.as_slice()], Some(&[next][..]), window, None);
        let after = VolatilityEstimate::from_histories(&[published.as_slice()], None, window, None);
        prop_assert!((tentative.sigma[0] - after.sigma[0]).abs() < 1e-12);
        prop_assert!((tentative.unit[0] - after.unit[0]).abs() < 1e-9);
    }
}
