//! Market clearing against the linear impact law.

use cascadelab_core::config::ConfigError;
use cascadelab_core::domain::{Asset, AssetId};
use cascadelab_core::market::{Market, MIN_PRICE};

fn two_assets() -> Market {
    let mut m = Market::new();
    m.add_asset("alpha", 100.0, 50.0).unwrap();
    m.add_asset("beta", 20.0, 400.0).unwrap();
    m
}

#[test]
fn price_follows_flow_over_liquidity() {
    let mut m = two_assets();
    let flows = [[10.0, -40.0], [-25.0, 0.0], [0.0, 120.0], [5.5, -3.0]];
    for (t, flow) in flows.iter().enumerate() {
        let before = m.prices();
        let after = m.clear(t + 1, flow);
        assert_eq!(after[0], before[0] + flow[0] / 50.0);
        assert_eq!(after[1], before[1] + flow[1] / 400.0);
    }
    assert_eq!(m.history(AssetId(0)).len(), flows.len() + 1);
    assert_eq!(m.flow_history(AssetId(1))[3], 120.0);
}

#[test]
fn tentative_prices_leave_state_untouched() {
    let m = two_assets();
    let tentative = m.tentative_prices(&[100.0, -400.0]);
    assert_eq!(tentative, vec![102.0, 19.0]);
    assert_eq!(m.prices(), vec![100.0, 20.0]);
    assert_eq!(m.impact(AssetId(0), -50.0), -1.0);
}

#[test]
fn crash_is_floored_at_minimum_price() {
    let mut m = two_assets();
    let prices = m.clear(1, &[-1.0e6, 0.0]);
    assert_eq!(prices[0], MIN_PRICE);
    assert!(prices.iter().all(|p| *p > 0.0));
}

#[test]
fn exogenous_shift_then_clear() {
    let mut m = two_assets();
    m.apply_exogenous(AssetId(0), 1.5);
    let prices = m.clear(1, &[50.0, 0.0]);
    assert_eq!(prices[0], 102.5);
    assert_eq!(m.history(AssetId(0)), &[100.0, 102.5]);
}

#[test]
fn surrogate_publish_has_no_impact() {
    let mut m = two_assets();
    m.set_price(AssetId(1), 21.0);
    let prices = m.publish(&[1000.0, 1000.0]);
    assert_eq!(prices, vec![100.0, 21.0]);
    assert_eq!(m.flow_history(AssetId(0)), &[0.0, 1000.0]);
}

#[test]
fn initialize_rejects_bad_assets() {
    let asset = |liquidity: f64, price0: f64| Asset {
        id: AssetId(0),
        name: "x".to_string(),
        price0,
        liquidity,
        spread_partner: None,
    };
    assert!(matches!(
        Market::initialize(&[asset(0.0, 10.0)]),
        Err(ConfigError::NonPositiveLiquidity { .. })
    ));
    assert!(matches!(
        Market::initialize(&[asset(10.0, -1.0)]),
        Err(ConfigError::NonPositivePrice { .. })
    ));
    assert_eq!(Market::initialize(&[asset(10.0, 1.0)]).unwrap().num_assets(), 1);
}
