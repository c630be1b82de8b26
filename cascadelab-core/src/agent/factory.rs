//! Builds the trader population from the configuration.
//!
//! Every trader draws its parameters from its own named stream
//! (`trader/<kind>/<index>`), so changing the number of traders of one kind
//! leaves the others untouched.

use rand::Rng;

use crate::config::{ConfigError, SimulationConfig};
use crate::domain::{AssetId, TraderId, TraderKind};
use crate::rng::SimContext;
use crate::strategy::{LongShortStrategy, Strategy, TrendStrategy, ValueStrategy};

use super::{Trader, TraderDirectory};

/// Create all traders, trend first, then value, then long-short.
///
/// Trend and value traders run one strategy per asset with one parameter
/// draw per trader. Long-short traders are assigned the configured spread
/// pairs round-robin.
pub fn build_traders(
    config: &SimulationConfig,
    ctx: &SimContext,
) -> Result<(Vec<Trader>, TraderDirectory), ConfigError> {
    let num_assets = config.assets.len();
    let pairs = config.spread_pairs()?;
    let mut traders = Vec::with_capacity(config.traders.total());
    let mut directory = TraderDirectory::new();

    let counts = [
        (TraderKind::Trend, config.traders.trend),
        (TraderKind::Value, config.traders.value),
        (TraderKind::LongShort, config.traders.long_short),
    ];
    for (kind, count) in counts {
        for i in 0..count {
            let mut rng = ctx.streams.fork(&format!("trader/{}/{i}", kind.as_str()));
            let (strategies, short_probability) = match kind {
                TraderKind::Trend => {
                    let params = config.trend.sample(&mut rng);
                    let strategies = (0..num_assets)
                        .map(|a| Strategy::Trend(TrendStrategy::new(AssetId(a), params)))
                        .collect::<Vec<_>>();
                    (strategies, config.trend.short_selling_probability)
                }
                TraderKind::Value => {
                    let params = config.value.sample(&mut rng);
                    let strategies = (0..num_assets)
                        .map(|a| Strategy::Value(ValueStrategy::new(AssetId(a), params)))
                        .collect::<Vec<_>>();
                    (strategies, config.value.short_selling_probability)
                }
                TraderKind::LongShort => {
                    let params = config.long_short.sample(&mut rng);
                    let Some(&(leg, partner)) = pairs.get(i % pairs.len().max(1)) else {
                        return Err(ConfigError::NoSpreadPairs);
                    };
                    let strategy = LongShortStrategy::new(leg, partner, params);
                    (
                        vec![Strategy::LongShort(strategy)],
                        config.long_short.short_selling_probability,
                    )
                }
            };
            let allow_short = rng.gen::<f64>() < short_probability;
            let risk = config.risk.sample(&mut rng)?;

            let id = directory.register(format!("{}-{i}", kind.as_str()));
            debug_assert_eq!(id, TraderId(traders.len() as u32));
            traders.push(Trader::new(
                id,
                kind,
                strategies,
                num_assets,
                config.initial_wealth,
                risk,
                allow_short,
            ));
        }
    }
    Ok((traders, directory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraderCounts;

    #[test]
    fn population_matches_counts() {
        let config = SimulationConfig::default();
        let ctx = SimContext::new(config.seed, 0);
        let (traders, dir) = build_traders(&config, &ctx).unwrap();
        assert_eq!(traders.len(), config.traders.total());
        assert_eq!(dir.len(), traders.len());
        assert_eq!(traders[0].kind(), TraderKind::Trend);
        assert_eq!(traders.last().map(|t| t.kind()), Some(TraderKind::LongShort));
        assert_eq!(dir.name(TraderId(0)), "trend-0");
        assert_eq!(traders[0].strategies().len(), config.assets.len());
    }

    #[test]
    fn adding_value_traders_keeps_trend_draws() {
        let config = SimulationConfig::default();
        let mut more = config.clone();
        more.traders = TraderCounts {
            value: config.traders.value + 5,
            ..config.traders
        };
        let ctx = SimContext::new(config.seed, 0);
        let (a, _) = build_traders(&config, &ctx).unwrap();
        let (b, _) = build_traders(&more, &ctx).unwrap();
        for (x, y) in a.iter().zip(&b).take(config.traders.trend) {
            assert_eq!(x.risk_profile(), y.risk_profile());
            assert_eq!(x.allow_short(), y.allow_short());
        }
    }

    #[test]
    fn long_short_traders_use_pairs() {
        let config = SimulationConfig::default();
        let ctx = SimContext::new(1, 0);
        let (traders, _) = build_traders(&config, &ctx).unwrap();
        for t in traders.iter().filter(|t| t.kind() == TraderKind::LongShort) {
            match &t.strategies()[0] {
                Strategy::LongShort(s) => {
                    assert_eq!((s.leg(), s.partner()), (AssetId(0), AssetId(1)));
                }
                other => panic!("unexpected strategy {:?}", other.kind()),
            }
        }
    }
}
