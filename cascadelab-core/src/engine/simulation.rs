//! Tick scheduler.
//!
//! Fixed order per tick:
//! 1. Exogenous: shift prices by the driver increment (impact) or impose the
//!    driver series (surrogate).
//! 2. Strategies: every trader evaluates against the same pre-clear snapshot.
//! 3. Risk: proposals are sized, or replaced by a forced sell-off.
//! 4. Cascade: re-check at tentative prices until no trader breaches.
//! 5. Clear: the market clears once from the accumulated flow.
//! 6. Accounting: wealth, positions and risk snapshots.

use tracing::{debug, info};

use crate::agent::{build_traders, Trader, TraderDirectory};
use crate::config::{ConfigError, PriceFormation, SimulationConfig};
use crate::domain::{AssetId, Order, RiskSnapshot, Tick};
use crate::exogenous::ExogenousPaths;
use crate::market::Market;
use crate::risk::{RiskEstimate, RiskManager};
use crate::rng::SimContext;

use super::cascade;
use super::recorder::{Recorder, RunOutput};

/// One run of the model: context, market, trader arena, paths and recorder.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
    ctx: SimContext,
    market: Market,
    traders: Vec<Trader>,
    directory: TraderDirectory,
    paths: ExogenousPaths,
    risk: RiskManager,
    recorder: Recorder,
}

impl Simulation {
    /// Validate the configuration and build fresh run state.
    ///
    /// All randomness is keyed by `(config.seed, run_index)`.
    pub fn new(config: &SimulationConfig, run_index: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut ctx = SimContext::new(config.seed, run_index);
        let assets = config.resolve_assets()?;
        let market = Market::initialize(&assets)?;
        let paths = ExogenousPaths::generate(
            &mut ctx,
            &config.price_processes,
            &config.value_processes,
            config.num_ticks + 1,
        );
        let (traders, directory) = build_traders(config, &ctx)?;
        Ok(Self {
            config: config.clone(),
            ctx,
            market,
            traders,
            directory,
            paths,
            risk: RiskManager::new(config.max_selloff_fraction),
            recorder: Recorder::new(),
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn tick(&self) -> Tick {
        self.ctx.tick()
    }

    pub fn is_finished(&self) -> bool {
        self.ctx.tick() >= self.config.num_ticks
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn traders(&self) -> &[Trader] {
        &self.traders
    }

    pub fn directory(&self) -> &TraderDirectory {
        &self.directory
    }

    pub fn paths(&self) -> &ExogenousPaths {
        &self.paths
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Advance one tick. Returns the tick just completed, or `None` once
    /// `num_ticks` ticks have run.
    pub fn step(&mut self) -> Option<Tick> {
        if self.is_finished() {
            return None;
        }
        let tick = self.ctx.advance();
        let num_assets = self.market.num_assets();
        let impact = self.config.price_formation == PriceFormation::Impact;

        for i in 0..num_assets {
            let asset = AssetId(i);
            match self.config.price_formation {
                PriceFormation::Impact => self
                    .market
                    .apply_exogenous(asset, self.paths.price_increment(asset, tick)),
                PriceFormation::Surrogate => {
                    self.market.set_price(asset, self.paths.price_at(asset, tick))
                }
            }
        }

        let prices = self.market.prices();
        let values: Vec<f64> = (0..num_assets)
            .map(|i| self.paths.value_at(AssetId(i), tick))
            .collect();
        let published: Vec<f64> = (0..num_assets)
            .map(|i| self.market.history(AssetId(i)).last().copied().unwrap_or(prices[i]))
            .collect();

        let mut orders: Vec<Order> = Vec::new();
        let mut pre: Vec<(RiskEstimate, f64, bool)> = Vec::with_capacity(self.traders.len());
        {
            let histories: Vec<&[f64]> = (0..num_assets)
                .map(|i| self.market.history(AssetId(i)))
                .collect();
            for trader in &mut self.traders {
                let proposed = trader.propose(tick, &prices, &values);
                let vols = trader.volatility(&histories, Some(prices.as_slice()));
                let limit = trader.active_limit(&vols);
                let sizing = self.risk.size_orders(
                    trader.id(),
                    trader.risk_profile(),
                    trader.positions(),
                    &proposed,
                    &vols,
                    limit,
                );
                pre.push((sizing.pre, sizing.limit, sizing.breached));
                orders.extend(sizing.orders);
            }
        }

        let outcome = cascade::resolve(
            tick,
            &self.market,
            &self.traders,
            &self.risk,
            orders,
            self.config.max_cascade_iterations,
            impact,
        );

        let cleared = if impact {
            self.market.clear(tick, &outcome.flow)
        } else {
            self.market.publish(&outcome.flow)
        };
        let change: Vec<f64> = cleared.iter().zip(&published).map(|(c, p)| c - p).collect();

        let mut by_trader: Vec<Vec<Order>> = vec![Vec::new(); self.traders.len()];
        for order in &outcome.orders {
            by_trader[order.trader.index()].push(order.clone());
        }

        let histories: Vec<&[f64]> = (0..num_assets)
            .map(|i| self.market.history(AssetId(i)))
            .collect();
        let mut snapshots = Vec::with_capacity(self.traders.len());
        for ((trader, executed), (pre_risk, limit, pre_breach)) in
            self.traders.iter_mut().zip(&by_trader).zip(pre)
        {
            trader.settle(executed, &change);
            let vols = trader.volatility(&histories, None);
            let post = self.risk.estimate(trader.risk_profile(), trader.positions(), &vols);
            let snapshot = RiskSnapshot {
                trader: trader.id(),
                tick,
                pre_var: pre_risk.var,
                pre_es: pre_risk.es,
                post_var: post.var,
                post_es: post.es,
                limit,
                breached: pre_breach || outcome.breached.contains(&trader.id()),
            };
            trader.record(snapshot.clone());
            snapshots.push(snapshot);
        }

        if outcome.rounds > 0 {
            debug!(tick, rounds = outcome.rounds, "cascade resolved");
        }
        self.recorder.record_tick(tick, &snapshots, outcome.rounds);
        self.recorder.record_orders(&outcome.orders);
        Some(tick)
    }

    /// Run all remaining ticks and collect the output.
    pub fn run(mut self) -> RunOutput {
        info!(
            seed = self.config.seed,
            run = self.ctx.streams.run_index(),
            ticks = self.config.num_ticks,
            traders = self.traders.len(),
            "run started"
        );
        while self.step().is_some() {}
        let output = self.finish();
        info!(
            run = output.run_index,
            breaches = output.total_breaches(),
            selloffs = output.orders.forced_selloff,
            "run finished"
        );
        output
    }

    /// Collect the output of the ticks run so far.
    pub fn finish(self) -> RunOutput {
        let seed = self.config.seed;
        let run_index = self.ctx.streams.run_index();
        self.recorder.finish(
            seed,
            run_index,
            &self.market,
            &self.paths,
            &self.traders,
            &self.directory,
        )
    }
}
