//! Output series collected over a run.

use serde::{Deserialize, Serialize};

use crate::agent::{Trader, TraderDirectory, TraderReport};
use crate::domain::{AssetId, Order, OrderReason, RiskSnapshot, Tick, TraderKind};
use crate::exogenous::ExogenousPaths;
use crate::market::Market;

/// Cross-trader statistics of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickStats {
    pub tick: Tick,
    pub mean_pre_var: f64,
    pub mean_pre_es: f64,
    pub mean_post_var: f64,
    pub mean_post_es: f64,
    /// Traders whose book breached its limit at some point in the tick.
    pub breaches: usize,
    /// Same-tick re-check rounds that produced new sell-offs.
    pub cascade_rounds: usize,
}

/// Number of orders (and their absolute volume) per reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderCounts {
    pub strategy: usize,
    pub risk_reduction: usize,
    pub forced_selloff: usize,
    pub strategy_volume: f64,
    pub risk_reduction_volume: f64,
    pub forced_selloff_volume: f64,
}

impl OrderCounts {
    pub fn add(&mut self, order: &Order) {
        let volume = order.size.abs();
        match order.reason {
            OrderReason::Strategy => {
                self.strategy += 1;
                self.strategy_volume += volume;
            }
            OrderReason::RiskReduction => {
                self.risk_reduction += 1;
                self.risk_reduction_volume += volume;
            }
            OrderReason::ForcedSelloff => {
                self.forced_selloff += 1;
                self.forced_selloff_volume += volume;
            }
        }
    }

    pub fn count(&self, reason: OrderReason) -> usize {
        match reason {
            OrderReason::Strategy => self.strategy,
            OrderReason::RiskReduction => self.risk_reduction,
            OrderReason::ForcedSelloff => self.forced_selloff,
        }
    }

    pub fn total(&self) -> usize {
        self.strategy + self.risk_reduction + self.forced_selloff
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSeries {
    pub name: String,
    /// Published price per tick, index 0 is the initial price.
    pub price: Vec<f64>,
    /// Fundamental value per tick.
    pub value: Vec<f64>,
    /// Net cleared order flow per tick.
    pub flow: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindSummary {
    pub kind: TraderKind,
    pub traders: usize,
    /// Mean over traders of `(final wealth − initial wealth) / num_ticks`.
    pub mean_wealth_increment: f64,
    /// Mean one-tick wealth change per tick; entry `t − 1` covers tick `t`.
    pub wealth_increment: Vec<f64>,
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub seed: u64,
    pub run_index: u64,
    pub num_ticks: usize,
    pub assets: Vec<AssetSeries>,
    pub kinds: Vec<KindSummary>,
    pub ticks: Vec<TickStats>,
    pub orders: OrderCounts,
    pub traders: Vec<TraderReport>,
}

impl RunOutput {
    pub fn total_breaches(&self) -> usize {
        self.ticks.iter().map(|t| t.breaches).sum()
    }

    pub fn max_cascade_rounds(&self) -> usize {
        self.ticks.iter().map(|t| t.cascade_rounds).max().unwrap_or(0)
    }

    pub fn kind(&self, kind: TraderKind) -> Option<&KindSummary> {
        self.kinds.iter().find(|k| k.kind == kind)
    }
}

/// Accumulates per-tick statistics while the run is in progress.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    ticks: Vec<TickStats>,
    orders: OrderCounts,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&mut self, tick: Tick, snapshots: &[RiskSnapshot], cascade_rounds: usize) {
        let n = snapshots.len().max(1) as f64;
        let mean = |f: fn(&RiskSnapshot) -> f64| snapshots.iter().map(f).sum::<f64>() / n;
        self.ticks.push(TickStats {
            tick,
            mean_pre_var: mean(|s| s.pre_var),
            mean_pre_es: mean(|s| s.pre_es),
            mean_post_var: mean(|s| s.post_var),
            mean_post_es: mean(|s| s.post_es),
            breaches: snapshots.iter().filter(|s| s.breached).count(),
            cascade_rounds,
        });
    }

    pub fn record_orders(&mut self, orders: &[Order]) {
        for order in orders {
            self.orders.add(order);
        }
    }

    pub fn ticks(&self) -> &[TickStats] {
        &self.ticks
    }

    pub fn orders(&self) -> &OrderCounts {
        &self.orders
    }

    /// Assemble the final output from the recorder and the run state.
    pub fn finish(
        self,
        seed: u64,
        run_index: u64,
        market: &Market,
        paths: &ExogenousPaths,
        traders: &[Trader],
        directory: &TraderDirectory,
    ) -> RunOutput {
        let num_ticks = self.ticks.len();
        let assets = (0..market.num_assets())
            .map(|i| {
                let id = AssetId(i);
                let len = market.history(id).len();
                AssetSeries {
                    name: market.asset_name(id).to_string(),
                    price: market.history(id).to_vec(),
                    value: paths.value[i].iter().take(len).copied().collect(),
                    flow: market.flow_history(id).to_vec(),
                }
            })
            .collect();

        let kinds = TraderKind::ALL
            .iter()
            .map(|&kind| {
                let members: Vec<&Trader> = traders.iter().filter(|t| t.kind() == kind).collect();
                let histories: Vec<&[f64]> = members.iter().map(|t| t.wealth_history()).collect();
                let increments: f64 = members
                    .iter()
                    .map(|t| {
                        let history = t.wealth_history();
                        let first = history.first().copied().unwrap_or(0.0);
                        (t.wealth() - first) / num_ticks.max(1) as f64
                    })
                    .sum();
                KindSummary {
                    kind,
                    traders: members.len(),
                    mean_wealth_increment: if members.is_empty() {
                        0.0
                    } else {
                        increments / members.len() as f64
                    },
                    wealth_increment: per_tick_increments(&histories, num_ticks),
                }
            })
            .collect();

        let reports = traders
            .iter()
            .map(|t| TraderReport {
                id: t.id(),
                name: directory.name(t.id()).to_string(),
                kind: t.kind(),
                measure: t.risk_profile().measure,
                allow_short: t.allow_short(),
                final_positions: t.positions().to_vec(),
                wealth: t.wealth_history().to_vec(),
                snapshots: t.snapshots().to_vec(),
            })
            .collect();

        RunOutput {
            seed,
            run_index,
            num_ticks,
            assets,
            kinds,
            ticks: self.ticks,
            orders: self.orders,
            traders: reports,
        }
    }
}

/// Mean over `histories` of `wealth[t] − wealth[t − 1]` for ticks `1..=num_ticks`.
///
/// A history too short to cover a tick contributes no change.
fn per_tick_increments(histories: &[&[f64]], num_ticks: usize) -> Vec<f64> {
    if histories.is_empty() {
        return vec![0.0; num_ticks];
    }
    let n = histories.len() as f64;
    (1..=num_ticks)
        .map(|t| {
            histories
                .iter()
                .map(|h| match (h.get(t - 1), h.get(t)) {
                    (Some(prev), Some(next)) => next - prev,
                    _ => 0.0,
                })
                .sum::<f64>()
                / n
        })
        .collect()
}
