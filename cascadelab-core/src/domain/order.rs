//! Orders exchanged between traders, the risk layer and the market.
//!
//! An order only lives inside the tick that created it: it is either applied
//! as proposed or replaced by a smaller risk-clipped version.

use super::ids::{AssetId, TraderId};
use serde::{Deserialize, Serialize};

/// Why an order entered the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderReason {
    /// Strategy order applied unchanged.
    Strategy,
    /// Strategy order scaled down to keep post-trade risk at the limit.
    RiskReduction,
    /// Reduce-only order emitted because the existing book breaches its limit.
    ForcedSelloff,
}

impl OrderReason {
    pub const ALL: [OrderReason; 3] = [
        OrderReason::Strategy,
        OrderReason::RiskReduction,
        OrderReason::ForcedSelloff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderReason::Strategy => "strategy",
            OrderReason::RiskReduction => "risk-reduction",
            OrderReason::ForcedSelloff => "forced-selloff",
        }
    }
}

/// A signed market order. Positive size buys, negative size sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub asset: AssetId,
    pub trader: TraderId,
    pub size: f64,
    pub reason: OrderReason,
}

impl Order {
    pub fn new(asset: AssetId, trader: TraderId, size: f64, reason: OrderReason) -> Self {
        Self {
            asset,
            trader,
            size,
            reason,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0.0
    }
}

/// A strategy's wish for one asset, before risk sizing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProposedOrder {
    pub asset: AssetId,
    pub size: f64,
}

impl ProposedOrder {
    pub fn new(asset: AssetId, size: f64) -> Self {
        Self { asset, size }
    }
}

/// Sum signed order sizes into a per-asset flow vector.
pub fn net_flow(orders: &[Order], num_assets: usize) -> Vec<f64> {
    let mut flow = vec![0.0; num_assets];
    for order in orders {
        flow[order.asset.index()] += order.size;
    }
    flow
}
