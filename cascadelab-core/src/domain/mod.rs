//! Domain types for CascadeLab

pub mod asset;
pub mod ids;
pub mod order;
pub mod risk;

pub use asset::Asset;
pub use ids::{AssetId, Tick, TraderId};
pub use order::{net_flow, Order, OrderReason, ProposedOrder};
pub use risk::RiskSnapshot;

/// Kind of trader, fixing which strategy family it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraderKind {
    Trend,
    Value,
    LongShort,
}

impl TraderKind {
    pub const ALL: [TraderKind; 3] = [TraderKind::Trend, TraderKind::Value, TraderKind::LongShort];

    pub fn as_str(&self) -> &'static str {
        match self {
            TraderKind::Trend => "trend",
            TraderKind::Value => "value",
            TraderKind::LongShort => "long_short",
        }
    }
}
