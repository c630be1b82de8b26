use super::ids::AssetId;
use serde::{Deserialize, Serialize};

/// Static description of a tradable asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub price0: f64,
    pub liquidity: f64,
    /// Partner leg for spread (long-short) traders.
    pub spread_partner: Option<AssetId>,
}
