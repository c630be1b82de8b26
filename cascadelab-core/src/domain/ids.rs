use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of an asset in the market. Stable for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub usize);

impl AssetId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

/// Arena handle of a trader. Assigned in construction order, never reused within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraderId(pub u32);

impl TraderId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TraderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trader#{}", self.0)
    }
}

/// Discrete unit of simulated time.
pub type Tick = usize;
