use super::ids::{Tick, TraderId};
use serde::{Deserialize, Serialize};

/// Risk state of one trader at one tick.
///
/// Pre-trade values are measured on the book held before the tick's orders at
/// the pre-clear price; post-trade values on the book after all of the tick's
/// orders at the cleared price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub trader: TraderId,
    pub tick: Tick,
    pub pre_var: f64,
    pub pre_es: f64,
    pub post_var: f64,
    pub post_es: f64,
    pub limit: f64,
    /// The book breached its limit at some point during the tick.
    pub breached: bool,
}
