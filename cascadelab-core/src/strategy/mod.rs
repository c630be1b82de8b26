//! Trading strategies: one tagged variant per strategy family.
//!
//! A `Strategy` owns only its own parameters and rolling state. Every tick the
//! trader calls [`Strategy::evaluate`] with the pre-tick market snapshot and
//! receives signed orders, one per asset it trades. Strategies never see other
//! traders' orders or the risk layer's decisions, only the resulting position.

pub mod long_short;
pub mod trend;
pub mod value;

pub use long_short::{LongShortConfig, LongShortStrategy};
pub use trend::{TrendConfig, TrendSignal, TrendStrategy};
pub use value::{ValueConfig, ValueStrategy};

use serde::{Deserialize, Serialize};

use crate::domain::{AssetId, ProposedOrder, Tick, TraderKind};

/// What a strategy may look at on a given tick.
///
/// All slices are indexed by asset. Prices are the published pre-tick
/// snapshot shared by every trader; values are the fundamental values
/// generated for this tick; positions are the calling trader's own book.
#[derive(Debug, Clone, Copy)]
pub struct StrategyInput<'a> {
    pub tick: Tick,
    pub prices: &'a [f64],
    pub values: &'a [f64],
    pub positions: &'a [f64],
}

/// How a position is held once opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// Hold `±cap_factor` until an exit rule fires.
    Binary,
    /// Resize every tick with the signal strength.
    Continuous,
}

/// How the strategy expresses its wish as an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emission {
    /// Emit the sized signal as an order increment.
    Increment,
    /// Emit the difference between target and current position.
    Target,
}

/// Side of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Side of a signed quantity; `None` for zero or NaN.
    pub fn of(x: f64) -> Option<Direction> {
        if x > 0.0 {
            Some(Direction::Long)
        } else if x < 0.0 {
            Some(Direction::Short)
        } else {
            None
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

/// Tagged strategy variant dispatched through a single `evaluate` contract.
#[derive(Debug, Clone)]
pub enum Strategy {
    Trend(TrendStrategy),
    Value(ValueStrategy),
    LongShort(LongShortStrategy),
}

impl Strategy {
    pub fn kind(&self) -> TraderKind {
        match self {
            Strategy::Trend(_) => TraderKind::Trend,
            Strategy::Value(_) => TraderKind::Value,
            Strategy::LongShort(_) => TraderKind::LongShort,
        }
    }

    /// Assets this strategy emits orders for.
    pub fn assets(&self) -> Vec<AssetId> {
        match self {
            Strategy::Trend(s) => vec![s.asset()],
            Strategy::Value(s) => vec![s.asset()],
            Strategy::LongShort(s) => vec![s.leg(), s.partner()],
        }
    }

    /// Update rolling state with this tick's snapshot and return orders.
    pub fn evaluate(&mut self, input: &StrategyInput<'_>) -> Vec<ProposedOrder> {
        match self {
            Strategy::Trend(s) => s.evaluate(input).into_iter().collect(),
            Strategy::Value(s) => s.evaluate(input).into_iter().collect(),
            Strategy::LongShort(s) => s.evaluate(input),
        }
    }
}

/// Turn a target position into an order according to the emission mode.
///
/// `opening` is true when the strategy moves from flat into a position this
/// tick. In binary increment mode a held position emits nothing; an exit
/// (target zero) always closes the whole position.
pub(crate) fn emit(
    target: f64,
    position: f64,
    mode: PositionMode,
    emission: Emission,
    opening: bool,
) -> f64 {
    if target == 0.0 {
        return -position;
    }
    match (emission, mode) {
        (Emission::Target, _) => target - position,
        (Emission::Increment, PositionMode::Continuous) => target,
        (Emission::Increment, PositionMode::Binary) => {
            if opening {
                target
            } else {
                0.0
            }
        }
    }
}

/// Clip an order so that a trader barred from short selling never ends up
/// short. Selling down an existing long to flat is still allowed.
pub fn clip_short(size: f64, position: f64, allow_short: bool) -> f64 {
    if allow_short {
        return size;
    }
    let floor = if position > 0.0 { -position } else { 0.0 };
    size.max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_short_allows_closing_long() {
        assert_eq!(clip_short(-8.0, 5.0, false), -5.0);
        assert_eq!(clip_short(-3.0, 5.0, false), -3.0);
    }

    #[test]
    fn clip_short_blocks_opening_short() {
        assert_eq!(clip_short(-3.0, 0.0, false), 0.0);
        assert_eq!(clip_short(4.0, 0.0, false), 4.0);
    }

    #[test]
    fn clip_short_noop_when_allowed() {
        assert_eq!(clip_short(-3.0, 0.0, true), -3.0);
    }

    #[test]
    fn emit_target_mode_diffs_against_position() {
        assert_eq!(emit(5.0, 2.0, PositionMode::Continuous, Emission::Target, false), 3.0);
        assert_eq!(emit(0.0, 2.0, PositionMode::Binary, Emission::Target, false), -2.0);
    }

    #[test]
    fn emit_binary_increment_only_on_open() {
        assert_eq!(emit(5.0, 0.0, PositionMode::Binary, Emission::Increment, true), 5.0);
        assert_eq!(emit(5.0, 5.0, PositionMode::Binary, Emission::Increment, false), 0.0);
    }

    #[test]
    fn emit_continuous_increment_extends() {
        assert_eq!(emit(1.5, 4.0, PositionMode::Continuous, Emission::Increment, false), 1.5);
    }

    #[test]
    fn direction_of_zero_is_none() {
        assert_eq!(Direction::of(0.0), None);
        assert_eq!(Direction::of(-2.0), Some(Direction::Short));
    }
}
