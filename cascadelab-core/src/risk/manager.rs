//! Order sizing against risk limits and forced de-leveraging.
//!
//! For a trader whose existing book is within its limit, proposed orders are
//! scaled by one common factor in [0, 1] (sign preserved) to the largest size
//! whose post-trade risk stays at the limit. A trader whose book already
//! breaches its limit does not trade its strategy at all: it receives a
//! reduce-only sell-off that scales every position toward the limit.

use tracing::debug;

use crate::domain::{AssetId, Order, OrderReason, ProposedOrder, TraderId};

use super::estimator::{estimate, exposure};
use super::{exceeds, RiskEstimate, RiskMeasure, RiskProfile, VolatilityEstimate};

/// Bisection steps for multi-leg scaling; 2⁻⁶⁰ is below f64 resolution of [0, 1].
const BISECTION_STEPS: usize = 60;

/// Result of running a trader's proposal through the risk layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Sizing {
    pub orders: Vec<Order>,
    pub pre: RiskEstimate,
    /// Risk of the book after `orders`, at the same prices.
    pub post: RiskEstimate,
    pub limit: f64,
    /// The existing book breached the limit and was force-reduced.
    pub breached: bool,
    /// Common factor applied to the strategy orders (1.0 = unchanged).
    pub scale: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskManager {
    /// Largest fraction of each position a single sell-off round may close.
    max_selloff_fraction: f64,
}

impl Default for RiskManager {
    fn default() -> Self {
        Self {
            max_selloff_fraction: 1.0,
        }
    }
}

impl RiskManager {
    pub fn new(max_selloff_fraction: f64) -> Self {
        Self {
            max_selloff_fraction: max_selloff_fraction.clamp(0.0, 1.0),
        }
    }

    pub fn max_selloff_fraction(&self) -> f64 {
        self.max_selloff_fraction
    }

    pub fn estimate(
        &self,
        profile: &RiskProfile,
        positions: &[f64],
        vols: &VolatilityEstimate,
    ) -> RiskEstimate {
        estimate(profile, positions, vols)
    }

    /// Size a trader's proposed orders against its active limit.
    pub fn size_orders(
        &self,
        trader: TraderId,
        profile: &RiskProfile,
        positions: &[f64],
        proposed: &[ProposedOrder],
        vols: &VolatilityEstimate,
        limit: f64,
    ) -> Sizing {
        let pre = estimate(profile, positions, vols);

        let Some(pre_measured) = pre.measured(profile.measure) else {
            let orders = to_orders(trader, proposed, 1.0, OrderReason::Strategy);
            let post = estimate(profile, &apply(positions, proposed, 1.0), vols);
            return Sizing {
                orders,
                pre,
                post,
                limit,
                breached: false,
                scale: 1.0,
            };
        };

        if exceeds(pre_measured, limit) {
            let orders = self.forced_selloff(trader, positions, pre_measured, limit);
            let post = estimate(profile, &apply_orders(positions, &orders), vols);
            debug!(%trader, risk = pre_measured, limit, "existing book breaches limit");
            return Sizing {
                orders,
                pre,
                post,
                limit,
                breached: true,
                scale: 0.0,
            };
        }

        let scale = max_scale(profile, positions, proposed, vols, limit);
        let reason = if scale < 1.0 {
            OrderReason::RiskReduction
        } else {
            OrderReason::Strategy
        };
        let orders = to_orders(trader, proposed, scale, reason);
        let post = estimate(profile, &apply_orders(positions, &orders), vols);
        Sizing {
            orders,
            pre,
            post,
            limit,
            breached: false,
            scale,
        }
    }

    /// Re-check a book at new prices; emit a sell-off if it now breaches.
    ///
    /// Returns an empty vector for unconstrained traders and books within
    /// their limit.
    pub fn recheck(
        &self,
        trader: TraderId,
        profile: &RiskProfile,
        positions: &[f64],
        vols: &VolatilityEstimate,
        limit: f64,
    ) -> Vec<Order> {
        let risk = estimate(profile, positions, vols);
        match risk.measured(profile.measure) {
            Some(measured) if exceeds(measured, limit) => {
                self.forced_selloff(trader, positions, measured, limit)
            }
            _ => Vec::new(),
        }
    }

    /// Reduce-only orders scaling the whole book by `limit / risk`.
    ///
    /// The closed fraction is capped by `max_selloff_fraction`, so a capped
    /// round can leave the book above its limit.
    pub fn forced_selloff(
        &self,
        trader: TraderId,
        positions: &[f64],
        risk: f64,
        limit: f64,
    ) -> Vec<Order> {
        if risk <= 0.0 {
            return Vec::new();
        }
        let keep = (limit.max(0.0) / risk).clamp(0.0, 1.0);
        let fraction = (1.0 - keep).min(self.max_selloff_fraction);
        if fraction <= 0.0 {
            return Vec::new();
        }
        positions
            .iter()
            .enumerate()
            .filter(|(_, &p)| p != 0.0)
            .map(|(i, &p)| {
                Order::new(
                    AssetId(i),
                    trader,
                    -p * fraction,
                    OrderReason::ForcedSelloff,
                )
            })
            .collect()
    }
}

/// Largest common scale in [0, 1] keeping post-trade risk within `limit`.
///
/// Assumes the pre-trade book is within the limit (scale 0 is feasible).
fn max_scale(
    profile: &RiskProfile,
    positions: &[f64],
    proposed: &[ProposedOrder],
    vols: &VolatilityEstimate,
    limit: f64,
) -> f64 {
    let factor = match profile.measure {
        RiskMeasure::ValueAtRisk => profile.factors.z_var,
        RiskMeasure::ExpectedShortfall => profile.factors.es_factor,
        RiskMeasure::Unconstrained => return 1.0,
    };
    let risk_at = |s: f64| factor * exposure(&apply(positions, proposed, s), &vols.unit);

    if !exceeds(risk_at(1.0), limit) {
        return 1.0;
    }

    let legs: Vec<&ProposedOrder> = proposed.iter().filter(|o| o.size != 0.0).collect();
    if let [leg] = legs.as_slice() {
        let k = leg.asset.index();
        let unit = vols.unit[k];
        if unit > 0.0 && factor > 0.0 {
            let others: f64 = positions
                .iter()
                .zip(&vols.unit)
                .enumerate()
                .filter(|(i, _)| *i != k)
                .map(|(_, (p, u))| (p * u).powi(2))
                .sum();
            let budget = (limit / factor).powi(2) - others;
            if budget <= 0.0 {
                return 0.0;
            }
            let max_abs = budget.sqrt() / unit;
            let p = positions[k];
            let a = leg.size;
            let s = if a > 0.0 {
                (max_abs - p) / a
            } else {
                (p + max_abs) / -a
            };
            return s.clamp(0.0, 1.0);
        }
    }

    // Risk is convex in s, so the feasible set is an interval starting at 0.
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if exceeds(risk_at(mid), limit) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    lo
}

fn apply(positions: &[f64], proposed: &[ProposedOrder], scale: f64) -> Vec<f64> {
    let mut out = positions.to_vec();
    for o in proposed {
        out[o.asset.index()] += o.size * scale;
    }
    out
}

fn apply_orders(positions: &[f64], orders: &[Order]) -> Vec<f64> {
    let mut out = positions.to_vec();
    for o in orders {
        out[o.asset.index()] += o.size;
    }
    out
}

fn to_orders(
    trader: TraderId,
    proposed: &[ProposedOrder],
    scale: f64,
    reason: OrderReason,
) -> Vec<Order> {
    proposed
        .iter()
        .map(|o| Order::new(o.asset, trader, o.size * scale, reason))
        .filter(|o| !o.is_empty())
        .collect()
}
