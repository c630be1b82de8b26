//! Market clearing with a linear price-impact model.
//!
//! Once per tick, after every trader has submitted, the net order flow of each
//! asset moves its price by `flow / liquidity`. Liquidity is asset-specific and
//! constant within a run. The published price series is what strategies read
//! on the next tick.

use tracing::warn;

use crate::config::ConfigError;
use crate::domain::{Asset, AssetId, Tick};

/// Lowest price the market will publish.
pub const MIN_PRICE: f64 = 1e-6;

/// Per-asset market state.
#[derive(Debug, Clone)]
struct AssetBook {
    name: String,
    price: f64,
    liquidity: f64,
    /// Published prices, one per tick including the initial price at index 0.
    history: Vec<f64>,
    /// Net order flow cleared at each tick (index 0 is the initial state).
    flow: Vec<f64>,
}

/// The market for all assets of a run.
#[derive(Debug, Clone, Default)]
pub struct Market {
    books: Vec<AssetBook>,
}

impl Market {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a market from asset descriptions, rejecting non-positive liquidity or price.
    pub fn initialize(assets: &[Asset]) -> Result<Self, ConfigError> {
        let mut market = Self::new();
        for asset in assets {
            let id = market.add_asset(&asset.name, asset.price0, asset.liquidity)?;
            debug_assert_eq!(id, asset.id);
        }
        Ok(market)
    }

    /// Register one asset with its starting price and liquidity.
    pub fn add_asset(&mut self, name: &str, price0: f64, liquidity: f64) -> Result<AssetId, ConfigError> {
        if !liquidity.is_finite() || liquidity <= 0.0 {
            return Err(ConfigError::NonPositiveLiquidity {
                asset: name.to_string(),
                liquidity,
            });
        }
        if !price0.is_finite() || price0 <= 0.0 {
            return Err(ConfigError::NonPositivePrice {
                asset: name.to_string(),
                price: price0,
            });
        }
        self.books.push(AssetBook {
            name: name.to_string(),
            price: price0,
            liquidity,
            history: vec![price0],
            flow: vec![0.0],
        });
        Ok(AssetId(self.books.len() - 1))
    }

    pub fn num_assets(&self) -> usize {
        self.books.len()
    }

    pub fn asset_name(&self, asset: AssetId) -> &str {
        &self.books[asset.index()].name
    }

    pub fn price(&self, asset: AssetId) -> f64 {
        self.books[asset.index()].price
    }

    pub fn prices(&self) -> Vec<f64> {
        self.books.iter().map(|b| b.price).collect()
    }

    pub fn liquidity(&self, asset: AssetId) -> f64 {
        self.books[asset.index()].liquidity
    }

    /// Published price series of an asset.
    pub fn history(&self, asset: AssetId) -> &[f64] {
        &self.books[asset.index()].history
    }

    /// Cleared order-flow series of an asset.
    pub fn flow_history(&self, asset: AssetId) -> &[f64] {
        &self.books[asset.index()].flow
    }

    /// Price change a given net flow would cause, without touching state.
    pub fn impact(&self, asset: AssetId, flow: f64) -> f64 {
        flow / self.books[asset.index()].liquidity
    }

    /// Prices that clearing `flow` would produce, without touching state.
    pub fn tentative_prices(&self, flow: &[f64]) -> Vec<f64> {
        self.books
            .iter()
            .zip(flow)
            .enumerate()
            .map(|(i, (book, &f))| floor_price(book.price + self.impact(AssetId(i), f)))
            .collect()
    }

    /// Shift an asset's price by an exogenous increment ahead of the clear.
    pub fn apply_exogenous(&mut self, asset: AssetId, delta: f64) {
        let book = &mut self.books[asset.index()];
        book.price = floor_price(book.price + delta);
    }

    /// Overwrite an asset's price (surrogate configurations).
    pub fn set_price(&mut self, asset: AssetId, price: f64) {
        self.books[asset.index()].price = floor_price(price);
    }

    /// Clear one tick of aggregate order flow and publish the new prices.
    ///
    /// `new_price = old_price + net_order_flow / liquidity`, floored at
    /// [`MIN_PRICE`].
    pub fn clear(&mut self, tick: Tick, order_flow: &[f64]) -> Vec<f64> {
        debug_assert_eq!(order_flow.len(), self.books.len());
        for (book, &flow) in self.books.iter_mut().zip(order_flow) {
            let raw = book.price + flow / book.liquidity;
            let price = floor_price(raw);
            if price != raw {
                warn!(tick, asset = %book.name, raw, "price floored at minimum");
            }
            book.price = price;
            book.history.push(price);
            book.flow.push(flow);
        }
        self.prices()
    }

    /// Publish the current prices with a recorded flow but no impact.
    ///
    /// Used when the price is imposed from outside (surrogate mode).
    pub fn publish(&mut self, order_flow: &[f64]) -> Vec<f64> {
        for (book, &flow) in self.books.iter_mut().zip(order_flow) {
            book.history.push(book.price);
            book.flow.push(flow);
        }
        self.prices()
    }
}

fn floor_price(price: f64) -> f64 {
    if price.is_nan() || price < MIN_PRICE {
        MIN_PRICE
    } else {
        price
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_asset(price: f64, liquidity: f64) -> Market {
        let mut m = Market::new();
        m.add_asset("A", price, liquidity).unwrap();
        m
    }

    #[test]
    fn clear_applies_linear_impact() {
        let mut m = one_asset(100.0, 50.0);
        let prices = m.clear(1, &[25.0]);
        assert_eq!(prices, vec![100.5]);
        assert_eq!(m.history(AssetId(0)), &[100.0, 100.5]);
        assert_eq!(m.flow_history(AssetId(0)), &[0.0, 25.0]);
    }

    #[test]
    fn zero_liquidity_rejected() {
        let mut m = Market::new();
        let err = m.add_asset("A", 100.0, 0.0).unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveLiquidity { .. }));
    }

    #[test]
    fn negative_liquidity_rejected() {
        let mut m = Market::new();
        assert!(m.add_asset("A", 100.0, -3.0).is_err());
        assert!(m.add_asset("A", 100.0, f64::NAN).is_err());
    }

    #[test]
    fn price_never_goes_non_positive() {
        let mut m = one_asset(1.0, 1.0);
        let prices = m.clear(1, &[-10.0]);
        assert_eq!(prices[0], MIN_PRICE);
    }

    #[test]
    fn tentative_prices_do_not_mutate() {
        let m = one_asset(100.0, 100.0);
        let p = m.tentative_prices(&[-50.0]);
        assert_eq!(p, vec![99.5]);
        assert_eq!(m.price(AssetId(0)), 100.0);
        assert_eq!(m.impact(AssetId(0), -50.0), -0.5);
    }

    #[test]
    fn assets_are_independent() {
        let mut m = Market::new();
        m.add_asset("A", 10.0, 10.0).unwrap();
        m.add_asset("B", 20.0, 40.0).unwrap();
        let prices = m.clear(1, &[10.0, 10.0]);
        assert_eq!(prices, vec![11.0, 20.25]);
    }
}
