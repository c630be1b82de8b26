//! Trader agents and the arena that owns them.
//!
//! Traders live in a `Vec<Trader>` indexed by [`TraderId`](crate::domain::TraderId);
//! names are kept apart in a [`TraderDirectory`].

pub mod directory;
pub mod factory;
pub mod trader;

pub use directory::TraderDirectory;
pub use factory::build_traders;
pub use trader::{Trader, TraderReport};
