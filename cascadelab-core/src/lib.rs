//! CascadeLab Core — risk-constrained multi-agent price formation.
//!
//! This crate contains the simulation engine and performs no file I/O:
//! - Domain types (assets, orders, risk snapshots, ids)
//! - Deterministic named random streams and the simulation context
//! - Exogenous price / fundamental-value driver generation
//! - Linear-impact market clearing
//! - Trend, value and long-short strategies
//! - VaR / ES estimation, order clipping and forced de-leveraging
//! - Trader arena and the tick scheduler with same-tick cascade resolution

pub mod agent;
pub mod config;
pub mod domain;
pub mod engine;
pub mod exogenous;
pub mod indicators;
pub mod market;
pub mod risk;
pub mod rng;
pub mod strategy;

pub use config::{ConfigError, SimulationConfig};
pub use engine::{RunOutput, Simulation};
