//! Exogenous driving series: sinusoid plus arithmetic Brownian motion.
//!
//! `value(t) = shift + amplitude · sin(2π (t − lag) / wavelength) + abm(t)`,
//! with `abm(0) = 0` and `abm(t) = abm(t−1) + mu + sigma · ε_t`.
//!
//! One path is generated per asset for price and, from a separate stream, one
//! for fundamental value. Paths are generated once per run, before the first
//! tick.

use std::f64::consts::PI;

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::AssetId;
use crate::rng::SimContext;

/// Parameters of one exogenous process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExogenousParams {
    pub shift: f64,
    pub amplitude: f64,
    pub lag: f64,
    /// Period of the sinusoid in ticks. Zero disables the periodic term.
    pub wavelength: f64,
    pub mu: f64,
    pub sigma: f64,
}

impl ExogenousParams {
    /// A flat series at `level`.
    pub fn constant(level: f64) -> Self {
        Self {
            shift: level,
            amplitude: 0.0,
            lag: 0.0,
            wavelength: 0.0,
            mu: 0.0,
            sigma: 0.0,
        }
    }

    /// Every term must be finite; `sigma` and `wavelength` must not be negative.
    pub fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        let checks = [
            (self.shift, "a finite shift"),
            (self.amplitude, "a finite amplitude"),
            (self.lag, "a finite lag"),
            (self.mu, "a finite mu"),
        ];
        for (value, expected) in checks {
            if !value.is_finite() {
                return Err(ConfigError::OutOfBounds {
                    field,
                    value,
                    expected,
                });
            }
        }
        for (value, expected) in [
            (self.wavelength, "a finite, non-negative wavelength"),
            (self.sigma, "a finite, non-negative sigma"),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::OutOfBounds {
                    field,
                    value,
                    expected,
                });
            }
        }
        Ok(())
    }

    /// Deterministic sinusoid component at tick `t`.
    pub fn sinusoid(&self, t: usize) -> f64 {
        if self.wavelength == 0.0 || self.amplitude == 0.0 {
            return self.shift;
        }
        let phase = 2.0 * PI * (t as f64 - self.lag) / self.wavelength;
        self.shift + self.amplitude * phase.sin()
    }
}

/// Generator of exogenous series from a random stream.
#[derive(Debug, Clone, Copy)]
pub struct ExogenousProcessGenerator {
    params: ExogenousParams,
}

impl ExogenousProcessGenerator {
    pub fn new(params: ExogenousParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ExogenousParams {
        &self.params
    }

    /// Produce `len` values (ticks `0..len`) drawing shocks from `rng`.
    pub fn generate<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Vec<f64> {
        let mut out = Vec::with_capacity(len);
        let mut walk = 0.0;
        for t in 0..len {
            if t > 0 {
                let eps: f64 = StandardNormal.sample(rng);
                walk += self.params.mu + self.params.sigma * eps;
            }
            out.push(self.params.sinusoid(t) + walk);
        }
        out
    }
}

/// Price and fundamental-value driving paths for every asset of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExogenousPaths {
    /// `price[asset][tick]`
    pub price: Vec<Vec<f64>>,
    /// `value[asset][tick]`
    pub value: Vec<Vec<f64>>,
}

impl ExogenousPaths {
    /// Generate all paths for `len` ticks from the context's named streams.
    ///
    /// Each asset/series pair reads its own stream, so adding an asset never
    /// changes the paths of the others.
    pub fn generate(
        ctx: &mut SimContext,
        price_params: &[ExogenousParams],
        value_params: &[ExogenousParams],
        len: usize,
    ) -> Self {
        let price = price_params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let rng = ctx.streams.stream(&format!("exogenous/price/{i}"));
                ExogenousProcessGenerator::new(*p).generate(len, rng)
            })
            .collect();
        let value = value_params
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let rng = ctx.streams.stream(&format!("exogenous/value/{i}"));
                ExogenousProcessGenerator::new(*p).generate(len, rng)
            })
            .collect();
        Self { price, value }
    }

    pub fn price_at(&self, asset: AssetId, tick: usize) -> f64 {
        self.price[asset.index()][tick]
    }

    pub fn value_at(&self, asset: AssetId, tick: usize) -> f64 {
        self.value[asset.index()][tick]
    }

    /// Exogenous price move between `tick - 1` and `tick`.
    pub fn price_increment(&self, asset: AssetId, tick: usize) -> f64 {
        if tick == 0 {
            return 0.0;
        }
        let series = &self.price[asset.index()];
        series[tick] - series[tick - 1]
    }
}
