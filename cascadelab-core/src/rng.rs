//! Deterministic named random streams and the simulation context.
//!
//! A base seed is expanded into one sub-seed per `(run_index, stream name)`
//! pair. Sub-seeds are derived via BLAKE3 hashing, so a stream never depends on
//! how many other streams were opened before it or in which order. The same
//! seed therefore replays bit-identically, and runs executed on different
//! threads cannot disturb each other.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::domain::Tick;

/// Pool of named pseudo-random streams for one run.
///
/// Streams are created lazily on first use and keep their position for the
/// rest of the run.
#[derive(Debug, Clone)]
pub struct RandomStreamPool {
    base_seed: u64,
    run_index: u64,
    streams: BTreeMap<String, StdRng>,
}

impl RandomStreamPool {
    pub fn new(base_seed: u64, run_index: u64) -> Self {
        Self {
            base_seed,
            run_index,
            streams: BTreeMap::new(),
        }
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn run_index(&self) -> u64 {
        self.run_index
    }

    /// Derive the sub-seed of a named stream.
    ///
    /// Derivation is hash-based: `sub_seed("a")` is the same whether or not
    /// `sub_seed("b")` was asked for first.
    pub fn sub_seed(&self, name: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.base_seed.to_le_bytes());
        hasher.update(&self.run_index.to_le_bytes());
        hasher.update(name.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Borrow a named stream, creating it on first use.
    pub fn stream(&mut self, name: &str) -> &mut StdRng {
        let seed = self.sub_seed(name);
        self.streams
            .entry(name.to_string())
            .or_insert_with(|| StdRng::seed_from_u64(seed))
    }

    /// A fresh, independent generator for a named stream, detached from the pool.
    pub fn fork(&self, name: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(name))
    }
}

/// Explicit per-run simulation context: named random streams plus the tick clock.
///
/// Every generator and agent call receives this instead of reaching for
/// process-wide state, which is what lets independent runs execute in parallel.
#[derive(Debug, Clone)]
pub struct SimContext {
    pub streams: RandomStreamPool,
    tick: Tick,
}

impl SimContext {
    pub fn new(base_seed: u64, run_index: u64) -> Self {
        Self {
            streams: RandomStreamPool::new(base_seed, run_index),
            tick: 0,
        }
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Move the clock forward by one tick.
    pub fn advance(&mut self) -> Tick {
        self.tick += 1;
        self.tick
    }
}
