//! No lookahead: extending a run never changes what happened earlier.

use cascadelab_core::config::TraderCounts;
use cascadelab_core::{Simulation, SimulationConfig};

fn config(num_ticks: usize) -> SimulationConfig {
    SimulationConfig {
        num_ticks,
        traders: TraderCounts {
            trend: 5,
            value: 5,
            long_short: 3,
        },
        ..SimulationConfig::default()
    }
}

#[test]
fn longer_run_shares_its_prefix() {
    let short = Simulation::new(&config(80), 0).unwrap().run();
    let long = Simulation::new(&config(160), 0).unwrap().run();

    for (s, l) in short.assets.iter().zip(&long.assets) {
        assert_eq!(s.price[..], l.price[..s.price.len()]);
        assert_eq!(s.flow[..], l.flow[..s.flow.len()]);
    }
    assert_eq!(short.ticks[..], long.ticks[..short.ticks.len()]);
    for (s, l) in short.traders.iter().zip(&long.traders) {
        assert_eq!(s.snapshots[..], l.snapshots[..s.snapshots.len()]);
        assert_eq!(s.wealth[..], l.wealth[..s.wealth.len()]);
    }
}
