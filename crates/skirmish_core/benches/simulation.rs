//! Simulation benchmarks for skirmish_core.
//!
//! Run with: `cargo bench -p skirmish_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use skirmish_core::config::SimConfig;
use skirmish_core::map_generation::{generate_map, new_game, MapConfig, MatchSetup, Opponent};
use skirmish_core::pathfinding::find_path;
use skirmish_core::rules::Rules;
use skirmish_core::simulation::advance;
use skirmish_core::terrain::UnitDomain;

fn setup(opponents: usize) -> MatchSetup {
    MatchSetup {
        seed: 4242,
        opponents: vec![Opponent::default(); opponents],
        ..Default::default()
    }
}

/// A* across a generated map, corner to corner.
pub fn pathfinding_benchmark(c: &mut Criterion) {
    let config = MapConfig::default().with_seed(4242);
    let Ok(map) = generate_map(&config, SimConfig::default().tile()) else {
        return;
    };
    let from = map.terrain.tile_center(map.starts[0]);
    let to = map.terrain.tile_center(map.starts[1]);
    c.bench_function("find_path_corner_to_corner", |b| {
        b.iter(|| find_path(black_box(&map.terrain), from, to, UnitDomain::Ground));
    });
}

/// Full ticks of a four-player match, AI decisions included.
pub fn tick_benchmark(c: &mut Criterion) {
    let Ok(start) = new_game(SimConfig::default(), Rules::stock(), &setup(3)) else {
        return;
    };
    let mut warmed = start.clone();
    for _ in 0..600 {
        warmed = advance(&warmed).state;
    }

    c.bench_function("advance_opening", |b| {
        b.iter(|| advance(black_box(&start)));
    });
    c.bench_function("advance_after_one_minute", |b| {
        b.iter(|| advance(black_box(&warmed)));
    });
    c.bench_function("advance_100_ticks", |b| {
        b.iter_batched(
            || start.clone(),
            |mut state| {
                for _ in 0..100 {
                    state = advance(&state).state;
                }
                state
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, pathfinding_benchmark, tick_benchmark);
criterion_main!(benches);
