//! Pathfinding benchmarks.
//!
//! Run with: `cargo bench -p gather_sim`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gather_sim::{find_route, Cell, Scenario, SimConfig, SimWorld, TerrainLayout};

/// A 64x64 field with a long wall that forces a detour.
fn walled_layout() -> TerrainLayout {
    let rows: Vec<String> = (0..64)
        .map(|y| {
            (0..64)
                .map(|x| if x == 32 && y < 60 { '#' } else { '.' })
                .collect()
        })
        .collect();
    TerrainLayout::parse(&rows).unwrap_or_else(|_| TerrainLayout::open(64, 64))
}

pub fn pathfinding_benchmark(c: &mut Criterion) {
    let open = TerrainLayout::open(64, 64);
    c.bench_function("route_open_64", |b| {
        b.iter(|| find_route(black_box(Cell::new(0, 0)), black_box(Cell::new(63, 63)), &open))
    });

    let walled = walled_layout();
    c.bench_function("route_walled_64", |b| {
        b.iter(|| find_route(black_box(Cell::new(0, 0)), black_box(Cell::new(63, 0)), &walled))
    });
}

pub fn tick_benchmark(c: &mut Criterion) {
    c.bench_function("tick_default_field", |b| {
        let mut sim = SimWorld::from_scenario(SimConfig::default(), &Scenario::default_field())
            .expect("default scenario is valid");
        b.iter(|| sim.tick())
    });
}

criterion_group!(benches, pathfinding_benchmark, tick_benchmark);
criterion_main!(benches);
