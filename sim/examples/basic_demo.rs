//! Basic demonstration of the gathering simulation.
//!
//! Run with: cargo run --example basic_demo
//! Set `RUST_LOG=gather_sim=debug` to watch state changes.

use gather_sim::{Scenario, SimConfig, SimWorld, UnitState};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    println!("=== Gather Sim - Demo ===\n");

    let mut sim = match SimWorld::from_scenario(SimConfig::default(), &Scenario::default_field()) {
        Ok(sim) => sim,
        Err(err) => {
            eprintln!("failed to build scenario: {err}");
            std::process::exit(1);
        }
    };

    println!("Initial state:");
    print_snapshot(&mut sim);

    // 60 seconds of simulated time, in 50 ms frames.
    println!("\nRunning for 60 simulated seconds...\n");
    for frame in 0..1200 {
        sim.step(0.05);

        if (frame + 1) % 200 == 0 {
            println!("--- Tick {} (t={:.1}s) ---", sim.current_tick(), sim.current_time());
            print_snapshot(&mut sim);
        }
    }

    println!("\n=== Final State (JSON) ===\n");
    match sim.snapshot().to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("snapshot failed: {err}"),
    }
}

fn print_snapshot(sim: &mut SimWorld) {
    let snapshot = sim.snapshot();
    let (remaining, carried, stored) = snapshot.ore_totals();

    println!(
        "  ore: {:.2} in {} mines, {:.2} carried, {:.2} delivered",
        remaining,
        snapshot.mines.len(),
        carried,
        stored
    );

    let mining = snapshot
        .units
        .iter()
        .filter(|u| u.state == UnitState::Mining)
        .count();
    let waiting = snapshot.units.iter().filter(|u| u.state.is_waiting()).count();
    println!("  units: {} total, {} mining, {} waiting", snapshot.units.len(), mining, waiting);

    for base in &snapshot.bases {
        println!("    base at {}: {}", base.cell, base.label);
    }
}
