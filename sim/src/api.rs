//! Public API for the simulation.
//!
//! This module provides the main interface for a renderer (or any other
//! client) to drive the simulation.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 60 Hz). When
//! `step(dt)` is called, the simulation accumulates time and runs fixed updates
//! as needed, so behavior does not depend on frame rate.
//!
//! ## Tick Order
//!
//! Each fixed update advances the clock, then runs, in order: unit AI,
//! pathfinding, movement, the spawn queue and the label systems.

use crate::components::*;
use crate::config::{SimClock, SimConfig, SimRng};
use crate::error::Result;
use crate::grid::{spawn_terrain, TerrainLayout, WorldGrid};
use crate::pathfinding::pathfinding_system;
use crate::scenario::Scenario;
use crate::systems::*;
use crate::world::Snapshot;
use bevy_ecs::prelude::*;

/// Default grid used by [`SimWorld::new`].
const DEFAULT_GRID_SIZE: i32 = 32;

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Initializing the simulation
/// - Stepping the simulation forward
/// - Extracting state snapshots
/// - Requesting spawns
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

impl SimWorld {
    /// Create an empty simulation on an open 32x32 grid.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create an empty simulation on an open 32x32 grid with custom configuration.
    pub fn with_config(config: SimConfig) -> Self {
        Self::with_terrain(config, &TerrainLayout::open(DEFAULT_GRID_SIZE, DEFAULT_GRID_SIZE))
    }

    /// Create an empty simulation over the given terrain.
    pub fn with_terrain(config: SimConfig, layout: &TerrainLayout) -> Self {
        let mut world = World::new();

        let mut rng = SimRng::seeded(config.seed);
        let names = NamePool::shuffled(&mut rng);

        world.insert_resource(config);
        world.insert_resource(SimClock::default());
        world.insert_resource(rng);
        world.insert_resource(names);
        world.insert_resource(EventQueue::default());
        let grid = spawn_terrain(&mut world, layout);
        world.insert_resource(grid);

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                unit_ai_system,
                pathfinding_system,
                movement_system,
                spawn_queue_system,
                (
                    label_system::<Unit>,
                    label_system::<Mine>,
                    label_system::<Base>,
                )
                    .chain(),
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            time_accumulator: 0.0,
        }
    }

    /// Build a simulation from a scenario and place its entities.
    pub fn from_scenario(config: SimConfig, scenario: &Scenario) -> Result<Self> {
        let layout = scenario.layout()?;
        let mut sim = Self::with_terrain(config, &layout);

        sim.world.resource_scope(|world, mut rng: Mut<SimRng>| {
            let mut queue = world.resource_mut::<EventQueue>();
            scenario.enqueue_into(&layout, &mut rng, &mut queue);
        });
        // Place the scenario now so it is visible before the first tick.
        spawn_queue_system(&mut sim.world);

        Ok(sim)
    }

    /// Queue an entity for creation at the end of the next tick.
    pub fn enqueue_spawn(&mut self, kind: impl Into<SpawnKind>, cell: impl Into<Cell>) {
        self.world
            .resource_mut::<EventQueue>()
            .enqueue(kind.into(), cell.into());
    }

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed updates
    /// as needed.
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = self.fixed_timestep();
        if fixed_dt <= 0.0 {
            return;
        }

        self.time_accumulator += dt;
        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
        }
    }

    /// Run exactly one fixed update.
    pub fn tick(&mut self) {
        let fixed_dt = self.fixed_timestep();
        self.fixed_update(fixed_dt);
    }

    fn fixed_timestep(&self) -> f32 {
        self.world
            .get_resource::<SimConfig>()
            .map(|c| c.fixed_timestep)
            .unwrap_or(1.0 / 60.0)
    }

    /// Run a single fixed timestep update.
    fn fixed_update(&mut self, dt: f32) {
        if let Some(mut clock) = self.world.get_resource_mut::<SimClock>() {
            clock.advance(f64::from(dt));
        }
        self.schedule.run(&mut self.world);
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        let (tick, time) = (self.current_tick(), self.current_time());
        Snapshot::from_world(&mut self.world, tick, time)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.world
            .get_resource::<SimClock>()
            .map_or(0, |c| c.tick)
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f64 {
        self.world
            .get_resource::<SimClock>()
            .map_or(0.0, |c| c.elapsed)
    }

    /// Total ore delivered to every base so far.
    pub fn total_collected(&mut self) -> f64 {
        let mut query = self.world.query::<&Base>();
        query.iter(&self.world).map(|b| b.stored).sum()
    }

    /// Get the grid resource (for debugging/visualization).
    pub fn grid(&self) -> Option<&WorldGrid> {
        self.world.get_resource::<WorldGrid>()
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimError;
    use crate::grid::NavGrid;

    fn small_scenario() -> Scenario {
        Scenario {
            terrain: vec![
                "..........".into(),
                "..........".into(),
                "...####...".into(),
                "..........".into(),
                "..........".into(),
                "......~~..".into(),
                "..........".into(),
                "..........".into(),
            ],
            bases: vec![Cell::new(1, 1)],
            units: 4,
            mines: 3,
        }
    }

    fn fast_config() -> SimConfig {
        SimConfig {
            seconds_per_cell: 0.1,
            load_rate_range: (0.05, 0.1),
            mine_quantity_range: (2.0, 4.0),
            seed: 11,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_world() {
        let sim = SimWorld::new();
        assert_eq!(sim.current_tick(), 0);
        assert_eq!(sim.grid().map(|g| g.width()), Some(32));
    }

    #[test]
    fn test_step_advances_tick() {
        let mut sim = SimWorld::new();
        sim.step(0.02);
        assert_eq!(sim.current_tick(), 1);
        sim.step(0.02);
        assert_eq!(sim.current_tick(), 2);
        sim.tick();
        assert_eq!(sim.current_tick(), 3);
    }

    #[test]
    fn test_default_scenario_is_placed() {
        let mut sim = SimWorld::from_scenario(SimConfig::default(), &Scenario::default_field()).unwrap();
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.units.len(), 15);
        assert_eq!(snapshot.mines.len(), 25);
        assert_eq!(snapshot.bases.len(), 2);
    }

    #[test]
    fn test_bad_terrain_is_rejected() {
        let scenario = Scenario {
            terrain: vec!["..".into(), ".".into()],
            ..small_scenario()
        };
        assert!(matches!(
            SimWorld::from_scenario(SimConfig::default(), &scenario),
            Err(SimError::RaggedTerrain { .. })
        ));
    }

    #[test]
    fn test_enqueue_spawn_applies_after_tick() {
        let mut sim = SimWorld::new();
        sim.enqueue_spawn("mine", (3, 3));
        sim.enqueue_spawn("volcano", (4, 4));
        assert!(sim.snapshot().mines.is_empty());

        sim.tick();
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.mines.len(), 1);
        assert_eq!(snapshot.mines[0].cell, Cell::new(3, 3));
        assert_eq!(snapshot.mines[0].label, format!("{:.2}", snapshot.mines[0].remaining));
    }

    #[test]
    fn test_snapshot_json() {
        let mut sim = SimWorld::from_scenario(fast_config(), &small_scenario()).unwrap();
        sim.tick();
        let json = sim.snapshot_json();
        assert!(json.contains("units"));
        assert!(json.contains("Base Ore"));
    }

    #[test]
    fn test_same_seed_same_run() {
        let run = || {
            let mut sim = SimWorld::from_scenario(fast_config(), &small_scenario()).unwrap();
            for _ in 0..300 {
                sim.tick();
            }
            sim.snapshot()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_long_run_keeps_invariants() {
        let mut sim = SimWorld::from_scenario(fast_config(), &small_scenario()).unwrap();
        let (initial, _, _) = sim.snapshot().ore_totals();
        assert!(initial > 0.0);

        for tick in 0..4000 {
            sim.tick();
            if tick % 50 != 0 {
                continue;
            }

            let world = sim.world_mut();
            let mut claims: Vec<Claim> = world.query::<&Mine>().iter(world).map(|m| m.claim).collect();
            claims.extend(world.query::<&Base>().iter(world).map(|b| b.claim));
            for claim in claims {
                if let Some(holder) = claim.holder() {
                    assert!(world.get::<Unit>(holder).is_some(), "claim held by a dead entity");
                }
            }

            let grid = world.resource::<WorldGrid>().clone();
            for (unit, pos) in world.query::<(&Unit, &Position)>().iter(world) {
                assert!(unit.load >= 0.0 && unit.load <= unit.max_load + 1e-9);
                assert!(grid.in_bounds(pos.cell));
            }

            let (remaining, carried, stored) = sim.snapshot().ore_totals();
            assert!(
                (remaining + carried + stored - initial).abs() < 1e-6,
                "ore not conserved at tick {tick}"
            );
        }

        assert!(sim.total_collected() > 0.0);
    }

    #[test]
    fn test_walled_in_mine_does_not_starve_unit() {
        // The mine at (2, 2) is closed in on all four sides.
        let layout =
            TerrainLayout::parse(&[".......", "..#....", ".#.#...", "..#....", "......."]).unwrap();
        let mut sim = SimWorld::with_terrain(fast_config(), &layout);
        sim.enqueue_spawn("unit", (0, 0));
        sim.enqueue_spawn("mine", (2, 2));
        sim.enqueue_spawn("mine", (6, 4));
        sim.enqueue_spawn("base", (6, 0));
        sim.tick();

        let walled_cell = Cell::new(2, 2);
        let walled_ore = |snapshot: &Snapshot| {
            snapshot
                .mines
                .iter()
                .find(|m| m.cell == walled_cell)
                .map(|m| m.remaining)
        };
        let before = walled_ore(&sim.snapshot());
        assert!(before.is_some());

        for _ in 0..3000 {
            sim.tick();
        }

        assert!(sim.total_collected() > 0.0);
        assert_eq!(walled_ore(&sim.snapshot()), before);
    }
}
