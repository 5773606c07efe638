//! Deferred spawning: the event queue, the entity factory and unit names.
//!
//! Game logic never spawns while a tick is in progress. Requests are queued
//! and applied by [`spawn_queue_system`] once every other system has run.

use crate::components::*;
use crate::config::{SimConfig, SimRng};
use crate::error::SimError;
use crate::grid::WorldGrid;
use bevy_ecs::prelude::*;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

// ============================================================================
// EVENT QUEUE
// ============================================================================

/// What a spawn request builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnKind {
    Unit,
    Mine,
    Base,
    /// A kind name nothing recognises; reported and skipped when processed.
    Unknown(String),
}

impl From<&str> for SpawnKind {
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "unit" | "robot" => SpawnKind::Unit,
            "mine" | "source" => SpawnKind::Mine,
            "base" | "collector" => SpawnKind::Base,
            _ => SpawnKind::Unknown(name.to_string()),
        }
    }
}

impl fmt::Display for SpawnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnKind::Unit => f.write_str("unit"),
            SpawnKind::Mine => f.write_str("mine"),
            SpawnKind::Base => f.write_str("base"),
            SpawnKind::Unknown(name) => write!(f, "unknown({name})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub kind: SpawnKind,
    pub cell: Cell,
}

/// FIFO of pending spawn requests, drained once per tick.
#[derive(Resource, Debug, Default)]
pub struct EventQueue {
    requests: Vec<SpawnRequest>,
}

impl EventQueue {
    pub fn enqueue(&mut self, kind: SpawnKind, cell: Cell) {
        self.requests.push(SpawnRequest { kind, cell });
    }

    /// Remove and return every pending request, oldest first.
    pub fn take(&mut self) -> Vec<SpawnRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

// ============================================================================
// NAME POOL
// ============================================================================

const UNIT_NAMES: [&str; 20] = [
    "Glitch", "404", "sudo", "Ping", "Pong", "Root", "Null", "NaN", "Segfault", "Kernel", "Byte",
    "Bit", "Cache", "Cookie", "Cron", "Daemon", "Fuzz", "Hex", "Jolt", "Zorp",
];

/// Unique unit names: the fixed list in shuffled order, then "Bot N".
#[derive(Resource, Debug, Clone)]
pub struct NamePool {
    /// Remaining names, next one last.
    available: Vec<String>,
    next_number: usize,
}

impl NamePool {
    pub fn shuffled(rng: &mut SimRng) -> Self {
        let mut available: Vec<String> = UNIT_NAMES.iter().map(|s| s.to_string()).collect();
        available.shuffle(&mut rng.0);
        Self {
            available,
            next_number: UNIT_NAMES.len() + 1,
        }
    }

    pub fn next_name(&mut self) -> String {
        self.available.pop().unwrap_or_else(|| {
            let name = format!("Bot {}", self.next_number);
            self.next_number += 1;
            name
        })
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Spawn a unit with a fresh name and randomized capacity and rate.
pub fn spawn_unit(world: &mut World, cell: Cell) -> Entity {
    let config = world.resource::<SimConfig>().clone();
    let (load_rate, max_load) = {
        let mut rng = world.resource_mut::<SimRng>();
        let rate = rng.in_range(config.load_rate_range);
        (rate, rng.in_range(config.max_load_range))
    };
    let name = world.resource_mut::<NamePool>().next_name();

    debug!(%name, %cell, load_rate, max_load, "Spawning unit");
    let unit = Unit::new(name, load_rate, max_load);
    world
        .spawn(UnitBundle::new(unit, cell, config.seconds_per_cell))
        .id()
}

/// Spawn a mine holding a random quantity of ore.
pub fn spawn_mine(world: &mut World, cell: Cell) -> Entity {
    let range = world.resource::<SimConfig>().mine_quantity_range;
    let remaining = world.resource_mut::<SimRng>().in_range(range);
    debug!(%cell, remaining, "Spawning mine");
    world.spawn(MineBundle::new(cell, remaining)).id()
}

/// Spawn an empty base.
pub fn spawn_base(world: &mut World, cell: Cell) -> Entity {
    debug!(%cell, "Spawning base");
    world.spawn(BaseBundle::new(cell)).id()
}

/// Build one request. Unknown kinds and off-grid cells are errors.
pub fn apply_request(world: &mut World, request: &SpawnRequest) -> crate::error::Result<Entity> {
    if let Some(grid) = world.get_resource::<WorldGrid>() {
        grid.check_bounds(request.cell)?;
    }
    match &request.kind {
        SpawnKind::Unit => Ok(spawn_unit(world, request.cell)),
        SpawnKind::Mine => Ok(spawn_mine(world, request.cell)),
        SpawnKind::Base => Ok(spawn_base(world, request.cell)),
        SpawnKind::Unknown(name) => Err(SimError::UnknownSpawnKind(name.clone())),
    }
}

/// System that drains the event queue in arrival order.
///
/// A bad request is logged and skipped; the rest of the queue still runs.
pub fn spawn_queue_system(world: &mut World) {
    let pending = world.resource::<EventQueue>().len();
    if pending == 0 {
        return;
    }
    debug!(pending, "Applying spawn requests");

    let requests = world.resource_mut::<EventQueue>().take();
    for request in &requests {
        if let Err(err) = apply_request(world, request) {
            warn!(kind = %request.kind, cell = %request.cell, "Skipping spawn request: {err}");
        }
    }
}
