//! Simulation configuration, clock and random source.
//!
//! All three are inserted as resources by [`SimWorld`](crate::api::SimWorld)
//! before the first tick.

use crate::error::Result;
use bevy_ecs::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Tunable constants for the simulation.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds (e.g., 1/60 for 60 Hz).
    pub fixed_timestep: f32,
    /// Seconds a unit needs to cross one cell.
    pub seconds_per_cell: f64,
    /// Unloading moves this many times the unit's load rate per tick.
    pub unload_multiplier: f64,
    /// Half-open range a new unit's per-tick load rate is drawn from.
    pub load_rate_range: (f64, f64),
    /// Half-open range a new unit's capacity is drawn from.
    pub max_load_range: (f64, f64),
    /// Half-open range a new mine's quantity is drawn from.
    pub mine_quantity_range: (f64, f64),
    /// Isometric tile size in pixels.
    pub tile_width: f32,
    pub tile_height: f32,
    /// Ticks an idle unit waits after a failed route before searching again.
    pub route_retry_ticks: u64,
    /// Seed for every random draw in the run.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0, // 60 Hz
            seconds_per_cell: 1.0,
            unload_multiplier: 10.0,
            load_rate_range: (0.002, 0.011),
            max_load_range: (1.0, 3.0),
            mine_quantity_range: (10.0, 20.0),
            tile_width: 128.0,
            tile_height: 64.0,
            route_retry_ticks: 60, // ~1 second at 60 Hz
            seed: 0x5eed,
        }
    }
}

impl SimConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Pixel offset of a grid delta in isometric projection.
    pub fn iso_offset(&self, dx: f32, dy: f32) -> (f32, f32) {
        let half_w = self.tile_width / 2.0;
        let half_h = self.tile_height / 2.0;
        ((dx - dy) * half_w, (dx + dy) * half_h)
    }
}

/// Tick counter and simulated time. The only clock game logic reads.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimClock {
    pub tick: u64,
    /// Simulated seconds since the run started.
    pub elapsed: f64,
}

impl SimClock {
    pub fn advance(&mut self, dt: f64) {
        self.tick = self.tick.wrapping_add(1);
        self.elapsed += dt;
    }
}

/// Seeded random source shared by the factory and scenario setup.
#[derive(Resource, Debug, Clone)]
pub struct SimRng(pub StdRng);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    /// Draw from a half-open range; a degenerate range yields its start.
    pub fn in_range(&mut self, (low, high): (f64, f64)) -> f64 {
        if high > low {
            self.0.gen_range(low..high)
        } else {
            low
        }
    }
}
