//! Gather Sim - Simulation Core
//!
//! A deterministic, fixed-timestep ECS simulation of worker units gathering
//! ore from mines and delivering it to bases on a grid.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod components;
pub mod config;
pub mod error;
pub mod grid;
pub mod pathfinding;
pub mod scenario;
pub mod systems;
pub mod world;

pub use api::SimWorld;
pub use components::*;
pub use config::{SimClock, SimConfig, SimRng};
pub use error::{Result, SimError};
pub use grid::{spawn_terrain, NavGrid, TerrainKind, TerrainLayout, WorldGrid};
pub use pathfinding::{find_route, pathfinding_system};
pub use scenario::Scenario;
pub use systems::*;
pub use world::Snapshot;
