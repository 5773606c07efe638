//! Snapshot types: a serializable, read-only view of the simulation.
//!
//! A renderer reads one `Snapshot` per frame and never touches the ECS world.

use crate::components::*;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single unit's state for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: u32,
    pub name: String,
    pub cell: Cell,
    pub offset_x: f32,
    pub offset_y: f32,
    pub facing: String,
    pub state: UnitState,
    pub load: f64,
    pub max_load: f64,
    pub label: String,
}

/// Snapshot of a mine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MineSnapshot {
    pub id: u32,
    pub cell: Cell,
    pub remaining: f64,
    pub busy: bool,
    pub label: String,
}

/// Snapshot of a base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseSnapshot {
    pub id: u32,
    pub cell: Cell,
    pub stored: f64,
    pub busy: bool,
    pub label: String,
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f64,
    pub units: Vec<UnitSnapshot>,
    pub mines: Vec<MineSnapshot>,
    pub bases: Vec<BaseSnapshot>,
}

fn label_text(label: Option<&Label>) -> String {
    label.map(|l| l.0.clone()).unwrap_or_default()
}

impl Snapshot {
    /// Create a snapshot from the ECS world. Entries are ordered by id.
    pub fn from_world(world: &mut World, tick: u64, time: f64) -> Self {
        let mut units: Vec<UnitSnapshot> = world
            .query::<(Entity, &Unit, &Position, Option<&Facing>, Option<&Label>)>()
            .iter(world)
            .map(|(entity, unit, pos, facing, label)| UnitSnapshot {
                id: entity.index(),
                name: unit.name.clone(),
                cell: pos.cell,
                offset_x: pos.offset_x,
                offset_y: pos.offset_y,
                facing: facing.copied().unwrap_or_default().asset_key().to_string(),
                state: unit.state,
                load: unit.load,
                max_load: unit.max_load,
                label: label_text(label),
            })
            .collect();
        units.sort_by_key(|u| u.id);

        let mut mines: Vec<MineSnapshot> = world
            .query::<(Entity, &Mine, &Position, Option<&Label>)>()
            .iter(world)
            .map(|(entity, mine, pos, label)| MineSnapshot {
                id: entity.index(),
                cell: pos.cell,
                remaining: mine.remaining,
                busy: mine.claim.is_busy(),
                label: label_text(label),
            })
            .collect();
        mines.sort_by_key(|m| m.id);

        let mut bases: Vec<BaseSnapshot> = world
            .query::<(Entity, &Base, &Position, Option<&Label>)>()
            .iter(world)
            .map(|(entity, base, pos, label)| BaseSnapshot {
                id: entity.index(),
                cell: pos.cell,
                stored: base.stored,
                busy: base.claim.is_busy(),
                label: label_text(label),
            })
            .collect();
        bases.sort_by_key(|b| b.id);

        Self {
            tick,
            time,
            units,
            mines,
            bases,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Ore still in the ground, carried, and delivered.
    pub fn ore_totals(&self) -> (f64, f64, f64) {
        (
            self.mines.iter().map(|m| m.remaining).sum(),
            self.units.iter().map(|u| u.load).sum(),
            self.bases.iter().map(|b| b.stored).sum(),
        )
    }
}
