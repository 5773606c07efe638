//! ECS Components for the gathering simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ============================================================================
// GRID COORDINATES
// ============================================================================

/// Integer grid coordinate (not a pixel coordinate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

/// Cardinal offsets in waiting-spot search order: up, right, down, left.
pub const CARDINAL_OFFSETS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn manhattan(self, other: Cell) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Exactly one cardinal step away.
    pub fn is_adjacent(self, other: Cell) -> bool {
        self.manhattan(other) == 1
    }

    /// The four cardinal neighbours, up first then clockwise.
    pub fn cardinal_neighbors(self) -> impl Iterator<Item = Cell> {
        CARDINAL_OFFSETS
            .into_iter()
            .map(move |(dx, dy)| self.offset(dx, dy))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Cell {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// Grid cell plus the pixel offset used for animation.
///
/// The cell is the source of truth for all game logic. The offset is zero
/// whenever the entity is centered on its cell.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub cell: Cell,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self::at(Cell::new(x, y))
    }

    pub fn at(cell: Cell) -> Self {
        Self {
            cell,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

/// Steps still to walk, consumed front first.
#[derive(Component, Debug, Clone, Default)]
pub struct Route {
    pub steps: VecDeque<Cell>,
}

impl Route {
    pub fn new(steps: impl IntoIterator<Item = Cell>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

/// Request for the pathfinder: compute a route to this cell.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination(pub Cell);

/// Left by the pathfinder when a destination could not be reached.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteFailed {
    pub target: Cell,
}

/// Timing state for cell-to-cell movement.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Movement {
    /// Seconds spent crossing one cell.
    pub seconds_per_cell: f64,
    /// Simulated time at which the current step began.
    pub transit_started: f64,
    /// Cell the current step is heading to.
    pub target: Cell,
    pub in_transit: bool,
    /// Fraction of the current step completed (0.0 - 1.0).
    pub progress: f32,
    /// Simulated time at which movement was paused, if paused.
    pub paused_at: Option<f64>,
}

impl Movement {
    pub fn new(seconds_per_cell: f64) -> Self {
        Self {
            seconds_per_cell,
            transit_started: 0.0,
            target: Cell::default(),
            in_transit: false,
            progress: 0.0,
            paused_at: None,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Freeze movement; an in-progress step is kept as it is.
    pub fn pause(&mut self, now: f64) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Unfreeze movement, shifting the step start by the time spent paused.
    pub fn resume(&mut self, now: f64) {
        if let Some(paused_at) = self.paused_at.take() {
            self.transit_started += (now - paused_at).max(0.0);
        }
    }
}

impl Default for Movement {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Visual variant selected from the direction of travel.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Facing {
    #[default]
    Right,
    Left,
    Up,
    Down,
}

impl Facing {
    /// Direction from `from` toward `to`, horizontal checked before vertical.
    pub fn toward(from: Cell, to: Cell) -> Option<Self> {
        if to.x < from.x {
            Some(Self::Left)
        } else if to.x > from.x {
            Some(Self::Right)
        } else if to.y < from.y {
            Some(Self::Up)
        } else if to.y > from.y {
            Some(Self::Down)
        } else {
            None
        }
    }

    /// Asset key a renderer uses for this variant.
    pub fn asset_key(self) -> &'static str {
        match self {
            Facing::Right => "robot_right",
            Facing::Left => "robot_left",
            Facing::Up => "robot_up",
            Facing::Down => "robot_down",
        }
    }
}

// ============================================================================
// TERRAIN
// ============================================================================

/// Terrain entity occupying one grid cell.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub walkable: bool,
}

// ============================================================================
// SITES
// ============================================================================

/// Exclusive use of a site. Busy exactly when a holder is recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Claim {
    holder: Option<Entity>,
}

impl Claim {
    pub fn is_busy(&self) -> bool {
        self.holder.is_some()
    }

    pub fn holder(&self) -> Option<Entity> {
        self.holder
    }

    pub fn is_held_by(&self, unit: Entity) -> bool {
        self.holder == Some(unit)
    }

    /// Take the claim if it is free. Returns whether `unit` now holds it.
    pub fn try_claim(&mut self, unit: Entity) -> bool {
        match self.holder {
            None => {
                self.holder = Some(unit);
                true
            }
            Some(current) => current == unit,
        }
    }

    /// Drop the claim. Only the holder can release it.
    pub fn release(&mut self, unit: Entity) -> bool {
        if self.is_held_by(unit) {
            self.holder = None;
            true
        } else {
            false
        }
    }
}

/// Shared access to the claim of either site kind.
pub trait Site: Component {
    fn claim(&self) -> &Claim;
    fn claim_mut(&mut self) -> &mut Claim;
}

/// Resource source; depletes toward zero and is despawned when empty.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Mine {
    pub remaining: f64,
    pub claim: Claim,
}

impl Mine {
    pub fn new(remaining: f64) -> Self {
        Self {
            remaining,
            claim: Claim::default(),
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.remaining <= 0.0
    }
}

impl Site for Mine {
    fn claim(&self) -> &Claim {
        &self.claim
    }

    fn claim_mut(&mut self) -> &mut Claim {
        &mut self.claim
    }
}

/// Collection point; accumulates delivered ore and lives for the whole run.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Base {
    pub stored: f64,
    pub claim: Claim,
}

impl Site for Base {
    fn claim(&self) -> &Claim {
        &self.claim
    }

    fn claim_mut(&mut self) -> &mut Claim {
        &mut self.claim
    }
}

// ============================================================================
// UNITS
// ============================================================================

/// Decision state of a gathering unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitState {
    #[default]
    Idle,
    MovingToMine,
    Mining,
    ReturningToBase,
    WaitingForBase,
    Unloading,
    MovingToMineWaitingSpot,
    WaitingForMine,
}

impl UnitState {
    /// States whose target cell is a parking spot next to a busy site.
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            UnitState::WaitingForBase
                | UnitState::MovingToMineWaitingSpot
                | UnitState::WaitingForMine
        )
    }
}

/// A gathering unit.
#[derive(Component, Debug, Clone)]
pub struct Unit {
    pub name: String,
    pub state: UnitState,
    /// Site being approached or used. Weak: may point at a despawned entity.
    pub target: Option<Entity>,
    pub target_cell: Cell,
    pub load: f64,
    pub max_load: f64,
    /// Ore moved per tick while mining.
    pub load_rate: f64,
    /// Idle units do not look for work before this tick.
    pub retry_at: u64,
    /// Sites the pathfinder could not reach from this unit; skipped when
    /// picking a new target.
    pub unreachable: Vec<Entity>,
}

impl Unit {
    pub fn new(name: impl Into<String>, load_rate: f64, max_load: f64) -> Self {
        Self {
            name: name.into(),
            state: UnitState::Idle,
            target: None,
            target_cell: Cell::default(),
            load: 0.0,
            max_load,
            load_rate,
            retry_at: 0,
            unreachable: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.load >= self.max_load
    }
}

/// Text a renderer draws next to an entity.
#[derive(Component, Debug, Clone, Default, PartialEq, Eq)]
pub struct Label(pub String);

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning a complete unit entity.
#[derive(Bundle)]
pub struct UnitBundle {
    pub unit: Unit,
    pub position: Position,
    pub movement: Movement,
    pub facing: Facing,
    pub label: Label,
}

impl UnitBundle {
    pub fn new(unit: Unit, cell: Cell, seconds_per_cell: f64) -> Self {
        Self {
            unit,
            position: Position::at(cell),
            movement: Movement::new(seconds_per_cell),
            facing: Facing::Right,
            label: Label::default(),
        }
    }
}

/// Bundle for spawning a mine.
#[derive(Bundle)]
pub struct MineBundle {
    pub mine: Mine,
    pub position: Position,
    pub label: Label,
}

impl MineBundle {
    pub fn new(cell: Cell, remaining: f64) -> Self {
        Self {
            mine: Mine::new(remaining),
            position: Position::at(cell),
            label: Label::default(),
        }
    }
}

/// Bundle for spawning a base.
#[derive(Bundle)]
pub struct BaseBundle {
    pub base: Base,
    pub position: Position,
    pub label: Label,
}

impl BaseBundle {
    pub fn new(cell: Cell) -> Self {
        Self {
            base: Base::default(),
            position: Position::at(cell),
            label: Label::default(),
        }
    }
}
