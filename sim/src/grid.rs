//! Static grid model: terrain layout, tile entities and walkability.
//!
//! The grid is built once at world init and never changes afterwards, so
//! walkability is indexed per cell at construction and every lookup is O(1).

use crate::components::{Cell, Tile};
use crate::error::{Result, SimError};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// The capability the pathfinder needs from a grid.
pub trait NavGrid {
    fn width(&self) -> i32;
    fn height(&self) -> i32;

    fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width() && cell.y < self.height()
    }

    /// False for out-of-range cells.
    fn is_walkable(&self, cell: Cell) -> bool;
}

/// Row-major index of an in-bounds cell.
#[inline]
fn index(width: i32, cell: Cell) -> usize {
    (cell.y * width + cell.x) as usize
}

// ============================================================================
// TERRAIN LAYOUT
// ============================================================================

/// Terrain kind of one cell in a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TerrainKind {
    #[default]
    Ground,
    Rock,
    Water,
}

impl TerrainKind {
    pub fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            '.' => Some(Self::Ground),
            '#' => Some(Self::Rock),
            '~' => Some(Self::Water),
            _ => None,
        }
    }

    pub fn is_walkable(self) -> bool {
        matches!(self, Self::Ground)
    }
}

/// Terrain description the world is built from.
///
/// Stands in for a map loader: rows of glyphs, `.` ground, `#` rock,
/// `~` water.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerrainLayout {
    width: i32,
    height: i32,
    kinds: Vec<TerrainKind>,
}

impl TerrainLayout {
    /// All-ground layout.
    pub fn open(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            kinds: vec![TerrainKind::Ground; (width * height) as usize],
        }
    }

    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Self> {
        let first = rows.first().ok_or(SimError::EmptyTerrain)?;
        let expected = first.as_ref().chars().count();
        if expected == 0 {
            return Err(SimError::EmptyTerrain);
        }

        let mut kinds = Vec::with_capacity(expected * rows.len());
        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            let found = line.chars().count();
            if found != expected {
                return Err(SimError::RaggedTerrain { row, expected, found });
            }
            for (column, glyph) in line.chars().enumerate() {
                let kind = TerrainKind::from_glyph(glyph)
                    .ok_or(SimError::UnknownTerrain { glyph, row, column })?;
                kinds.push(kind);
            }
        }

        Ok(Self {
            width: expected as i32,
            height: rows.len() as i32,
            kinds,
        })
    }

    pub fn kind(&self, cell: Cell) -> Option<TerrainKind> {
        self.in_bounds(cell)
            .then(|| self.kinds[index(self.width, cell)])
    }

    /// Every walkable cell in row-major order.
    pub fn walkable_cells(&self) -> Vec<Cell> {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Cell::new(x, y)))
            .filter(|&c| self.is_walkable(c))
            .collect()
    }
}

impl NavGrid for TerrainLayout {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn is_walkable(&self, cell: Cell) -> bool {
        self.kind(cell).is_some_and(TerrainKind::is_walkable)
    }
}

// ============================================================================
// WORLD GRID
// ============================================================================

/// Grid resource: tile occupants per cell plus a walkability index.
#[derive(Resource, Debug, Clone, Default)]
pub struct WorldGrid {
    width: i32,
    height: i32,
    /// Terrain entities per cell (row-major).
    occupants: Vec<Vec<Entity>>,
    walkable: Vec<bool>,
}

impl WorldGrid {
    /// Terrain entities in a cell; empty for out-of-range cells.
    pub fn occupants(&self, cell: Cell) -> &[Entity] {
        if self.in_bounds(cell) {
            &self.occupants[index(self.width, cell)]
        } else {
            &[]
        }
    }

    pub fn check_bounds(&self, cell: Cell) -> Result<()> {
        if self.in_bounds(cell) {
            Ok(())
        } else {
            Err(SimError::OutOfBounds {
                cell,
                width: self.width,
                height: self.height,
            })
        }
    }
}

impl NavGrid for WorldGrid {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn is_walkable(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && self.walkable[index(self.width, cell)]
    }
}

/// Spawn one `Tile` entity per layout cell and index the result.
///
/// A cell is walkable when any of its tiles is.
pub fn spawn_terrain(world: &mut World, layout: &TerrainLayout) -> WorldGrid {
    let cells = (layout.width * layout.height) as usize;
    let mut occupants = vec![Vec::new(); cells];
    let mut walkable = vec![false; cells];

    for y in 0..layout.height {
        for x in 0..layout.width {
            let cell = Cell::new(x, y);
            let i = index(layout.width, cell);
            let tile = Tile {
                walkable: layout.kinds[i].is_walkable(),
            };
            let entity = world.spawn(tile).id();
            occupants[i].push(entity);
        }
    }

    for (i, tiles) in occupants.iter().enumerate() {
        walkable[i] = tiles
            .iter()
            .any(|&e| world.get::<Tile>(e).is_some_and(|t| t.walkable));
    }

    tracing::debug!(
        width = layout.width,
        height = layout.height,
        "Spawned terrain tiles"
    );

    WorldGrid {
        width: layout.width,
        height: layout.height,
        occupants,
        walkable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layout() {
        let layout = TerrainLayout::parse(&["..#", ".~."]).unwrap();
        assert_eq!(layout.width(), 3);
        assert_eq!(layout.height(), 2);
        assert!(layout.is_walkable(Cell::new(0, 0)));
        assert!(!layout.is_walkable(Cell::new(2, 0)));
        assert!(!layout.is_walkable(Cell::new(1, 1)));
        assert!(!layout.is_walkable(Cell::new(3, 0)));
        assert!(!layout.is_walkable(Cell::new(-1, 0)));
        assert_eq!(layout.walkable_cells().len(), 4);
    }

    #[test]
    fn test_parse_errors() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            TerrainLayout::parse(&empty),
            Err(SimError::EmptyTerrain)
        ));
        assert!(matches!(
            TerrainLayout::parse(&["...", ".."]),
            Err(SimError::RaggedTerrain { row: 1, expected: 3, found: 2 })
        ));
        assert!(matches!(
            TerrainLayout::parse(&["..", ".x"]),
            Err(SimError::UnknownTerrain { glyph: 'x', row: 1, column: 1 })
        ));
    }

    #[test]
    fn test_spawn_terrain_indexes_tiles() {
        let mut world = World::new();
        let layout = TerrainLayout::parse(&[".#", ".."]).unwrap();
        let grid = spawn_terrain(&mut world, &layout);

        assert_eq!(grid.width(), 2);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.occupants(Cell::new(1, 0)).len(), 1);
        assert!(grid.occupants(Cell::new(5, 5)).is_empty());
        assert!(!grid.is_walkable(Cell::new(1, 0)));
        assert!(grid.is_walkable(Cell::new(1, 1)));

        let tile = grid.occupants(Cell::new(1, 0))[0];
        assert_eq!(world.get::<Tile>(tile), Some(&Tile { walkable: false }));

        let mut tiles = world.query::<&Tile>();
        assert_eq!(tiles.iter(&world).count(), 4);
    }

    #[test]
    fn test_check_bounds() {
        let mut world = World::new();
        let grid = spawn_terrain(&mut world, &TerrainLayout::open(4, 3));
        assert!(grid.check_bounds(Cell::new(3, 2)).is_ok());
        assert!(matches!(
            grid.check_bounds(Cell::new(4, 0)),
            Err(SimError::OutOfBounds { width: 4, height: 3, .. })
        ));
    }
}
