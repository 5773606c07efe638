//! Error types for the simulation.

use crate::components::Cell;
use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors surfaced by setup code and by the pathfinder.
///
/// None of these stop a running simulation; the tick path logs them and
/// degrades to an idle/no-op outcome.
#[derive(Debug, Error)]
pub enum SimError {
    /// No walkable route connects the two cells.
    #[error("No route from {from} to {to}")]
    NoRoute { from: Cell, to: Cell },

    /// A cell lies outside the grid.
    #[error("Cell {cell} is outside the {width}x{height} grid")]
    OutOfBounds { cell: Cell, width: i32, height: i32 },

    /// A terrain layout had no rows or no columns.
    #[error("Terrain layout is empty")]
    EmptyTerrain,

    /// A terrain row differs in length from the first row.
    #[error("Terrain row {row} has {found} cells, expected {expected}")]
    RaggedTerrain {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A terrain glyph is not one of `.`, `#` or `~`.
    #[error("Unknown terrain glyph '{glyph}' at row {row}, column {column}")]
    UnknownTerrain {
        glyph: char,
        row: usize,
        column: usize,
    },

    /// A spawn request named a kind the factory cannot build.
    #[error("Unknown spawn kind: {0}")]
    UnknownSpawnKind(String),

    /// Config or scenario JSON failed to parse.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
