//! Scenario setup: terrain plus the initial bases, units and mines.

use crate::components::Cell;
use crate::config::SimRng;
use crate::error::Result;
use crate::grid::TerrainLayout;
use crate::systems::spawn::{EventQueue, SpawnKind};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// A starting layout. Loaded from JSON or built in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Terrain rows, see [`TerrainLayout::parse`].
    pub terrain: Vec<String>,
    pub bases: Vec<Cell>,
    /// Units placed on random walkable cells.
    pub units: usize,
    /// Mines placed on random walkable cells other than base cells.
    pub mines: usize,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::default_field()
    }
}

impl Scenario {
    /// Open 32x32 field with two bases, 15 units and 25 mines.
    pub fn default_field() -> Self {
        Self {
            terrain: vec![".".repeat(32); 32],
            bases: vec![Cell::new(16, 16), Cell::new(20, 20)],
            units: 15,
            mines: 25,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn layout(&self) -> Result<TerrainLayout> {
        TerrainLayout::parse(&self.terrain)
    }

    /// Queue spawn requests for the whole scenario: bases, then units, then
    /// mines.
    pub fn enqueue_into(&self, layout: &TerrainLayout, rng: &mut SimRng, queue: &mut EventQueue) {
        for &base in &self.bases {
            queue.enqueue(SpawnKind::Base, base);
        }

        let open = layout.walkable_cells();
        if open.is_empty() && self.units + self.mines > 0 {
            tracing::warn!("Scenario terrain has no walkable cell; skipping units and mines");
            return;
        }

        for _ in 0..self.units {
            if let Some(&cell) = open.choose(&mut rng.0) {
                queue.enqueue(SpawnKind::Unit, cell);
            }
        }

        let mine_cells: Vec<Cell> = open
            .into_iter()
            .filter(|c| !self.bases.contains(c))
            .collect();
        for _ in 0..self.mines {
            if let Some(&cell) = mine_cells.choose(&mut rng.0) {
                queue.enqueue(SpawnKind::Mine, cell);
            }
        }

        tracing::info!(
            bases = self.bases.len(),
            units = self.units,
            mines = self.mines,
            "Scenario queued"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::NavGrid;

    #[test]
    fn test_default_field() {
        let scenario = Scenario::default_field();
        let layout = scenario.layout().unwrap();
        assert_eq!((layout.width(), layout.height()), (32, 32));
        assert_eq!(scenario.bases.len(), 2);
    }

    #[test]
    fn test_enqueue_order_and_placement() {
        let scenario = Scenario {
            terrain: vec!["..#".into(), ".#.".into(), "...".into()],
            bases: vec![Cell::new(0, 0)],
            units: 4,
            mines: 30,
        };
        let layout = scenario.layout().unwrap();
        let mut queue = EventQueue::default();
        scenario.enqueue_into(&layout, &mut SimRng::seeded(9), &mut queue);

        let requests = queue.take();
        assert_eq!(requests.len(), 35);
        assert_eq!(requests[0].kind, SpawnKind::Base);
        assert!(requests[1..5].iter().all(|r| r.kind == SpawnKind::Unit));
        assert!(requests[5..].iter().all(|r| r.kind == SpawnKind::Mine));
        assert!(requests[1..].iter().all(|r| layout.is_walkable(r.cell)));
        assert!(requests[5..].iter().all(|r| r.cell != Cell::new(0, 0)));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{ "terrain": ["...", "..."], "bases": [{ "x": 1, "y": 1 }], "units": 2, "mines": 3 }"#;
        let scenario = Scenario::from_json(json).unwrap();
        assert_eq!(scenario.bases, vec![Cell::new(1, 1)]);
        assert_eq!(scenario.units, 2);
    }
}
