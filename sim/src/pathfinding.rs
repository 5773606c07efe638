//! Grid pathfinding using A*.
//!
//! Moves are 4-directional with uniform cost. The heuristic is the squared
//! Euclidean distance, which overestimates on long legs: searches expand few
//! nodes on open grids but the route returned is not guaranteed shortest.

use crate::components::{Cell, Destination, Position, Route, RouteFailed};
use crate::error::{Result, SimError};
use crate::grid::{NavGrid, WorldGrid};
use bevy_ecs::prelude::*;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Neighbour expansion order.
const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Per-search record for one cell.
#[derive(Debug, Clone, Copy)]
struct Node {
    cell: Cell,
    cost: f64,
    parent: Option<usize>,
    closed: bool,
}

/// Open-set entry. Ordered so the heap pops the lowest estimate first,
/// then the earliest pushed on equal estimates.
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    estimate: f64,
    cost: f64,
    seq: u64,
    node: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimate
            .total_cmp(&self.estimate)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[inline]
fn heuristic(a: Cell, b: Cell) -> f64 {
    let dx = f64::from(b.x - a.x);
    let dy = f64::from(b.y - a.y);
    dx * dx + dy * dy
}

/// Find a walkable route from `from` to `to`.
///
/// The returned steps exclude `from` and end at `to`; `from == to` yields an
/// empty route.
pub fn find_route<G: NavGrid + ?Sized>(from: Cell, to: Cell, grid: &G) -> Result<Vec<Cell>> {
    if from == to {
        return Ok(Vec::new());
    }
    if !grid.in_bounds(from) || !grid.in_bounds(to) {
        return Err(SimError::NoRoute { from, to });
    }

    let mut nodes: Vec<Node> = Vec::new();
    let mut index: HashMap<Cell, usize> = HashMap::new();
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;

    nodes.push(Node {
        cell: from,
        cost: 0.0,
        parent: None,
        closed: false,
    });
    index.insert(from, 0);
    open.push(OpenEntry {
        estimate: heuristic(from, to),
        cost: 0.0,
        seq,
        node: 0,
    });

    while let Some(entry) = open.pop() {
        let current = nodes[entry.node];
        if current.closed || entry.cost > current.cost {
            continue; // stale
        }
        if current.cell == to {
            return Ok(reconstruct(&nodes, entry.node));
        }
        nodes[entry.node].closed = true;

        for (dx, dy) in NEIGHBOR_OFFSETS {
            let next = current.cell.offset(dx, dy);
            if !grid.in_bounds(next) || !grid.is_walkable(next) {
                continue;
            }
            let cost = current.cost + 1.0;

            let slot = match index.get(&next) {
                Some(&i) => {
                    if nodes[i].closed || cost >= nodes[i].cost {
                        continue;
                    }
                    nodes[i].cost = cost;
                    nodes[i].parent = Some(entry.node);
                    i
                }
                None => {
                    let i = nodes.len();
                    nodes.push(Node {
                        cell: next,
                        cost,
                        parent: Some(entry.node),
                        closed: false,
                    });
                    index.insert(next, i);
                    i
                }
            };

            seq += 1;
            open.push(OpenEntry {
                estimate: cost + heuristic(next, to),
                cost,
                seq,
                node: slot,
            });
        }
    }

    Err(SimError::NoRoute { from, to })
}

/// Walk parents back from the goal, then reverse and drop the start.
fn reconstruct(nodes: &[Node], goal: usize) -> Vec<Cell> {
    let mut steps = Vec::new();
    let mut cursor = Some(goal);
    while let Some(i) = cursor {
        steps.push(nodes[i].cell);
        cursor = nodes[i].parent;
    }
    steps.reverse();
    steps.remove(0);
    steps
}

/// System that turns destination requests into routes.
///
/// Runs only for entities without a route, so a new destination waits until
/// the current route has been walked. The request is removed either way; a
/// failed search leaves a [`RouteFailed`] marker for the AI.
pub fn pathfinding_system(
    mut commands: Commands,
    grid: Res<WorldGrid>,
    requests: Query<(Entity, &Position, &Destination), Without<Route>>,
) {
    let grid: &WorldGrid = &grid;
    let pending: Vec<(Entity, Cell, Cell)> = requests
        .iter()
        .map(|(entity, pos, dest)| (entity, pos.cell, dest.0))
        .collect();

    #[cfg(feature = "parallel")]
    let results: Vec<_> = pending
        .par_iter()
        .map(|&(entity, from, to)| (entity, to, find_route(from, to, grid)))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let results: Vec<_> = pending
        .iter()
        .map(|&(entity, from, to)| (entity, to, find_route(from, to, grid)))
        .collect();

    for (entity, to, result) in results {
        let mut entity_commands = commands.entity(entity);
        entity_commands.remove::<Destination>();
        match result {
            Ok(steps) => {
                tracing::trace!(?entity, %to, steps = steps.len(), "Route found");
                entity_commands.insert(Route::new(steps));
            }
            Err(err) => {
                tracing::warn!(?entity, %to, "{err}");
                entity_commands.insert(RouteFailed { target: to });
            }
        }
    }
}
