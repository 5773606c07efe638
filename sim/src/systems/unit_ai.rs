//! Unit AI - the gathering state machine.
//!
//! Each unit cycles Idle -> MovingToMine -> Mining -> ReturningToBase ->
//! Unloading -> Idle, detouring through the waiting states when the site it
//! wants is claimed by someone else.
//!
//! ## Ordering
//! The AI is an exclusive system. Units are stepped one at a time in
//! ascending entity order, so a claim taken by one unit is visible to the
//! next unit within the same tick.
//!
//! ## Liveness
//! `Unit::target` is a weak handle. Every use goes through `World::get`, and a
//! missing site sends the unit back to Idle.

use crate::components::*;
use crate::config::{SimClock, SimConfig};
use crate::grid::{NavGrid, WorldGrid};
use bevy_ecs::prelude::*;
use tracing::{debug, info};

/// System that steps every unit's state machine once.
pub fn unit_ai_system(world: &mut World) {
    let tick = world.resource::<SimClock>().tick;

    let mut units: Vec<Entity> = world
        .query_filtered::<Entity, With<Unit>>()
        .iter(world)
        .collect();
    units.sort_unstable();

    for unit in units {
        step_unit(world, unit, tick);
    }
}

/// Advance one unit by one tick.
pub fn step_unit(world: &mut World, entity: Entity, tick: u64) {
    if let Some(failed) = world.get::<RouteFailed>(entity).copied() {
        world.entity_mut(entity).remove::<RouteFailed>();
        abandon_target(world, entity, tick, failed.target);
        return;
    }

    let Some(unit) = world.get::<Unit>(entity) else {
        return;
    };
    let (state, retry_at) = (unit.state, unit.retry_at);

    match state {
        UnitState::Idle => {
            if tick >= retry_at {
                handle_idle(world, entity);
            }
        }
        UnitState::MovingToMine => handle_moving_to_mine(world, entity),
        UnitState::Mining => handle_mining(world, entity),
        UnitState::ReturningToBase => handle_returning_to_base(world, entity),
        UnitState::WaitingForBase => handle_waiting_for_base(world, entity),
        UnitState::Unloading => handle_unloading(world, entity),
        UnitState::MovingToMineWaitingSpot => handle_moving_to_waiting_spot(world, entity),
        UnitState::WaitingForMine => handle_waiting_for_mine(world, entity),
    }
}

// ============================================================================
// STATE HANDLERS
// ============================================================================

fn handle_idle(world: &mut World, entity: Entity) {
    let Some(from) = cell_of(world, entity) else {
        return;
    };

    let found = pick_mine(world, entity, from).or_else(|| {
        forget_unreachable(world, entity)
            .then(|| pick_mine(world, entity, from))
            .flatten()
    });
    let Some((mine, mine_cell)) = found else {
        return;
    };

    let claimed = world
        .get_mut::<Mine>(mine)
        .is_some_and(|mut m| m.claim.try_claim(entity));

    if claimed {
        set_target(world, entity, mine, mine_cell);
        transition(world, entity, UnitState::MovingToMine);
        request_destination(world, entity, mine_cell);
        return;
    }

    match free_adjacent_cell(world, entity, mine_cell) {
        Some(spot) => {
            set_target(world, entity, mine, spot);
            transition(world, entity, UnitState::MovingToMineWaitingSpot);
            request_destination(world, entity, spot);
        }
        None => debug!(?entity, %mine_cell, "No waiting spot next to busy mine"),
    }
}

fn handle_moving_to_mine(world: &mut World, entity: Entity) {
    let Some((mine, target_cell)) = target_of(world, entity) else {
        return go_idle(world, entity, "target mine gone");
    };
    let Some(claim) = world.get::<Mine>(mine).map(|m| m.claim) else {
        return go_idle(world, entity, "target mine gone");
    };

    if claim.is_busy() && !claim.is_held_by(entity) {
        return go_idle(world, entity, "mine claimed by another unit");
    }

    if has_arrived(world, entity, target_cell) {
        transition(world, entity, UnitState::Mining);
    }
}

fn handle_mining(world: &mut World, entity: Entity) {
    let Some((mine, _)) = target_of(world, entity) else {
        return go_idle(world, entity, "mine gone while mining");
    };
    let Some(unit) = world.get::<Unit>(entity) else {
        return;
    };
    let (load, max_load, rate) = (unit.load, unit.max_load, unit.load_rate);

    let mined = world.get_mut::<Mine>(mine).map(|mut m| {
        let amount = rate.min(max_load - load).min(m.remaining).max(0.0);
        m.remaining -= amount;
        (amount, m.is_depleted())
    });
    let Some((amount, depleted)) = mined else {
        return go_idle(world, entity, "mine gone while mining");
    };

    let full = world.get_mut::<Unit>(entity).is_some_and(|mut unit| {
        unit.load = load + amount;
        unit.is_full()
    });

    if depleted {
        info!(?mine, "Mine depleted");
        world.despawn(mine);
        if !start_returning_to_base(world, entity) {
            go_idle(world, entity, "no base to return to");
        }
        return;
    }

    if full {
        release_site::<Mine>(world, mine, entity);
        if !start_returning_to_base(world, entity) {
            debug!(?entity, "Full but no base exists, staying put");
        }
    }
}

fn handle_returning_to_base(world: &mut World, entity: Entity) {
    let Some((base, _)) = target_of(world, entity) else {
        return go_idle(world, entity, "target base gone");
    };
    let Some(claim) = world.get::<Base>(base).map(|b| b.claim) else {
        return go_idle(world, entity, "target base gone");
    };
    let (Some(here), Some(base_cell)) = (cell_of(world, entity), cell_of(world, base)) else {
        return;
    };

    if has_arrived(world, entity, base_cell) {
        if claim.is_held_by(entity) {
            transition(world, entity, UnitState::Unloading);
        } else {
            go_idle(world, entity, "arrived at a base it did not claim");
        }
        return;
    }

    if !here.is_adjacent(base_cell) {
        return;
    }

    if !claim.is_busy() {
        claim_site::<Base>(world, base, entity);
        resume_movement(world, entity);
        debug!(?entity, ?base, "Claimed base");
    } else if !claim.is_held_by(entity) {
        pause_movement(world, entity);
        transition(world, entity, UnitState::WaitingForBase);
    }
}

fn handle_waiting_for_base(world: &mut World, entity: Entity) {
    let claim = target_of(world, entity).and_then(|(base, _)| {
        world.get::<Base>(base).map(|b| (base, b.claim))
    });
    let Some((base, claim)) = claim else {
        resume_movement(world, entity);
        return go_idle(world, entity, "target base gone");
    };

    if !claim.is_busy() {
        claim_site::<Base>(world, base, entity);
        resume_movement(world, entity);
        transition(world, entity, UnitState::ReturningToBase);
    }
}

fn handle_unloading(world: &mut World, entity: Entity) {
    let Some((base, _)) = target_of(world, entity) else {
        return go_idle(world, entity, "base gone while unloading");
    };
    let multiplier = world.resource::<SimConfig>().unload_multiplier;
    let Some(unit) = world.get::<Unit>(entity) else {
        return;
    };
    let amount = (unit.load_rate * multiplier).min(unit.load).max(0.0);
    let load = unit.load - amount;

    let emptied = load <= 0.0;
    let delivered = world.get_mut::<Base>(base).map(|mut b| {
        b.stored += amount;
        if emptied {
            b.claim.release(entity);
        }
    });
    if delivered.is_none() {
        return go_idle(world, entity, "base gone while unloading");
    }

    if let Some(mut unit) = world.get_mut::<Unit>(entity) {
        unit.load = if emptied { 0.0 } else { load };
    }

    if emptied {
        transition(world, entity, UnitState::Idle);
    }
}

fn handle_moving_to_waiting_spot(world: &mut World, entity: Entity) {
    let Some((mine, spot)) = target_of(world, entity) else {
        return go_idle(world, entity, "target mine gone");
    };
    if world.get::<Mine>(mine).is_none() {
        return go_idle(world, entity, "target mine gone");
    }

    if has_arrived(world, entity, spot) {
        transition(world, entity, UnitState::WaitingForMine);
    }
}

fn handle_waiting_for_mine(world: &mut World, entity: Entity) {
    let Some((mine, _)) = target_of(world, entity) else {
        return go_idle(world, entity, "target mine gone");
    };
    let Some(claim) = world.get::<Mine>(mine).map(|m| m.claim) else {
        return go_idle(world, entity, "target mine gone");
    };
    let Some(mine_cell) = cell_of(world, mine) else {
        return;
    };

    if !claim.is_busy() && claim_site::<Mine>(world, mine, entity) {
        set_target(world, entity, mine, mine_cell);
        transition(world, entity, UnitState::MovingToMine);
        request_destination(world, entity, mine_cell);
    }
}

/// Give up on a target the pathfinder could not reach.
///
/// Any claim the unit holds on its target is released, the target is
/// remembered as unreachable and the unit stays Idle for `route_retry_ticks`
/// before searching again.
fn abandon_target(world: &mut World, entity: Entity, tick: u64, unreachable: Cell) {
    let retry_ticks = world.resource::<SimConfig>().route_retry_ticks;

    let site = target_of(world, entity).map(|(site, _)| site);
    if let Some(site) = site {
        release_site::<Mine>(world, site, entity);
        release_site::<Base>(world, site, entity);
    }
    resume_movement(world, entity);
    stop_after_current_step(world, entity);

    if let Some(mut unit) = world.get_mut::<Unit>(entity) {
        unit.retry_at = tick.saturating_add(retry_ticks);
        unit.target = None;
        if let Some(site) = site.filter(|s| !unit.unreachable.contains(s)) {
            unit.unreachable.push(site);
        }
    }
    info!(?entity, %unreachable, retry_ticks, "Target unreachable, backing off");
    transition(world, entity, UnitState::Idle);
}

// ============================================================================
// HELPERS
// ============================================================================

fn cell_of(world: &World, entity: Entity) -> Option<Cell> {
    world.get::<Position>(entity).map(|p| p.cell)
}

fn target_of(world: &World, entity: Entity) -> Option<(Entity, Cell)> {
    let unit = world.get::<Unit>(entity)?;
    unit.target.map(|t| (t, unit.target_cell))
}

fn set_target(world: &mut World, entity: Entity, site: Entity, cell: Cell) {
    if let Some(mut unit) = world.get_mut::<Unit>(entity) {
        unit.target = Some(site);
        unit.target_cell = cell;
    }
}

fn transition(world: &mut World, entity: Entity, state: UnitState) {
    if let Some(mut unit) = world.get_mut::<Unit>(entity) {
        if unit.state != state {
            debug!(unit = %unit.name, from = ?unit.state, to = ?state, "State change");
            unit.state = state;
        }
    }
}

fn go_idle(world: &mut World, entity: Entity, reason: &str) {
    debug!(?entity, reason, "Going idle");
    stop_after_current_step(world, entity);
    transition(world, entity, UnitState::Idle);
}

/// Drop the rest of the route and any pending request. A step already under
/// way still finishes so the unit ends on a whole cell.
fn stop_after_current_step(world: &mut World, entity: Entity) {
    let Ok(mut entity_mut) = world.get_entity_mut(entity) else {
        return;
    };
    entity_mut.remove::<Destination>();
    if let Some(mut route) = entity_mut.get_mut::<Route>() {
        route.steps.clear();
    }
}

/// Standing on `cell` with nothing left to walk.
fn has_arrived(world: &World, entity: Entity, cell: Cell) -> bool {
    cell_of(world, entity) == Some(cell)
        && world.get::<Destination>(entity).is_none()
        && world.get::<Route>(entity).map_or(true, Route::is_empty)
        && !world.get::<Movement>(entity).is_some_and(|m| m.in_transit)
}

fn request_destination(world: &mut World, entity: Entity, cell: Cell) {
    if let Ok(mut entity_mut) = world.get_entity_mut(entity) {
        entity_mut.insert(Destination(cell));
    }
}

fn pause_movement(world: &mut World, entity: Entity) {
    let now = world.resource::<SimClock>().elapsed;
    if let Some(mut movement) = world.get_mut::<Movement>(entity) {
        movement.pause(now);
    }
}

fn resume_movement(world: &mut World, entity: Entity) {
    let now = world.resource::<SimClock>().elapsed;
    if let Some(mut movement) = world.get_mut::<Movement>(entity) {
        movement.resume(now);
    }
}

fn claim_site<S: Site>(world: &mut World, site: Entity, unit: Entity) -> bool {
    world
        .get_mut::<S>(site)
        .is_some_and(|mut s| s.claim_mut().try_claim(unit))
}

fn release_site<S: Site>(world: &mut World, site: Entity, unit: Entity) -> bool {
    world
        .get_mut::<S>(site)
        .is_some_and(|mut s| s.claim_mut().release(unit))
}

/// Nearest site by Manhattan distance among those passing `accept`.
/// Equal distances resolve to the lowest entity.
fn nearest_site<S: Site>(
    world: &mut World,
    from: Cell,
    accept: impl Fn(Entity, &S) -> bool,
) -> Option<(Entity, Cell)> {
    world
        .query::<(Entity, &Position, &S)>()
        .iter(world)
        .filter(|(entity, _, site)| accept(*entity, *site))
        .min_by_key(|(entity, pos, _)| (from.manhattan(pos.cell), *entity))
        .map(|(entity, pos, _)| (entity, pos.cell))
}

/// [`nearest_site`] restricted to sites `unit` has not failed to reach.
fn nearest_untried<S: Site>(
    world: &mut World,
    unit: Entity,
    from: Cell,
    accept: impl Fn(&S) -> bool,
) -> Option<(Entity, Cell)> {
    let tried = world
        .get::<Unit>(unit)
        .map(|u| u.unreachable.clone())
        .unwrap_or_default();
    nearest_site::<S>(world, from, |site, s| !tried.contains(&site) && accept(s))
}

/// Prefer a free mine; with none free, queue up at the nearest busy one.
fn pick_mine(world: &mut World, unit: Entity, from: Cell) -> Option<(Entity, Cell)> {
    nearest_untried::<Mine>(world, unit, from, |m| !m.claim().is_busy())
        .or_else(|| nearest_untried::<Mine>(world, unit, from, |_| true))
}

/// Clear the unreachable list. Returns whether there was anything to forget,
/// so a unit with every site marked can try them all again.
fn forget_unreachable(world: &mut World, entity: Entity) -> bool {
    world.get_mut::<Unit>(entity).is_some_and(|mut unit| {
        let had_any = !unit.unreachable.is_empty();
        unit.unreachable.clear();
        had_any
    })
}

fn start_returning_to_base(world: &mut World, entity: Entity) -> bool {
    let Some(from) = cell_of(world, entity) else {
        return false;
    };
    let found = nearest_untried::<Base>(world, entity, from, |_| true).or_else(|| {
        forget_unreachable(world, entity)
            .then(|| nearest_untried::<Base>(world, entity, from, |_| true))
            .flatten()
    });
    let Some((base, base_cell)) = found else {
        return false;
    };
    set_target(world, entity, base, base_cell);
    transition(world, entity, UnitState::ReturningToBase);
    request_destination(world, entity, base_cell);
    true
}

/// First free cell next to `site_cell`, checked up, right, down, left.
///
/// A cell is free when it is walkable, no other unit stands on it and no
/// other waiting unit has picked it as its spot.
pub fn free_adjacent_cell(world: &mut World, entity: Entity, site_cell: Cell) -> Option<Cell> {
    let others: Vec<(Cell, Option<Cell>)> = world
        .query::<(Entity, &Position, &Unit)>()
        .iter(world)
        .filter(|(other, _, _)| *other != entity)
        .map(|(_, pos, unit)| {
            let spot = unit.state.is_waiting().then_some(unit.target_cell);
            (pos.cell, spot)
        })
        .collect();

    let grid = world.get_resource::<WorldGrid>()?;
    site_cell.cardinal_neighbors().find(|&cell| {
        grid.is_walkable(cell)
            && !others
                .iter()
                .any(|&(at, spot)| at == cell || spot == Some(cell))
    })
}
