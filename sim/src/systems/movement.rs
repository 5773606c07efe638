//! Movement system - walks entities along their routes in simulated time.

use crate::components::*;
use crate::config::{SimClock, SimConfig};
use bevy_ecs::prelude::*;

/// System that advances every routed entity by one tick.
///
/// An entity is either between steps (pops the next cell and starts a
/// transit) or in transit (interpolates its pixel offset until the step
/// takes `seconds_per_cell`, then snaps onto the target cell). A paused
/// entity is left untouched. An exhausted route is removed.
pub fn movement_system(
    mut commands: Commands,
    clock: Res<SimClock>,
    config: Res<SimConfig>,
    mut query: Query<(
        Entity,
        &mut Position,
        &mut Route,
        &mut Movement,
        Option<&mut Facing>,
    )>,
) {
    let now = clock.elapsed;

    for (entity, mut pos, mut route, mut movement, facing) in query.iter_mut() {
        if movement.is_paused() {
            continue;
        }

        if !movement.in_transit {
            let Some(next) = route.steps.pop_front() else {
                commands.entity(entity).remove::<Route>();
                continue;
            };
            movement.target = next;
            movement.transit_started = now;
            movement.in_transit = true;
            movement.progress = 0.0;
            if let (Some(mut facing), Some(dir)) = (facing, Facing::toward(pos.cell, next)) {
                *facing = dir;
            }
            continue;
        }

        let progress = if movement.seconds_per_cell > 0.0 {
            (now - movement.transit_started) / movement.seconds_per_cell
        } else {
            1.0
        };

        if progress >= 1.0 {
            pos.cell = movement.target;
            pos.offset_x = 0.0;
            pos.offset_y = 0.0;
            movement.in_transit = false;
            movement.progress = 0.0;
        } else {
            let progress = progress.max(0.0) as f32;
            let dx = (movement.target.x - pos.cell.x) as f32 * progress;
            let dy = (movement.target.y - pos.cell.y) as f32 * progress;
            let (ox, oy) = config.iso_offset(dx, dy);
            pos.offset_x = ox;
            pos.offset_y = oy;
            movement.progress = progress;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(route: &[Cell]) -> (World, Schedule, Entity) {
        let mut world = World::new();
        world.insert_resource(SimClock::default());
        world.insert_resource(SimConfig::default());

        let entity = world
            .spawn((
                Position::new(0, 0),
                Route::new(route.iter().copied()),
                Movement::new(1.0),
                Facing::default(),
            ))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(movement_system);
        (world, schedule, entity)
    }

    fn run_at(world: &mut World, schedule: &mut Schedule, now: f64) {
        world.resource_mut::<SimClock>().elapsed = now;
        schedule.run(world);
    }

    #[test]
    fn test_step_interpolates_then_snaps() {
        let (mut world, mut schedule, entity) = setup(&[Cell::new(1, 0)]);

        run_at(&mut world, &mut schedule, 0.0);
        let movement = world.get::<Movement>(entity).unwrap();
        assert!(movement.in_transit);
        assert_eq!(movement.target, Cell::new(1, 0));
        assert_eq!(world.get::<Position>(entity).unwrap().offset_x, 0.0);

        run_at(&mut world, &mut schedule, 0.5);
        let pos = world.get::<Position>(entity).unwrap();
        assert_eq!(pos.cell, Cell::new(0, 0));
        assert!((pos.offset_x - 32.0).abs() < 1e-4);
        assert!((pos.offset_y - 16.0).abs() < 1e-4);

        run_at(&mut world, &mut schedule, 1.0);
        let pos = world.get::<Position>(entity).unwrap();
        assert_eq!(pos.cell, Cell::new(1, 0));
        assert_eq!((pos.offset_x, pos.offset_y), (0.0, 0.0));

        // Empty route is dropped on the next tick.
        run_at(&mut world, &mut schedule, 1.1);
        assert!(world.get::<Route>(entity).is_none());
    }

    #[test]
    fn test_facing_follows_direction() {
        let (mut world, mut schedule, entity) = setup(&[Cell::new(0, 1)]);
        run_at(&mut world, &mut schedule, 0.0);
        assert_eq!(world.get::<Facing>(entity), Some(&Facing::Down));
    }

    #[test]
    fn test_arrival_invariant_to_pause() {
        let (mut world, mut schedule, entity) = setup(&[Cell::new(1, 0)]);

        run_at(&mut world, &mut schedule, 0.0);
        run_at(&mut world, &mut schedule, 0.5);
        world.get_mut::<Movement>(entity).unwrap().pause(0.5);

        for now in [1.0, 2.0, 3.0] {
            run_at(&mut world, &mut schedule, now);
            assert_eq!(world.get::<Position>(entity).unwrap().cell, Cell::new(0, 0));
        }

        world.get_mut::<Movement>(entity).unwrap().resume(3.5);

        run_at(&mut world, &mut schedule, 3.9);
        assert_eq!(world.get::<Position>(entity).unwrap().cell, Cell::new(0, 0));

        run_at(&mut world, &mut schedule, 4.0);
        assert_eq!(world.get::<Position>(entity).unwrap().cell, Cell::new(1, 0));
    }

    #[test]
    fn test_walks_whole_route() {
        let route = [Cell::new(1, 0), Cell::new(2, 0), Cell::new(2, 1)];
        let (mut world, mut schedule, entity) = setup(&route);

        let mut now = 0.0;
        for _ in 0..40 {
            run_at(&mut world, &mut schedule, now);
            now += 0.25;
        }

        assert_eq!(world.get::<Position>(entity).unwrap().cell, Cell::new(2, 1));
        assert!(world.get::<Route>(entity).is_none());
        assert!(!world.get::<Movement>(entity).unwrap().in_transit);
    }
}
