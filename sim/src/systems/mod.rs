//! ECS Systems for the gathering simulation.
//!
//! Systems contain the game logic that operates on components.
//!
//! ## Tick Order
//!
//! The schedule is a single chain, run once per fixed update:
//! - `unit_ai_system` - Steps every unit's state machine (exclusive)
//! - `pathfinding_system` - Turns destination requests into routes
//! - `movement_system` - Walks routes in simulated time
//! - `spawn_queue_system` - Applies queued spawn requests (exclusive)
//! - `label_system::<T>` - Refreshes label text per role

pub mod labels;
pub mod movement;
pub mod spawn;
pub mod unit_ai;

pub use labels::*;
pub use movement::*;
pub use spawn::*;
pub use unit_ai::*;
