//! Game Logic Module
//!
//! All simulation code. Single-threaded and deterministic: given the
//! same state and inputs, a tick always produces the same result.
//!
//! ## Module Structure
//!
//! - `collision`: tile-grid collision engine (queries, rays, movers)
//! - `map`: map documents, validation, demo arena
//! - `state`: players, teams, the mutable world
//! - `entity`: characters, projectiles, flags
//! - `tick`: per-tick simulation pipeline
//! - `round`: round lifecycle, balancing, spawn placement
//! - `mute`: chat moderation
//! - `events`: events emitted during simulation

pub mod collision;
pub mod entity;
pub mod events;
pub mod map;
pub mod mute;
pub mod round;
pub mod state;
pub mod tick;

// Re-export key types
pub use collision::{CollisionFlags, CollisionMap};
pub use events::GameEvent;
pub use map::GameMap;
pub use state::{GameState, Player, PlayerId, Team};
pub use tick::TickResult;
