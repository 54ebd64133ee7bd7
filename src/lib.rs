//! # TileFront Game Server
//!
//! Authoritative simulation for TileFront, a tile-grid 2D shooter.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TILEFRONT SERVER                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Spatial primitives                      │
//! │  └── vec2.rs      - 2D world-space vector                   │
//! │                                                             │
//! │  game/            - Game logic (deterministic)              │
//! │  ├── collision.rs - Tile-grid collision engine              │
//! │  ├── map.rs       - Map documents and validation            │
//! │  ├── state.rs     - Players, teams, world state             │
//! │  ├── entity.rs    - Characters, projectiles, flags          │
//! │  ├── tick.rs      - Per-tick simulation pipeline            │
//! │  ├── round.rs     - Round lifecycle and team balance        │
//! │  ├── mute.rs      - Chat moderation                         │
//! │  └── events.rs    - Simulation events                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The collision engine is the heart of the crate: the tile grid is the
//! ground truth for every spatial query, and all entity movement runs
//! through its ray caster and swept point/box movers. The grid is
//! immutable between map loads, so queries are lock-free and safe to
//! issue from anywhere in the simulation.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;

// Re-export commonly used types
pub use crate::core::vec2::Vec2;
pub use game::collision::{classify, CollisionFlags, CollisionMap, RayHit, TILE_SIZE};
pub use game::map::GameMap;
pub use game::state::{GameState, PlayerId, Team};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 50;
