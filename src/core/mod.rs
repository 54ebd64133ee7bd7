//! Core spatial primitives.
//!
//! Shared by the collision engine and the game layer. Everything here is
//! plain value math with no game rules attached.

pub mod vec2;

// Re-export core types
pub use vec2::Vec2;
