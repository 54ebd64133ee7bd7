//! Map Documents
//!
//! On-disk JSON map format and its validation. A validated map hands the
//! raw tile buffer to the collision engine and spawn geometry to the
//! round controller. Map loading happens only at round/map boundaries,
//! never during simulation.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::vec2::Vec2;
use crate::game::collision::{
    CollisionMap, TILE_AIR, TILE_DEATH, TILE_NOHOOK, TILE_SIZE, TILE_SOLID, TILE_TELE_ONE,
    TILE_TELE_TWO,
};

/// Error raised while loading or validating a map document.
#[derive(Debug, Error)]
pub enum MapError {
    /// The map file could not be read.
    #[error("failed to read map file: {0}")]
    Io(#[from] std::io::Error),

    /// The map document is not valid JSON.
    #[error("failed to parse map document: {0}")]
    Parse(#[from] serde_json::Error),

    /// Zero-sized grids are unusable.
    #[error("map dimensions must be nonzero (got {width}x{height})")]
    EmptyGrid {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
    },

    /// The tile buffer does not match the declared dimensions.
    #[error("tile buffer holds {actual} tiles, expected {expected}")]
    TileCountMismatch {
        /// width * height.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },

    /// A spawn point lies outside the world.
    #[error("spawn point ({x}, {y}) lies outside the map")]
    SpawnOutOfBounds {
        /// World x of the offending spawn.
        x: f32,
        /// World y of the offending spawn.
        y: f32,
    },
}

/// Which players a spawn point admits.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnKind {
    /// Open to everyone.
    Neutral,
    /// Red team only.
    Red,
    /// Blue team only.
    Blue,
}

/// A spawn point in world coordinates.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// World x.
    pub x: f32,
    /// World y.
    pub y: f32,
    /// Admission kind.
    #[serde(default = "SpawnPoint::default_kind")]
    pub kind: SpawnKind,
}

impl SpawnPoint {
    fn default_kind() -> SpawnKind {
        SpawnKind::Neutral
    }

    /// Spawn position as a vector.
    #[inline]
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A flag stand position in world coordinates.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FlagStand {
    /// World x.
    pub x: f32,
    /// World y.
    pub y: f32,
}

impl FlagStand {
    /// Stand position as a vector.
    #[inline]
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A parsed map document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameMap {
    /// Display name of the map.
    pub name: String,
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Row-major raw tile indices, `width * height` entries.
    pub tiles: Vec<u8>,
    /// Spawn points.
    #[serde(default)]
    pub spawns: Vec<SpawnPoint>,
    /// Red flag stands, in preference order.
    #[serde(default)]
    pub red_stands: Vec<FlagStand>,
    /// Blue flag stands, in preference order.
    #[serde(default)]
    pub blue_stands: Vec<FlagStand>,
}

impl GameMap {
    /// Load and validate a map document from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a map document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, MapError> {
        let map: GameMap = serde_json::from_str(text)?;
        map.validate()?;
        Ok(map)
    }

    /// World-space width of the map.
    #[inline]
    pub fn world_width(&self) -> f32 {
        self.width as f32 * TILE_SIZE
    }

    /// World-space height of the map.
    #[inline]
    pub fn world_height(&self) -> f32 {
        self.height as f32 * TILE_SIZE
    }

    /// Build the collision map for this document.
    pub fn collision(&self) -> CollisionMap {
        CollisionMap::new(self.width, self.height, self.tiles.clone())
    }

    /// Spawn points of a given kind.
    pub fn spawns_of(&self, kind: SpawnKind) -> impl Iterator<Item = &SpawnPoint> {
        self.spawns.iter().filter(move |s| s.kind == kind)
    }

    fn validate(&self) -> Result<(), MapError> {
        if self.width == 0 || self.height == 0 {
            return Err(MapError::EmptyGrid {
                width: self.width,
                height: self.height,
            });
        }

        let expected = (self.width as usize) * (self.height as usize);
        if self.tiles.len() != expected {
            return Err(MapError::TileCountMismatch {
                expected,
                actual: self.tiles.len(),
            });
        }

        for spawn in &self.spawns {
            if spawn.x < 0.0
                || spawn.y < 0.0
                || spawn.x >= self.world_width()
                || spawn.y >= self.world_height()
            {
                return Err(MapError::SpawnOutOfBounds {
                    x: spawn.x,
                    y: spawn.y,
                });
            }
        }

        Ok(())
    }

    /// Built-in demo arena for tests and the headless demo binary.
    ///
    /// A bordered 40x25 arena with a center platform, a hook-proof pillar,
    /// a death pit, one teleporter pair, and team spawns at both ends.
    pub fn demo_arena() -> Self {
        let (width, height) = (40u32, 25u32);
        let mut tiles = vec![TILE_AIR; (width * height) as usize];

        let mut set = |x: u32, y: u32, raw: u8| {
            tiles[(y * width + x) as usize] = raw;
        };

        // Border ring
        for x in 0..width {
            set(x, 0, TILE_SOLID);
            set(x, height - 1, TILE_SOLID);
        }
        for y in 0..height {
            set(0, y, TILE_SOLID);
            set(width - 1, y, TILE_SOLID);
        }

        // Death pit in the middle of the floor
        for x in 17..23 {
            set(x, height - 2, TILE_DEATH);
        }

        // Center platform above the pit
        for x in 15..25 {
            set(x, 16, TILE_SOLID);
        }

        // Hook-proof pillar on the platform
        for y in 12..16 {
            set(20, y, TILE_NOHOOK);
        }

        // Teleporter pair near the upper corners
        set(3, 5, TILE_TELE_ONE);
        set(36, 5, TILE_TELE_TWO);

        let spawn = |x: u32, y: u32, kind: SpawnKind| SpawnPoint {
            x: (x as f32 + 0.5) * TILE_SIZE,
            y: (y as f32 + 0.5) * TILE_SIZE,
            kind,
        };

        Self {
            name: "demo_arena".to_string(),
            width,
            height,
            tiles,
            spawns: vec![
                spawn(3, height - 3, SpawnKind::Red),
                spawn(5, height - 3, SpawnKind::Red),
                spawn(34, height - 3, SpawnKind::Blue),
                spawn(36, height - 3, SpawnKind::Blue),
                spawn(20, 15, SpawnKind::Neutral),
            ],
            red_stands: vec![FlagStand {
                x: 2.5 * TILE_SIZE,
                y: (height as f32 - 2.5) * TILE_SIZE,
            }],
            blue_stands: vec![FlagStand {
                x: (width as f32 - 2.5) * TILE_SIZE,
                y: (height as f32 - 2.5) * TILE_SIZE,
            }],
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::collision::TeleAnchor;

    #[test]
    fn test_parse_minimal_map() {
        let text = r#"{
            "name": "tiny",
            "width": 2,
            "height": 2,
            "tiles": [0, 1, 1, 0],
            "spawns": [{"x": 16.0, "y": 16.0, "kind": "neutral"}]
        }"#;
        let map = GameMap::from_json(text).unwrap();
        assert_eq!(map.name, "tiny");
        assert_eq!(map.tiles.len(), 4);
        assert_eq!(map.spawns.len(), 1);
    }

    #[test]
    fn test_tile_count_mismatch_rejected() {
        let text = r#"{"name": "bad", "width": 3, "height": 3, "tiles": [0, 1]}"#;
        let err = GameMap::from_json(text).unwrap_err();
        assert!(matches!(
            err,
            MapError::TileCountMismatch {
                expected: 9,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let text = r#"{"name": "bad", "width": 0, "height": 3, "tiles": []}"#;
        assert!(matches!(
            GameMap::from_json(text).unwrap_err(),
            MapError::EmptyGrid { .. }
        ));
    }

    #[test]
    fn test_spawn_out_of_bounds_rejected() {
        let text = r#"{
            "name": "bad",
            "width": 2,
            "height": 2,
            "tiles": [0, 0, 0, 0],
            "spawns": [{"x": 999.0, "y": 16.0}]
        }"#;
        assert!(matches!(
            GameMap::from_json(text).unwrap_err(),
            MapError::SpawnOutOfBounds { .. }
        ));
    }

    #[test]
    fn test_spawn_kind_defaults_to_neutral() {
        let text = r#"{
            "name": "m",
            "width": 2,
            "height": 2,
            "tiles": [0, 0, 0, 0],
            "spawns": [{"x": 16.0, "y": 16.0}]
        }"#;
        let map = GameMap::from_json(text).unwrap();
        assert_eq!(map.spawns[0].kind, SpawnKind::Neutral);
    }

    #[test]
    fn test_demo_arena_is_valid() {
        let map = GameMap::demo_arena();
        assert!(map.validate().is_ok());

        let collision = map.collision();
        assert_eq!(collision.width(), 40);
        assert_eq!(collision.height(), 25);

        // Border is solid, interior air
        assert!(collision.is_solid(16.0, 16.0));
        assert!(!collision.is_solid(48.0, 48.0));

        // The teleporter pair is registered
        assert_eq!(collision.tele_anchor(0), Some(TeleAnchor { x: 3, y: 5 }));
        assert_eq!(collision.tele_anchor(1), Some(TeleAnchor { x: 36, y: 5 }));
    }

    #[test]
    fn test_load_from_disk() {
        let path = std::env::temp_dir().join("tilefront_map_roundtrip.json");
        let map = GameMap::demo_arena();
        fs::write(&path, serde_json::to_string(&map).unwrap()).unwrap();

        let loaded = GameMap::load(&path).unwrap();
        assert_eq!(loaded.name, map.name);
        assert_eq!(loaded.tiles, map.tiles);
        fs::remove_file(&path).ok();
    }
}
