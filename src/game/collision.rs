//! Tile-Grid Collision Engine
//!
//! The ground truth for all spatial queries: point solidity, line-of-sight
//! ray casts, and swept movement of points and axis-aligned boxes against
//! the tile grid. The grid is immutable after construction; every query is
//! O(1) and allocation-free so it can run for every entity on every tick.

use crate::core::vec2::Vec2;

/// World units per tile cell edge.
pub const TILE_SIZE: f32 = 32.0;

/// Sampling stride for ray casts, in world units.
///
/// A ~1 unit stride can step over sub-unit solid features, which is an
/// accepted trade-off at 32-unit tile granularity.
pub const RAY_STEP: f32 = 1.0;

/// Raw tile indices above this value are decorative and never collide.
pub const RESERVED_TILE_LIMIT: u8 = 128;

/// Box sweeps below this travel distance are skipped entirely.
const MIN_BOX_TRAVEL: f32 = 0.00001;

// =============================================================================
// RAW TILE INDICES
// =============================================================================

/// Empty space.
pub const TILE_AIR: u8 = 0;
/// Plain solid wall.
pub const TILE_SOLID: u8 = 1;
/// Instantly lethal.
pub const TILE_DEATH: u8 = 2;
/// Solid wall that grapple hooks cannot attach to.
pub const TILE_NOHOOK: u8 = 3;
/// Teleporter anchors, four distinct kinds.
pub const TILE_TELE_ONE: u8 = 16;
/// Second teleporter kind.
pub const TILE_TELE_TWO: u8 = 17;
/// Third teleporter kind.
pub const TILE_TELE_THREE: u8 = 18;
/// Fourth teleporter kind.
pub const TILE_TELE_FOUR: u8 = 19;
/// Lethal after prolonged contact.
pub const TILE_SLOWDEATH: u8 = 20;
/// Solid zone where flags may not be carried.
pub const TILE_NOFLAG: u8 = 21;
/// Solid health-restoring zone marker.
pub const TILE_HEALTHZONE: u8 = 22;
/// Solid armor-restoring zone marker.
pub const TILE_ARMORZONE: u8 = 23;

// =============================================================================
// COLLISION FLAGS
// =============================================================================

/// Collision semantics of a cell.
///
/// Derived on demand from the cell's raw tile index via [`classify`];
/// never stored per cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CollisionFlags(u8);

impl CollisionFlags {
    /// No collision semantics.
    pub const NONE: Self = Self(0);
    /// Blocks movement and rays.
    pub const SOLID: Self = Self(1 << 0);
    /// Kills entities on contact.
    pub const DEATH: Self = Self(1 << 1);
    /// Rejects grapple hooks. Always paired with SOLID.
    pub const NOHOOK: Self = Self(1 << 2);
    /// Kills entities after prolonged contact.
    pub const SLOWDEATH: Self = Self(1 << 3);
    /// First teleporter anchor kind.
    pub const TELE_ONE: Self = Self(1 << 4);
    /// Second teleporter anchor kind.
    pub const TELE_TWO: Self = Self(1 << 5);
    /// Third teleporter anchor kind.
    pub const TELE_THREE: Self = Self(1 << 6);
    /// Fourth teleporter anchor kind.
    pub const TELE_FOUR: Self = Self(1 << 7);

    /// Raw bit representation.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if no flags are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Teleporter slot index (0-3) if exactly a teleporter flag is set.
    pub fn tele_slot(self) -> Option<usize> {
        if self.contains(Self::TELE_ONE) {
            Some(0)
        } else if self.contains(Self::TELE_TWO) {
            Some(1)
        } else if self.contains(Self::TELE_THREE) {
            Some(2)
        } else if self.contains(Self::TELE_FOUR) {
            Some(3)
        } else {
            None
        }
    }
}

impl std::ops::BitOr for CollisionFlags {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for CollisionFlags {
    type Output = Self;
    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// Classify a raw tile index into its collision flags.
///
/// Pure and total: every index maps to a flag set, unrecognized and
/// decorative indices (above [`RESERVED_TILE_LIMIT`]) map to no flags.
/// Queried fresh on every lookup; there is no per-cell flag cache.
#[inline]
pub fn classify(raw: u8) -> CollisionFlags {
    match raw {
        TILE_DEATH => CollisionFlags::DEATH,
        TILE_SOLID => CollisionFlags::SOLID,
        TILE_NOHOOK => CollisionFlags::SOLID | CollisionFlags::NOHOOK,
        TILE_TELE_ONE => CollisionFlags::TELE_ONE,
        TILE_TELE_TWO => CollisionFlags::TELE_TWO,
        TILE_TELE_THREE => CollisionFlags::TELE_THREE,
        TILE_TELE_FOUR => CollisionFlags::TELE_FOUR,
        TILE_SLOWDEATH => CollisionFlags::SLOWDEATH,
        TILE_NOFLAG | TILE_HEALTHZONE | TILE_ARMORZONE => CollisionFlags::SOLID,
        _ => CollisionFlags::NONE,
    }
}

// =============================================================================
// TELEPORTER ANCHORS
// =============================================================================

/// Number of distinct teleporter anchor kinds.
pub const TELE_SLOTS: usize = 4;

/// Grid coordinates of a teleporter anchor tile.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TeleAnchor {
    /// Cell x coordinate.
    pub x: i32,
    /// Cell y coordinate.
    pub y: i32,
}

// =============================================================================
// COLLISION MAP
// =============================================================================

/// Result of a ray cast through the grid.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    /// Flags at the first solid sample, or NONE for a clear segment.
    pub flags: CollisionFlags,
    /// First solid sample point, or the segment end if clear.
    pub collision: Vec2,
    /// Sample point immediately preceding the hit, or the segment end.
    pub before_collision: Vec2,
}

impl RayHit {
    /// True if the segment reached its end without hitting a solid cell.
    #[inline]
    pub fn is_clear(&self) -> bool {
        self.flags.is_empty()
    }
}

/// The tile grid and the spatial queries over it.
///
/// Owns an immutable raw tile buffer. Built once per map load; read-only
/// for the lifetime of the loaded map, so shared queries need no locking.
#[derive(Clone, Debug)]
pub struct CollisionMap {
    width: u32,
    height: u32,
    tiles: Vec<u8>,
    tele_anchors: [Option<TeleAnchor>; TELE_SLOTS],
}

impl CollisionMap {
    /// Build a collision map from a raw tile buffer.
    ///
    /// Scans the buffer once to record the first occurrence of each
    /// teleporter anchor kind (later occurrences are ignored).
    ///
    /// # Panics
    ///
    /// Panics on zero dimensions or a buffer whose length does not match
    /// `width * height`. These are programmer errors; running a tick loop
    /// against a malformed grid would corrupt everything downstream.
    pub fn new(width: u32, height: u32, tiles: Vec<u8>) -> Self {
        assert!(width > 0 && height > 0, "collision map dimensions must be nonzero");
        assert_eq!(
            tiles.len(),
            (width as usize) * (height as usize),
            "tile buffer length must equal width * height"
        );

        let mut tele_anchors = [None; TELE_SLOTS];
        for (i, &raw) in tiles.iter().enumerate() {
            if raw > RESERVED_TILE_LIMIT {
                continue;
            }

            let slot = match raw {
                TILE_TELE_ONE => 0,
                TILE_TELE_TWO => 1,
                TILE_TELE_THREE => 2,
                TILE_TELE_FOUR => 3,
                _ => continue,
            };

            // First write wins; later anchors of the same kind are inert.
            if tele_anchors[slot].is_none() {
                tele_anchors[slot] = Some(TeleAnchor {
                    x: (i as u32 % width) as i32,
                    y: (i as u32 / width) as i32,
                });
            }
        }

        Self {
            width,
            height,
            tiles,
            tele_anchors,
        }
    }

    /// Grid width in cells.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Teleporter anchor for a slot (0-3), if the map contains one.
    #[inline]
    pub fn tele_anchor(&self, slot: usize) -> Option<TeleAnchor> {
        self.tele_anchors.get(slot).copied().flatten()
    }

    /// World-space center of a cell.
    #[inline]
    pub fn cell_center(cell_x: i32, cell_y: i32) -> Vec2 {
        Vec2::new(
            (cell_x as f32 + 0.5) * TILE_SIZE,
            (cell_y as f32 + 0.5) * TILE_SIZE,
        )
    }

    /// Resolve world coordinates to a grid cell.
    ///
    /// Each axis is clamped into the grid independently, so positions far
    /// outside the map resolve to the nearest edge cell instead of
    /// erroring. Off-map entities still get a sane answer.
    #[inline]
    pub fn cell_of(&self, x: f32, y: f32) -> (u32, u32) {
        let cx = ((x / TILE_SIZE) as i32).clamp(0, self.width as i32 - 1) as u32;
        let cy = ((y / TILE_SIZE) as i32).clamp(0, self.height as i32 - 1) as u32;
        (cx, cy)
    }

    /// Collision flags at a world position.
    #[inline]
    pub fn flags_at(&self, x: f32, y: f32) -> CollisionFlags {
        let (cx, cy) = self.cell_of(x, y);
        classify(self.tiles[(cy * self.width + cx) as usize])
    }

    /// True if the cell at a world position is solid.
    #[inline]
    pub fn is_solid(&self, x: f32, y: f32) -> bool {
        self.flags_at(x, y).contains(CollisionFlags::SOLID)
    }

    /// True if the cell under a world point is solid.
    #[inline]
    pub fn check_point(&self, pos: Vec2) -> bool {
        self.is_solid(pos.x, pos.y)
    }

    /// March a line segment through the grid in [`RAY_STEP`] strides.
    ///
    /// Stops at the first solid sample and reports the flags there, the
    /// sample itself, and the last free sample before it. A clear segment
    /// reports no flags with both points at the segment end.
    pub fn intersect_line(&self, pos0: Vec2, pos1: Vec2) -> RayHit {
        let distance = pos0.distance(pos1);
        let end = (distance / RAY_STEP) as i32 + 1;
        let mut last = pos0;

        for i in 0..end {
            let a = if distance > 0.0 {
                i as f32 * RAY_STEP / distance
            } else {
                0.0
            };
            let pos = pos0.lerp(pos1, a);
            if self.check_point(pos) {
                return RayHit {
                    flags: self.flags_at(pos.x, pos.y),
                    collision: pos,
                    before_collision: last,
                };
            }
            last = pos;
        }

        RayHit {
            flags: CollisionFlags::NONE,
            collision: pos1,
            before_collision: pos1,
        }
    }

    /// Integrate a point by one velocity step with elastic bounce.
    ///
    /// Tests the destination first; if blocked, each axis-projected
    /// destination is tested independently and blocked axes are reflected
    /// scaled by `elasticity`. If the combined destination is blocked but
    /// neither axis alone is, both axes reflect. The position only
    /// advances on a clear destination; a blocked point pauses this step
    /// and retries next tick with its reflected velocity.
    ///
    /// Returns the number of axes that bounced.
    pub fn move_point(&self, pos: &mut Vec2, vel: &mut Vec2, elasticity: f32) -> u32 {
        let mut bounces = 0;

        if self.check_point(*pos + *vel) {
            let mut affected = 0;
            if self.check_point(Vec2::new(pos.x + vel.x, pos.y)) {
                vel.x *= -elasticity;
                bounces += 1;
                affected += 1;
            }

            if self.check_point(Vec2::new(pos.x, pos.y + vel.y)) {
                vel.y *= -elasticity;
                bounces += 1;
                affected += 1;
            }

            if affected == 0 {
                vel.x *= -elasticity;
                vel.y *= -elasticity;
            }
        } else {
            *pos += *vel;
        }

        bounces
    }

    /// True if any of the four half-extent corners of a box is solid.
    ///
    /// Corner sampling can miss a solid cell lying strictly between two
    /// tested corners; accepted at this tile granularity.
    pub fn test_box(&self, pos: Vec2, size: Vec2) -> bool {
        let half = size * 0.5;
        self.is_solid(pos.x - half.x, pos.y - half.y)
            || self.is_solid(pos.x + half.x, pos.y - half.y)
            || self.is_solid(pos.x - half.x, pos.y + half.y)
            || self.is_solid(pos.x + half.x, pos.y + half.y)
    }

    /// Sweep an axis-aligned box along its velocity with elastic response.
    ///
    /// Travel is sub-stepped one world unit at a time; each sub-step that
    /// lands the box in a wall is resolved per axis by snapping the
    /// blocked axis back and reflecting its velocity. When only the
    /// combined move is blocked (a real corner case) both axes snap and
    /// reflect. Unlike [`move_point`], the box adopts the corrected
    /// candidate every sub-step, so it never fully stalls.
    pub fn move_box(&self, pos: &mut Vec2, vel: &mut Vec2, size: Vec2, elasticity: f32) {
        let distance = vel.length();
        if distance <= MIN_BOX_TRAVEL {
            return;
        }

        let max = distance as i32;
        let fraction = 1.0 / (max + 1) as f32;
        let mut cur = *pos;
        let mut v = *vel;

        for _ in 0..=max {
            let mut new_pos = cur + v * fraction;

            if self.test_box(new_pos, size) {
                let mut hits = 0;

                if self.test_box(Vec2::new(cur.x, new_pos.y), size) {
                    new_pos.y = cur.y;
                    v.y *= -elasticity;
                    hits += 1;
                }

                if self.test_box(Vec2::new(new_pos.x, cur.y), size) {
                    new_pos.x = cur.x;
                    v.x *= -elasticity;
                    hits += 1;
                }

                // Neither axis test collided on its own: a real corner case.
                if hits == 0 {
                    new_pos.y = cur.y;
                    v.y *= -elasticity;
                    new_pos.x = cur.x;
                    v.x *= -elasticity;
                }
            }

            cur = new_pos;
        }

        *pos = cur;
        *vel = v;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// 10x10 all-air grid with the given cells set to a raw index.
    fn grid_with(cells: &[(u32, u32, u8)]) -> CollisionMap {
        let (w, h) = (10u32, 10u32);
        let mut tiles = vec![TILE_AIR; (w * h) as usize];
        for &(x, y, raw) in cells {
            tiles[(y * w + x) as usize] = raw;
        }
        CollisionMap::new(w, h, tiles)
    }

    #[test]
    fn test_classify_table() {
        assert_eq!(classify(TILE_AIR), CollisionFlags::NONE);
        assert_eq!(classify(TILE_SOLID), CollisionFlags::SOLID);
        assert_eq!(classify(TILE_DEATH), CollisionFlags::DEATH);
        assert_eq!(
            classify(TILE_NOHOOK),
            CollisionFlags::SOLID | CollisionFlags::NOHOOK
        );
        assert_eq!(classify(TILE_TELE_ONE), CollisionFlags::TELE_ONE);
        assert_eq!(classify(TILE_TELE_TWO), CollisionFlags::TELE_TWO);
        assert_eq!(classify(TILE_TELE_THREE), CollisionFlags::TELE_THREE);
        assert_eq!(classify(TILE_TELE_FOUR), CollisionFlags::TELE_FOUR);
        assert_eq!(classify(TILE_SLOWDEATH), CollisionFlags::SLOWDEATH);
        assert_eq!(classify(TILE_NOFLAG), CollisionFlags::SOLID);
        assert_eq!(classify(TILE_HEALTHZONE), CollisionFlags::SOLID);
        assert_eq!(classify(TILE_ARMORZONE), CollisionFlags::SOLID);
    }

    #[test]
    fn test_classify_nohook_implies_solid() {
        assert!(classify(TILE_NOHOOK).contains(CollisionFlags::SOLID));
    }

    #[test]
    fn test_classify_reserved_range() {
        for raw in 129..=255u16 {
            assert_eq!(classify(raw as u8), CollisionFlags::NONE);
        }
    }

    #[test]
    fn test_tele_anchor_first_write_wins() {
        // Two TELE_ONE tiles; only the first in row-major order counts.
        let map = grid_with(&[(7, 2, TILE_TELE_ONE), (3, 5, TILE_TELE_ONE)]);
        assert_eq!(map.tele_anchor(0), Some(TeleAnchor { x: 7, y: 2 }));
        assert_eq!(map.tele_anchor(1), None);
    }

    #[test]
    fn test_tele_anchor_all_slots() {
        let map = grid_with(&[
            (1, 1, TILE_TELE_ONE),
            (2, 1, TILE_TELE_TWO),
            (3, 1, TILE_TELE_THREE),
            (4, 1, TILE_TELE_FOUR),
        ]);
        for slot in 0..TELE_SLOTS {
            assert_eq!(
                map.tele_anchor(slot),
                Some(TeleAnchor {
                    x: slot as i32 + 1,
                    y: 1
                })
            );
        }
        assert_eq!(map.tele_anchor(TELE_SLOTS), None);
    }

    #[test]
    fn test_cell_of_clamps_to_edges() {
        let map = grid_with(&[(0, 0, TILE_SOLID)]);

        assert_eq!(map.cell_of(-1000.0, -1000.0), (0, 0));
        assert_eq!(map.cell_of(100000.0, 100000.0), (9, 9));

        // Far outside resolves to the same cell as the corner itself.
        assert_eq!(map.flags_at(-1000.0, -1000.0), map.flags_at(0.0, 0.0));
        assert!(map.is_solid(-1000.0, -1000.0));
    }

    #[test]
    fn test_is_solid_agrees_with_flags() {
        let map = grid_with(&[(2, 2, TILE_SOLID), (3, 3, TILE_DEATH)]);
        for (x, y) in [(80.0, 80.0), (112.0, 112.0), (16.0, 16.0)] {
            assert_eq!(
                map.is_solid(x, y),
                map.flags_at(x, y).contains(CollisionFlags::SOLID)
            );
        }
        // Death without solid does not block.
        assert!(!map.is_solid(112.0, 112.0));
    }

    #[test]
    #[should_panic]
    fn test_zero_dimensions_rejected() {
        CollisionMap::new(0, 10, Vec::new());
    }

    #[test]
    #[should_panic]
    fn test_buffer_length_mismatch_rejected() {
        CollisionMap::new(10, 10, vec![TILE_AIR; 99]);
    }

    // =========================================================================
    // Ray caster
    // =========================================================================

    #[test]
    fn test_intersect_line_clear() {
        let map = grid_with(&[]);
        let hit = map.intersect_line(Vec2::new(0.0, 0.0), Vec2::new(320.0, 0.0));
        assert!(hit.is_clear());
        assert_eq!(hit.collision, Vec2::new(320.0, 0.0));
        assert_eq!(hit.before_collision, Vec2::new(320.0, 0.0));
    }

    #[test]
    fn test_intersect_line_hits_midpoint_cell() {
        // Solid cell (5, 0) spans x in [160, 192).
        let map = grid_with(&[(5, 0, TILE_SOLID)]);
        let hit = map.intersect_line(Vec2::new(0.0, 16.0), Vec2::new(320.0, 16.0));
        assert!(hit.flags.contains(CollisionFlags::SOLID));
        assert!(hit.collision.x >= 160.0 && hit.collision.x < 192.0);
        assert!(hit.before_collision.x < 160.0);
    }

    #[test]
    fn test_intersect_line_reports_tile_flags() {
        let map = grid_with(&[(5, 0, TILE_NOHOOK)]);
        let hit = map.intersect_line(Vec2::new(0.0, 16.0), Vec2::new(320.0, 16.0));
        assert!(hit.flags.contains(CollisionFlags::SOLID));
        assert!(hit.flags.contains(CollisionFlags::NOHOOK));
    }

    #[test]
    fn test_intersect_line_degenerate_segment() {
        let map = grid_with(&[(1, 1, TILE_SOLID)]);

        let free = Vec2::new(16.0, 16.0);
        let hit = map.intersect_line(free, free);
        assert!(hit.is_clear());
        assert_eq!(hit.collision, free);

        let inside = Vec2::new(48.0, 48.0);
        let hit = map.intersect_line(inside, inside);
        assert!(hit.flags.contains(CollisionFlags::SOLID));
        assert_eq!(hit.collision, inside);
        assert_eq!(hit.before_collision, inside);
    }

    // =========================================================================
    // Point mover
    // =========================================================================

    #[test]
    fn test_move_point_free_flight() {
        let map = grid_with(&[]);
        let mut pos = Vec2::new(50.0, 50.0);
        let mut vel = Vec2::new(4.0, -3.0);
        let bounces = map.move_point(&mut pos, &mut vel, 1.0);
        assert_eq!(bounces, 0);
        assert_eq!(pos, Vec2::new(54.0, 47.0));
        assert_eq!(vel, Vec2::new(4.0, -3.0));
    }

    #[test]
    fn test_move_point_x_axis_bounce() {
        // Wall cell (2, 1) spans x in [64, 96).
        let map = grid_with(&[(2, 1, TILE_SOLID)]);
        let mut pos = Vec2::new(60.0, 48.0);
        let mut vel = Vec2::new(5.0, 0.0);
        let bounces = map.move_point(&mut pos, &mut vel, 1.0);
        assert_eq!(bounces, 1);
        assert_eq!(pos, Vec2::new(60.0, 48.0));
        assert_eq!(vel, Vec2::new(-5.0, 0.0));
    }

    #[test]
    fn test_move_point_elasticity_scales_bounce() {
        let map = grid_with(&[(2, 1, TILE_SOLID)]);
        let mut pos = Vec2::new(60.0, 48.0);
        let mut vel = Vec2::new(5.0, 0.0);
        map.move_point(&mut pos, &mut vel, 0.5);
        assert_eq!(vel, Vec2::new(-2.5, 0.0));
    }

    #[test]
    fn test_move_point_corner_case_reflects_both() {
        // Only the diagonal cell (2, 2) is solid; each axis alone is clear.
        let map = grid_with(&[(2, 2, TILE_SOLID)]);
        let mut pos = Vec2::new(60.0, 60.0);
        let mut vel = Vec2::new(5.0, 5.0);
        let bounces = map.move_point(&mut pos, &mut vel, 1.0);
        assert_eq!(bounces, 0);
        assert_eq!(pos, Vec2::new(60.0, 60.0));
        assert_eq!(vel, Vec2::new(-5.0, -5.0));
    }

    // =========================================================================
    // Box mover
    // =========================================================================

    #[test]
    fn test_test_box_corners() {
        let map = grid_with(&[(2, 2, TILE_SOLID)]);
        // Box whose bottom-right corner reaches into the solid cell.
        assert!(map.test_box(Vec2::new(52.0, 52.0), Vec2::new(28.0, 28.0)));
        // Same box well clear of it.
        assert!(!map.test_box(Vec2::new(40.0, 40.0), Vec2::new(28.0, 28.0)));
    }

    #[test]
    fn test_test_box_corner_sampling_gap() {
        // A solid cell strictly between the sampled corners goes unnoticed;
        // known approximation of the corner-sampled box test.
        let map = grid_with(&[(2, 1, TILE_SOLID)]);
        assert!(!map.test_box(Vec2::new(80.0, 48.0), Vec2::new(96.0, 28.0)));
    }

    #[test]
    fn test_move_box_stops_at_wall() {
        // Wall column at cell x = 3: solid from x = 96 on.
        let map = grid_with(&[(3, 0, TILE_SOLID), (3, 1, TILE_SOLID), (3, 2, TILE_SOLID)]);
        let size = Vec2::new(28.0, 28.0);
        let mut pos = Vec2::new(50.0, 48.0);
        let mut vel = Vec2::new(100.0, 0.0);
        map.move_box(&mut pos, &mut vel, size, 0.0);

        assert_eq!(vel.x, 0.0);
        assert_eq!(vel.y, 0.0);
        // Right edge ends at or just before the wall face.
        assert!(pos.x + size.x * 0.5 <= 96.0);
        assert!(pos.x + size.x * 0.5 > 90.0);
        assert_eq!(pos.y, 48.0);
    }

    #[test]
    fn test_move_box_reflects_with_elasticity() {
        let map = grid_with(&[(3, 0, TILE_SOLID), (3, 1, TILE_SOLID), (3, 2, TILE_SOLID)]);
        let mut pos = Vec2::new(70.0, 48.0);
        let mut vel = Vec2::new(20.0, 0.0);
        map.move_box(&mut pos, &mut vel, Vec2::new(28.0, 28.0), 1.0);
        // Fully elastic: speed preserved, direction reversed.
        assert_eq!(vel.x, -20.0);
    }

    #[test]
    fn test_move_box_corner_case_keeps_advancing() {
        // Only cell (2, 2) solid: the diagonal candidate is blocked while
        // both axis-isolated candidates are clear.
        let map = grid_with(&[(2, 2, TILE_SOLID)]);
        let mut pos = Vec2::new(48.0, 48.0);
        let mut vel = Vec2::new(5.0, 5.0);
        map.move_box(&mut pos, &mut vel, Vec2::new(28.0, 28.0), 1.0);

        // Both axes reflected at the corner, and the box kept moving with
        // the reflected velocity instead of stalling on the spot.
        assert_eq!(vel, Vec2::new(-5.0, -5.0));
        assert!(pos.x < 48.0);
        assert!(pos.y < 48.0);
    }

    #[test]
    fn test_move_box_degenerate_velocity() {
        let map = grid_with(&[(2, 2, TILE_SOLID)]);
        let mut pos = Vec2::new(48.0, 48.0);
        let mut vel = Vec2::new(0.0, 0.000001);
        map.move_box(&mut pos, &mut vel, Vec2::new(28.0, 28.0), 0.0);
        assert_eq!(pos, Vec2::new(48.0, 48.0));
        assert_eq!(vel, Vec2::new(0.0, 0.000001));
    }

    #[test]
    fn test_intersect_line_random_segments() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let map = grid_with(&[(4, 4, TILE_SOLID), (7, 2, TILE_NOHOOK)]);

        for _ in 0..200 {
            let p0 = Vec2::new(rng.gen_range(-400.0..720.0), rng.gen_range(-400.0..720.0));
            let p1 = Vec2::new(rng.gen_range(-400.0..720.0), rng.gen_range(-400.0..720.0));
            let hit = map.intersect_line(p0, p1);
            if hit.is_clear() {
                assert_eq!(hit.collision, p1);
                assert_eq!(hit.before_collision, p1);
            } else {
                assert!(map.is_solid(hit.collision.x, hit.collision.y));
                // A ray that starts inside a wall reports itself as the
                // last free point; otherwise that point was sampled clear.
                if hit.before_collision != hit.collision {
                    assert!(!map.is_solid(hit.before_collision.x, hit.before_collision.y));
                }
            }
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    proptest! {
        #[test]
        fn prop_classify_is_pure(raw: u8) {
            prop_assert_eq!(classify(raw), classify(raw));
        }

        #[test]
        fn prop_decorative_indices_never_collide(raw in 129u8..=255) {
            prop_assert_eq!(classify(raw), CollisionFlags::NONE);
        }

        #[test]
        fn prop_cell_of_stays_in_bounds(x in -1e6f32..1e6, y in -1e6f32..1e6) {
            let map = grid_with(&[(4, 4, TILE_SOLID)]);
            let (cx, cy) = map.cell_of(x, y);
            prop_assert!(cx < map.width());
            prop_assert!(cy < map.height());
        }

        #[test]
        fn prop_is_solid_matches_flags(x in -1e4f32..1e4, y in -1e4f32..1e4) {
            let map = grid_with(&[(4, 4, TILE_SOLID), (5, 5, TILE_DEATH)]);
            prop_assert_eq!(
                map.is_solid(x, y),
                map.flags_at(x, y).contains(CollisionFlags::SOLID)
            );
        }
    }
}
