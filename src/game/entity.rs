//! World Entities
//!
//! Characters, projectiles, and flags. Each entity owns its position and
//! velocity and integrates itself against the collision map once per
//! tick; the collision engine never retains entity state.

use serde::{Deserialize, Serialize};

use crate::core::vec2::{closest_point_on_segment, Vec2};
use crate::game::collision::{CollisionFlags, CollisionMap};
use crate::game::events::DeathCause;
use crate::game::state::{PlayerId, Team};

/// Character bounding box edge, world units.
pub const CHARACTER_SIZE: f32 = 28.0;
/// Flag bounding box edge, world units.
pub const FLAG_SIZE: f32 = 14.0;
/// Downward acceleration per tick.
pub const GRAVITY: f32 = 0.5;
/// Grenade area-kill radius.
pub const GRENADE_RADIUS: f32 = 48.0;
/// Maximum laser beam length.
pub const LASER_RANGE: f32 = 800.0;

const MOVE_SPEED: f32 = 10.0;
const GROUND_FRICTION: f32 = 0.8;
const JUMP_IMPULSE: f32 = 13.2;
const GROUND_PROBE: f32 = 5.0;
const HOOK_RANGE: f32 = 380.0;
const HOOK_PULL: f32 = 0.7;
const SLOWDEATH_CONTACT_TICKS: u32 = 150;
const GRENADE_SPEED: f32 = 18.0;
const GRENADE_GRAVITY: f32 = 0.3;
const GRENADE_ELASTICITY: f32 = 0.75;
const GRENADE_LIFETIME: u32 = 100;
const GRENADE_MAX_BOUNCES: u32 = 4;
const LASER_HIT_DISTANCE: f32 = 20.0;
const FLAG_RESPAWN_TICKS: u64 = 1500;

/// Teleporter slots are paired: one exits at two and back, three at four.
#[inline]
fn tele_partner(slot: usize) -> usize {
    slot ^ 1
}

// =============================================================================
// INPUT
// =============================================================================

/// Weapons a character can fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weapon {
    /// Bouncing area-damage projectile.
    Grenade,
    /// Instant hitscan beam.
    Laser,
}

/// A fire request within an input frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FireInput {
    /// Which weapon.
    pub weapon: Weapon,
    /// Aim direction (normalized by the consumer).
    pub direction: Vec2,
}

/// One tick worth of control input for a character.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct CharacterInput {
    /// Horizontal intent: -1 left, 0 idle, 1 right.
    pub direction: i8,
    /// Jump requested.
    pub jump: bool,
    /// Grapple aim direction while the hook button is held.
    pub hook: Option<Vec2>,
    /// Fire request, if any.
    pub fire: Option<FireInput>,
}

impl CharacterInput {
    /// True if the frame requests nothing at all.
    pub fn is_idle(&self) -> bool {
        self.direction == 0 && !self.jump && self.hook.is_none() && self.fire.is_none()
    }
}

// =============================================================================
// CHARACTER
// =============================================================================

/// Grapple hook state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum HookState {
    /// Not deployed.
    Idle,
    /// Latched onto a wall at this point.
    Attached(Vec2),
}

/// A teleporter traversal that happened during a tick.
#[derive(Clone, Copy, Debug)]
pub struct Teleport {
    /// Anchor slot entered.
    pub from_slot: usize,
    /// Anchor slot exited at.
    pub to_slot: usize,
    /// Exit position.
    pub position: Vec2,
}

/// What happened to a character during its tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharacterOutcome {
    /// The character died to terrain this tick.
    pub death: Option<DeathCause>,
    /// The character traversed a teleporter this tick.
    pub teleported: Option<Teleport>,
}

/// A player's in-world avatar.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Character {
    /// Owning player.
    pub id: PlayerId,
    /// Team at spawn time.
    pub team: Team,
    /// Body center position.
    pub pos: Vec2,
    /// Velocity, world units per tick.
    pub vel: Vec2,
    /// Grapple hook.
    pub hook: HookState,
    slowdeath_contact: u32,
    in_tele: bool,
}

impl Character {
    /// Spawn a character at a position.
    pub fn spawn(id: PlayerId, team: Team, pos: Vec2) -> Self {
        Self {
            id,
            team,
            pos,
            vel: Vec2::ZERO,
            hook: HookState::Idle,
            slowdeath_contact: 0,
            in_tele: false,
        }
    }

    /// True if standing on solid ground.
    pub fn is_grounded(&self, collision: &CollisionMap) -> bool {
        let half = CHARACTER_SIZE * 0.5;
        collision.is_solid(self.pos.x - half, self.pos.y + half + GROUND_PROBE)
            || collision.is_solid(self.pos.x + half, self.pos.y + half + GROUND_PROBE)
    }

    /// Resolve a grapple shot. NOHOOK walls reject the hook outright.
    fn fire_hook(&self, collision: &CollisionMap, dir: Vec2) -> HookState {
        let dir = dir.normalize();
        if dir == Vec2::ZERO {
            return HookState::Idle;
        }

        let hit = collision.intersect_line(self.pos, self.pos + dir * HOOK_RANGE);
        if hit.is_clear() || hit.flags.contains(CollisionFlags::NOHOOK) {
            HookState::Idle
        } else {
            HookState::Attached(hit.collision)
        }
    }

    /// Run one simulation tick: controls, grapple, gravity, swept
    /// movement, then tile semantics under the body center.
    pub fn tick(&mut self, collision: &CollisionMap, input: &CharacterInput) -> CharacterOutcome {
        let mut outcome = CharacterOutcome::default();
        let grounded = self.is_grounded(collision);

        if input.direction != 0 {
            self.vel.x = input.direction as f32 * MOVE_SPEED;
        } else if grounded {
            self.vel.x *= GROUND_FRICTION;
        }

        if input.jump && grounded {
            self.vel.y = -JUMP_IMPULSE;
        }

        match input.hook {
            Some(dir) => {
                if self.hook == HookState::Idle {
                    self.hook = self.fire_hook(collision, dir);
                }
            }
            None => self.hook = HookState::Idle,
        }
        if let HookState::Attached(anchor) = self.hook {
            self.vel += (anchor - self.pos).normalize() * HOOK_PULL;
        }

        self.vel.y += GRAVITY;

        collision.move_box(
            &mut self.pos,
            &mut self.vel,
            Vec2::new(CHARACTER_SIZE, CHARACTER_SIZE),
            0.0,
        );

        let flags = collision.flags_at(self.pos.x, self.pos.y);

        if flags.contains(CollisionFlags::DEATH) {
            outcome.death = Some(DeathCause::DeathTile);
            return outcome;
        }

        if flags.contains(CollisionFlags::SLOWDEATH) {
            self.slowdeath_contact += 1;
            if self.slowdeath_contact >= SLOWDEATH_CONTACT_TICKS {
                outcome.death = Some(DeathCause::SlowDeath);
                return outcome;
            }
        } else {
            self.slowdeath_contact = 0;
        }

        if let Some(slot) = flags.tele_slot() {
            if !self.in_tele {
                let exit = tele_partner(slot);
                if let Some(anchor) = collision.tele_anchor(exit) {
                    self.pos = CollisionMap::cell_center(anchor.x, anchor.y);
                    self.hook = HookState::Idle;
                    // Stays set while standing on the exit tile, so the
                    // pair does not ping-pong the character back.
                    self.in_tele = true;
                    outcome.teleported = Some(Teleport {
                        from_slot: slot,
                        to_slot: exit,
                        position: self.pos,
                    });
                }
            }
        } else {
            self.in_tele = false;
        }

        outcome
    }
}

// =============================================================================
// PROJECTILES
// =============================================================================

/// A live grenade in flight.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Projectile {
    /// Player who fired it.
    pub owner: PlayerId,
    /// Owner's team at fire time.
    pub team: Team,
    /// Position.
    pub pos: Vec2,
    /// Velocity, world units per tick.
    pub vel: Vec2,
    /// Remaining ticks until the fuse runs out.
    pub lifetime: u32,
    /// Accumulated wall bounces.
    pub bounces: u32,
}

impl Projectile {
    /// Fire a grenade from a position along a direction.
    pub fn grenade(owner: PlayerId, team: Team, pos: Vec2, dir: Vec2) -> Self {
        Self {
            owner,
            team,
            pos,
            vel: dir.normalize() * GRENADE_SPEED,
            lifetime: GRENADE_LIFETIME,
            bounces: 0,
        }
    }

    /// Integrate one tick. Returns true when the grenade detonates.
    pub fn tick(&mut self, collision: &CollisionMap) -> bool {
        self.vel.y += GRENADE_GRAVITY;
        self.bounces += collision.move_point(&mut self.pos, &mut self.vel, GRENADE_ELASTICITY);
        self.lifetime = self.lifetime.saturating_sub(1);
        self.lifetime == 0 || self.bounces > GRENADE_MAX_BOUNCES
    }
}

/// A resolved laser beam.
#[derive(Clone, Copy, Debug)]
pub struct LaserTrace {
    /// Muzzle position.
    pub from: Vec2,
    /// Impact point, or maximum range if nothing was hit.
    pub to: Vec2,
    /// Flags at the impact cell.
    pub flags: CollisionFlags,
}

impl LaserTrace {
    /// True if the beam passes close enough to a body center to hit it.
    pub fn hits(&self, target: Vec2) -> bool {
        closest_point_on_segment(target, self.from, self.to).distance(target) <= LASER_HIT_DISTANCE
    }
}

/// Resolve a laser shot instantaneously against the grid.
pub fn fire_laser(collision: &CollisionMap, from: Vec2, dir: Vec2) -> LaserTrace {
    let dir = dir.normalize();
    if dir == Vec2::ZERO {
        return LaserTrace {
            from,
            to: from,
            flags: CollisionFlags::NONE,
        };
    }

    let hit = collision.intersect_line(from, from + dir * LASER_RANGE);
    LaserTrace {
        from,
        to: hit.collision,
        flags: hit.flags,
    }
}

// =============================================================================
// FLAGS
// =============================================================================

/// A team flag: carried, at a stand, or loose in the world.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flag {
    /// Owning team.
    pub team: Team,
    /// Position (tracks the carrier while carried).
    pub pos: Vec2,
    /// Velocity while loose.
    pub vel: Vec2,
    /// Stand positions; a reset picks the nearest one.
    pub stands: Vec<Vec2>,
    /// Current carrier.
    pub carrier: Option<PlayerId>,
    /// True while resting at a stand.
    pub at_stand: bool,
    /// Tick the flag was last dropped.
    pub drop_tick: u64,
    /// Tick the flag was last grabbed.
    pub grab_tick: u64,
    in_tele: bool,
}

impl Flag {
    /// Create a flag resting at its first stand.
    ///
    /// # Panics
    ///
    /// Panics if `stands` is empty; a flag without a stand has nowhere
    /// to exist.
    pub fn new(team: Team, stands: Vec<Vec2>) -> Self {
        assert!(!stands.is_empty(), "flag needs at least one stand");
        let pos = stands[0];
        Self {
            team,
            pos,
            vel: Vec2::ZERO,
            stands,
            carrier: None,
            at_stand: true,
            drop_tick: 0,
            grab_tick: 0,
            in_tele: false,
        }
    }

    /// The stand closest to the flag's current position.
    pub fn nearest_stand(&self) -> Vec2 {
        let mut best = self.stands[0];
        for &stand in &self.stands[1..] {
            if self.pos.distance_squared(stand) < self.pos.distance_squared(best) {
                best = stand;
            }
        }
        best
    }

    /// Send the flag home to its nearest stand.
    pub fn reset(&mut self) {
        self.pos = self.nearest_stand();
        self.vel = Vec2::ZERO;
        self.carrier = None;
        self.at_stand = true;
        self.in_tele = false;
    }

    /// Attach the flag to a carrier.
    pub fn grab(&mut self, player: PlayerId, tick: u64) {
        self.carrier = Some(player);
        self.at_stand = false;
        self.grab_tick = tick;
    }

    /// Detach the flag from its carrier, leaving it loose in the world.
    pub fn release(&mut self, tick: u64) {
        self.carrier = None;
        self.vel = Vec2::ZERO;
        self.drop_tick = tick;
    }

    /// Physics for a loose flag. Returns true if it went home this tick.
    pub fn tick(&mut self, collision: &CollisionMap, now: u64) -> bool {
        if self.carrier.is_some() || self.at_stand {
            return false;
        }

        if now >= self.drop_tick + FLAG_RESPAWN_TICKS {
            self.reset();
            return true;
        }

        self.vel.y += GRAVITY;
        collision.move_box(
            &mut self.pos,
            &mut self.vel,
            Vec2::new(FLAG_SIZE, FLAG_SIZE),
            0.0,
        );

        let flags = collision.flags_at(self.pos.x, self.pos.y);
        if flags.contains(CollisionFlags::DEATH) {
            self.reset();
            return true;
        }

        if let Some(slot) = flags.tele_slot() {
            if !self.in_tele {
                let exit = tele_partner(slot);
                if let Some(anchor) = collision.tele_anchor(exit) {
                    self.pos = CollisionMap::cell_center(anchor.x, anchor.y);
                    self.vel = Vec2::ZERO;
                    self.in_tele = true;
                }
            }
        } else {
            self.in_tele = false;
        }

        false
    }
}

// =============================================================================
// TESTS
// =============================================================================
