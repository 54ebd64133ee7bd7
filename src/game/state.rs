//! Game State Definitions
//!
//! Players, teams, and the mutable per-round world. Uses BTreeMap keyed
//! by player id so every per-tick iteration is deterministically ordered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::entity::{Character, Flag, Projectile};
use crate::game::events::GameEvent;
use crate::game::map::GameMap;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random id.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s).ok().map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }
}

// =============================================================================
// TEAMS
// =============================================================================

/// Team membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Team {
    /// Red team (team 0 in free-for-all).
    Red = 0,
    /// Blue team.
    Blue = 1,
    /// Not playing.
    Spectators = 2,
}

impl Team {
    /// True for Red and Blue.
    #[inline]
    pub fn is_playing(self) -> bool {
        self != Team::Spectators
    }

    /// The opposing team. Spectators oppose nobody.
    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
            Team::Spectators => Team::Spectators,
        }
    }

    /// Index into per-team arrays. Only valid for playing teams.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Human-readable team name.
    pub fn name(self, teamplay: bool) -> &'static str {
        match self {
            Team::Red if teamplay => "red team",
            Team::Blue if teamplay => "blue team",
            Team::Red | Team::Blue => "game",
            Team::Spectators => "spectators",
        }
    }
}

// =============================================================================
// PLAYERS
// =============================================================================

/// Per-round statistics of a player.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Characters killed.
    pub kills: u32,
    /// Own deaths.
    pub deaths: u32,
    /// Flags captured.
    pub captures: u32,
}

/// A connected player.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Unique id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Network address, used as the mute key.
    pub addr: String,
    /// Team membership.
    pub team: Team,
    /// Round score. Signed: suicides and teamkills subtract.
    pub score: i32,
    /// Round statistics.
    pub stats: PlayerStats,
    /// Last tick the player did anything (for inactivity handling).
    pub last_action_tick: u64,
    /// Tick the current scoring period began (for balance scoring).
    pub score_start_tick: u64,
    /// Earliest tick a new character may spawn, if one is pending.
    pub respawn_at: Option<u64>,
}

impl Player {
    /// Create a new player on a team.
    pub fn new(id: PlayerId, name: String, addr: String, team: Team) -> Self {
        Self {
            id,
            name,
            addr,
            team,
            score: 0,
            stats: PlayerStats::default(),
            last_action_tick: 0,
            score_start_tick: 0,
            respawn_at: Some(0),
        }
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// The mutable world: players, live entities, team scores, event queue.
///
/// The collision map and map document live outside this struct; they are
/// immutable for the lifetime of the loaded map and shared by reference.
#[derive(Clone, Debug)]
pub struct GameState {
    /// Simulation tick counter.
    pub tick: u64,
    /// Connected players, deterministically ordered.
    pub players: BTreeMap<PlayerId, Player>,
    /// Live characters of playing players.
    pub characters: BTreeMap<PlayerId, Character>,
    /// Live projectiles.
    pub projectiles: Vec<Projectile>,
    /// Flags, one per team that has stands on the map.
    pub flags: Vec<Flag>,
    /// Team scores, indexed by [`Team::index`].
    pub teamscore: [i32; 2],
    /// World is frozen (game over screen, admin pause).
    pub paused: bool,
    /// A full world reset is pending (round start).
    pub reset_requested: bool,
    events: Vec<GameEvent>,
}

impl GameState {
    /// Create the state for a freshly loaded map.
    pub fn new(map: &GameMap) -> Self {
        let mut flags = Vec::new();
        if !map.red_stands.is_empty() {
            flags.push(Flag::new(
                Team::Red,
                map.red_stands.iter().map(|s| s.pos()).collect(),
            ));
        }
        if !map.blue_stands.is_empty() {
            flags.push(Flag::new(
                Team::Blue,
                map.blue_stands.iter().map(|s| s.pos()).collect(),
            ));
        }

        Self {
            tick: 0,
            players: BTreeMap::new(),
            characters: BTreeMap::new(),
            projectiles: Vec::new(),
            flags,
            teamscore: [0, 0],
            paused: false,
            reset_requested: true,
            events: Vec::new(),
        }
    }

    /// Add a player. Replaces any previous entry with the same id.
    pub fn add_player(&mut self, id: PlayerId, name: &str, addr: &str, team: Team) {
        let mut player = Player::new(id, name.to_string(), addr.to_string(), team);
        player.last_action_tick = self.tick;
        player.score_start_tick = self.tick;
        player.respawn_at = if team.is_playing() {
            Some(self.tick)
        } else {
            None
        };
        self.players.insert(id, player);
    }

    /// Remove a player and their character.
    pub fn remove_player(&mut self, id: &PlayerId) {
        self.players.remove(id);
        self.characters.remove(id);
    }

    /// Number of players on each playing team.
    pub fn team_counts(&self) -> [usize; 2] {
        let mut counts = [0, 0];
        for player in self.players.values() {
            if player.team.is_playing() {
                counts[player.team.index()] += 1;
            }
        }
        counts
    }

    /// Queue an event for this tick.
    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Drain the queued events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_helpers() {
        assert!(Team::Red.is_playing());
        assert!(Team::Blue.is_playing());
        assert!(!Team::Spectators.is_playing());
        assert_eq!(Team::Red.opponent(), Team::Blue);
        assert_eq!(Team::Blue.opponent(), Team::Red);
        assert_eq!(Team::Red.index(), 0);
        assert_eq!(Team::Blue.index(), 1);
    }

    #[test]
    fn test_team_names() {
        assert_eq!(Team::Red.name(true), "red team");
        assert_eq!(Team::Blue.name(true), "blue team");
        assert_eq!(Team::Red.name(false), "game");
        assert_eq!(Team::Spectators.name(true), "spectators");
    }

    #[test]
    fn test_player_id_uuid_roundtrip() {
        let id = PlayerId::random();
        let parsed = PlayerId::from_uuid_str(&id.to_uuid_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_add_and_count_players() {
        let map = GameMap::demo_arena();
        let mut state = GameState::new(&map);

        state.add_player(PlayerId::new([1; 16]), "alice", "10.0.0.1", Team::Red);
        state.add_player(PlayerId::new([2; 16]), "bob", "10.0.0.2", Team::Blue);
        state.add_player(PlayerId::new([3; 16]), "carol", "10.0.0.3", Team::Blue);
        state.add_player(PlayerId::new([4; 16]), "dave", "10.0.0.4", Team::Spectators);

        assert_eq!(state.team_counts(), [1, 2]);

        // Spectators never get a pending respawn
        assert_eq!(
            state.players[&PlayerId::new([4; 16])].respawn_at,
            None
        );

        state.remove_player(&PlayerId::new([2; 16]));
        assert_eq!(state.team_counts(), [1, 1]);
    }

    #[test]
    fn test_flags_built_from_stands() {
        let map = GameMap::demo_arena();
        let state = GameState::new(&map);
        assert_eq!(state.flags.len(), 2);
        assert_eq!(state.flags[0].team, Team::Red);
        assert_eq!(state.flags[1].team, Team::Blue);
        assert!(state.flags.iter().all(|f| f.at_stand));
    }

    #[test]
    fn test_event_queue_drains() {
        let map = GameMap::demo_arena();
        let mut state = GameState::new(&map);
        state.push_event(crate::game::events::GameEvent::new(
            0,
            crate::game::events::GameEventData::SuddenDeath,
        ));
        assert_eq!(state.take_events().len(), 1);
        assert!(state.take_events().is_empty());
    }
}
