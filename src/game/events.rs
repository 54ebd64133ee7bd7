//! Game Events
//!
//! Events generated during simulation, collected per tick for logging
//! and for the surrounding server layer.

use serde::{Deserialize, Serialize};

use crate::core::vec2::Vec2;
use crate::game::state::{PlayerId, Team};

/// Why a character died.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeathCause {
    /// Grenade explosion.
    Grenade,
    /// Laser beam.
    Laser,
    /// Touched a death tile.
    DeathTile,
    /// Lingered on a slow-death tile.
    SlowDeath,
    /// Killed by the game itself (team switch, round reset). Never scored.
    World,
}

/// Game event data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum GameEventData {
    /// A character died.
    CharacterDied {
        /// Who died.
        victim: PlayerId,
        /// Who gets the credit, if anyone.
        killer: Option<PlayerId>,
        /// What killed them.
        cause: DeathCause,
    },

    /// A character traversed a teleporter.
    CharacterTeleported {
        /// Who teleported.
        player: PlayerId,
        /// Anchor slot entered.
        from_slot: usize,
        /// Anchor slot exited at.
        to_slot: usize,
        /// Exit position.
        position: Vec2,
    },

    /// A character picked up the enemy flag.
    FlagGrabbed {
        /// The carrier.
        player: PlayerId,
        /// Which team's flag.
        flag_team: Team,
    },

    /// A carried flag was dropped.
    FlagDropped {
        /// The former carrier.
        player: PlayerId,
        /// Which team's flag.
        flag_team: Team,
    },

    /// A flag returned to its stand.
    FlagReturned {
        /// Which team's flag.
        flag_team: Team,
    },

    /// The enemy flag was brought home.
    FlagCaptured {
        /// The capturing player.
        player: PlayerId,
        /// Which team's flag was captured.
        flag_team: Team,
    },

    /// A new round began.
    RoundStarted {
        /// Zero-based round number.
        round: u32,
    },

    /// The round ended.
    RoundEnded {
        /// Red team score at the end.
        red_score: i32,
        /// Blue team score at the end.
        blue_score: i32,
    },

    /// The win condition tied; next point decides.
    SuddenDeath,

    /// The balancer moved players between teams.
    TeamsBalanced {
        /// How many players were moved.
        moved: u32,
    },

    /// A chat message was rejected.
    ChatBlocked {
        /// Whose message.
        player: PlayerId,
        /// Human-readable reason.
        reason: String,
    },
}

/// A game event with the tick it occurred on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when the event occurred.
    pub tick: u64,
    /// Event data.
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Shorthand for a death event.
    pub fn character_died(
        tick: u64,
        victim: PlayerId,
        killer: Option<PlayerId>,
        cause: DeathCause,
    ) -> Self {
        Self::new(
            tick,
            GameEventData::CharacterDied {
                victim,
                killer,
                cause,
            },
        )
    }
}
