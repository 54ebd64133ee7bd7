//! Simulation Tick
//!
//! The per-tick pipeline: respawns, character physics, weapons,
//! projectiles, flags, then the round controller. All iteration runs in
//! BTreeMap key order so a tick is a deterministic function of state and
//! inputs.

use std::collections::BTreeMap;

use crate::game::collision::CollisionMap;
use crate::game::entity::{
    fire_laser, Character, CharacterInput, Projectile, Weapon, CHARACTER_SIZE, FLAG_SIZE,
    GRENADE_RADIUS,
};
use crate::game::events::{DeathCause, GameEvent, GameEventData};
use crate::game::map::GameMap;
use crate::game::round::RoundController;
use crate::game::state::{GameState, PlayerId, Team};
use crate::TICK_RATE;

/// A character touching a loose flag within this range interacts with it.
const FLAG_GRAB_DISTANCE: f32 = CHARACTER_SIZE * 0.5 + FLAG_SIZE;

/// Points for capturing the enemy flag.
const CAPTURE_SCORE: i32 = 5;
/// Team points for a capture.
const CAPTURE_TEAM_SCORE: i32 = 100;
/// Points for returning the own flag.
const RETURN_SCORE: i32 = 1;

/// Per-player inputs for one tick.
pub type TickInputs = BTreeMap<PlayerId, CharacterInput>;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick.
    pub events: Vec<GameEvent>,
}

/// Run one simulation tick.
pub fn tick(
    state: &mut GameState,
    collision: &CollisionMap,
    map: &GameMap,
    round: &mut RoundController,
    inputs: &TickInputs,
) -> TickResult {
    // A pending world reset replaces every live entity before anything
    // moves.
    if state.reset_requested {
        reset_world(state);
    }

    if state.paused {
        round.tick(state);
        return TickResult {
            events: state.take_events(),
        };
    }

    state.tick += 1;

    // 1. Bring pending players into the world
    respawn_players(state, collision, map, round);

    // 2. Character physics and terrain semantics
    let mut kills = simulate_characters(state, collision, inputs);

    // 3. Weapons fired this tick (lasers resolve instantly)
    kills.extend(process_fire_inputs(state, collision, round, inputs));

    // 4. Projectiles in flight
    kills.extend(simulate_projectiles(state, collision, round));

    // 5. Apply deaths
    for (victim, killer, cause) in kills {
        kill_character(state, round, victim, killer, cause);
    }

    // 6. Flags: physics, grabs, returns, captures
    simulate_flags(state, collision);

    // 7. Round state machine
    round.tick(state);

    TickResult {
        events: state.take_events(),
    }
}

/// Clear live entities and schedule everyone for a fresh spawn.
fn reset_world(state: &mut GameState) {
    state.characters.clear();
    state.projectiles.clear();
    for flag in &mut state.flags {
        flag.reset();
    }

    let respawn_tick = state.tick + (TICK_RATE / 2) as u64;
    for player in state.players.values_mut() {
        player.respawn_at = if player.team.is_playing() {
            Some(respawn_tick)
        } else {
            None
        };
    }

    state.reset_requested = false;
}

fn respawn_players(
    state: &mut GameState,
    collision: &CollisionMap,
    map: &GameMap,
    round: &RoundController,
) {
    let mut pending: Vec<(PlayerId, Team)> = Vec::new();
    for (id, player) in &state.players {
        let due = player.respawn_at.is_some_and(|at| at <= state.tick);
        if due && player.team.is_playing() && !state.characters.contains_key(id) {
            pending.push((*id, player.team));
        }
    }

    for (id, team) in pending {
        // Spawns are evaluated one by one so each new character blocks
        // the point for the next.
        if let Some(pos) = round.can_spawn(&*state, collision, map, team) {
            state.characters.insert(id, Character::spawn(id, team, pos));
            if let Some(player) = state.players.get_mut(&id) {
                player.respawn_at = None;
            }
        }
    }
}

fn simulate_characters(
    state: &mut GameState,
    collision: &CollisionMap,
    inputs: &TickInputs,
) -> Vec<(PlayerId, Option<PlayerId>, DeathCause)> {
    let default_input = CharacterInput::default();
    let now = state.tick;

    let mut kills = Vec::new();
    let mut events: Vec<GameEvent> = Vec::new();
    let mut active: Vec<PlayerId> = Vec::new();

    for (id, character) in state.characters.iter_mut() {
        let input = inputs.get(id).unwrap_or(&default_input);
        if !input.is_idle() {
            active.push(*id);
        }

        let outcome = character.tick(collision, input);

        if let Some(teleport) = outcome.teleported {
            events.push(GameEvent::new(
                now,
                GameEventData::CharacterTeleported {
                    player: *id,
                    from_slot: teleport.from_slot,
                    to_slot: teleport.to_slot,
                    position: teleport.position,
                },
            ));
        }

        if let Some(cause) = outcome.death {
            kills.push((*id, None, cause));
        }
    }

    for event in events {
        state.push_event(event);
    }
    for id in active {
        if let Some(player) = state.players.get_mut(&id) {
            player.last_action_tick = now;
        }
    }

    kills
}

fn process_fire_inputs(
    state: &mut GameState,
    collision: &CollisionMap,
    round: &RoundController,
    inputs: &TickInputs,
) -> Vec<(PlayerId, Option<PlayerId>, DeathCause)> {
    let teamplay = round.config().teamplay;
    let mut grenades: Vec<Projectile> = Vec::new();
    let mut kills = Vec::new();

    for (id, input) in inputs {
        let Some(fire) = input.fire else { continue };
        let Some(shooter) = state.characters.get(id) else {
            continue;
        };

        match fire.weapon {
            Weapon::Grenade => {
                grenades.push(Projectile::grenade(
                    *id,
                    shooter.team,
                    shooter.pos,
                    fire.direction,
                ));
            }
            Weapon::Laser => {
                let trace = fire_laser(collision, shooter.pos, fire.direction);

                // nearest body on the beam takes the hit
                let mut best: Option<(PlayerId, f32)> = None;
                for (victim_id, victim) in &state.characters {
                    if victim_id == id {
                        continue;
                    }
                    if teamplay && victim.team == shooter.team {
                        continue;
                    }
                    if !trace.hits(victim.pos) {
                        continue;
                    }
                    let d = shooter.pos.distance(victim.pos);
                    if best.map_or(true, |(_, bd)| d < bd) {
                        best = Some((*victim_id, d));
                    }
                }
                if let Some((victim_id, _)) = best {
                    kills.push((victim_id, Some(*id), DeathCause::Laser));
                }
            }
        }
    }

    state.projectiles.extend(grenades);
    kills
}

fn simulate_projectiles(
    state: &mut GameState,
    collision: &CollisionMap,
    round: &RoundController,
) -> Vec<(PlayerId, Option<PlayerId>, DeathCause)> {
    let teamplay = round.config().teamplay;

    let mut explosions = Vec::new();
    state.projectiles.retain_mut(|projectile| {
        if projectile.tick(collision) {
            explosions.push((projectile.pos, projectile.owner, projectile.team));
            false
        } else {
            true
        }
    });

    let mut kills = Vec::new();
    for (pos, owner, team) in explosions {
        for (id, character) in &state.characters {
            if character.pos.distance(pos) > GRENADE_RADIUS {
                continue;
            }
            // Self-damage is allowed; teammates are spared in teamplay.
            if *id != owner && teamplay && character.team == team {
                continue;
            }
            kills.push((*id, Some(owner), DeathCause::Grenade));
        }
    }
    kills
}

fn kill_character(
    state: &mut GameState,
    round: &RoundController,
    victim: PlayerId,
    killer: Option<PlayerId>,
    cause: DeathCause,
) {
    // Several kill sources can name the same victim within one tick;
    // only the first one lands.
    let Some(character) = state.characters.remove(&victim) else {
        return;
    };
    let now = state.tick;

    let mut dropped: Vec<Team> = Vec::new();
    for flag in &mut state.flags {
        if flag.carrier == Some(victim) {
            flag.pos = character.pos;
            flag.release(now);
            dropped.push(flag.team);
        }
    }
    for flag_team in dropped {
        state.push_event(GameEvent::new(
            now,
            GameEventData::FlagDropped {
                player: victim,
                flag_team,
            },
        ));
    }

    round.on_character_death(state, victim, killer, cause);

    if let Some(player) = state.players.get_mut(&victim) {
        player.respawn_at = Some(now + (TICK_RATE / 2) as u64);
    }

    state.push_event(GameEvent::character_died(now, victim, killer, cause));
}

fn simulate_flags(state: &mut GameState, collision: &CollisionMap) {
    let now = state.tick;
    let mut events: Vec<GameEvent> = Vec::new();

    // Carried flags track their carrier; loose flags run physics.
    for flag in &mut state.flags {
        if let Some(carrier) = flag.carrier {
            match state.characters.get(&carrier) {
                Some(character) => flag.pos = character.pos,
                None => {
                    flag.release(now);
                    events.push(GameEvent::new(
                        now,
                        GameEventData::FlagDropped {
                            player: carrier,
                            flag_team: flag.team,
                        },
                    ));
                }
            }
        } else if flag.tick(collision, now) {
            events.push(GameEvent::new(
                now,
                GameEventData::FlagReturned {
                    flag_team: flag.team,
                },
            ));
        }
    }

    // Captures: a carrier standing at their own home flag scores.
    let mut captures: Vec<(PlayerId, Team, Team)> = Vec::new();
    for flag in &state.flags {
        let Some(carrier) = flag.carrier else { continue };
        let Some(character) = state.characters.get(&carrier) else {
            continue;
        };
        let home = state.flags.iter().find(|f| f.team == character.team);
        if let Some(home) = home {
            if home.at_stand && character.pos.distance(home.pos) <= FLAG_GRAB_DISTANCE {
                captures.push((carrier, character.team, flag.team));
            }
        }
    }
    for (player, player_team, flag_team) in captures {
        if let Some(p) = state.players.get_mut(&player) {
            p.score += CAPTURE_SCORE;
            p.stats.captures += 1;
        }
        if player_team.is_playing() {
            state.teamscore[player_team.index()] += CAPTURE_TEAM_SCORE;
        }
        for flag in &mut state.flags {
            if flag.team == flag_team {
                flag.reset();
            }
        }
        events.push(GameEvent::new(
            now,
            GameEventData::FlagCaptured { player, flag_team },
        ));
    }

    // Grabs and returns on loose flags.
    let mut grabs: Vec<(usize, PlayerId)> = Vec::new();
    let mut returns: Vec<(usize, PlayerId)> = Vec::new();
    for (index, flag) in state.flags.iter().enumerate() {
        if flag.carrier.is_some() {
            continue;
        }
        for (id, character) in &state.characters {
            if character.pos.distance(flag.pos) > FLAG_GRAB_DISTANCE {
                continue;
            }
            if character.team == flag.team {
                if !flag.at_stand {
                    returns.push((index, *id));
                    break;
                }
            } else {
                grabs.push((index, *id));
                break;
            }
        }
    }
    for (index, player) in returns {
        let flag_team = state.flags[index].team;
        state.flags[index].reset();
        if let Some(p) = state.players.get_mut(&player) {
            p.score += RETURN_SCORE;
        }
        events.push(GameEvent::new(
            now,
            GameEventData::FlagReturned { flag_team },
        ));
    }
    for (index, player) in grabs {
        if state.flags[index].carrier.is_none() {
            let flag_team = state.flags[index].team;
            state.flags[index].grab(player, now);
            events.push(GameEvent::new(
                now,
                GameEventData::FlagGrabbed { player, flag_team },
            ));
        }
    }

    for event in events {
        state.push_event(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================
