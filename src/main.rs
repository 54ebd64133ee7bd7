//! TileFront Server
//!
//! Headless demo entry point: loads a map (or the built-in arena), runs
//! a scripted match, and logs notable events and final standings.

use anyhow::Context;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tilefront::{
    game::{
        entity::{CharacterInput, FireInput, Weapon},
        events::{GameEvent, GameEventData},
        map::GameMap,
        mute::{check_chat, ChatVerdict, MuteList},
        round::{RoundConfig, RoundController},
        state::{GameState, PlayerId, Team},
        tick::{tick, TickInputs},
    },
    Vec2, TICK_RATE, VERSION,
};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("TileFront Server v{}", VERSION);
    info!("Tick rate: {} Hz", TICK_RATE);

    let map = match std::env::args().nth(1) {
        Some(path) => GameMap::load(&path).with_context(|| format!("loading map {path}"))?,
        None => GameMap::demo_arena(),
    };
    info!(name = %map.name, width = map.width, height = map.height, "map ready");

    run_demo_match(map);
    Ok(())
}

/// Run a scripted 2v2 match for one minute of simulated time.
fn run_demo_match(map: GameMap) {
    let collision = map.collision();
    let mut state = GameState::new(&map);
    let mut round = RoundController::new(RoundConfig::default());
    let mut mutes = MuteList::new();

    let ids: Vec<PlayerId> = (1u8..=4).map(|i| PlayerId::new([i; 16])).collect();
    state.add_player(ids[0], "alice", "10.0.0.1", Team::Red);
    state.add_player(ids[1], "bob", "10.0.0.2", Team::Red);
    state.add_player(ids[2], "carol", "10.0.0.3", Team::Blue);
    state.add_player(ids[3], "dave", "10.0.0.4", Team::Blue);

    // Vet a couple of chat lines through the moderation layer
    for (id, text) in [(ids[0], "glhf"), (ids[1], "free bot client at http://spam")] {
        let (name, addr) = {
            let player = &state.players[&id];
            (player.name.clone(), player.addr.clone())
        };
        match check_chat(&mut mutes, &addr, text, state.tick) {
            ChatVerdict::Allowed => info!(name, text, "chat"),
            ChatVerdict::Spam => {
                info!(name, "chat dropped as spam, sender muted");
                state.push_event(GameEvent::new(
                    state.tick,
                    GameEventData::ChatBlocked {
                        player: id,
                        reason: "spam".to_string(),
                    },
                ));
            }
            ChatVerdict::Muted(secs) => info!(name, secs, "chat dropped, sender is muted"),
        }
    }

    round.start_round(&mut state);

    let total_ticks = 60 * TICK_RATE;
    let mut total_events = 0usize;

    for t in 0..total_ticks {
        let inputs = scripted_inputs(&state, t);
        let result = tick(&mut state, &collision, &map, &mut round, &inputs);
        total_events += result.events.len();

        for event in &result.events {
            match &event.data {
                GameEventData::RoundStarted { round } => info!(round, "round started"),
                GameEventData::RoundEnded {
                    red_score,
                    blue_score,
                } => info!(red_score, blue_score, "round ended"),
                GameEventData::CharacterDied { victim, cause, .. } => {
                    info!(victim = %victim.to_uuid_string(), ?cause, "character died");
                }
                GameEventData::CharacterTeleported { to_slot, .. } => {
                    info!(to_slot, "character teleported");
                }
                GameEventData::FlagCaptured { flag_team, .. } => {
                    info!(?flag_team, "flag captured");
                }
                _ => {}
            }
        }
    }

    info!(total_events, "demo match finished");
    for player in state.players.values() {
        info!(
            name = %player.name,
            team = ?player.team,
            score = player.score,
            kills = player.stats.kills,
            deaths = player.stats.deaths,
            "final standing"
        );
    }
    info!(
        red = state.teamscore[Team::Red.index()],
        blue = state.teamscore[Team::Blue.index()],
        "team scores"
    );
}

/// Simple scripted inputs: each side walks at the other, hops on a
/// cadence, and lobs the occasional grenade.
fn scripted_inputs(state: &GameState, t: u32) -> TickInputs {
    let mut inputs = TickInputs::new();
    for (i, (id, player)) in state.players.iter().enumerate() {
        if !player.team.is_playing() {
            continue;
        }
        let dir: i8 = if player.team == Team::Red { 1 } else { -1 };
        let phase = t + i as u32 * 13;
        inputs.insert(
            *id,
            CharacterInput {
                direction: dir,
                jump: phase % 90 == 0,
                hook: None,
                fire: if phase % 150 == 0 {
                    let weapon = if phase % 300 == 0 {
                        Weapon::Laser
                    } else {
                        Weapon::Grenade
                    };
                    Some(FireInput {
                        weapon,
                        direction: Vec2::new(dir as f32, -0.3),
                    })
                } else {
                    None
                },
            },
        );
    }
    inputs
}
