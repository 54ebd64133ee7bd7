//! Round Lifecycle
//!
//! Warmup, win conditions, sudden death, team balancing, spawn placement,
//! and end-of-round statistics. Everything here is plain state bookkeeping
//! over [`GameState`]; the collision engine is consulted only for spawn
//! placement.

use std::path::PathBuf;

use chrono::{Duration, Local};
use tracing::{debug, info, warn};

use crate::core::vec2::Vec2;
use crate::game::collision::CollisionMap;
use crate::game::entity::CHARACTER_SIZE;
use crate::game::events::{DeathCause, GameEvent, GameEventData};
use crate::game::map::{GameMap, SpawnKind};
use crate::game::state::{GameState, PlayerId, Team};
use crate::TICK_RATE;

/// Candidate offsets tried around a blocked spawn point: start, left,
/// up, right, down.
const SPAWN_OFFSETS: [Vec2; 5] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(-32.0, 0.0),
    Vec2::new(0.0, -32.0),
    Vec2::new(32.0, 0.0),
    Vec2::new(0.0, 32.0),
];

/// Server-side round configuration.
#[derive(Clone, Debug)]
pub struct RoundConfig {
    /// Teams and team scoring enabled.
    pub teamplay: bool,
    /// Warmup before the first round, seconds.
    pub warmup_secs: u32,
    /// Score that ends the round (0 disables).
    pub scorelimit: i32,
    /// Round length limit in minutes (0 disables).
    pub timelimit_mins: u32,
    /// Rounds played before the host rotates the map.
    pub rounds_per_map: u32,
    /// Grace period before forced team balancing, minutes (0 disables).
    pub teambalance_time_mins: u32,
    /// Move players idle for this many minutes to spectators (0 disables).
    pub inactive_kick_mins: u32,
    /// Game-over screen duration before the next round, seconds.
    pub gameover_wait_secs: u32,
    /// Maximum simultaneously playing players.
    pub max_players: usize,
    /// Append end-of-round statistics to this file, if set.
    pub stats_file: Option<PathBuf>,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            teamplay: true,
            warmup_secs: 0,
            scorelimit: 10,
            timelimit_mins: 0,
            rounds_per_map: 1,
            teambalance_time_mins: 1,
            inactive_kick_mins: 0,
            gameover_wait_secs: 10,
            max_players: 16,
            stats_file: None,
        }
    }
}

/// Round state machine.
#[derive(Debug)]
pub struct RoundController {
    config: RoundConfig,
    warmup: u64,
    game_over_tick: Option<u64>,
    sudden_death: bool,
    round_start_tick: u64,
    round_count: u32,
    unbalanced_tick: Option<u64>,
}

impl RoundController {
    /// Create a controller, entering warmup if one is configured.
    pub fn new(config: RoundConfig) -> Self {
        let warmup = config.warmup_secs as u64 * TICK_RATE as u64;
        Self {
            config,
            warmup,
            game_over_tick: None,
            sudden_death: false,
            round_start_tick: 0,
            round_count: 0,
            unbalanced_tick: None,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    /// True while warmup is counting down.
    pub fn is_warmup(&self) -> bool {
        self.warmup > 0
    }

    /// True between round end and the next round start.
    pub fn is_game_over(&self) -> bool {
        self.game_over_tick.is_some()
    }

    /// True when the win condition tied and the next point decides.
    pub fn is_sudden_death(&self) -> bool {
        self.sudden_death
    }

    /// Rounds completed on this map.
    pub fn round_count(&self) -> u32 {
        self.round_count
    }

    /// Tick the current round started on.
    pub fn round_start_tick(&self) -> u64 {
        self.round_start_tick
    }

    /// Restart warmup for a number of seconds.
    pub fn do_warmup(&mut self, secs: u32) {
        self.warmup = secs as u64 * TICK_RATE as u64;
    }

    /// Advance the round state machine by one tick.
    pub fn tick(&mut self, state: &mut GameState) {
        if self.warmup > 0 {
            self.warmup -= 1;
            if self.warmup == 0 {
                self.start_round(state);
            }
        }

        if let Some(over_tick) = self.game_over_tick {
            // game over.. wait for restart
            let wait = self.config.gameover_wait_secs as u64 * TICK_RATE as u64;
            if state.tick > over_tick + wait {
                self.round_count += 1;
                if self.round_count >= self.config.rounds_per_map {
                    // Map rotation itself belongs to the host; we only
                    // restart the counter.
                    self.round_count = 0;
                }
                self.start_round(state);
            }
        }

        // A paused world does not consume round time.
        if state.paused {
            self.round_start_tick += 1;
        }

        self.kick_inactive(state);
        self.do_team_balance(state);
        self.do_wincheck(state);
    }

    /// Begin a fresh round: wipe scores and request a world reset.
    pub fn start_round(&mut self, state: &mut GameState) {
        state.reset_requested = true;

        for player in state.players.values_mut() {
            player.score = 0;
            player.stats = Default::default();
            player.score_start_tick = state.tick;
        }

        self.round_start_tick = state.tick;
        self.sudden_death = false;
        self.game_over_tick = None;
        state.paused = false;
        state.teamscore = [0, 0];

        state.push_event(GameEvent::new(
            state.tick,
            GameEventData::RoundStarted {
                round: self.round_count,
            },
        ));
        info!(
            round = self.round_count,
            teamplay = self.config.teamplay,
            "start round"
        );
    }

    /// End the round: freeze the world and report results.
    pub fn end_round(&mut self, state: &mut GameState) {
        if self.warmup > 0 {
            // game can't end when we are running warmup
            return;
        }

        state.paused = true;
        self.game_over_tick = Some(state.tick);
        self.sudden_death = false;
        self.save_stats(state);

        let red = state.teamscore[Team::Red.index()];
        let blue = state.teamscore[Team::Blue.index()];
        state.push_event(GameEvent::new(
            state.tick,
            GameEventData::RoundEnded {
                red_score: red,
                blue_score: blue,
            },
        ));

        if self.config.teamplay {
            match red.cmp(&blue) {
                std::cmp::Ordering::Greater => info!(red, blue, "red team has won the round"),
                std::cmp::Ordering::Less => info!(red, blue, "blue team has won the round"),
                std::cmp::Ordering::Equal => info!(red, blue, "round ended in a draw"),
            }
        }

        let mut best_killer: Option<(&str, u32)> = None;
        let mut best_capper: Option<(&str, u32)> = None;
        for player in state.players.values() {
            if !player.team.is_playing() {
                continue;
            }
            if best_killer.map_or(true, |(_, k)| player.stats.kills > k) {
                best_killer = Some((player.name.as_str(), player.stats.kills));
            }
            if best_capper.map_or(true, |(_, c)| player.stats.captures > c) {
                best_capper = Some((player.name.as_str(), player.stats.captures));
            }
        }
        if let Some((name, captures)) = best_capper.filter(|&(_, c)| c > 0) {
            info!(name, captures, "most flag captures");
        } else if let Some((name, kills)) = best_killer {
            info!(name, kills, "most kills");
        }
    }

    fn do_wincheck(&mut self, state: &mut GameState) {
        if self.game_over_tick.is_some() || self.warmup > 0 || state.reset_requested {
            return;
        }

        let timelimit_hit = self.config.timelimit_mins > 0
            && state.tick - self.round_start_tick
                >= self.config.timelimit_mins as u64 * 60 * TICK_RATE as u64;

        if self.config.teamplay {
            let red = state.teamscore[Team::Red.index()];
            let blue = state.teamscore[Team::Blue.index()];
            let scorelimit_hit = self.config.scorelimit > 0
                && (red >= self.config.scorelimit || blue >= self.config.scorelimit);

            if scorelimit_hit || timelimit_hit {
                if red != blue {
                    self.end_round(state);
                } else {
                    self.enter_sudden_death(state);
                }
            }
        } else {
            let mut top_score = i32::MIN;
            let mut top_count = 0;
            for player in state.players.values() {
                if !player.team.is_playing() {
                    continue;
                }
                if player.score > top_score {
                    top_score = player.score;
                    top_count = 1;
                } else if player.score == top_score {
                    top_count += 1;
                }
            }

            let scorelimit_hit =
                self.config.scorelimit > 0 && top_score >= self.config.scorelimit;
            if scorelimit_hit || timelimit_hit {
                if top_count == 1 {
                    self.end_round(state);
                } else {
                    self.enter_sudden_death(state);
                }
            }
        }
    }

    fn enter_sudden_death(&mut self, state: &mut GameState) {
        if !self.sudden_death {
            state.push_event(GameEvent::new(state.tick, GameEventData::SuddenDeath));
        }
        self.sudden_death = true;
    }

    // =========================================================================
    // Scoring
    // =========================================================================

    /// Apply death scoring: suicide -1, teamkill -1, kill +1 (and a team
    /// point in teamplay). World deaths are never scored.
    pub fn on_character_death(
        &self,
        state: &mut GameState,
        victim: PlayerId,
        killer: Option<PlayerId>,
        cause: DeathCause,
    ) {
        if cause == DeathCause::World {
            return;
        }

        if let Some(victim_player) = state.players.get_mut(&victim) {
            victim_player.stats.deaths += 1;
        }

        match killer {
            None => {
                // terrain kill counts against the victim
                if let Some(victim_player) = state.players.get_mut(&victim) {
                    victim_player.score -= 1;
                }
            }
            Some(k) if k == victim => {
                if let Some(victim_player) = state.players.get_mut(&victim) {
                    victim_player.score -= 1; // suicide
                }
            }
            Some(k) => {
                let victim_team = state.players.get(&victim).map(|p| p.team);
                let killer_team = state.players.get(&k).map(|p| p.team);

                if self.config.teamplay && victim_team.is_some() && victim_team == killer_team {
                    if let Some(killer_player) = state.players.get_mut(&k) {
                        killer_player.score -= 1; // teamkill
                    }
                } else {
                    if let Some(killer_player) = state.players.get_mut(&k) {
                        killer_player.score += 1; // normal kill
                        killer_player.stats.kills += 1;
                    }
                    if self.config.teamplay {
                        if let Some(team) = killer_team.filter(|t| t.is_playing()) {
                            state.teamscore[team.index()] += 1;
                        }
                    }
                }
            }
        }
    }

    /// True if damage between two players should be ignored.
    pub fn is_friendly_fire(&self, state: &GameState, a: PlayerId, b: PlayerId) -> bool {
        if a == b || !self.config.teamplay {
            return false;
        }
        match (state.players.get(&a), state.players.get(&b)) {
            (Some(pa), Some(pb)) => pa.team == pb.team,
            _ => false,
        }
    }

    // =========================================================================
    // Teams
    // =========================================================================

    /// Team a joining player should land on.
    pub fn auto_team(&self, state: &GameState, exclude: Option<PlayerId>) -> Team {
        let counts = count_teams(state, exclude);

        let team = if self.config.teamplay {
            if counts[Team::Red.index()] > counts[Team::Blue.index()] {
                Team::Blue
            } else {
                Team::Red
            }
        } else {
            Team::Red
        };

        if self.can_join_team(state, team, exclude) {
            team
        } else {
            Team::Spectators
        }
    }

    /// True if a player may join a team at all (slot limit).
    pub fn can_join_team(&self, state: &GameState, team: Team, exclude: Option<PlayerId>) -> bool {
        if team == Team::Spectators {
            return true;
        }
        if let Some(id) = exclude {
            if state.players.get(&id).is_some_and(|p| p.team.is_playing()) {
                return true;
            }
        }

        let counts = count_teams(state, exclude);
        counts[0] + counts[1] < self.config.max_players
    }

    /// True if a voluntary team change keeps the teams acceptable.
    pub fn can_change_team(&self, state: &GameState, player: PlayerId, join: Team) -> bool {
        if !self.config.teamplay
            || join == Team::Spectators
            || self.config.teambalance_time_mins == 0
        {
            return true;
        }

        let mut counts = [0i32; 2];
        for p in state.players.values() {
            if p.team.is_playing() {
                counts[p.team.index()] += 1;
            }
        }

        // simulate what would happen if the player changed team
        counts[join.index()] += 1;
        if state
            .players
            .get(&player)
            .is_some_and(|p| p.team.is_playing())
        {
            counts[join.opponent().index()] -= 1;
        }

        if (counts[0] - counts[1]).abs() >= 2 {
            // only allowed into the smaller team
            (counts[0] < counts[1] && join == Team::Red)
                || (counts[0] > counts[1] && join == Team::Blue)
        } else {
            true
        }
    }

    /// Record whether the teams are currently balanced, arming the
    /// balance timer when they are not.
    pub fn check_team_balance(&mut self, state: &GameState) -> bool {
        if !self.config.teamplay || self.config.teambalance_time_mins == 0 {
            return true;
        }

        let counts = state.team_counts();
        let red = counts[0];
        let blue = counts[1];
        if red.abs_diff(blue) >= 2 {
            debug!(red, blue, "teams are NOT balanced");
            if self.unbalanced_tick.is_none() {
                self.unbalanced_tick = Some(state.tick);
            }
            false
        } else {
            debug!(red, blue, "teams are balanced");
            self.unbalanced_tick = None;
            true
        }
    }

    fn do_team_balance(&mut self, state: &mut GameState) {
        if !self.config.teamplay || self.config.teambalance_time_mins == 0 {
            return;
        }
        let Some(unbalanced_tick) = self.unbalanced_tick else {
            return;
        };
        let grace = self.config.teambalance_time_mins as u64 * 60 * TICK_RATE as u64;
        if state.tick <= unbalanced_tick + grace {
            return;
        }

        debug!("balancing teams");

        let mut counts = [0i32; 2];
        let mut team_score = [0.0f32; 2];
        let mut player_score: Vec<(PlayerId, Team, f32)> = Vec::new();
        for (id, player) in &state.players {
            if !player.team.is_playing() {
                continue;
            }
            counts[player.team.index()] += 1;
            let elapsed = (state.tick - player.score_start_tick).max(1) as f32;
            let per_minute = player.score as f32 * (TICK_RATE as f32 * 60.0) / elapsed;
            team_score[player.team.index()] += per_minute;
            player_score.push((*id, player.team, per_minute));
        }

        if (counts[0] - counts[1]).abs() >= 2 {
            let bigger = if counts[0] > counts[1] {
                Team::Red
            } else {
                Team::Blue
            };
            let m = bigger.index();
            let mut to_move = (counts[0] - counts[1]).unsigned_abs() / 2;
            let mut moved = 0u32;

            while to_move > 0 {
                // pick the player whose transfer leaves the smallest
                // score difference between the teams
                let mut best: Option<(usize, f32)> = None;
                for (idx, (_, team, score)) in player_score.iter().enumerate() {
                    if *team != bigger {
                        continue;
                    }
                    let diff = ((team_score[1 - m] + score) - (team_score[m] - score)).abs();
                    if best.map_or(true, |(_, d)| diff < d) {
                        best = Some((idx, diff));
                    }
                }
                let Some((idx, _)) = best else { break };

                let (id, _, score) = player_score[idx];
                player_score[idx].1 = bigger.opponent();
                team_score[m] -= score;
                team_score[1 - m] += score;

                if let Some(player) = state.players.get_mut(&id) {
                    player.team = bigger.opponent();
                    player.respawn_at = Some(state.tick);
                }
                state.characters.remove(&id);

                moved += 1;
                to_move -= 1;
            }

            if moved > 0 {
                state.push_event(GameEvent::new(
                    state.tick,
                    GameEventData::TeamsBalanced { moved },
                ));
            }
        }

        self.unbalanced_tick = None;
    }

    fn kick_inactive(&self, state: &mut GameState) {
        if self.config.inactive_kick_mins == 0 {
            return;
        }
        let limit = self.config.inactive_kick_mins as u64 * 60 * TICK_RATE as u64;

        let mut idle: Vec<PlayerId> = Vec::new();
        for (id, player) in &state.players {
            if player.team.is_playing() && state.tick > player.last_action_tick + limit {
                idle.push(*id);
            }
        }
        for id in idle {
            if let Some(player) = state.players.get_mut(&id) {
                info!(name = %player.name, "moved to spectators for inactivity");
                player.team = Team::Spectators;
                player.respawn_at = None;
            }
            state.characters.remove(&id);
        }
    }

    // =========================================================================
    // Spawning
    // =========================================================================

    /// Pick a spawn position for a team, or None if every candidate is
    /// blocked. Candidates are rejected when solid or crowded, and the
    /// survivor closest to safety (far from enemies) wins.
    pub fn can_spawn(
        &self,
        state: &GameState,
        collision: &CollisionMap,
        map: &GameMap,
        team: Team,
    ) -> Option<Vec2> {
        // spectators can't spawn
        if team == Team::Spectators {
            return None;
        }

        let friendly = if self.config.teamplay { Some(team) } else { None };
        let mut best: Option<(Vec2, f32)> = None;

        if self.config.teamplay {
            let own = spawn_kind_of(team);
            let enemy = spawn_kind_of(team.opponent());

            // first try own team spawns, then neutral and then enemy
            self.evaluate_spawn_kind(state, collision, map, friendly, own, &mut best);
            if best.is_none() {
                self.evaluate_spawn_kind(state, collision, map, friendly, SpawnKind::Neutral, &mut best);
                if best.is_none() {
                    self.evaluate_spawn_kind(state, collision, map, friendly, enemy, &mut best);
                }
            }
        } else {
            for kind in [SpawnKind::Neutral, SpawnKind::Red, SpawnKind::Blue] {
                self.evaluate_spawn_kind(state, collision, map, friendly, kind, &mut best);
            }
        }

        best.map(|(pos, _)| pos)
    }

    fn evaluate_spawn_kind(
        &self,
        state: &GameState,
        collision: &CollisionMap,
        map: &GameMap,
        friendly: Option<Team>,
        kind: SpawnKind,
        best: &mut Option<(Vec2, f32)>,
    ) {
        'spawns: for spawn in map.spawns_of(kind) {
            // check if the position is occupado
            let mut candidate = None;
            'offsets: for offset in SPAWN_OFFSETS {
                let pos = spawn.pos() + offset;
                if collision.check_point(pos) {
                    continue 'offsets;
                }
                for character in state.characters.values() {
                    if character.pos.distance(pos) <= CHARACTER_SIZE {
                        continue 'offsets;
                    }
                }
                candidate = Some(pos);
                break;
            }
            let Some(pos) = candidate else {
                continue 'spawns;
            };

            let score = evaluate_spawn_pos(state, friendly, pos);
            if best.map_or(true, |(_, s)| score < s) {
                *best = Some((pos, score));
            }
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    fn save_stats(&self, state: &GameState) {
        let Some(path) = &self.config.stats_file else {
            return;
        };

        let playing_secs = (state.tick - self.round_start_tick) / TICK_RATE as u64;
        let ended = Local::now();
        let started = ended - Duration::seconds(playing_secs as i64);

        let mut out = String::new();
        out.push_str(&format!(
            "--> Round started at {} and ended at {} (length: {} min {} sec)\n",
            started.format("%d.%m.%Y %X"),
            ended.format("%X"),
            playing_secs / 60,
            playing_secs % 60,
        ));

        for player in state.players.values() {
            if !player.team.is_playing() {
                continue;
            }
            let ratio = if player.stats.deaths > 0 {
                player.stats.kills as f32 / player.stats.deaths as f32
            } else {
                0.0
            };
            out.push_str(&format!(
                "Name: {:<16}| Team: {:<10}| Score: {:<5}| Kills: {:<5}| Deaths: {:<5}| Ratio: {:<6.2}| Captures: {}\n",
                player.name,
                player.team.name(self.config.teamplay),
                player.score,
                player.stats.kills,
                player.stats.deaths,
                ratio,
                player.stats.captures,
            ));
        }

        if self.config.teamplay {
            out.push_str(&format!(
                "---------------------\nRed: {} | Blue: {}\n",
                state.teamscore[Team::Red.index()],
                state.teamscore[Team::Blue.index()],
            ));
        }
        out.push('\n');

        let result = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .and_then(|mut file| std::io::Write::write_all(&mut file, out.as_bytes()));
        if let Err(err) = result {
            warn!(path = %path.display(), error = %err, "failed to save stats");
        }
    }
}

/// Inverse-distance danger score of a spawn position; lower is safer.
/// Friendly characters weigh half as much as enemies.
fn evaluate_spawn_pos(state: &GameState, friendly: Option<Team>, pos: Vec2) -> f32 {
    let mut score = 0.0;
    for character in state.characters.values() {
        // team mates are not as dangerous as enemies
        let score_mod = if friendly == Some(character.team) {
            0.5
        } else {
            1.0
        };
        let d = pos.distance(character.pos);
        score += score_mod * if d == 0.0 { 1_000_000_000.0 } else { 1.0 / d };
    }
    score
}

fn spawn_kind_of(team: Team) -> SpawnKind {
    match team {
        Team::Blue => SpawnKind::Blue,
        _ => SpawnKind::Red,
    }
}

fn count_teams(state: &GameState, exclude: Option<PlayerId>) -> [usize; 2] {
    let mut counts = [0usize; 2];
    for (id, player) in &state.players {
        if Some(*id) == exclude {
            continue;
        }
        if player.team.is_playing() {
            counts[player.team.index()] += 1;
        }
    }
    counts
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::Character;
    use crate::game::map::GameMap;

    fn setup(config: RoundConfig) -> (GameState, RoundController, GameMap) {
        let map = GameMap::demo_arena();
        let state = GameState::new(&map);
        let round = RoundController::new(config);
        (state, round, map)
    }

    fn add_players(state: &mut GameState, reds: u8, blues: u8) -> Vec<PlayerId> {
        let mut ids = Vec::new();
        for i in 0..reds {
            let id = PlayerId::new([i + 1; 16]);
            state.add_player(id, &format!("red{i}"), &format!("10.0.0.{}", i + 1), Team::Red);
            ids.push(id);
        }
        for i in 0..blues {
            let id = PlayerId::new([i + 101; 16]);
            state.add_player(id, &format!("blue{i}"), &format!("10.0.1.{}", i + 1), Team::Blue);
            ids.push(id);
        }
        ids
    }

    #[test]
    fn test_warmup_counts_down_into_round() {
        let (mut state, mut round, _map) = setup(RoundConfig {
            warmup_secs: 1,
            ..Default::default()
        });
        state.reset_requested = false;
        assert!(round.is_warmup());

        for _ in 0..TICK_RATE {
            state.tick += 1;
            round.tick(&mut state);
        }
        assert!(!round.is_warmup());
        assert!(state.reset_requested);

        // An explicit warmup re-arms the countdown
        round.do_warmup(5);
        assert!(round.is_warmup());
    }

    #[test]
    fn test_scorelimit_ends_round() {
        let (mut state, mut round, _map) = setup(RoundConfig::default());
        add_players(&mut state, 1, 1);
        state.reset_requested = false;

        state.teamscore = [10, 3];
        state.tick = 500;
        round.tick(&mut state);

        assert!(round.is_game_over());
        assert!(state.paused);
        let events = state.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e.data, GameEventData::RoundEnded { red_score: 10, blue_score: 3 })));
    }

    #[test]
    fn test_tied_scorelimit_enters_sudden_death() {
        let (mut state, mut round, _map) = setup(RoundConfig::default());
        add_players(&mut state, 1, 1);
        state.reset_requested = false;

        state.teamscore = [10, 10];
        state.tick = 500;
        round.tick(&mut state);

        assert!(round.is_sudden_death());
        assert!(!round.is_game_over());

        // The next point breaks the tie and ends the round
        state.teamscore = [11, 10];
        state.tick += 1;
        round.tick(&mut state);
        assert!(round.is_game_over());
        assert!(!round.is_sudden_death());
    }

    #[test]
    fn test_game_over_wait_then_new_round() {
        let (mut state, mut round, _map) = setup(RoundConfig::default());
        add_players(&mut state, 1, 1);
        state.reset_requested = false;

        state.teamscore = [10, 0];
        state.tick = 500;
        round.tick(&mut state);
        assert!(round.is_game_over());

        state.tick += 10 * TICK_RATE as u64 + 2;
        round.tick(&mut state);
        assert!(!round.is_game_over());
        assert!(state.reset_requested);
        assert_eq!(state.teamscore, [0, 0]);
    }

    #[test]
    fn test_death_scoring() {
        let (mut state, round, _map) = setup(RoundConfig::default());
        let ids = add_players(&mut state, 2, 1);
        let (red_a, red_b, blue) = (ids[0], ids[1], ids[2]);

        // normal kill
        round.on_character_death(&mut state, blue, Some(red_a), DeathCause::Grenade);
        assert_eq!(state.players[&red_a].score, 1);
        assert_eq!(state.players[&red_a].stats.kills, 1);
        assert_eq!(state.players[&blue].stats.deaths, 1);
        assert_eq!(state.teamscore, [1, 0]);

        // teamkill
        round.on_character_death(&mut state, red_b, Some(red_a), DeathCause::Grenade);
        assert_eq!(state.players[&red_a].score, 0);
        assert_eq!(state.teamscore, [1, 0]);

        // suicide and terrain deaths count against the victim
        round.on_character_death(&mut state, red_a, Some(red_a), DeathCause::Grenade);
        assert_eq!(state.players[&red_a].score, -1);
        round.on_character_death(&mut state, red_a, None, DeathCause::DeathTile);
        assert_eq!(state.players[&red_a].score, -2);

        // world deaths never score
        round.on_character_death(&mut state, blue, None, DeathCause::World);
        assert_eq!(state.players[&blue].score, 0);
        assert_eq!(state.players[&blue].stats.deaths, 1);
    }

    #[test]
    fn test_friendly_fire() {
        let (mut state, round, _map) = setup(RoundConfig::default());
        let ids = add_players(&mut state, 2, 1);

        assert!(round.is_friendly_fire(&state, ids[0], ids[1]));
        assert!(!round.is_friendly_fire(&state, ids[0], ids[2]));
        assert!(!round.is_friendly_fire(&state, ids[0], ids[0]));
    }

    #[test]
    fn test_auto_team_fills_smaller() {
        let (mut state, round, _map) = setup(RoundConfig::default());
        add_players(&mut state, 2, 1);
        assert_eq!(round.auto_team(&state, None), Team::Blue);

        add_players(&mut state, 0, 2);
        assert_eq!(round.auto_team(&state, None), Team::Red);
    }

    #[test]
    fn test_can_change_team_blocks_stacking() {
        let (mut state, round, _map) = setup(RoundConfig::default());
        let ids = add_players(&mut state, 2, 2);

        // 2v2: moving to the other team makes 1v3
        assert!(!round.can_change_team(&state, ids[0], Team::Blue));
        // leaving for the spectators is always fine
        assert!(round.can_change_team(&state, ids[0], Team::Spectators));

        // 4v2: a red player may move to the smaller blue team
        state.add_player(PlayerId::new([50; 16]), "red2", "10.0.0.50", Team::Red);
        state.add_player(PlayerId::new([51; 16]), "red3", "10.0.0.51", Team::Red);
        assert!(round.can_change_team(&state, ids[0], Team::Blue));
    }

    #[test]
    fn test_team_balance_moves_player() {
        let (mut state, mut round, _map) = setup(RoundConfig::default());
        add_players(&mut state, 3, 1);
        state.reset_requested = false;
        state.tick = 100;

        assert!(!round.check_team_balance(&state));

        // after the grace period the balancer moves one player over
        state.tick += 60 * TICK_RATE as u64 + 2;
        round.tick(&mut state);

        assert_eq!(state.team_counts(), [2, 2]);
        let events = state.take_events();
        assert!(events
            .iter()
            .any(|e| matches!(e.data, GameEventData::TeamsBalanced { moved: 1 })));
    }

    #[test]
    fn test_spawn_avoids_crowded_points() {
        let (mut state, round, map) = setup(RoundConfig::default());
        add_players(&mut state, 1, 1);
        let collision = map.collision();

        // Park a blue character right on top of the first red spawn; red
        // should get the other one.
        let red_spawns: Vec<Vec2> = map.spawns_of(SpawnKind::Red).map(|s| s.pos()).collect();
        state.characters.insert(
            PlayerId::new([200; 16]),
            Character::spawn(PlayerId::new([200; 16]), Team::Blue, red_spawns[0]),
        );

        let pos = round
            .can_spawn(&state, &collision, &map, Team::Red)
            .expect("a red spawn must remain");
        assert!(pos.distance(red_spawns[0]) > CHARACTER_SIZE);
    }

    #[test]
    fn test_spectators_never_spawn() {
        let (state, round, map) = setup(RoundConfig::default());
        let collision = map.collision();
        assert!(round
            .can_spawn(&state, &collision, &map, Team::Spectators)
            .is_none());
    }

    #[test]
    fn test_stats_file_written() {
        let path = std::env::temp_dir().join("tilefront_round_stats.txt");
        std::fs::remove_file(&path).ok();

        let (mut state, mut round, _map) = setup(RoundConfig {
            stats_file: Some(path.clone()),
            ..Default::default()
        });
        add_players(&mut state, 1, 1);
        state.reset_requested = false;
        state.teamscore = [10, 4];
        state.tick = 3000;
        round.tick(&mut state);
        assert!(round.is_game_over());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Red: 10 | Blue: 4"));
        assert!(contents.contains("red0"));
        std::fs::remove_file(&path).ok();
    }
}
