//! Fixed timestep simulation tick
//!
//! [`Simulation`] owns every piece of session state. Hosts push
//! [`InputAction`]s between ticks, call [`Simulation::tick`] once per step and
//! read [`Snapshot`]s; nothing outside can mutate entities directly.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::behavior;
use super::collision;
use super::events::{EffectsSink, FrameEvent, FrameEvents};
use super::progression::ProgressionTracker;
use super::snapshot::Snapshot;
use super::spawn::SpawnDirector;
use super::state::{EnemyKind, GameState, SessionState, WavePhase};
use crate::consts::*;
use crate::error::{Result, SimError};
use crate::highscores::{DEFAULT_NAME, sanitize_name};
use crate::persistence::{self, Profile, ProfileStore};
use crate::tuning::{DifficultyTier, Tuning};

/// Decorrelates the behavior stream from the spawn stream
const BEHAVIOR_SEED_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Discrete intents queued between ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    /// Desired movement direction; stays in effect until replaced
    Move(Vec2),
    Fire,
    ActivateSpecial,
    /// Toggle pause
    Pause,
}

/// Input commands for a single tick, folded from the queue
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Latest move vector submitted, if any
    pub move_dir: Option<Vec2>,
    pub fire: bool,
    pub special: bool,
    /// Number of pause toggles requested
    pub pause_toggles: u32,
}

impl TickInput {
    pub fn fold(actions: impl IntoIterator<Item = InputAction>) -> Self {
        let mut input = TickInput::default();
        for action in actions {
            match action {
                InputAction::Move(dir) => input.move_dir = Some(dir),
                InputAction::Fire => input.fire = true,
                InputAction::ActivateSpecial => input.special = true,
                InputAction::Pause => input.pause_toggles += 1,
            }
        }
        input
    }
}

/// One game session context: state machine, entities, progression, profile
#[derive(Debug, Clone)]
pub struct Simulation {
    tuning: Tuning,
    seed: u64,
    sessions_started: u64,
    state: GameState,
    director: SpawnDirector,
    progression: ProgressionTracker,
    behavior_rng: Pcg32,
    profile: Profile,
    player_name: String,
    /// Timestamp recorded with the leaderboard entry
    started_at: f64,
    move_intent: Vec2,
    inputs: Vec<InputAction>,
    /// Events raised between ticks, delivered with the next tick
    pending_events: FrameEvents,
}

impl Simulation {
    pub fn new(tuning: Tuning, profile: Profile, seed: u64) -> Self {
        let state = GameState::new(seed, &tuning, DifficultyTier::default(), 1);
        let progression = ProgressionTracker::new(profile.progress.highest_unlocked_level);
        Self {
            director: SpawnDirector::new(seed),
            behavior_rng: Pcg32::seed_from_u64(seed ^ BEHAVIOR_SEED_SALT),
            tuning,
            seed,
            sessions_started: 0,
            state,
            progression,
            profile,
            player_name: DEFAULT_NAME.to_string(),
            started_at: 0.0,
            move_intent: Vec2::ZERO,
            inputs: Vec::new(),
            pending_events: Vec::new(),
        }
    }

    /// Build from a store. Corrupt records become defaults and surface as
    /// [`FrameEvent::Warning`]s on the first tick.
    pub fn load(tuning: Tuning, store: &dyn ProfileStore, seed: u64) -> Self {
        let (profile, warnings) = persistence::load_profile(store);
        let mut sim = Self::new(tuning, profile, seed);
        for warning in warnings {
            sim.pending_events.emit(FrameEvent::Warning {
                message: warning.to_string(),
            });
        }
        sim
    }

    /// Write the profile back through the host's store
    pub fn persist(&self, store: &mut dyn ProfileStore) -> std::io::Result<()> {
        persistence::save_profile(store, &self.profile)
    }

    pub fn session(&self) -> SessionState {
        self.state.session
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn settings_mut(&mut self) -> &mut crate::settings::Settings {
        &mut self.profile.progress.settings
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn highest_unlocked_level(&self) -> u32 {
        self.progression.highest_unlocked_level()
    }

    pub fn queued_inputs(&self) -> &[InputAction] {
        &self.inputs
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.state, &self.player_name)
    }

    /// Queue an intent for the next tick
    pub fn submit_input(&mut self, action: InputAction) {
        self.inputs.push(action);
    }

    fn transition(&mut self, from: &[SessionState], to: SessionState, action: &'static str) -> Result<()> {
        let current = self.state.session;
        if !from.contains(&current) {
            log::debug!("rejected {action} in {current:?}");
            return Err(SimError::InvalidTransition {
                from: current,
                action,
            });
        }
        log::info!("session {current:?} -> {to:?}");
        self.state.session = to;
        Ok(())
    }

    pub fn open_name_entry(&mut self) -> Result<()> {
        self.transition(&[SessionState::Menu], SessionState::NameEntry, "enter name")
    }

    /// Set the pilot name (trimmed, blank becomes "Anonymous")
    pub fn submit_name(&mut self, name: &str) -> Result<()> {
        if self.state.session != SessionState::NameEntry {
            return Err(SimError::InvalidTransition {
                from: self.state.session,
                action: "submit name",
            });
        }
        self.player_name = sanitize_name(name);
        Ok(())
    }

    /// Begin a fresh session at an unlocked level
    pub fn start_game(&mut self, difficulty: DifficultyTier, level: u32, timestamp: f64) -> Result<()> {
        if self.state.session != SessionState::NameEntry {
            return Err(SimError::InvalidTransition {
                from: self.state.session,
                action: "start game",
            });
        }
        if !self.progression.is_unlocked(level) {
            log::debug!("level {level} is locked");
            return Err(SimError::InvalidTransition {
                from: self.state.session,
                action: "start a locked level",
            });
        }

        self.sessions_started += 1;
        let session_seed = self.seed.wrapping_add(self.sessions_started);
        self.state = GameState::new(session_seed, &self.tuning, difficulty, level);
        self.director = SpawnDirector::new(session_seed);
        self.behavior_rng = Pcg32::seed_from_u64(session_seed ^ BEHAVIOR_SEED_SALT);
        self.started_at = timestamp;
        self.move_intent = Vec2::ZERO;
        self.inputs.clear();

        self.state.session = SessionState::Playing;
        log::info!(
            "{} starts level {level} on {} (seed {session_seed})",
            self.player_name,
            difficulty.as_str()
        );
        self.director
            .begin_wave(&mut self.state.wave, &self.tuning, &mut self.pending_events);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.transition(&[SessionState::Playing], SessionState::Paused, "pause")
    }

    pub fn resume(&mut self) -> Result<()> {
        self.transition(&[SessionState::Paused], SessionState::Playing, "resume")
    }

    pub fn show_leaderboard(&mut self) -> Result<()> {
        self.transition(
            &[SessionState::GameOver, SessionState::Menu],
            SessionState::Leaderboard,
            "show leaderboard",
        )
    }

    pub fn return_to_menu(&mut self) -> Result<()> {
        self.transition(&[SessionState::Leaderboard], SessionState::Menu, "return to menu")?;
        self.teardown();
        Ok(())
    }

    /// Release every pool and drop queued input. Safe between any two ticks.
    pub fn teardown(&mut self) {
        self.state.clear_pools();
        self.inputs.clear();
        self.move_intent = Vec2::ZERO;
        if matches!(self.state.session, SessionState::Playing | SessionState::Paused) {
            log::info!("session torn down mid-game");
            self.state.session = SessionState::Menu;
        }
    }

    fn toggle_pause(&mut self) {
        let result = match self.state.session {
            SessionState::Paused => self.resume(),
            _ => self.pause(),
        };
        if let Err(err) = result {
            log::debug!("pause input dropped: {err}");
        }
    }

    /// Put folded gameplay intents back on the queue, at most one of each
    fn requeue(&mut self, input: &TickInput) {
        if let Some(dir) = input.move_dir {
            self.inputs.push(InputAction::Move(dir));
        }
        if input.fire {
            self.inputs.push(InputAction::Fire);
        }
        if input.special {
            self.inputs.push(InputAction::ActivateSpecial);
        }
    }

    /// Advance the simulation by `dt` seconds (clamped to [`MAX_TICK_DT`])
    pub fn tick(&mut self, dt: f32) -> FrameEvents {
        let mut events = std::mem::take(&mut self.pending_events);
        let dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_TICK_DT)
        } else {
            0.0
        };

        let actions = std::mem::take(&mut self.inputs);
        let input = TickInput::fold(actions.iter().copied());
        for _ in 0..input.pause_toggles {
            self.toggle_pause();
        }

        match self.state.session {
            SessionState::Playing if dt > 0.0 => self.step(dt, &input, &mut events),
            // Nothing elapsed for gameplay: keep intents for the next real step
            SessionState::Playing | SessionState::Paused => self.requeue(&input),
            _ => {}
        }

        self.state.compact_pools();
        events
    }

    fn step(&mut self, dt: f32, input: &TickInput, events: &mut FrameEvents) {
        let state = &mut self.state;
        let tuning = &self.tuning;

        state.time_ticks += 1;
        state.stats.ticks += 1;
        state.elapsed += dt as f64;
        state.wave.elapsed_wave_time += dt;

        self.progression
            .advance(&mut state.wave, &mut self.director, tuning, events);

        // Player
        if let Some(dir) = input.move_dir {
            self.move_intent = dir;
        }
        behavior::move_player(state, tuning, self.move_intent, dt);
        for expired in state.player.tick_timers(dt) {
            log::trace!("{} expired", expired.as_str());
        }
        if input.special {
            behavior::activate_special(state, tuning, events);
        }
        if input.fire {
            behavior::player_fire(state, tuning);
        }

        // Enemy side runs on scaled time
        let enemy_dt = dt * state.enemy_time_scale(tuning);
        state.time_freeze_remaining = (state.time_freeze_remaining - dt).max(0.0);

        behavior::update_enemies(state, tuning, &mut self.behavior_rng, enemy_dt);
        behavior::update_bullets(state, tuning, dt, enemy_dt);
        behavior::update_powerups(state, dt);

        self.director.update(state, tuning, dt, events);

        let report = collision::resolve(state, tuning, events);
        for kill in &report.kills {
            let was_boss = kill.kind == EnemyKind::Boss;
            self.director.roll_drop(state, tuning, kill.pos, was_boss);
        }

        let score = state.player.score;
        let phase = self
            .progression
            .evaluate(&mut state.wave, tuning, score, events);

        if report.player_died {
            self.lose_life(events);
        } else if phase == WavePhase::Victory {
            self.finish_session(events);
        }

        if let Some(problem) = self.invariant_violation() {
            log::error!("forcing game over: {problem}");
            events.emit(FrameEvent::Diagnostic { message: problem });
            if self.state.session == SessionState::Playing {
                self.finish_session(events);
            }
        }
    }

    fn lose_life(&mut self, events: &mut FrameEvents) {
        let player = &mut self.state.player;
        player.lives = player.lives.saturating_sub(1);
        events.emit(FrameEvent::LifeLost {
            lives_remaining: player.lives,
        });

        if player.lives == 0 {
            // A Health pickup in the fatal tick does not revive
            player.health = 0.0;
            self.finish_session(events);
            return;
        }

        log::info!("life lost, {} remaining", player.lives);
        player.health = player.max_health;
        player.pos = Vec2::new(PLAYER_START.0, PLAYER_START.1);
        player.vel = Vec2::ZERO;
    }

    /// Enter GameOver, unlocking levels and recording the leaderboard entry
    fn finish_session(&mut self, events: &mut FrameEvents) {
        let score = self.state.player.score;
        self.state.session = SessionState::GameOver;

        for level in self.progression.unlock_for_score(&self.tuning, score) {
            events.emit(FrameEvent::LevelUnlocked { level });
        }
        self.profile.progress.highest_unlocked_level = self.progression.highest_unlocked_level();

        let rank = self.profile.leaderboard.add_score(
            &self.player_name,
            score,
            self.state.wave.difficulty,
            self.started_at,
        );
        match rank {
            Some(rank) => log::info!("game over: {score} points, rank {rank}"),
            None => log::info!("game over: {score} points"),
        }
        events.emit(FrameEvent::GameOver { score });
    }

    fn invariant_violation(&self) -> Option<String> {
        let player = &self.state.player;
        if !player.pos.is_finite() || !player.vel.is_finite() {
            return Some(format!("player kinematics not finite: {:?}", player.pos));
        }
        if !player.health.is_finite() || player.health < 0.0 || player.health > player.max_health {
            return Some(format!(
                "player health {} outside 0..={}",
                player.health, player.max_health
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    fn playing(seed: u64) -> Simulation {
        let mut sim = Simulation::new(Tuning::default(), Profile::default(), seed);
        sim.open_name_entry().unwrap();
        sim.submit_name("Tester").unwrap();
        sim.start_game(DifficultyTier::Commander, 1, 0.0).unwrap();
        sim
    }

    #[test]
    fn test_session_flow() {
        let mut sim = Simulation::new(Tuning::default(), Profile::default(), 1);
        assert_eq!(sim.session(), SessionState::Menu);
        assert!(sim.pause().is_err());
        sim.open_name_entry().unwrap();
        sim.submit_name("  ").unwrap();
        assert_eq!(sim.player_name(), "Anonymous");
        sim.start_game(DifficultyTier::Cadet, 1, 0.0).unwrap();
        assert_eq!(sim.session(), SessionState::Playing);
        let events = sim.tick(SIM_DT);
        assert!(events.contains(&FrameEvent::WaveStarted { level: 1, wave: 1 }));
    }

    #[test]
    fn test_locked_level_rejected() {
        let mut sim = Simulation::new(Tuning::default(), Profile::default(), 1);
        sim.open_name_entry().unwrap();
        let err = sim.start_game(DifficultyTier::Commander, 3, 0.0).unwrap_err();
        assert!(matches!(err, SimError::InvalidTransition { .. }));
        assert_eq!(sim.session(), SessionState::NameEntry);
    }

    #[test]
    fn test_tick_pause() {
        let mut sim = playing(2);
        sim.submit_input(InputAction::Pause);
        sim.tick(SIM_DT);
        assert_eq!(sim.session(), SessionState::Paused);
        let before = sim.state().elapsed;
        sim.tick(SIM_DT);
        assert_eq!(sim.state().elapsed, before);

        sim.submit_input(InputAction::Pause);
        sim.tick(SIM_DT);
        assert_eq!(sim.session(), SessionState::Playing);
    }

    #[test]
    fn test_pause_input_in_menu_is_dropped() {
        let mut sim = Simulation::new(Tuning::default(), Profile::default(), 1);
        sim.submit_input(InputAction::Pause);
        let events = sim.tick(SIM_DT);
        assert!(events.is_empty());
        assert_eq!(sim.session(), SessionState::Menu);
    }

    #[test]
    fn test_delta_is_clamped() {
        let mut sim = playing(3);
        sim.tick(10.0);
        assert!((sim.state().elapsed - MAX_TICK_DT as f64).abs() < 1e-9);
        sim.tick(f32::NAN);
        sim.tick(-1.0);
        assert!((sim.state().elapsed - MAX_TICK_DT as f64).abs() < 1e-9);
    }

    #[test]
    fn test_zero_tick_keeps_intents_queued() {
        let mut sim = playing(4);
        sim.submit_input(InputAction::Fire);
        sim.tick(0.0);
        assert_eq!(sim.queued_inputs(), &[InputAction::Fire]);
        assert!(sim.state().bullets.is_empty());
        sim.tick(SIM_DT);
        assert!(sim.queued_inputs().is_empty());
        assert_eq!(sim.state().bullets.len(), 1);
    }

    #[test]
    fn test_pause_keeps_intents_for_resume() {
        let mut sim = playing(5);
        sim.submit_input(InputAction::Fire);
        sim.submit_input(InputAction::Pause);
        sim.tick(SIM_DT);
        assert_eq!(sim.session(), SessionState::Paused);
        assert_eq!(sim.queued_inputs(), &[InputAction::Fire]);
        assert!(sim.state().bullets.is_empty());

        // Repeated paused ticks do not pile up copies
        sim.submit_input(InputAction::Fire);
        sim.tick(SIM_DT);
        assert_eq!(sim.queued_inputs(), &[InputAction::Fire]);

        sim.submit_input(InputAction::Pause);
        sim.tick(SIM_DT);
        assert_eq!(sim.session(), SessionState::Playing);
        assert!(sim.queued_inputs().is_empty());
        assert_eq!(sim.state().bullets.len(), 1);
    }

    #[test]
    fn test_determinism() {
        let run = |seed| {
            let mut sim = playing(seed);
            for i in 0..600 {
                if i % 3 == 0 {
                    sim.submit_input(InputAction::Fire);
                }
                sim.submit_input(InputAction::Move(Vec2::new((i as f32 * 0.05).sin(), 0.0)));
                sim.tick(SIM_DT);
            }
            let snap = sim.snapshot();
            (
                snap.player.score,
                snap.enemies.iter().map(|e| (e.id, e.pos)).collect::<Vec<_>>(),
                snap.bullets.len(),
            )
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_death_ends_session_and_records_score() {
        let mut sim = playing(5);
        sim.state.player.score = 1_200;
        sim.state.player.health = 0.0;
        let mut events = Vec::new();
        sim.lose_life(&mut events);
        assert_eq!(sim.session(), SessionState::GameOver);
        assert_eq!(sim.profile().leaderboard.top_score(), Some(1_200));
        assert_eq!(sim.highest_unlocked_level(), 2);
        assert!(events.contains(&FrameEvent::GameOver { score: 1_200 }));
        assert!(events.contains(&FrameEvent::LevelUnlocked { level: 2 }));

        sim.show_leaderboard().unwrap();
        sim.return_to_menu().unwrap();
        assert_eq!(sim.session(), SessionState::Menu);
        assert!(sim.state().enemies.is_empty());
    }

    #[test]
    fn test_extra_life_respawns() {
        let mut tuning = Tuning::default();
        tuning.player.starting_lives = 2;
        let mut sim = Simulation::new(tuning, Profile::default(), 6);
        sim.open_name_entry().unwrap();
        sim.start_game(DifficultyTier::Commander, 1, 0.0).unwrap();
        sim.state.player.health = 0.0;
        let mut events = Vec::new();
        sim.lose_life(&mut events);
        assert_eq!(sim.session(), SessionState::Playing);
        assert_eq!(sim.state().player.health, sim.state().player.max_health);
        assert_eq!(events, vec![FrameEvent::LifeLost { lives_remaining: 1 }]);
    }

    #[test]
    fn test_watchdog_forces_game_over() {
        let mut sim = playing(7);
        sim.state.player.pos = Vec2::new(f32::NAN, 0.0);
        let events = sim.tick(SIM_DT);
        assert_eq!(sim.session(), SessionState::GameOver);
        assert!(events.iter().any(|e| matches!(e, FrameEvent::Diagnostic { .. })));
    }

    #[test]
    fn test_corrupt_store_warns_on_first_tick() {
        let mut store = MemoryStore::new();
        store.insert_raw(crate::highscores::HighScores::STORAGE_KEY, "garbage");
        let mut sim = Simulation::load(Tuning::default(), &store, 1);
        let events = sim.tick(SIM_DT);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], FrameEvent::Warning { .. }));
        assert!(sim.tick(SIM_DT).is_empty());
    }

    #[test]
    fn test_persist_round_trip() {
        let mut sim = playing(8);
        sim.state.player.score = 3_000;
        sim.state.player.health = 0.0;
        let mut events = Vec::new();
        sim.lose_life(&mut events);

        let mut store = MemoryStore::new();
        sim.persist(&mut store).unwrap();
        let reloaded = Simulation::load(Tuning::default(), &store, 9);
        assert_eq!(reloaded.highest_unlocked_level(), 3);
        assert_eq!(reloaded.profile().leaderboard.entries[0].name, "Tester");
    }
}
