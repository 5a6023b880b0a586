//! Enemy, boss and powerup spawning
//!
//! The director only ever adds entities. Pool exhaustion is backpressure:
//! the spawn is skipped, counted, and retried on the next interval.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::events::{EffectsSink, FrameEvent};
use super::pool::EntityId;
use super::state::{Enemy, EnemyKind, GameState, Powerup, PowerupKind, WavePhase, WaveState};
use crate::consts::*;
use crate::tuning::{SpawnTuning, Tuning};

/// Kinds a regular wave draws from
const WAVE_KINDS: [EnemyKind; 4] = [
    EnemyKind::Basic,
    EnemyKind::Fast,
    EnemyKind::Heavy,
    EnemyKind::Zigzag,
];

/// Decides when and what to spawn
#[derive(Debug, Clone)]
pub struct SpawnDirector {
    rng: Pcg32,
    /// Counts down to the next regular spawn
    spawn_timer: f32,
    /// Quiet period left before the current wave's first spawn
    wave_delay_remaining: f32,
    /// Enemies of the current wave not yet placed on the field
    to_spawn: u32,
}

impl SpawnDirector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            spawn_timer: 0.0,
            wave_delay_remaining: 0.0,
            to_spawn: 0,
        }
    }

    pub fn rng(&mut self) -> &mut Pcg32 {
        &mut self.rng
    }

    pub fn pending_spawns(&self) -> u32 {
        self.to_spawn
    }

    pub fn spawn_timer(&self) -> f32 {
        self.spawn_timer
    }

    pub fn wave_delay_remaining(&self) -> f32 {
        self.wave_delay_remaining
    }

    /// Enemies in a wave with this session-wide index
    pub fn wave_size(spawn: &SpawnTuning, wave_number: u32) -> u32 {
        if Self::is_boss_wave(spawn, wave_number) {
            1
        } else {
            spawn.enemies_per_wave_base + wave_number.saturating_sub(1) * spawn.enemies_per_wave_growth
        }
    }

    pub fn is_boss_wave(spawn: &SpawnTuning, wave_number: u32) -> bool {
        spawn.boss_wave_interval > 0 && wave_number > 0 && wave_number % spawn.boss_wave_interval == 0
    }

    /// Seconds between regular spawns. Shrinks with level, wave and tier.
    pub fn spawn_interval(tuning: &Tuning, wave: &WaveState) -> f32 {
        let spawn = &tuning.spawn;
        let level_rate = 1.0 + spawn.level_rate_growth * wave.current_level.saturating_sub(1) as f32;
        let wave_rate = 1.0 + 0.02 * wave.current_wave_in_level.saturating_sub(1) as f32;
        let tier_rate = wave.difficulty.modifiers().spawn_rate;
        (spawn.base_interval / (level_rate * wave_rate * tier_rate)).max(spawn.min_interval)
    }

    /// Relative odds of each regular kind; harder kinds gain as threat rises
    pub fn kind_weights(wave: &WaveState) -> [(EnemyKind, f32); 4] {
        let threat = wave.current_level as f32 * wave.difficulty_multiplier;
        [
            (EnemyKind::Basic, (60.0 - threat * 4.0).max(10.0)),
            (EnemyKind::Fast, 20.0 + threat * 1.5),
            (EnemyKind::Heavy, 5.0 + threat * 1.5),
            (EnemyKind::Zigzag, 15.0 + threat),
        ]
    }

    /// Set up the wave described by `wave.wave_number`
    pub fn begin_wave(&mut self, wave: &mut WaveState, tuning: &Tuning, sink: &mut impl EffectsSink) {
        let size = Self::wave_size(&tuning.spawn, wave.wave_number);
        wave.boss_wave = Self::is_boss_wave(&tuning.spawn, wave.wave_number);
        wave.enemies_remaining_in_wave = size;
        wave.boss_active = false;
        wave.elapsed_wave_time = 0.0;
        wave.phase = WavePhase::WaveInProgress;

        self.to_spawn = size;
        self.wave_delay_remaining = tuning.spawn.wave_delay;
        self.spawn_timer = 0.0;

        log::info!(
            "wave {} (level {}, #{}) begins: {} enemies{}",
            wave.current_wave_in_level,
            wave.current_level,
            wave.wave_number,
            size,
            if wave.boss_wave { ", boss" } else { "" }
        );
        sink.emit(FrameEvent::WaveStarted {
            level: wave.current_level,
            wave: wave.current_wave_in_level,
        });
    }

    /// Advance spawn timers by the real delta and place due enemies
    pub fn update(&mut self, state: &mut GameState, tuning: &Tuning, dt: f32, sink: &mut impl EffectsSink) {
        if state.wave.phase != WavePhase::WaveInProgress || self.to_spawn == 0 {
            return;
        }

        let mut dt = dt;
        if self.wave_delay_remaining > 0.0 {
            self.wave_delay_remaining -= dt;
            if self.wave_delay_remaining > 0.0 {
                return;
            }
            // Only the overshoot past the delay counts toward spawning
            dt = -self.wave_delay_remaining;
            self.wave_delay_remaining = 0.0;
        }

        if state.wave.boss_wave {
            if !state.wave.boss_active {
                self.spawn_boss(state, tuning, sink);
            }
            return;
        }
        if state.wave.boss_active {
            return;
        }

        self.spawn_timer -= dt;
        let interval = Self::spawn_interval(tuning, &state.wave);
        while self.spawn_timer <= 0.0 && self.to_spawn > 0 {
            self.spawn_timer += interval;
            let kind = self.pick_kind(&state.wave);
            let x = self.spawn_x(tuning.enemies.stats(kind).half_extent.0);
            let pos = Vec2::new(x, -tuning.enemies.stats(kind).half_extent.1);
            if self.spawn_enemy(state, tuning, kind, pos).is_none() {
                break;
            }
        }
    }

    /// Uniform x that keeps the body on screen; centered if it cannot fit
    fn spawn_x(&mut self, half: f32) -> f32 {
        if half.is_finite() && half >= 0.0 && half * 2.0 < SCREEN_WIDTH {
            self.rng.random_range(half..SCREEN_WIDTH - half)
        } else {
            SCREEN_WIDTH / 2.0
        }
    }

    fn pick_kind(&mut self, wave: &WaveState) -> EnemyKind {
        let weights = Self::kind_weights(wave);
        let total: f32 = weights.iter().map(|(_, w)| w).sum();
        let mut roll = self.rng.random_range(0.0..total);
        for (kind, weight) in weights {
            if roll < weight {
                return kind;
            }
            roll -= weight;
        }
        WAVE_KINDS[0]
    }

    /// Place one enemy. `None` if the pool is exhausted.
    pub fn spawn_enemy(
        &mut self,
        state: &mut GameState,
        tuning: &Tuning,
        kind: EnemyKind,
        pos: Vec2,
    ) -> Option<EntityId> {
        let id = state.next_entity_id();
        let enemy = Enemy::new(id, kind, pos, tuning, state.wave.difficulty);
        match state.enemies.allocate(enemy) {
            Ok(id) => {
                self.to_spawn = self.to_spawn.saturating_sub(1);
                state.stats.enemies_spawned += 1;
                Some(id)
            }
            Err(err) => {
                state.stats.pool_exhausted.enemies += 1;
                log::debug!("{} spawn skipped: {err}", kind.as_str());
                None
            }
        }
    }

    fn spawn_boss(&mut self, state: &mut GameState, tuning: &Tuning, sink: &mut impl EffectsSink) {
        let pos = Vec2::new(SCREEN_WIDTH / 2.0, -tuning.enemies.boss.half_extent.1);
        if self.spawn_enemy(state, tuning, EnemyKind::Boss, pos).is_some() {
            state.wave.boss_active = true;
            log::info!("boss spawned on wave #{}", state.wave.wave_number);
            sink.emit(FrameEvent::BossSpawned { pos });
        }
    }

    /// Roll for a drop at a kill site. At most one powerup per kill.
    pub fn roll_drop(
        &mut self,
        state: &mut GameState,
        tuning: &Tuning,
        pos: Vec2,
        was_boss: bool,
    ) -> Option<PowerupKind> {
        let chance = if was_boss {
            tuning.powerups.boss_drop_chance
        } else {
            tuning.powerups.drop_chance
        };
        if !self.rng.random_bool(chance.clamp(0.0, 1.0) as f64) {
            return None;
        }

        let kind = self.pick_powerup(tuning)?;
        let powerup = Powerup {
            id: state.next_entity_id(),
            kind,
            pos,
            vel: Vec2::new(0.0, tuning.powerups.drift_speed),
            lifetime_remaining: tuning.powerups.lifetime,
        };
        match state.powerups.allocate(powerup) {
            Ok(_) => Some(kind),
            Err(err) => {
                state.stats.pool_exhausted.powerups += 1;
                log::debug!("drop skipped: {err}");
                None
            }
        }
    }

    fn pick_powerup(&mut self, tuning: &Tuning) -> Option<PowerupKind> {
        let total: u32 = tuning.powerups.weights.iter().sum();
        if total == 0 {
            return None;
        }
        let mut roll = self.rng.random_range(0..total);
        for kind in PowerupKind::ALL {
            let weight = tuning.powerups.weight(kind);
            if roll < weight {
                return Some(kind);
            }
            roll -= weight;
        }
        None
    }
}
