//! Game state and core simulation types
//!
//! Entities are plain records tagged by kind; behavior dispatches on the tag.

use std::collections::BTreeMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::pool::{EntityId, EntityPool, Pooled};
use crate::consts::*;
use crate::tuning::{DifficultyTier, Tuning};

/// Id reserved for the player; pooled entities start at 1
pub const PLAYER_ID: EntityId = EntityId(0);

/// Top-level session state. Only `Playing` advances entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Menu,
    NameEntry,
    Playing,
    Paused,
    GameOver,
    Leaderboard,
}

/// Progression state over the current wave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WavePhase {
    WaveInProgress,
    WaveCleared,
    LevelCleared,
    /// Terminal: every level cleared
    Victory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    Basic,
    Fast,
    Heavy,
    Zigzag,
    Boss,
}

impl EnemyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnemyKind::Basic => "basic",
            EnemyKind::Fast => "fast",
            EnemyKind::Heavy => "heavy",
            EnemyKind::Zigzag => "zigzag",
            EnemyKind::Boss => "boss",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulletOwner {
    Player,
    Enemy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulletKind {
    Normal,
    Homing,
    Explosive,
}

/// Power-up types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PowerupKind {
    Health,
    Shield,
    RapidFire,
    MultiShot,
    ScreenClear,
    TimeSlow,
    Homing,
}

impl PowerupKind {
    pub const ALL: [PowerupKind; 7] = [
        PowerupKind::Health,
        PowerupKind::Shield,
        PowerupKind::RapidFire,
        PowerupKind::MultiShot,
        PowerupKind::ScreenClear,
        PowerupKind::TimeSlow,
        PowerupKind::Homing,
    ];

    /// Timed powerups sit in `active_powerups`; the rest apply instantly
    pub fn is_timed(&self) -> bool {
        !matches!(self, PowerupKind::Health | PowerupKind::ScreenClear)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerupKind::Health => "health",
            PowerupKind::Shield => "shield",
            PowerupKind::RapidFire => "rapid_fire",
            PowerupKind::MultiShot => "multi_shot",
            PowerupKind::ScreenClear => "screen_clear",
            PowerupKind::TimeSlow => "time_slow",
            PowerupKind::Homing => "homing",
        }
    }
}

/// The player's ship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub pos: Vec2,
    pub vel: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub shield_active: bool,
    pub shield_remaining: f32,
    pub fire_cooldown: f32,
    pub special_cooldown: f32,
    /// Timed powerups and their remaining seconds
    pub active_powerups: BTreeMap<PowerupKind, f32>,
    pub score: u64,
    pub lives: u32,
}

impl Player {
    pub fn new(max_health: f32, lives: u32) -> Self {
        Self {
            pos: Vec2::new(PLAYER_START.0, PLAYER_START.1),
            vel: Vec2::ZERO,
            health: max_health,
            max_health,
            shield_active: false,
            shield_remaining: 0.0,
            fire_cooldown: 0.0,
            special_cooldown: 0.0,
            active_powerups: BTreeMap::new(),
            score: 0,
            lives,
        }
    }

    pub fn has(&self, kind: PowerupKind) -> bool {
        self.active_powerups.contains_key(&kind)
    }

    pub fn remaining(&self, kind: PowerupKind) -> f32 {
        self.active_powerups.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }

    /// Subtract damage, flooring at zero. Returns the health left.
    pub fn apply_damage(&mut self, amount: f32) -> f32 {
        self.health = (self.health - amount.max(0.0)).max(0.0);
        self.health
    }

    /// Restore health up to the cap. Returns the amount actually restored.
    pub fn heal(&mut self, amount: f32) -> f32 {
        let before = self.health;
        self.health = (self.health + amount.max(0.0)).min(self.max_health);
        self.health - before
    }

    /// Score only ever goes up
    pub fn add_score(&mut self, points: u64) {
        self.score = self.score.saturating_add(points);
    }

    /// Start or refresh (never extend) a timed powerup
    pub fn grant_timed(&mut self, kind: PowerupKind, duration: f32) {
        self.active_powerups.insert(kind, duration);
        if kind == PowerupKind::Shield {
            self.shield_active = true;
            self.shield_remaining = duration;
        }
    }

    /// Count down player timers; returns powerups that expired
    pub fn tick_timers(&mut self, dt: f32) -> Vec<PowerupKind> {
        self.fire_cooldown = (self.fire_cooldown - dt).max(0.0);
        self.special_cooldown = (self.special_cooldown - dt).max(0.0);

        let mut expired = Vec::new();
        for (kind, remaining) in self.active_powerups.iter_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                expired.push(*kind);
            }
        }
        for kind in &expired {
            self.active_powerups.remove(kind);
        }

        self.shield_remaining = self.remaining(PowerupKind::Shield);
        self.shield_active = self.shield_remaining > 0.0;
        expired
    }

    pub fn half_extent(&self) -> Vec2 {
        Vec2::new(PLAYER_HALF_EXTENT.0, PLAYER_HALF_EXTENT.1)
    }
}

/// Boss-only state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BossState {
    /// 1-based phase
    pub phase: u32,
    /// Absolute health values, strictly decreasing; crossing one advances the phase
    pub phase_health_thresholds: Vec<f32>,
    pub contact_cooldown: f32,
}

impl BossState {
    pub fn new(max_health: f32, fractions: &[f32]) -> Self {
        let mut thresholds: Vec<f32> = fractions
            .iter()
            .filter(|f| **f > 0.0 && **f < 1.0)
            .map(|f| f * max_health)
            .collect();
        thresholds.sort_by(|a, b| b.total_cmp(a));
        thresholds.dedup();
        Self {
            phase: 1,
            phase_health_thresholds: thresholds,
            contact_cooldown: 0.0,
        }
    }

    /// Phase implied by a health value
    pub fn phase_for(&self, health: f32) -> u32 {
        1 + self
            .phase_health_thresholds
            .iter()
            .filter(|t| health <= **t)
            .count() as u32
    }

    pub fn max_phase(&self) -> u32 {
        self.phase_health_thresholds.len() as u32 + 1
    }
}

/// An enemy ship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub id: EntityId,
    pub kind: EnemyKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub speed: f32,
    /// Kind-specific phase clock
    pub behavior_timer: f32,
    pub fire_cooldown: f32,
    pub fire_interval: f32,
    pub contact_damage: f32,
    pub score_value: u32,
    pub half_extent: Vec2,
    /// Fast enemies steer toward this x
    pub target_x: f32,
    pub boss: Option<BossState>,
}

impl Enemy {
    /// Build an enemy with tier modifiers applied
    pub fn new(
        id: EntityId,
        kind: EnemyKind,
        pos: Vec2,
        tuning: &Tuning,
        tier: DifficultyTier,
    ) -> Self {
        let stats = tuning.enemies.stats(kind);
        let mods = tier.modifiers();
        let health = (stats.health * mods.enemy_health).max(0.1);
        let fire_interval = if stats.fire_rate > 0.0 {
            1.0 / stats.fire_rate
        } else {
            f32::INFINITY
        };
        let boss = (kind == EnemyKind::Boss)
            .then(|| BossState::new(health, &tuning.enemies.boss_phase_thresholds));

        Self {
            id,
            kind,
            pos,
            vel: Vec2::ZERO,
            health,
            max_health: health,
            speed: stats.speed * mods.enemy_speed,
            behavior_timer: 0.0,
            fire_cooldown: fire_interval,
            fire_interval,
            contact_damage: stats.contact_damage * mods.enemy_damage,
            score_value: stats.score,
            half_extent: Vec2::new(stats.half_extent.0, stats.half_extent.1),
            target_x: pos.x,
            boss,
        }
    }

    pub fn is_boss(&self) -> bool {
        self.kind == EnemyKind::Boss
    }

    /// Apply damage; returns true if this destroyed the enemy
    pub fn take_damage(&mut self, amount: f32) -> bool {
        self.health -= amount;
        self.health <= 0.0
    }

    pub fn is_off_screen(&self) -> bool {
        self.pos.y > SCREEN_HEIGHT + OFFSCREEN_MARGIN
            || self.pos.x < -OFFSCREEN_MARGIN
            || self.pos.x > SCREEN_WIDTH + OFFSCREEN_MARGIN
    }
}

impl Pooled for Enemy {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// A projectile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bullet {
    pub id: EntityId,
    pub owner: BulletOwner,
    pub kind: BulletKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub damage: f32,
    pub lifetime_remaining: f32,
    /// Homing target; a lookup key checked for liveness, never an owning reference
    pub target: Option<EntityId>,
}

impl Bullet {
    pub fn half_extent(&self) -> Vec2 {
        match self.kind {
            BulletKind::Explosive => Vec2::new(EXPLOSIVE_HALF_EXTENT.0, EXPLOSIVE_HALF_EXTENT.1),
            _ => Vec2::new(BULLET_HALF_EXTENT.0, BULLET_HALF_EXTENT.1),
        }
    }

    pub fn is_off_screen(&self) -> bool {
        self.pos.x < -OFFSCREEN_MARGIN
            || self.pos.x > SCREEN_WIDTH + OFFSCREEN_MARGIN
            || self.pos.y < -OFFSCREEN_MARGIN
            || self.pos.y > SCREEN_HEIGHT + OFFSCREEN_MARGIN
    }
}

impl Pooled for Bullet {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// A pickup drifting down the screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Powerup {
    pub id: EntityId,
    pub kind: PowerupKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub lifetime_remaining: f32,
}

impl Powerup {
    pub fn half_extent(&self) -> Vec2 {
        Vec2::new(POWERUP_HALF_EXTENT.0, POWERUP_HALF_EXTENT.1)
    }
}

impl Pooled for Powerup {
    fn id(&self) -> EntityId {
        self.id
    }
}

/// Level/wave/difficulty state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveState {
    /// 1..=20
    pub current_level: u32,
    /// 1-based wave index inside the level
    pub current_wave_in_level: u32,
    /// 1-based wave index across the session (drives boss waves)
    pub wave_number: u32,
    pub difficulty: DifficultyTier,
    pub difficulty_multiplier: f32,
    pub enemies_remaining_in_wave: u32,
    pub boss_active: bool,
    /// This wave's only enemy is a boss
    pub boss_wave: bool,
    pub elapsed_wave_time: f32,
    pub phase: WavePhase,
}

impl WaveState {
    pub fn new(level: u32, difficulty: DifficultyTier) -> Self {
        Self {
            current_level: level.clamp(1, MAX_LEVELS),
            current_wave_in_level: 1,
            wave_number: 1,
            difficulty,
            difficulty_multiplier: difficulty.multiplier(),
            enemies_remaining_in_wave: 0,
            boss_active: false,
            boss_wave: false,
            elapsed_wave_time: 0.0,
            phase: WavePhase::WaveInProgress,
        }
    }

    /// A wave completes exactly when nothing is left and no boss is alive
    pub fn is_complete(&self) -> bool {
        self.enemies_remaining_in_wave == 0 && !self.boss_active
    }

    /// Record that an enemy belonging to this wave is gone
    pub fn enemy_removed(&mut self, was_boss: bool) {
        self.enemies_remaining_in_wave = self.enemies_remaining_in_wave.saturating_sub(1);
        if was_boss {
            self.boss_active = false;
        }
    }
}

/// Pool exhaustion counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolExhaustion {
    pub enemies: u64,
    pub bullets: u64,
    pub powerups: u64,
}

/// Running session metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimStats {
    pub ticks: u64,
    pub enemies_spawned: u64,
    pub enemies_destroyed: u64,
    pub shots_fired: u64,
    pub powerups_collected: u64,
    pub pool_exhausted: PoolExhaustion,
}

/// All mutable state of one session
#[derive(Debug, Clone)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub session: SessionState,
    pub player: Player,
    pub enemies: EntityPool<Enemy>,
    pub bullets: EntityPool<Bullet>,
    pub powerups: EntityPool<Powerup>,
    pub wave: WaveState,
    /// In-simulation seconds spent in `Playing`
    pub elapsed: f64,
    /// Simulation tick counter
    pub time_ticks: u64,
    /// Enemy-side time is frozen while positive
    pub time_freeze_remaining: f32,
    pub stats: SimStats,
    /// Next entity ID
    next_id: u32,
}

impl GameState {
    /// Fresh session state, sitting in the menu
    pub fn new(seed: u64, tuning: &Tuning, difficulty: DifficultyTier, level: u32) -> Self {
        let max_health = tuning.player.max_health * difficulty.modifiers().player_health;
        Self {
            seed,
            session: SessionState::Menu,
            player: Player::new(max_health, tuning.player.starting_lives.max(1)),
            enemies: EntityPool::new("enemy", MAX_ENEMIES),
            bullets: EntityPool::new("bullet", MAX_BULLETS),
            powerups: EntityPool::new("powerup", MAX_POWERUPS),
            wave: WaveState::new(level, difficulty),
            elapsed: 0.0,
            time_ticks: 0,
            time_freeze_remaining: 0.0,
            stats: SimStats::default(),
            next_id: PLAYER_ID.0 + 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Scale applied to enemy and enemy-bullet time
    pub fn enemy_time_scale(&self, tuning: &Tuning) -> f32 {
        if self.time_freeze_remaining > 0.0 {
            0.0
        } else if self.player.has(PowerupKind::TimeSlow) {
            tuning.powerups.time_slow_scale
        } else {
            1.0
        }
    }

    /// End-of-tick pass freeing every released slot
    pub fn compact_pools(&mut self) {
        self.enemies.compact();
        self.bullets.compact();
        self.powerups.compact();
    }

    /// Release all pools (session teardown)
    pub fn clear_pools(&mut self) {
        self.enemies.clear();
        self.bullets.clear();
        self.powerups.clear();
    }
}
