//! Data-driven game balance
//!
//! Every number that shapes difficulty lives here so it can be overridden
//! from JSON without touching simulation code. Defaults are the classic
//! per-frame values converted to per-second units.

use serde::{Deserialize, Serialize};

use crate::consts::MAX_LEVELS;
use crate::sim::state::{EnemyKind, PowerupKind};

/// Difficulty presets, chosen once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DifficultyTier {
    Cadet,
    Pilot,
    #[default]
    Commander,
    Ace,
    Legend,
}

impl DifficultyTier {
    pub const ALL: [DifficultyTier; 5] = [
        DifficultyTier::Cadet,
        DifficultyTier::Pilot,
        DifficultyTier::Commander,
        DifficultyTier::Ace,
        DifficultyTier::Legend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyTier::Cadet => "Cadet",
            DifficultyTier::Pilot => "Pilot",
            DifficultyTier::Commander => "Commander",
            DifficultyTier::Ace => "Ace",
            DifficultyTier::Legend => "Legend",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cadet" => Some(DifficultyTier::Cadet),
            "pilot" => Some(DifficultyTier::Pilot),
            "commander" => Some(DifficultyTier::Commander),
            "ace" => Some(DifficultyTier::Ace),
            "legend" => Some(DifficultyTier::Legend),
            _ => None,
        }
    }

    /// Score multiplier (the session's difficulty_multiplier)
    pub fn multiplier(&self) -> f32 {
        self.modifiers().score
    }

    /// Independent modifiers applied by this tier
    pub fn modifiers(&self) -> TierModifiers {
        match self {
            DifficultyTier::Cadet => TierModifiers {
                enemy_speed: 0.7,
                enemy_health: 0.8,
                enemy_damage: 0.8,
                spawn_rate: 0.8,
                player_damage: 1.5,
                player_health: 1.2,
                score: 1.0,
            },
            DifficultyTier::Pilot => TierModifiers {
                enemy_speed: 0.85,
                enemy_health: 0.9,
                enemy_damage: 0.9,
                spawn_rate: 0.9,
                player_damage: 1.2,
                player_health: 1.2,
                score: 1.2,
            },
            DifficultyTier::Commander => TierModifiers {
                enemy_speed: 1.0,
                enemy_health: 1.0,
                enemy_damage: 1.0,
                spawn_rate: 1.0,
                player_damage: 1.0,
                player_health: 1.0,
                score: 1.5,
            },
            DifficultyTier::Ace => TierModifiers {
                enemy_speed: 1.2,
                enemy_health: 1.3,
                enemy_damage: 1.2,
                spawn_rate: 1.2,
                player_damage: 0.8,
                player_health: 1.0,
                score: 2.0,
            },
            DifficultyTier::Legend => TierModifiers {
                enemy_speed: 1.5,
                enemy_health: 1.5,
                enemy_damage: 1.5,
                spawn_rate: 1.4,
                player_damage: 0.6,
                player_health: 1.0,
                score: 3.0,
            },
        }
    }
}

/// Per-tier multiplicative modifiers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierModifiers {
    pub enemy_speed: f32,
    pub enemy_health: f32,
    pub enemy_damage: f32,
    pub spawn_rate: f32,
    pub player_damage: f32,
    pub player_health: f32,
    pub score: f32,
}

/// Base stats for one enemy kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemyStats {
    pub health: f32,
    /// Pixels per second
    pub speed: f32,
    pub score: u32,
    /// Collision half-extents
    pub half_extent: (f32, f32),
    /// Shots per second
    pub fire_rate: f32,
    pub contact_damage: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub max_health: f32,
    pub speed: f32,
    /// Shots per second
    pub fire_rate: f32,
    pub bullet_speed: f32,
    pub bullet_damage: f32,
    pub multishot_spread: f32,
    pub special_cooldown: f32,
    pub time_freeze_duration: f32,
    pub starting_lives: u32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            speed: 300.0,
            fire_rate: 10.0,
            bullet_speed: 480.0,
            bullet_damage: 1.0,
            multishot_spread: 0.3,
            special_cooldown: 15.0,
            time_freeze_duration: 3.0,
            starting_lives: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyTuning {
    pub basic: EnemyStats,
    pub fast: EnemyStats,
    pub heavy: EnemyStats,
    pub zigzag: EnemyStats,
    pub boss: EnemyStats,
    pub bullet_damage: f32,
    pub bullet_speed: f32,
    /// Enemies hold fire beyond this distance from the player
    pub fire_range: f32,
    /// Boss phase boundaries as fractions of max health, decreasing
    pub boss_phase_thresholds: Vec<f32>,
    /// Seconds between repeated boss contact hits
    pub boss_contact_cooldown: f32,
}

impl Default for EnemyTuning {
    fn default() -> Self {
        Self {
            basic: EnemyStats {
                health: 1.0,
                speed: 120.0,
                score: 100,
                half_extent: (15.0, 15.0),
                fire_rate: 1.0,
                contact_damage: 10.0,
            },
            fast: EnemyStats {
                health: 1.0,
                speed: 240.0,
                score: 150,
                half_extent: (12.5, 12.5),
                fire_rate: 1.5,
                contact_damage: 10.0,
            },
            heavy: EnemyStats {
                health: 5.0,
                speed: 60.0,
                score: 300,
                half_extent: (22.5, 22.5),
                fire_rate: 0.5,
                contact_damage: 10.0,
            },
            zigzag: EnemyStats {
                health: 2.0,
                speed: 180.0,
                score: 200,
                half_extent: (17.5, 17.5),
                fire_rate: 0.8,
                contact_damage: 10.0,
            },
            boss: EnemyStats {
                health: 50.0,
                speed: 90.0,
                score: 1000,
                half_extent: (40.0, 40.0),
                fire_rate: 0.5,
                contact_damage: 25.0,
            },
            bullet_damage: 5.0,
            bullet_speed: 384.0,
            fire_range: 400.0,
            boss_phase_thresholds: vec![0.66, 0.33],
            boss_contact_cooldown: 1.0,
        }
    }
}

impl EnemyTuning {
    pub fn stats(&self, kind: EnemyKind) -> &EnemyStats {
        match kind {
            EnemyKind::Basic => &self.basic,
            EnemyKind::Fast => &self.fast,
            EnemyKind::Heavy => &self.heavy,
            EnemyKind::Zigzag => &self.zigzag,
            EnemyKind::Boss => &self.boss,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnTuning {
    /// Seconds between enemy spawns at level 1, Commander
    pub base_interval: f32,
    /// Floor for the spawn interval
    pub min_interval: f32,
    /// Fractional spawn-rate increase per level above 1
    pub level_rate_growth: f32,
    /// Quiet period before a wave's first spawn
    pub wave_delay: f32,
    pub enemies_per_wave_base: u32,
    pub enemies_per_wave_growth: u32,
    /// Every Nth wave of a session is a boss wave
    pub boss_wave_interval: u32,
}

impl Default for SpawnTuning {
    fn default() -> Self {
        Self {
            base_interval: 1.0,
            min_interval: 0.25,
            level_rate_growth: 0.05,
            wave_delay: 2.0,
            enemies_per_wave_base: 5,
            enemies_per_wave_growth: 2,
            boss_wave_interval: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerupTuning {
    /// Chance that a regular kill drops a powerup
    pub drop_chance: f32,
    /// Chance that a boss kill drops a powerup
    pub boss_drop_chance: f32,
    /// Relative weights in [`PowerupKind::ALL`] order
    pub weights: [u32; 7],
    /// Seconds a timed powerup stays active
    pub duration: f32,
    /// Seconds an uncollected powerup survives
    pub lifetime: f32,
    pub drift_speed: f32,
    pub health_restore: f32,
    /// Enemy-side time scale while TimeSlow is active
    pub time_slow_scale: f32,
}

impl Default for PowerupTuning {
    fn default() -> Self {
        Self {
            drop_chance: 0.15,
            boss_drop_chance: 1.0,
            weights: [25, 20, 20, 15, 10, 7, 3],
            duration: 10.0,
            lifetime: 15.0,
            drift_speed: 60.0,
            health_restore: 25.0,
            time_slow_scale: 0.5,
        }
    }
}

impl PowerupTuning {
    pub fn weight(&self, kind: PowerupKind) -> u32 {
        let index = PowerupKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(0);
        self.weights[index]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BulletTuning {
    pub lifetime: f32,
    pub homing_speed: f32,
    /// Radians per second
    pub homing_turn_rate: f32,
    pub homing_range: f32,
    pub explosive_speed: f32,
    pub explosive_damage: f32,
    pub explosive_radius: f32,
}

impl Default for BulletTuning {
    fn default() -> Self {
        Self {
            lifetime: 5.0,
            homing_speed: 360.0,
            homing_turn_rate: 6.0,
            homing_range: 200.0,
            explosive_speed: 300.0,
            explosive_damage: 5.0,
            explosive_radius: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionTuning {
    pub waves_per_level_base: u32,
    pub waves_per_level_growth: u32,
    /// Score needed to unlock level `i + 1`
    pub level_requirements: [u64; MAX_LEVELS as usize],
}

impl Default for ProgressionTuning {
    fn default() -> Self {
        Self {
            waves_per_level_base: 10,
            waves_per_level_growth: 2,
            level_requirements: [
                0, 1_000, 2_500, 5_000, 8_000, 12_000, 17_000, 23_000, 30_000, 40_000, 52_000,
                66_000, 82_000, 100_000, 120_000, 142_000, 166_000, 192_000, 220_000, 250_000,
            ],
        }
    }
}

impl ProgressionTuning {
    /// Number of waves that make up `level`
    pub fn waves_for_level(&self, level: u32) -> u32 {
        (self.waves_per_level_base + level.saturating_sub(1) * self.waves_per_level_growth).max(1)
    }

    /// Score required to unlock `level` (1-based)
    pub fn requirement(&self, level: u32) -> u64 {
        let index = level.clamp(1, MAX_LEVELS) as usize - 1;
        self.level_requirements[index]
    }

    /// Highest level whose requirement `score` meets
    pub fn highest_unlocked_for(&self, score: u64) -> u32 {
        (1..=MAX_LEVELS)
            .take_while(|&level| score >= self.requirement(level))
            .last()
            .unwrap_or(1)
    }
}

/// Complete balance table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub player: PlayerTuning,
    pub enemies: EnemyTuning,
    pub spawn: SpawnTuning,
    pub powerups: PowerupTuning,
    pub bullets: BulletTuning,
    pub progression: ProgressionTuning,
}

impl Tuning {
    /// Parse overrides; missing fields keep their defaults
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
