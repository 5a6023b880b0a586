//! Cosmic Defenders - simulation core for a vertical arcade shooter
//!
//! Core modules:
//! - `sim`: Fixed-timestep simulation (entities, collisions, waves, session state)
//! - `tuning`: Data-driven game balance
//! - `persistence`: Typed leaderboard/progress records behind an external store
//! - `highscores` / `settings`: The records the store carries
//!
//! Rendering, audio and input polling live outside this crate. They read
//! [`sim::Snapshot`]s, react to [`sim::FrameEvent`]s and push
//! [`sim::InputAction`]s between ticks.

pub mod error;
pub mod highscores;
pub mod persistence;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use error::{Result, SimError};
pub use highscores::HighScores;
pub use settings::{QualityPreset, Settings};
pub use tuning::{DifficultyTier, Tuning};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Largest delta a single tick will integrate; the excess is dropped
    pub const MAX_TICK_DT: f32 = 1.0 / 20.0;

    /// Playfield dimensions (origin top-left, +y down)
    pub const SCREEN_WIDTH: f32 = 1200.0;
    pub const SCREEN_HEIGHT: f32 = 800.0;
    /// Entities this far beyond an edge count as off-screen
    pub const OFFSCREEN_MARGIN: f32 = 50.0;

    /// Pool capacities
    pub const MAX_BULLETS: usize = 500;
    pub const MAX_ENEMIES: usize = 100;
    pub const MAX_POWERUPS: usize = 50;

    /// Level range
    pub const MAX_LEVELS: u32 = 20;

    /// Collision half-extents (width/2, height/2)
    pub const PLAYER_HALF_EXTENT: (f32, f32) = (20.0, 20.0);
    pub const BULLET_HALF_EXTENT: (f32, f32) = (2.0, 5.0);
    pub const EXPLOSIVE_HALF_EXTENT: (f32, f32) = (5.0, 5.0);
    pub const POWERUP_HALF_EXTENT: (f32, f32) = (15.0, 15.0);

    /// Player spawn point
    pub const PLAYER_START: (f32, f32) = (SCREEN_WIDTH / 2.0, SCREEN_HEIGHT - 100.0);
    /// Height the boss settles at after entering
    pub const BOSS_HOVER_Y: f32 = 150.0;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}
