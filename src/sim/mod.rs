//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Time only advances through `Simulation::tick`
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering, audio or platform dependencies

pub mod behavior;
pub mod collision;
pub mod events;
pub mod pool;
pub mod progression;
pub mod snapshot;
pub mod spawn;
pub mod state;
pub mod tick;

pub use collision::{Aabb, CollisionReport, Kill};
pub use events::{EffectsSink, FrameEvent, FrameEvents};
pub use pool::{EntityId, EntityPool, Pooled};
pub use progression::ProgressionTracker;
pub use snapshot::Snapshot;
pub use spawn::SpawnDirector;
pub use state::{
    Bullet, BulletKind, BulletOwner, Enemy, EnemyKind, GameState, PLAYER_ID, Player, Powerup,
    PowerupKind, SessionState, SimStats, WavePhase, WaveState,
};
pub use tick::{InputAction, Simulation, TickInput};
