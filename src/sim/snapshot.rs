//! Read-only view for renderers
//!
//! A snapshot is an owned copy; nothing in it can reach back into the
//! simulation.

use glam::Vec2;
use serde::Serialize;

use super::pool::EntityId;
use super::state::{
    BulletKind, BulletOwner, EnemyKind, GameState, PowerupKind, SessionState, SimStats, WaveState,
};

#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub pos: Vec2,
    pub health: f32,
    pub max_health: f32,
    pub shield_active: bool,
    pub shield_remaining: f32,
    pub special_cooldown: f32,
    pub active_powerups: Vec<(PowerupKind, f32)>,
    pub score: u64,
    pub lives: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnemyView {
    pub id: EntityId,
    pub kind: EnemyKind,
    pub pos: Vec2,
    pub health: f32,
    pub max_health: f32,
    /// Boss phase, if a boss
    pub phase: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulletView {
    pub id: EntityId,
    pub owner: BulletOwner,
    pub kind: BulletKind,
    pub pos: Vec2,
    pub vel: Vec2,
}

#[derive(Debug, Clone, Serialize)]
pub struct PowerupView {
    pub id: EntityId,
    pub kind: PowerupKind,
    pub pos: Vec2,
    pub lifetime_remaining: f32,
}

/// Everything a presentation layer needs for one frame
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub session: SessionState,
    pub player_name: String,
    pub player: PlayerView,
    pub enemies: Vec<EnemyView>,
    pub bullets: Vec<BulletView>,
    pub powerups: Vec<PowerupView>,
    pub wave: WaveState,
    pub elapsed: f64,
    pub time_freeze_remaining: f32,
    pub stats: SimStats,
}

impl Snapshot {
    pub fn capture(state: &GameState, player_name: &str) -> Self {
        let p = &state.player;
        Self {
            session: state.session,
            player_name: player_name.to_string(),
            player: PlayerView {
                pos: p.pos,
                health: p.health,
                max_health: p.max_health,
                shield_active: p.shield_active,
                shield_remaining: p.shield_remaining,
                special_cooldown: p.special_cooldown,
                active_powerups: p.active_powerups.iter().map(|(k, t)| (*k, *t)).collect(),
                score: p.score,
                lives: p.lives,
            },
            enemies: state
                .enemies
                .iter()
                .map(|e| EnemyView {
                    id: e.id,
                    kind: e.kind,
                    pos: e.pos,
                    health: e.health,
                    max_health: e.max_health,
                    phase: e.boss.as_ref().map(|b| b.phase),
                })
                .collect(),
            bullets: state
                .bullets
                .iter()
                .map(|b| BulletView {
                    id: b.id,
                    owner: b.owner,
                    kind: b.kind,
                    pos: b.pos,
                    vel: b.vel,
                })
                .collect(),
            powerups: state
                .powerups
                .iter()
                .map(|p| PowerupView {
                    id: p.id,
                    kind: p.kind,
                    pos: p.pos,
                    lifetime_remaining: p.lifetime_remaining,
                })
                .collect(),
            wave: state.wave.clone(),
            elapsed: state.elapsed,
            time_freeze_remaining: state.time_freeze_remaining,
            stats: state.stats,
        }
    }

    pub fn enemy(&self, id: EntityId) -> Option<&EnemyView> {
        self.enemies.iter().find(|e| e.id == id)
    }
}
