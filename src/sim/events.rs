//! Outbound feedback events
//!
//! The simulation never calls into rendering or audio. It pushes
//! [`FrameEvent`]s into an [`EffectsSink`] and the tick hands the collected
//! list back to the caller.

use glam::Vec2;
use serde::Serialize;

use super::state::{EnemyKind, PowerupKind};

/// Discrete things that happened during one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FrameEvent {
    EnemyDestroyed { pos: Vec2, kind: EnemyKind },
    PlayerHit { remaining_health: f32 },
    /// A hit landed on an active shield and was fully absorbed
    ShieldAbsorbed,
    PowerupCollected { kind: PowerupKind },
    WaveStarted { level: u32, wave: u32 },
    WaveCleared { level: u32, wave: u32 },
    LevelCleared { level: u32 },
    LevelUnlocked { level: u32 },
    BossSpawned { pos: Vec2 },
    BossPhaseChanged { phase: u32 },
    /// Explosive shell detonation
    Explosion { pos: Vec2, radius: f32 },
    SpecialActivated,
    LifeLost { lives_remaining: u32 },
    GameOver { score: u64 },
    Victory { score: u64 },
    /// Recoverable problem, e.g. corrupt persisted data replaced by defaults
    Warning { message: String },
    /// Internal inconsistency that forced a game over
    Diagnostic { message: String },
}

/// Receiver for feedback requests
pub trait EffectsSink {
    fn emit(&mut self, event: FrameEvent);
}

/// Events returned from a tick
pub type FrameEvents = Vec<FrameEvent>;

impl EffectsSink for Vec<FrameEvent> {
    fn emit(&mut self, event: FrameEvent) {
        self.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_keeps_order() {
        let mut events = FrameEvents::new();
        events.emit(FrameEvent::ShieldAbsorbed);
        events.emit(FrameEvent::LevelCleared { level: 2 });
        assert_eq!(
            events,
            vec![FrameEvent::ShieldAbsorbed, FrameEvent::LevelCleared { level: 2 }]
        );
    }
}
