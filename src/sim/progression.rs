//! Wave and level progression
//!
//! `WaveInProgress -> WaveCleared -> (next wave | LevelCleared -> next level | Victory)`
//!
//! Clearing is evaluated at the end of a tick so the transition lands in the
//! same tick as the last kill. Starting the following wave happens at the
//! start of the next tick.

use super::events::{EffectsSink, FrameEvent};
use super::spawn::SpawnDirector;
use super::state::{WavePhase, WaveState};
use crate::consts::MAX_LEVELS;
use crate::tuning::Tuning;

/// Tracks wave/level transitions and which levels are unlocked
#[derive(Debug, Clone)]
pub struct ProgressionTracker {
    highest_unlocked_level: u32,
}

impl ProgressionTracker {
    pub fn new(highest_unlocked_level: u32) -> Self {
        Self {
            highest_unlocked_level: highest_unlocked_level.clamp(1, MAX_LEVELS),
        }
    }

    pub fn highest_unlocked_level(&self) -> u32 {
        self.highest_unlocked_level
    }

    pub fn is_unlocked(&self, level: u32) -> bool {
        (1..=self.highest_unlocked_level).contains(&level)
    }

    /// Unlock every level `score` qualifies for. Returns newly unlocked levels.
    pub fn unlock_for_score(&mut self, tuning: &Tuning, score: u64) -> Vec<u32> {
        let reached = tuning.progression.highest_unlocked_for(score);
        if reached <= self.highest_unlocked_level {
            return Vec::new();
        }
        let unlocked: Vec<u32> = (self.highest_unlocked_level + 1..=reached).collect();
        self.highest_unlocked_level = reached;
        log::info!("unlocked levels up to {reached}");
        unlocked
    }

    /// End-of-tick check: has the current wave just been cleared?
    pub fn evaluate(
        &mut self,
        wave: &mut WaveState,
        tuning: &Tuning,
        score: u64,
        sink: &mut impl EffectsSink,
    ) -> WavePhase {
        if wave.phase != WavePhase::WaveInProgress || !wave.is_complete() {
            return wave.phase;
        }

        wave.phase = WavePhase::WaveCleared;
        log::info!(
            "wave {} of level {} cleared",
            wave.current_wave_in_level,
            wave.current_level
        );
        sink.emit(FrameEvent::WaveCleared {
            level: wave.current_level,
            wave: wave.current_wave_in_level,
        });

        if wave.current_wave_in_level < tuning.progression.waves_for_level(wave.current_level) {
            return wave.phase;
        }

        wave.phase = WavePhase::LevelCleared;
        log::info!("level {} cleared", wave.current_level);
        sink.emit(FrameEvent::LevelCleared {
            level: wave.current_level,
        });
        for level in self.unlock_for_score(tuning, score) {
            sink.emit(FrameEvent::LevelUnlocked { level });
        }

        if wave.current_level >= MAX_LEVELS {
            wave.phase = WavePhase::Victory;
            log::info!("all levels cleared");
            sink.emit(FrameEvent::Victory { score });
        }
        wave.phase
    }

    /// Start-of-tick step: move on from a cleared wave or level
    pub fn advance(
        &mut self,
        wave: &mut WaveState,
        director: &mut SpawnDirector,
        tuning: &Tuning,
        sink: &mut impl EffectsSink,
    ) {
        match wave.phase {
            WavePhase::WaveCleared => {
                wave.current_wave_in_level += 1;
            }
            WavePhase::LevelCleared => {
                wave.current_level += 1;
                wave.current_wave_in_level = 1;
            }
            WavePhase::WaveInProgress | WavePhase::Victory => return,
        }
        wave.wave_number += 1;
        director.begin_wave(wave, tuning, sink);
    }
}
