//! Invariants over random input scripts

use glam::Vec2;
use proptest::prelude::*;

use cosmic_defenders::persistence::Profile;
use cosmic_defenders::sim::{FrameEvent, InputAction, PowerupKind, Simulation, WavePhase, WaveState};
use cosmic_defenders::{DifficultyTier, Tuning};

fn action() -> impl Strategy<Value = InputAction> {
    prop_oneof![
        4 => (-1.5f32..1.5, -1.5f32..1.5).prop_map(|(x, y)| InputAction::Move(Vec2::new(x, y))),
        4 => Just(InputAction::Fire),
        1 => Just(InputAction::ActivateSpecial),
        1 => Just(InputAction::Pause),
    ]
}

fn tier() -> impl Strategy<Value = DifficultyTier> {
    prop::sample::select(DifficultyTier::ALL.to_vec())
}

fn script() -> impl Strategy<Value = Vec<(Vec<InputAction>, f32)>> {
    prop::collection::vec((prop::collection::vec(action(), 0..3), 0.0f32..0.08), 1..600)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_health_bounded_and_score_monotonic(seed in any::<u64>(), tier in tier(), script in script()) {
        let mut tuning = Tuning::default();
        // Plenty of pickups so healing gets exercised
        tuning.powerups.drop_chance = 0.5;
        let mut sim = Simulation::new(tuning, Profile::default(), seed);
        sim.open_name_entry().unwrap();
        sim.start_game(tier, 1, 0.0).unwrap();

        let mut last = sim.snapshot();
        for (actions, dt) in script {
            for action in actions {
                sim.submit_input(action);
            }
            let events = sim.tick(dt);
            let now = sim.snapshot();

            prop_assert!(now.player.health >= 0.0);
            prop_assert!(now.player.health <= now.player.max_health);
            prop_assert!(now.player.score >= last.player.score);

            let healed = events.iter().any(|e| *e == FrameEvent::PowerupCollected { kind: PowerupKind::Health });
            if !healed {
                prop_assert!(now.player.health <= last.player.health);
            }
            prop_assert!(now.enemies.len() <= cosmic_defenders::consts::MAX_ENEMIES);
            prop_assert!(now.bullets.len() <= cosmic_defenders::consts::MAX_BULLETS);
            last = now;
        }
    }

    #[test]
    fn test_wave_state_round_trip(
        level in 1u32..=20,
        wave in 1u32..40,
        remaining in 0u32..200,
        boss in any::<bool>(),
        tier in tier(),
    ) {
        let mut state = WaveState::new(level, tier);
        state.current_wave_in_level = wave;
        state.enemies_remaining_in_wave = remaining;
        state.boss_active = boss;
        state.phase = WavePhase::WaveCleared;

        let json = serde_json::to_string(&state).unwrap();
        let back: WaveState = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, state);
    }

    #[test]
    fn test_zero_tick_changes_nothing(seed in any::<u64>(), warmup in 1usize..300) {
        let mut sim = Simulation::new(Tuning::default(), Profile::default(), seed);
        sim.open_name_entry().unwrap();
        sim.start_game(DifficultyTier::Ace, 1, 0.0).unwrap();
        for i in 0..warmup {
            sim.submit_input(InputAction::Fire);
            sim.submit_input(InputAction::Move(Vec2::new((i as f32 * 0.1).cos(), 0.0)));
            sim.tick(1.0 / 60.0);
        }

        let before = serde_json::to_string(&sim.snapshot()).unwrap();
        sim.submit_input(InputAction::Fire);
        sim.tick(0.0);
        let after = serde_json::to_string(&sim.snapshot()).unwrap();
        prop_assert_eq!(before, after);
    }
}
