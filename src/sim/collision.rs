//! Collision detection and resolution
//!
//! Axis-aligned boxes around entity centers, no rotation. Resolution runs in
//! a fixed order so a given tick always plays out the same way:
//!
//! 1. Player bullets vs enemies
//! 2. Enemy bullets and enemy bodies vs the player
//! 3. Player vs powerups
//!
//! An enemy destroyed in pass 1 is released immediately and so is invisible
//! to every later check. Player death only sets a flag, so pickups touched in
//! the same tick are still collected; the session transition happens once
//! the tick finishes.

use glam::Vec2;

use super::events::{EffectsSink, FrameEvent};
use super::pool::EntityId;
use super::state::{BulletKind, BulletOwner, EnemyKind, GameState, PowerupKind};
use crate::tuning::Tuning;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec2,
    pub half: Vec2,
}

impl Aabb {
    pub fn new(center: Vec2, half: Vec2) -> Self {
        Self { center, half }
    }

    /// Strict overlap; boxes that merely touch do not collide
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let d = (self.center - other.center).abs();
        let reach = self.half + other.half;
        d.x < reach.x && d.y < reach.y
    }
}

/// An enemy kill credited to the player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kill {
    pub pos: Vec2,
    pub kind: EnemyKind,
}

/// What a resolution pass produced beyond the events
#[derive(Debug, Clone, Default)]
pub struct CollisionReport {
    /// Credited kills, in order; each gets a drop roll
    pub kills: Vec<Kill>,
    /// Health hit zero during pass 2
    pub player_died: bool,
    pub powerups_collected: Vec<PowerupKind>,
}

/// Run all three passes
pub fn resolve(state: &mut GameState, tuning: &Tuning, sink: &mut impl EffectsSink) -> CollisionReport {
    let mut report = CollisionReport::default();
    player_bullets_vs_enemies(state, tuning, sink, &mut report);
    hazards_vs_player(state, tuning, sink, &mut report);
    player_vs_powerups(state, tuning, sink, &mut report);
    report
}

fn player_bullets_vs_enemies(
    state: &mut GameState,
    tuning: &Tuning,
    sink: &mut impl EffectsSink,
    report: &mut CollisionReport,
) {
    for bullet_id in state.bullets.ids() {
        let Some(bullet) = state.bullets.get(bullet_id) else {
            continue;
        };
        if bullet.owner != BulletOwner::Player {
            continue;
        }
        let shot = Aabb::new(bullet.pos, bullet.half_extent());
        let (damage, kind) = (bullet.damage, bullet.kind);

        let hit = state
            .enemies
            .iter()
            .find(|e| shot.overlaps(&Aabb::new(e.pos, e.half_extent)))
            .map(|e| (e.id, e.pos));
        let Some((enemy_id, impact)) = hit else {
            continue;
        };

        state.bullets.release(bullet_id);
        damage_enemy(state, enemy_id, damage, sink, report);

        if kind == BulletKind::Explosive {
            let radius = tuning.bullets.explosive_radius;
            sink.emit(FrameEvent::Explosion { pos: impact, radius });
            let splash: Vec<EntityId> = state
                .enemies
                .iter()
                .filter(|e| e.id != enemy_id && e.pos.distance(impact) <= radius)
                .map(|e| e.id)
                .collect();
            for id in splash {
                damage_enemy(state, id, damage, sink, report);
            }
        }
    }
}

/// Apply player damage to one enemy, destroying it or advancing a boss phase
fn damage_enemy(
    state: &mut GameState,
    id: EntityId,
    damage: f32,
    sink: &mut impl EffectsSink,
    report: &mut CollisionReport,
) {
    let Some(enemy) = state.enemies.get_mut(id) else {
        return;
    };

    if enemy.take_damage(damage) {
        let (pos, kind, score_value) = (enemy.pos, enemy.kind, enemy.score_value);
        let was_boss = enemy.is_boss();
        state.enemies.release(id);
        state.wave.enemy_removed(was_boss);

        let points = (score_value as f32 * state.wave.difficulty_multiplier).round() as u64;
        state.player.add_score(points);
        state.stats.enemies_destroyed += 1;
        if was_boss {
            log::info!("boss destroyed (+{points})");
        }

        sink.emit(FrameEvent::EnemyDestroyed { pos, kind });
        report.kills.push(Kill { pos, kind });
        return;
    }

    let health = enemy.health;
    if let Some(boss) = enemy.boss.as_mut() {
        let phase = boss.phase_for(health);
        if phase > boss.phase {
            boss.phase = phase;
            log::info!("boss entered phase {phase}");
            sink.emit(FrameEvent::BossPhaseChanged { phase });
        }
    }
}

fn hazards_vs_player(
    state: &mut GameState,
    tuning: &Tuning,
    sink: &mut impl EffectsSink,
    report: &mut CollisionReport,
) {
    let player_box = Aabb::new(state.player.pos, state.player.half_extent());

    for bullet_id in state.bullets.ids() {
        let Some(bullet) = state.bullets.get(bullet_id) else {
            continue;
        };
        if bullet.owner != BulletOwner::Enemy
            || !player_box.overlaps(&Aabb::new(bullet.pos, bullet.half_extent()))
        {
            continue;
        }
        let damage = bullet.damage;
        state.bullets.release(bullet_id);
        hit_player(state, damage, sink, report);
    }

    for enemy_id in state.enemies.ids() {
        let Some(enemy) = state.enemies.get_mut(enemy_id) else {
            continue;
        };
        if !player_box.overlaps(&Aabb::new(enemy.pos, enemy.half_extent)) {
            continue;
        }

        let damage = enemy.contact_damage;
        if let Some(boss) = enemy.boss.as_mut() {
            // Bosses survive contact and hit again only after a cooldown
            if boss.contact_cooldown > 0.0 {
                continue;
            }
            boss.contact_cooldown = tuning.enemies.boss_contact_cooldown;
        } else {
            let (pos, kind) = (enemy.pos, enemy.kind);
            state.enemies.release(enemy_id);
            state.wave.enemy_removed(false);
            sink.emit(FrameEvent::EnemyDestroyed { pos, kind });
        }
        hit_player(state, damage, sink, report);
    }
}

fn hit_player(state: &mut GameState, damage: f32, sink: &mut impl EffectsSink, report: &mut CollisionReport) {
    if state.player.shield_active {
        sink.emit(FrameEvent::ShieldAbsorbed);
        return;
    }

    let remaining = state.player.apply_damage(damage);
    sink.emit(FrameEvent::PlayerHit {
        remaining_health: remaining,
    });
    if remaining <= 0.0 {
        report.player_died = true;
    }
}

fn player_vs_powerups(
    state: &mut GameState,
    tuning: &Tuning,
    sink: &mut impl EffectsSink,
    report: &mut CollisionReport,
) {
    let player_box = Aabb::new(state.player.pos, state.player.half_extent());

    for id in state.powerups.ids() {
        let Some(powerup) = state.powerups.get(id) else {
            continue;
        };
        if !player_box.overlaps(&Aabb::new(powerup.pos, powerup.half_extent())) {
            continue;
        }
        let kind = powerup.kind;
        state.powerups.release(id);
        apply_powerup(state, tuning, kind, sink);
        report.powerups_collected.push(kind);
    }
}

/// Apply a pickup's effect to the player
pub fn apply_powerup(state: &mut GameState, tuning: &Tuning, kind: PowerupKind, sink: &mut impl EffectsSink) {
    match kind {
        PowerupKind::Health => {
            state.player.heal(tuning.powerups.health_restore);
        }
        PowerupKind::ScreenClear => {
            let cleared: Vec<(EntityId, Vec2, EnemyKind)> = state
                .enemies
                .iter()
                .filter(|e| !e.is_boss())
                .map(|e| (e.id, e.pos, e.kind))
                .collect();
            for (id, pos, kind) in cleared {
                state.enemies.release(id);
                state.wave.enemy_removed(false);
                sink.emit(FrameEvent::EnemyDestroyed { pos, kind });
            }
        }
        timed => state.player.grant_timed(timed, tuning.powerups.duration),
    }

    state.stats.powerups_collected += 1;
    sink.emit(FrameEvent::PowerupCollected { kind });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{Bullet, Enemy, Powerup};
    use crate::tuning::DifficultyTier;

    fn setup() -> (GameState, Tuning) {
        let tuning = Tuning::default();
        let state = GameState::new(1, &tuning, DifficultyTier::Commander, 1);
        (state, tuning)
    }

    fn add_enemy(state: &mut GameState, tuning: &Tuning, kind: EnemyKind, pos: Vec2) -> EntityId {
        let id = state.next_entity_id();
        let enemy = Enemy::new(id, kind, pos, tuning, DifficultyTier::Commander);
        state.enemies.allocate(enemy).unwrap()
    }

    fn add_bullet(state: &mut GameState, owner: BulletOwner, kind: BulletKind, pos: Vec2, damage: f32) -> EntityId {
        let id = state.next_entity_id();
        state
            .bullets
            .allocate(Bullet {
                id,
                owner,
                kind,
                pos,
                vel: Vec2::ZERO,
                damage,
                lifetime_remaining: 5.0,
                target: None,
            })
            .unwrap()
    }

    #[test]
    fn test_aabb_overlap() {
        let a = Aabb::new(Vec2::ZERO, Vec2::splat(10.0));
        assert!(a.overlaps(&Aabb::new(Vec2::new(15.0, 5.0), Vec2::splat(10.0))));
        assert!(!a.overlaps(&Aabb::new(Vec2::new(25.0, 0.0), Vec2::splat(5.0))));
        // Touching edges
        assert!(!a.overlaps(&Aabb::new(Vec2::new(20.0, 0.0), Vec2::splat(10.0))));
    }

    #[test]
    fn test_kill_awards_scaled_score() {
        let (mut state, tuning) = setup();
        let pos = Vec2::new(300.0, 300.0);
        let enemy = add_enemy(&mut state, &tuning, EnemyKind::Heavy, pos);
        state.wave.enemies_remaining_in_wave = 1;
        add_bullet(&mut state, BulletOwner::Player, BulletKind::Normal, pos, 5.0);

        let mut events = Vec::new();
        let report = resolve(&mut state, &tuning, &mut events);

        assert!(!state.enemies.contains(enemy));
        assert_eq!(state.player.score, 450);
        assert_eq!(report.kills.len(), 1);
        assert_eq!(state.wave.enemies_remaining_in_wave, 0);
        let destroyed = events
            .iter()
            .filter(|e| matches!(e, FrameEvent::EnemyDestroyed { .. }))
            .count();
        assert_eq!(destroyed, 1);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_dead_enemy_skipped_by_later_bullets() {
        let (mut state, tuning) = setup();
        let pos = Vec2::new(300.0, 300.0);
        add_enemy(&mut state, &tuning, EnemyKind::Basic, pos);
        let first = add_bullet(&mut state, BulletOwner::Player, BulletKind::Normal, pos, 1.0);
        let second = add_bullet(&mut state, BulletOwner::Player, BulletKind::Normal, pos, 1.0);

        let mut events = Vec::new();
        let report = resolve(&mut state, &tuning, &mut events);
        assert_eq!(report.kills.len(), 1);
        assert!(!state.bullets.contains(first));
        // Nothing left to hit
        assert!(state.bullets.contains(second));
        assert_eq!(state.player.score, 150);
    }

    #[test]
    fn test_shield_absorbs_bullet() {
        let (mut state, tuning) = setup();
        state.player.grant_timed(PowerupKind::Shield, 5.0);
        let pos = state.player.pos;
        let bullet = add_bullet(&mut state, BulletOwner::Enemy, BulletKind::Normal, pos, 10.0);

        let mut events = Vec::new();
        resolve(&mut state, &tuning, &mut events);
        assert_eq!(state.player.health, 100.0);
        assert_eq!(state.player.shield_remaining, 5.0);
        assert!(!state.bullets.contains(bullet));
        assert_eq!(events, vec![FrameEvent::ShieldAbsorbed]);
    }

    #[test]
    fn test_death_is_flagged_not_applied() {
        let (mut state, tuning) = setup();
        state.player.health = 8.0;
        let pos = state.player.pos;
        add_bullet(&mut state, BulletOwner::Enemy, BulletKind::Normal, pos, 5.0);
        add_bullet(&mut state, BulletOwner::Enemy, BulletKind::Normal, pos, 5.0);
        add_bullet(&mut state, BulletOwner::Enemy, BulletKind::Normal, pos, 5.0);

        let mut events = Vec::new();
        let report = resolve(&mut state, &tuning, &mut events);
        assert!(report.player_died);
        assert_eq!(state.player.health, 0.0);
        // Every overlapping bullet still resolved
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_pickups_still_collected_on_lethal_tick() {
        let (mut state, tuning) = setup();
        state.player.health = 5.0;
        let pos = state.player.pos;
        add_bullet(&mut state, BulletOwner::Enemy, BulletKind::Normal, pos, 10.0);
        let id = state.next_entity_id();
        state
            .powerups
            .allocate(Powerup {
                id,
                kind: PowerupKind::Shield,
                pos,
                vel: Vec2::ZERO,
                lifetime_remaining: 10.0,
            })
            .unwrap();

        let mut events = Vec::new();
        let report = resolve(&mut state, &tuning, &mut events);
        assert!(report.player_died);
        assert_eq!(report.powerups_collected, vec![PowerupKind::Shield]);
        assert!(state.powerups.is_empty());
        assert!(state.player.has(PowerupKind::Shield));
        assert!(events.contains(&FrameEvent::PowerupCollected {
            kind: PowerupKind::Shield
        }));
    }

    #[test]
    fn test_contact_destroys_enemy_without_score() {
        let (mut state, tuning) = setup();
        let pos = state.player.pos;
        let enemy = add_enemy(&mut state, &tuning, EnemyKind::Fast, pos);
        state.wave.enemies_remaining_in_wave = 1;

        let mut events = Vec::new();
        resolve(&mut state, &tuning, &mut events);
        assert!(!state.enemies.contains(enemy));
        assert_eq!(state.player.health, 90.0);
        assert_eq!(state.player.score, 0);
        assert_eq!(state.wave.enemies_remaining_in_wave, 0);
    }

    #[test]
    fn test_boss_contact_cooldown() {
        let (mut state, tuning) = setup();
        let pos = state.player.pos;
        let boss = add_enemy(&mut state, &tuning, EnemyKind::Boss, pos);

        let mut events = Vec::new();
        resolve(&mut state, &tuning, &mut events);
        resolve(&mut state, &tuning, &mut events);
        assert!(state.enemies.contains(boss));
        assert_eq!(state.player.health, 75.0);
    }

    #[test]
    fn test_boss_phase_change_event() {
        let (mut state, tuning) = setup();
        let pos = Vec2::new(600.0, 150.0);
        add_enemy(&mut state, &tuning, EnemyKind::Boss, pos);
        add_bullet(&mut state, BulletOwner::Player, BulletKind::Normal, pos, 20.0);

        let mut events = Vec::new();
        resolve(&mut state, &tuning, &mut events);
        assert_eq!(events, vec![FrameEvent::BossPhaseChanged { phase: 2 }]);
    }

    #[test]
    fn test_explosive_splash() {
        let (mut state, tuning) = setup();
        let a = add_enemy(&mut state, &tuning, EnemyKind::Basic, Vec2::new(300.0, 300.0));
        let b = add_enemy(&mut state, &tuning, EnemyKind::Basic, Vec2::new(340.0, 300.0));
        let far = add_enemy(&mut state, &tuning, EnemyKind::Basic, Vec2::new(500.0, 300.0));
        add_bullet(&mut state, BulletOwner::Player, BulletKind::Explosive, Vec2::new(300.0, 300.0), 5.0);

        let mut events = Vec::new();
        let report = resolve(&mut state, &tuning, &mut events);
        assert!(!state.enemies.contains(a));
        assert!(!state.enemies.contains(b));
        assert!(state.enemies.contains(far));
        assert_eq!(report.kills.len(), 2);
        assert!(events.iter().any(|e| matches!(e, FrameEvent::Explosion { .. })));
    }

    #[test]
    fn test_powerup_pickup_refreshes() {
        let (mut state, tuning) = setup();
        state.player.grant_timed(PowerupKind::RapidFire, 2.0);
        let id = state.next_entity_id();
        let pos = state.player.pos;
        state
            .powerups
            .allocate(Powerup {
                id,
                kind: PowerupKind::RapidFire,
                pos,
                vel: Vec2::ZERO,
                lifetime_remaining: 10.0,
            })
            .unwrap();

        let mut events = Vec::new();
        resolve(&mut state, &tuning, &mut events);
        assert_eq!(state.player.remaining(PowerupKind::RapidFire), 10.0);
        assert!(state.powerups.is_empty());
        assert_eq!(
            events,
            vec![FrameEvent::PowerupCollected {
                kind: PowerupKind::RapidFire
            }]
        );
    }

    #[test]
    fn test_screen_clear_spares_boss() {
        let (mut state, tuning) = setup();
        add_enemy(&mut state, &tuning, EnemyKind::Basic, Vec2::new(100.0, 100.0));
        add_enemy(&mut state, &tuning, EnemyKind::Zigzag, Vec2::new(200.0, 100.0));
        let boss = add_enemy(&mut state, &tuning, EnemyKind::Boss, Vec2::new(600.0, 150.0));
        state.wave.enemies_remaining_in_wave = 3;
        state.wave.boss_active = true;

        let mut events = Vec::new();
        apply_powerup(&mut state, &tuning, PowerupKind::ScreenClear, &mut events);
        assert_eq!(state.enemies.ids(), vec![boss]);
        assert_eq!(state.wave.enemies_remaining_in_wave, 1);
        assert_eq!(state.player.score, 0);
    }
}
