//! Per-kind kinematics and firing
//!
//! One switch on the kind tag per entity family. Enemy-side motion is
//! integrated with the scaled delta (TimeSlow / freeze); the player, player
//! bullets and pickups always use the real delta.

use glam::Vec2;
use rand::Rng;

use super::events::{EffectsSink, FrameEvent};
use super::pool::EntityId;
use super::state::{
    Bullet, BulletKind, BulletOwner, Enemy, EnemyKind, GameState, PLAYER_ID, PowerupKind,
};
use crate::consts::*;
use crate::normalize_angle;
use crate::tuning::Tuning;

/// Seconds between Fast-enemy retargets
const FAST_RETARGET_INTERVAL: f32 = 0.5;
/// Spread of the boss phase-1 volley (radians between shots)
const BOSS_SPREAD_STEP: f32 = 0.2;
const BOSS_RING_SIZE: usize = 8;

/// Allocate a bullet, assigning it a fresh id. Exhaustion skips the shot.
pub(crate) fn spawn_bullet(state: &mut GameState, mut bullet: Bullet) -> Option<EntityId> {
    bullet.id = state.next_entity_id();
    match state.bullets.allocate(bullet) {
        Ok(id) => Some(id),
        Err(err) => {
            state.stats.pool_exhausted.bullets += 1;
            log::debug!("shot skipped: {err}");
            None
        }
    }
}

fn bullet(owner: BulletOwner, kind: BulletKind, pos: Vec2, vel: Vec2, damage: f32, lifetime: f32) -> Bullet {
    Bullet {
        id: PLAYER_ID,
        owner,
        kind,
        pos,
        vel,
        damage,
        lifetime_remaining: lifetime,
        target: None,
    }
}

/// Unit vector at `angle` radians (+y is down)
fn heading(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Move the player by a direction intent, clamped to the playfield
pub fn move_player(state: &mut GameState, tuning: &Tuning, intent: Vec2, dt: f32) {
    let player = &mut state.player;
    let dir = if intent.length_squared() > 1.0 {
        intent.normalize_or_zero()
    } else {
        intent
    };

    let mut speed = tuning.player.speed;
    if player.has(PowerupKind::RapidFire) {
        speed *= 1.2;
    }
    if player.shield_active {
        speed *= 0.8;
    }

    player.vel = dir * speed;
    player.pos += player.vel * dt;

    let half = player.half_extent();
    player.pos.x = player.pos.x.clamp(half.x, SCREEN_WIDTH - half.x);
    player.pos.y = player.pos.y.clamp(half.y, SCREEN_HEIGHT - half.y);
}

/// Fire the player's guns if the cooldown allows. Returns shots spawned.
pub fn player_fire(state: &mut GameState, tuning: &Tuning) -> u32 {
    if state.player.fire_cooldown > 0.0 {
        return 0;
    }

    let player = &state.player;
    let mut rate = tuning.player.fire_rate;
    if player.has(PowerupKind::RapidFire) {
        rate *= 2.0;
    }
    let kind = if player.has(PowerupKind::Homing) {
        BulletKind::Homing
    } else {
        BulletKind::Normal
    };
    let speed = match kind {
        BulletKind::Homing => tuning.bullets.homing_speed,
        _ => tuning.player.bullet_speed,
    };
    let damage = tuning.player.bullet_damage * state.wave.difficulty.modifiers().player_damage;
    let muzzle = player.pos - Vec2::new(0.0, player.half_extent().y);

    let up = -std::f32::consts::FRAC_PI_2;
    let spread = tuning.player.multishot_spread;
    let angles: Vec<f32> = if player.has(PowerupKind::MultiShot) {
        vec![up - spread, up, up + spread]
    } else {
        vec![up]
    };

    state.player.fire_cooldown = if rate > 0.0 { 1.0 / rate } else { f32::INFINITY };

    let mut fired = 0;
    for angle in angles {
        let shot = bullet(
            BulletOwner::Player,
            kind,
            muzzle,
            heading(angle) * speed,
            damage,
            tuning.bullets.lifetime,
        );
        if spawn_bullet(state, shot).is_some() {
            fired += 1;
        }
    }
    state.stats.shots_fired += fired as u64;
    fired
}

/// Time freeze plus one explosive shell. Returns false while on cooldown.
pub fn activate_special(state: &mut GameState, tuning: &Tuning, sink: &mut impl EffectsSink) -> bool {
    if state.player.special_cooldown > 0.0 {
        return false;
    }

    state.player.special_cooldown = tuning.player.special_cooldown;
    state.time_freeze_remaining = tuning.player.time_freeze_duration;

    let damage = tuning.bullets.explosive_damage * state.wave.difficulty.modifiers().player_damage;
    let muzzle = state.player.pos - Vec2::new(0.0, state.player.half_extent().y);
    let shell = bullet(
        BulletOwner::Player,
        BulletKind::Explosive,
        muzzle,
        Vec2::new(0.0, -tuning.bullets.explosive_speed),
        damage,
        tuning.bullets.lifetime,
    );
    if spawn_bullet(state, shell).is_some() {
        state.stats.shots_fired += 1;
    }

    log::debug!("special activated at t={:.2}", state.elapsed);
    sink.emit(FrameEvent::SpecialActivated);
    true
}

/// Kind-specific velocity for this step
fn steer_enemy(enemy: &mut Enemy, player_pos: Vec2, rng: &mut impl Rng) {
    let speed = enemy.speed;
    let t = enemy.behavior_timer;

    enemy.vel = match enemy.kind {
        EnemyKind::Basic => {
            let dx = (player_pos.x - enemy.pos.x).clamp(-speed * 0.3, speed * 0.3);
            Vec2::new(dx, speed)
        }
        EnemyKind::Fast => {
            // behavior_timer doubles as the retarget clock
            if enemy.behavior_timer >= FAST_RETARGET_INTERVAL {
                enemy.behavior_timer = 0.0;
                enemy.target_x = rng.random_range(OFFSCREEN_MARGIN..SCREEN_WIDTH - OFFSCREEN_MARGIN);
            }
            let dx = (enemy.target_x - enemy.pos.x).clamp(-speed, speed);
            Vec2::new(dx, speed)
        }
        EnemyKind::Heavy => Vec2::new((t * 1.5).sin() * speed * 0.5, speed * 0.8),
        EnemyKind::Zigzag => Vec2::new((t * 3.0).sin() * speed, speed * 0.7),
        EnemyKind::Boss => boss_velocity(enemy, player_pos),
    };
}

fn boss_velocity(enemy: &Enemy, player_pos: Vec2) -> Vec2 {
    let speed = enemy.speed;
    if enemy.pos.y < BOSS_HOVER_Y {
        return Vec2::new(0.0, speed);
    }

    let t = enemy.behavior_timer;
    let phase = enemy.boss.as_ref().map_or(1, |b| b.phase);
    let target = match phase {
        // sweep
        1 => Vec2::new(SCREEN_WIDTH / 2.0 + (t * 0.5).sin() * SCREEN_WIDTH * 0.35, BOSS_HOVER_Y),
        // orbit
        2 => Vec2::new(
            SCREEN_WIDTH / 2.0 + t.cos() * 200.0,
            BOSS_HOVER_Y + 40.0 + t.sin() * 60.0,
        ),
        // press
        _ => Vec2::new(player_pos.x, BOSS_HOVER_Y + 100.0),
    };
    let max_speed = if phase >= 3 { speed * 1.2 } else { speed * 1.5 };
    ((target - enemy.pos) * 2.0).clamp_length_max(max_speed)
}

/// Bullets an enemy wants to fire this step
fn enemy_volley(enemy: &Enemy, player_pos: Vec2, tuning: &Tuning, damage: f32) -> Vec<Bullet> {
    let speed = tuning.enemies.bullet_speed;
    let lifetime = tuning.bullets.lifetime;
    let to_player = player_pos - enemy.pos;
    let aim = to_player.y.atan2(to_player.x);
    let muzzle = enemy.pos + Vec2::new(0.0, enemy.half_extent.y);
    let shot = |angle: f32, kind: BulletKind, speed: f32, damage: f32| {
        bullet(BulletOwner::Enemy, kind, muzzle, heading(angle) * speed, damage, lifetime)
    };

    match (&enemy.boss, enemy.kind) {
        (Some(boss), EnemyKind::Boss) => match boss.phase {
            1 => (-2..=2)
                .map(|i| shot(aim + i as f32 * BOSS_SPREAD_STEP, BulletKind::Normal, speed, damage))
                .collect(),
            2 => (0..BOSS_RING_SIZE)
                .map(|i| {
                    let angle = i as f32 * std::f32::consts::TAU / BOSS_RING_SIZE as f32;
                    shot(angle, BulletKind::Normal, speed, damage)
                })
                .collect(),
            _ => [-0.5f32, 0.5]
                .iter()
                .map(|offset| {
                    let mut missile = shot(
                        aim + offset,
                        BulletKind::Homing,
                        speed * 0.6,
                        damage * 2.0,
                    );
                    missile.target = Some(PLAYER_ID);
                    missile
                })
                .collect(),
        },
        _ => vec![shot(aim, BulletKind::Normal, speed, damage)],
    }
}

/// Advance every enemy, release the ones that left the screen and fire
/// whatever volleys came due. `dt` is already time-scaled.
pub fn update_enemies(state: &mut GameState, tuning: &Tuning, rng: &mut impl Rng, dt: f32) {
    if dt <= 0.0 {
        return;
    }

    let player_pos = state.player.pos;
    let damage_mult = state.wave.difficulty.modifiers().enemy_damage;
    let damage = tuning.enemies.bullet_damage * damage_mult;
    let fire_range = tuning.enemies.fire_range;

    let mut volleys = Vec::new();
    let mut exited = Vec::new();
    state.enemies.retain_live(|enemy| {
        enemy.behavior_timer += dt;
        steer_enemy(enemy, player_pos, rng);
        enemy.pos += enemy.vel * dt;

        if let Some(boss) = enemy.boss.as_mut() {
            boss.contact_cooldown = (boss.contact_cooldown - dt).max(0.0);
            enemy.pos.x = enemy.pos.x.clamp(enemy.half_extent.x, SCREEN_WIDTH - enemy.half_extent.x);
        }

        if enemy.is_off_screen() {
            exited.push(enemy.is_boss());
            return false;
        }

        enemy.fire_cooldown -= dt;
        if enemy.fire_cooldown <= 0.0 {
            enemy.fire_cooldown = enemy.fire_interval;
            let on_screen = enemy.pos.y > 0.0;
            let in_range = enemy.is_boss() || enemy.pos.distance(player_pos) <= fire_range;
            if on_screen && in_range {
                volleys.extend(enemy_volley(enemy, player_pos, tuning, damage));
            }
        }
        true
    });

    for was_boss in exited {
        state.wave.enemy_removed(was_boss);
    }
    for shot in volleys {
        spawn_bullet(state, shot);
    }
}

/// Nearest live enemy to `pos` within `range`
fn nearest_enemy(state: &GameState, pos: Vec2, range: f32) -> Option<(EntityId, Vec2)> {
    state
        .enemies
        .iter()
        .map(|e| (e.id, e.pos, e.pos.distance_squared(pos)))
        .filter(|(_, _, d2)| *d2 <= range * range)
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(id, pos, _)| (id, pos))
}

/// Rotate `vel` toward `target` by at most `max_turn` radians, keeping speed
pub fn steer_toward(vel: Vec2, from: Vec2, target: Vec2, max_turn: f32) -> Vec2 {
    let speed = vel.length();
    let to_target = target - from;
    if speed <= f32::EPSILON || to_target.length_squared() <= f32::EPSILON {
        return vel;
    }

    let current = vel.y.atan2(vel.x);
    let desired = to_target.y.atan2(to_target.x);
    let turn = normalize_angle(desired - current).clamp(-max_turn, max_turn);
    heading(current + turn) * speed
}

/// Advance every bullet: lifetimes, homing steering, motion, expiry.
/// Enemy bullets move on `enemy_dt`.
pub fn update_bullets(state: &mut GameState, tuning: &Tuning, dt: f32, enemy_dt: f32) {
    let turn_rate = tuning.bullets.homing_turn_rate;
    let range = tuning.bullets.homing_range;
    let player_pos = state.player.pos;

    // Target resolution first, against the pool as it stood before anything moved
    let mut aims: Vec<(EntityId, Option<(EntityId, Vec2)>)> = Vec::new();
    for b in state.bullets.iter() {
        if b.kind != BulletKind::Homing {
            continue;
        }
        let aim = match b.owner {
            BulletOwner::Enemy => Some((PLAYER_ID, player_pos)),
            BulletOwner::Player => match b.target.and_then(|id| state.enemies.get(id)) {
                Some(target) => Some((target.id, target.pos)),
                None => nearest_enemy(state, b.pos, range),
            },
        };
        aims.push((b.id, aim));
    }

    let mut aims = aims.into_iter().peekable();
    state.bullets.retain_live(|b| {
        let step = match b.owner {
            BulletOwner::Player => dt,
            BulletOwner::Enemy => enemy_dt,
        };

        if aims.peek().is_some_and(|(id, _)| *id == b.id) {
            if let Some((_, aim)) = aims.next() {
                b.target = aim.map(|(id, _)| id);
                if let Some((_, target_pos)) = aim {
                    b.vel = steer_toward(b.vel, b.pos, target_pos, turn_rate * step);
                }
            }
        }

        b.lifetime_remaining -= step;
        b.pos += b.vel * step;
        b.lifetime_remaining > 0.0 && !b.is_off_screen()
    });
}

/// Drift pickups and expire uncollected ones
pub fn update_powerups(state: &mut GameState, dt: f32) {
    state.powerups.retain_live(|p| {
        p.lifetime_remaining -= dt;
        p.pos += p.vel * dt;
        p.lifetime_remaining > 0.0 && p.pos.y <= SCREEN_HEIGHT + OFFSCREEN_MARGIN
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::DifficultyTier;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn playing_state() -> (GameState, Tuning) {
        let tuning = Tuning::default();
        let state = GameState::new(7, &tuning, DifficultyTier::Commander, 1);
        (state, tuning)
    }

    fn add_enemy(state: &mut GameState, tuning: &Tuning, kind: EnemyKind, pos: Vec2) -> EntityId {
        let id = state.next_entity_id();
        let enemy = Enemy::new(id, kind, pos, tuning, DifficultyTier::Commander);
        state.enemies.allocate(enemy).unwrap()
    }

    #[test]
    fn test_steer_toward_is_bounded() {
        let vel = Vec2::new(0.0, -100.0);
        // Target directly to the right: a 90 degree turn wanted
        let out = steer_toward(vel, Vec2::ZERO, Vec2::new(100.0, 0.0), 0.1);
        let turned = normalize_angle(out.y.atan2(out.x) - vel.y.atan2(vel.x));
        assert!((turned.abs() - 0.1).abs() < 1e-4);
        assert!((out.length() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_steer_toward_converges_when_close() {
        let vel = Vec2::new(0.0, -100.0);
        let out = steer_toward(vel, Vec2::ZERO, Vec2::new(1.0, -100.0), 0.5);
        let dir = out.normalize();
        let want = Vec2::new(1.0, -100.0).normalize();
        assert!(dir.distance(want) < 1e-4);
    }

    #[test]
    fn test_player_clamped_to_screen() {
        let (mut state, tuning) = playing_state();
        for _ in 0..600 {
            move_player(&mut state, &tuning, Vec2::new(-1.0, 0.0), SIM_DT);
        }
        assert_eq!(state.player.pos.x, PLAYER_HALF_EXTENT.0);
    }

    #[test]
    fn test_fire_respects_cooldown() {
        let (mut state, tuning) = playing_state();
        assert_eq!(player_fire(&mut state, &tuning), 1);
        assert_eq!(player_fire(&mut state, &tuning), 0);
        assert!((state.player.fire_cooldown - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_multishot_and_rapid_fire() {
        let (mut state, tuning) = playing_state();
        state.player.grant_timed(PowerupKind::MultiShot, 10.0);
        state.player.grant_timed(PowerupKind::RapidFire, 10.0);
        assert_eq!(player_fire(&mut state, &tuning), 3);
        assert!((state.player.fire_cooldown - 0.05).abs() < 1e-6);
        assert_eq!(state.stats.shots_fired, 3);
    }

    #[test]
    fn test_special_gated_by_cooldown() {
        let (mut state, tuning) = playing_state();
        let mut events = Vec::new();
        assert!(activate_special(&mut state, &tuning, &mut events));
        assert!(!activate_special(&mut state, &tuning, &mut events));
        assert_eq!(events, vec![FrameEvent::SpecialActivated]);
        assert_eq!(state.time_freeze_remaining, 3.0);
        assert!(state.bullets.iter().any(|b| b.kind == BulletKind::Explosive));
    }

    #[test]
    fn test_enemy_leaving_screen_counts_toward_wave() {
        let (mut state, tuning) = playing_state();
        let mut rng = Pcg32::seed_from_u64(1);
        add_enemy(&mut state, &tuning, EnemyKind::Basic, Vec2::new(600.0, SCREEN_HEIGHT + 49.0));
        state.wave.enemies_remaining_in_wave = 1;
        update_enemies(&mut state, &tuning, &mut rng, 0.1);
        assert!(state.enemies.is_empty());
        assert!(state.wave.is_complete());
    }

    #[test]
    fn test_frozen_enemies_do_not_move() {
        let (mut state, tuning) = playing_state();
        let mut rng = Pcg32::seed_from_u64(1);
        let id = add_enemy(&mut state, &tuning, EnemyKind::Zigzag, Vec2::new(300.0, 100.0));
        update_enemies(&mut state, &tuning, &mut rng, 0.0);
        assert_eq!(state.enemies.get(id).map(|e| e.pos), Some(Vec2::new(300.0, 100.0)));
    }

    #[test]
    fn test_homing_reacquires_nearest() {
        let (mut state, tuning) = playing_state();
        let near = add_enemy(&mut state, &tuning, EnemyKind::Heavy, Vec2::new(350.0, 300.0));
        add_enemy(&mut state, &tuning, EnemyKind::Heavy, Vec2::new(400.0, 250.0));

        let mut missile = bullet(
            BulletOwner::Player,
            BulletKind::Homing,
            Vec2::new(300.0, 400.0),
            Vec2::new(0.0, -360.0),
            1.0,
            5.0,
        );
        missile.target = Some(EntityId(999));
        let id = spawn_bullet(&mut state, missile).unwrap();

        update_bullets(&mut state, &tuning, SIM_DT, SIM_DT);
        let b = state.bullets.get(id).unwrap();
        assert_eq!(b.target, Some(near));
        // Turned right toward the target
        assert!(b.vel.x > 0.0);
    }

    #[test]
    fn test_homing_flies_straight_without_targets() {
        let (mut state, tuning) = playing_state();
        let mut missile = bullet(
            BulletOwner::Player,
            BulletKind::Homing,
            Vec2::new(300.0, 400.0),
            Vec2::new(0.0, -360.0),
            1.0,
            5.0,
        );
        missile.target = Some(EntityId(999));
        let id = spawn_bullet(&mut state, missile).unwrap();

        update_bullets(&mut state, &tuning, SIM_DT, SIM_DT);
        let b = state.bullets.get(id).unwrap();
        assert_eq!(b.target, None);
        assert_eq!(b.vel, Vec2::new(0.0, -360.0));
    }

    #[test]
    fn test_bullet_lifetime_expiry() {
        let (mut state, tuning) = playing_state();
        let shot = bullet(
            BulletOwner::Player,
            BulletKind::Normal,
            Vec2::new(300.0, 400.0),
            Vec2::ZERO,
            1.0,
            0.01,
        );
        spawn_bullet(&mut state, shot).unwrap();
        update_bullets(&mut state, &tuning, SIM_DT, SIM_DT);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_boss_ring_volley() {
        let (mut state, tuning) = playing_state();
        let id = add_enemy(&mut state, &tuning, EnemyKind::Boss, Vec2::new(600.0, 150.0));
        let boss = state.enemies.get_mut(id).unwrap();
        if let Some(b) = boss.boss.as_mut() {
            b.phase = 2;
        }
        let boss = state.enemies.get(id).unwrap().clone();
        let volley = enemy_volley(&boss, Vec2::new(600.0, 700.0), &tuning, 5.0);
        assert_eq!(volley.len(), 8);

        let mut boss = boss;
        if let Some(b) = boss.boss.as_mut() {
            b.phase = 3;
        }
        let volley = enemy_volley(&boss, Vec2::new(600.0, 700.0), &tuning, 5.0);
        assert_eq!(volley.len(), 2);
        assert!(volley.iter().all(|b| b.kind == BulletKind::Homing && b.damage == 10.0));
    }
}
