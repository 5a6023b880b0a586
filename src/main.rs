//! Cosmic Defenders headless driver
//!
//! Runs one session with a simple autopilot through the fixed-timestep loop
//! and persists the profile next to the working directory.
//!
//! Usage: `cosmic-defenders [tuning.json] [difficulty] [seconds]`

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use glam::Vec2;

use cosmic_defenders::consts::*;
use cosmic_defenders::persistence::ProfileStore;
use cosmic_defenders::sim::{FrameEvent, InputAction, SessionState, Simulation, Snapshot};
use cosmic_defenders::{DifficultyTier, Tuning};

/// One JSON file per key inside a directory
struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl ProfileStore for JsonFileStore {
    fn read(&self, key: &str) -> Option<String> {
        fs::read_to_string(self.path(key)).ok()
    }

    fn write(&mut self, key: &str, value: &str) -> std::io::Result<()> {
        // Write-then-rename so a crash never leaves half a file
        let tmp = self.path(&format!("{key}.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(tmp, self.path(key))
    }
}

/// Drift under the nearest enemy, keep firing, fire the special into crowds
fn autopilot(snap: &Snapshot, sim: &mut Simulation) {
    let player = snap.player.pos;
    let threat = snap
        .enemies
        .iter()
        .filter(|e| e.pos.y > 0.0)
        .min_by(|a, b| {
            a.pos
                .distance_squared(player)
                .total_cmp(&b.pos.distance_squared(player))
        });

    let mut dir = match threat {
        Some(enemy) => Vec2::new((enemy.pos.x - player.x) / 100.0, 0.0),
        None => Vec2::new((SCREEN_WIDTH / 2.0 - player.x) / 200.0, 0.0),
    };
    // Sidestep incoming enemy fire
    if let Some(bullet) = snap
        .bullets
        .iter()
        .find(|b| b.vel.y > 0.0 && (b.pos.x - player.x).abs() < 30.0 && player.y - b.pos.y < 120.0)
    {
        dir.x = if bullet.pos.x > player.x { -1.0 } else { 1.0 };
    }

    sim.submit_input(InputAction::Move(dir.clamp_length_max(1.0)));
    sim.submit_input(InputAction::Fire);
    if snap.enemies.len() >= 6 && snap.player.special_cooldown <= 0.0 {
        sim.submit_input(InputAction::ActivateSpecial);
    }
}

fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    log::info!("Cosmic Defenders (headless) starting...");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let tuning = match args.first().filter(|a| a.ends_with(".json")) {
        Some(path) => Tuning::from_json(&fs::read_to_string(path)?)?,
        None => Tuning::default(),
    };
    let difficulty = args
        .iter()
        .find_map(|a| DifficultyTier::from_str(a))
        .unwrap_or_default();
    let seconds: f32 = args
        .iter()
        .find_map(|a| a.parse().ok())
        .unwrap_or(120.0);

    let mut store = JsonFileStore::new("profile")?;
    let seed = now_ms() as u64;
    let mut sim = Simulation::load(tuning, &store, seed);

    sim.open_name_entry()?;
    sim.submit_name("Autopilot")?;
    let level = sim.highest_unlocked_level();
    sim.start_game(difficulty, level, now_ms())?;

    // Uneven frame pacing with the occasional stall
    let mut accumulator = 0.0f32;
    let mut wall = 0.0f32;
    let mut frame = 0u32;
    let mut kills = 0u32;
    while wall < seconds && sim.session() == SessionState::Playing {
        frame += 1;
        let dt = if frame % 500 == 0 { 0.5 } else { 1.0 / 50.0 };
        wall += dt;
        accumulator += dt.min(0.1);

        let mut substeps = 0;
        while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            let snap = sim.snapshot();
            autopilot(&snap, &mut sim);
            for event in sim.tick(SIM_DT) {
                match event {
                    FrameEvent::EnemyDestroyed { .. } => kills += 1,
                    FrameEvent::Warning { message } => log::warn!("{message}"),
                    FrameEvent::LevelCleared { .. }
                    | FrameEvent::BossSpawned { .. }
                    | FrameEvent::Victory { .. }
                    | FrameEvent::GameOver { .. } => log::info!("{event:?}"),
                    _ => {}
                }
            }
            accumulator -= SIM_DT;
            substeps += 1;
        }
    }

    if sim.session() == SessionState::Playing {
        sim.pause()?;
    }
    let snap = sim.snapshot();
    log::info!(
        "session over after {:.1}s simulated: score {}, level {} wave {}, {} kills, stats {:?}",
        snap.elapsed,
        snap.player.score,
        snap.wave.current_level,
        snap.wave.current_wave_in_level,
        kills,
        snap.stats
    );

    sim.persist(&mut store)?;
    Ok(())
}
