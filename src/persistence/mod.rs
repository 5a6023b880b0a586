//! Leaderboard and progress persistence
//!
//! The core only sees typed records. Where the bytes live is up to a
//! [`ProfileStore`] supplied by the host.
//!
//! Features:
//! - Versioned JSON envelope per key
//! - Corruption detection and recovery (defaults plus a warning, never a failure)

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::consts::MAX_LEVELS;
use crate::error::SimError;
use crate::highscores::HighScores;
use crate::settings::Settings;

/// Envelope version written by this build
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

/// Key/value storage owned by the host
pub trait ProfileStore {
    /// Raw value for `key`, `None` if never written
    fn read(&self, key: &str) -> Option<String>;
    fn write(&mut self, key: &str, value: &str) -> std::io::Result<()>;
}

/// In-memory store for tests and headless runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a raw value in place, bypassing the envelope
    pub fn insert_raw(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl ProfileStore for MemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn write(&mut self, key: &str, value: &str) -> std::io::Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Progress carried between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressRecord {
    /// 1..=20
    pub highest_unlocked_level: u32,
    pub settings: Settings,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            highest_unlocked_level: 1,
            settings: Settings::default(),
        }
    }
}

impl ProgressRecord {
    pub const STORAGE_KEY: &'static str = "cosmic_defenders_progress";

    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_LEVELS).contains(&self.highest_unlocked_level) {
            return Err(format!(
                "highest_unlocked_level {} outside 1..={MAX_LEVELS}",
                self.highest_unlocked_level
            ));
        }
        self.settings.validate()
    }
}

/// Everything read at session start and written at session end
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub leaderboard: HighScores,
    pub progress: ProgressRecord,
}

fn corrupt(key: &str, reason: impl ToString) -> SimError {
    SimError::CorruptPersistedState {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Decode one enveloped record. `Ok(None)` when the key was never written.
pub fn load_record<T: DeserializeOwned>(
    store: &dyn ProfileStore,
    key: &str,
) -> Result<Option<T>, SimError> {
    let Some(raw) = store.read(key) else {
        return Ok(None);
    };
    let envelope: Envelope<T> = serde_json::from_str(&raw).map_err(|e| corrupt(key, e))?;
    if envelope.version != FORMAT_VERSION {
        return Err(corrupt(
            key,
            format!("unsupported version {}", envelope.version),
        ));
    }
    Ok(Some(envelope.data))
}

/// Encode one record in the current envelope
pub fn save_record<T: Serialize>(
    store: &mut dyn ProfileStore,
    key: &str,
    data: &T,
) -> std::io::Result<()> {
    let json = serde_json::to_string(&Envelope {
        version: FORMAT_VERSION,
        data,
    })
    .map_err(std::io::Error::other)?;
    store.write(key, &json)
}

/// Read the profile, replacing anything unusable with defaults.
/// Returns the profile and one warning per record that had to be replaced.
pub fn load_profile(store: &dyn ProfileStore) -> (Profile, Vec<SimError>) {
    let mut warnings = Vec::new();

    let leaderboard = match load_record::<HighScores>(store, HighScores::STORAGE_KEY) {
        Ok(Some(mut scores)) => {
            scores.normalize();
            log::info!("Loaded {} high scores", scores.len());
            scores
        }
        Ok(None) => {
            log::info!("No high scores found, starting fresh");
            HighScores::new()
        }
        Err(err) => {
            log::warn!("{err}; using an empty leaderboard");
            warnings.push(err);
            HighScores::new()
        }
    };

    let progress = match load_record::<ProgressRecord>(store, ProgressRecord::STORAGE_KEY) {
        Ok(Some(record)) => match record.validate() {
            Ok(()) => record,
            Err(reason) => {
                let err = corrupt(ProgressRecord::STORAGE_KEY, reason);
                log::warn!("{err}; using default progress");
                warnings.push(err);
                ProgressRecord::default()
            }
        },
        Ok(None) => ProgressRecord::default(),
        Err(err) => {
            log::warn!("{err}; using default progress");
            warnings.push(err);
            ProgressRecord::default()
        }
    };

    (
        Profile {
            leaderboard,
            progress,
        },
        warnings,
    )
}

/// Write both records
pub fn save_profile(store: &mut dyn ProfileStore, profile: &Profile) -> std::io::Result<()> {
    save_record(store, HighScores::STORAGE_KEY, &profile.leaderboard)?;
    save_record(store, ProgressRecord::STORAGE_KEY, &profile.progress)?;
    log::info!(
        "Profile saved ({} scores, level {} unlocked)",
        profile.leaderboard.len(),
        profile.progress.highest_unlocked_level
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuning::DifficultyTier;

    #[test]
    fn test_empty_store_gives_defaults() {
        let store = MemoryStore::new();
        let (profile, warnings) = load_profile(&store);
        assert!(warnings.is_empty());
        assert_eq!(profile, Profile::default());
        assert_eq!(profile.progress.highest_unlocked_level, 1);
    }

    #[test]
    fn test_save_then_load() {
        let mut store = MemoryStore::new();
        let mut profile = Profile::default();
        profile
            .leaderboard
            .add_score("Ripley", 4200, DifficultyTier::Ace, 1_700_000_000_000.0);
        profile.progress.highest_unlocked_level = 4;
        profile.progress.settings.music_volume = 0.25;
        save_profile(&mut store, &profile).unwrap();

        let (loaded, warnings) = load_profile(&store);
        assert!(warnings.is_empty());
        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_corrupt_leaderboard_falls_back() {
        let mut store = MemoryStore::new();
        store.insert_raw(HighScores::STORAGE_KEY, "{not json");
        save_record(
            &mut store,
            ProgressRecord::STORAGE_KEY,
            &ProgressRecord {
                highest_unlocked_level: 6,
                ..ProgressRecord::default()
            },
        )
        .unwrap();

        let (profile, warnings) = load_profile(&store);
        assert!(profile.leaderboard.is_empty());
        assert_eq!(profile.progress.highest_unlocked_level, 6);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            SimError::CorruptPersistedState { key, .. } if key == HighScores::STORAGE_KEY
        ));
    }

    #[test]
    fn test_out_of_range_level_is_corrupt() {
        let mut store = MemoryStore::new();
        store.insert_raw(
            ProgressRecord::STORAGE_KEY,
            r#"{"version":1,"data":{"highest_unlocked_level":99}}"#,
        );
        let (profile, warnings) = load_profile(&store);
        assert_eq!(profile.progress.highest_unlocked_level, 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_unknown_version_is_corrupt() {
        let mut store = MemoryStore::new();
        store.insert_raw(
            HighScores::STORAGE_KEY,
            r#"{"version":9,"data":{"entries":[]}}"#,
        );
        let err = load_record::<HighScores>(&store, HighScores::STORAGE_KEY).unwrap_err();
        assert_eq!(
            err.to_string(),
            "persisted `cosmic_defenders_leaderboard` is corrupt: unsupported version 9"
        );
    }
}
