//! Error taxonomy for the simulation core
//!
//! None of these are fatal. Pool exhaustion is backpressure, invalid
//! transitions are no-ops, and corrupt persisted data is replaced by defaults.

use thiserror::Error;

use crate::sim::SessionState;

/// Errors surfaced by the simulation core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// A spawn was attempted while every slot of a pool was occupied
    #[error("{pool} pool exhausted (capacity {capacity})")]
    PoolExhausted { pool: &'static str, capacity: usize },

    /// A state-machine transition was requested from an incompatible state
    #[error("cannot {action} while in {from:?}")]
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },

    /// Leaderboard/progress data from the external store could not be used
    #[error("persisted `{key}` is corrupt: {reason}")]
    CorruptPersistedState { key: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SimError>;
