//! Control-surface error taxonomy.
//!
//! Every variant is raised before any simulation state is touched, so a
//! rejected request never leaves the simulator half-updated.

use crate::vitals::EntityId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    /// The orchestrator has not been created or was never started
    #[error("simulator not ready: {0}")]
    NotReady(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    #[error("speed must be a number between {min} and {max}, got {value}")]
    InvalidSpeed { value: f64, min: f64, max: f64 },

    /// Restricted identity acting outside its own entity
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}
