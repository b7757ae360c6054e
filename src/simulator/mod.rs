// Synthetic vital-sign simulation: clock, numerical model, scenarios and the tick orchestrator

pub mod baseline;
pub mod circadian;
pub mod clock;
pub mod correlation;
mod engine;
pub mod entity;
pub mod generator;
pub mod model;
mod output;
pub mod scenario;

pub use baseline::BaselineRegistry;
pub use clock::{ManualClock, SystemClock, VirtualClock, WallClock};
pub use engine::{
    Lifecycle, RosterChange, RosterEntry, Simulator, SimulatorOptions, SimulatorStatus,
    MAX_SPEED, MIN_SPEED,
};
pub use entity::{EntityState, EntityStatus, ScenarioStatus};
pub use model::SimulationModel;
pub use output::{NullOutput, SimulationOutput};
pub use scenario::{ScenarioDefinition, ScenarioId};
