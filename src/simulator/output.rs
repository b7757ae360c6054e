use crate::vitals::{Reading, SimEvent};

/// Where the orchestrator sends what it produces.
///
/// `emit_reading` may fail (e.g. a storage write); the orchestrator logs the
/// failure and carries on with the remaining entities of the tick.
/// `emit_event` is fire-and-forget.
pub trait SimulationOutput: Send + Sync {
    fn emit_reading(&self, reading: &Reading) -> anyhow::Result<()>;

    fn emit_event(&self, event: &SimEvent);
}

/// Output that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl SimulationOutput for NullOutput {
    fn emit_reading(&self, _reading: &Reading) -> anyhow::Result<()> {
        Ok(())
    }

    fn emit_event(&self, _event: &SimEvent) {}
}
