//! Production wiring of simulator output: readings are queued for real-time
//! fan-out and persisted; events are broadcast immediately.

use crate::distribution::Distributor;
use crate::simulator::SimulationOutput;
use crate::storage::ReadingStore;
use crate::vitals::{Reading, SimEvent};
use std::sync::Arc;
use tracing::debug;

pub struct ReadingPipeline {
    store: Arc<ReadingStore>,
    distributor: Arc<Distributor>,
}

impl ReadingPipeline {
    pub fn new(store: Arc<ReadingStore>, distributor: Arc<Distributor>) -> Self {
        Self { store, distributor }
    }
}

impl SimulationOutput for ReadingPipeline {
    fn emit_reading(&self, reading: &Reading) -> anyhow::Result<()> {
        // Live viewers still see the reading if the write fails
        self.distributor.enqueue(reading.clone());
        self.store.append(reading)
    }

    fn emit_event(&self, event: &SimEvent) {
        let recipients = self.distributor.publish_event(event);
        debug!(
            kind = ?event.kind,
            entity_id = event.entity_id,
            recipients = recipients,
            "Event broadcast"
        );
    }
}
