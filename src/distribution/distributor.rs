use crate::auth::Identity;
use crate::distribution::buffer::CoalescingBuffer;
use crate::distribution::hub::{ConnectionId, SubscriptionHub};
use crate::distribution::protocol::ServerMessage;
use crate::vitals::{EntityId, Reading, SimEvent};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

/// Counts from one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub entities: usize,
    pub deliveries: usize,
}

/// Batched real-time fan-out: readings are coalesced per entity and pushed
/// on flush; events go out immediately.
pub struct Distributor {
    buffer: Mutex<CoalescingBuffer>,
    hub: Mutex<SubscriptionHub>,
}

impl Distributor {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(CoalescingBuffer::new()),
            hub: Mutex::new(SubscriptionHub::new()),
        }
    }

    fn buffer(&self) -> MutexGuard<'_, CoalescingBuffer> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn hub(&self) -> MutexGuard<'_, SubscriptionHub> {
        self.hub.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn enqueue(&self, reading: Reading) {
        self.buffer().enqueue(reading);
    }

    pub fn pending(&self) -> usize {
        self.buffer().len()
    }

    /// Broadcast an event to every connection, bypassing the buffer
    pub fn publish_event(&self, event: &SimEvent) -> usize {
        self.hub().broadcast(&ServerMessage::SimulatorEvent(event.clone()))
    }

    /// Drain the buffer and deliver each entity's latest reading to its group
    pub fn flush(&self) -> FlushStats {
        let readings = self.buffer().drain();
        if readings.is_empty() {
            return FlushStats::default();
        }

        let hub = self.hub();
        let deliveries = readings.iter().map(|r| hub.deliver(r)).sum();
        FlushStats {
            entities: readings.len(),
            deliveries,
        }
    }

    /// Register a connection; privileged identities join the current tracked set
    pub fn connect(&self, identity: Identity, sender: UnboundedSender<ServerMessage>) -> ConnectionId {
        self.hub().connect(identity, sender)
    }

    pub fn subscribe(&self, connection_id: ConnectionId, entity_id: EntityId) -> bool {
        self.hub().subscribe(connection_id, entity_id)
    }

    pub fn unsubscribe(&self, connection_id: ConnectionId, entity_id: EntityId) -> bool {
        self.hub().unsubscribe(connection_id, entity_id)
    }

    pub fn disconnect(&self, connection_id: ConnectionId) {
        self.hub().disconnect(connection_id);
    }

    /// Reflect roster additions and removals in the subscriber groups
    pub fn apply_roster_change(&self, added: &[EntityId], removed: &[EntityId]) {
        let mut hub = self.hub();
        for &entity_id in added {
            hub.entity_added(entity_id);
        }
        for &entity_id in removed {
            hub.entity_removed(entity_id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.hub().connection_count()
    }

    pub fn tracked(&self) -> Vec<EntityId> {
        self.hub().tracked()
    }
}

impl Default for Distributor {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodically flush the coalescing buffer
pub async fn run_flush_loop(distributor: Arc<Distributor>, period: Duration) {
    let mut ticker = interval(period);

    // Skip missed ticks to prevent backlog under load
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let stats = distributor.flush();
        if stats.entities > 0 {
            trace!(
                entities = stats.entities,
                deliveries = stats.deliveries,
                "Flushed readings"
            );
        }
    }
}

/// Spawn the flush loop, logging its period
pub fn spawn_flush_loop(
    distributor: Arc<Distributor>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    debug!(period_ms = period.as_millis() as u64, "Starting flush loop");
    tokio::spawn(run_flush_loop(distributor, period))
}
