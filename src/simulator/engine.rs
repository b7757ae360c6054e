use crate::error::ControlError;
use crate::simulator::baseline::BaselineRegistry;
use crate::simulator::clock::{self, SystemClock, VirtualClock, WallClock};
use crate::simulator::correlation;
use crate::simulator::entity::{EntityState, EntityStatus, ScenarioStatus};
use crate::simulator::generator;
use crate::simulator::model::SimulationModel;
use crate::simulator::output::SimulationOutput;
use crate::simulator::scenario::{self, ActiveScenario, ScenarioId};
use crate::vitals::{Channel, ChannelValues, EntityId, EventKind, Reading, SimEvent};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

pub const MIN_SPEED: f64 = 1.0;
pub const MAX_SPEED: f64 = 100.0;

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Created, never started
    Idle,
    Running,
    Paused,
    Stopped,
}

/// One entry of the external roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: EntityId,
    pub name: String,
}

/// Result of reconciling the tracked set against a roster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RosterChange {
    pub added: Vec<EntityId>,
    pub removed: Vec<EntityId>,
}

/// Full status view for the control surface
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorStatus {
    pub state: Lifecycle,
    pub running: bool,
    pub speed: f64,
    pub simulated_time: DateTime<Utc>,
    pub entity_count: usize,
    pub entities: Vec<EntityStatus>,
}

/// Construction options
pub struct SimulatorOptions {
    /// Wall-clock interval between ticks, independent of speed
    pub tick_interval: Duration,
    pub speed: f64,
    /// Fixed RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
    pub model: SimulationModel,
    pub baselines: BaselineRegistry,
    pub wall_clock: Arc<dyn WallClock>,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            speed: 1.0,
            seed: None,
            model: SimulationModel::default(),
            baselines: BaselineRegistry::seeded(),
            wall_clock: Arc::new(SystemClock),
        }
    }
}

/// Everything a tick reads or writes. Guarded by a single lock so control
/// operations always land between ticks.
struct SimState {
    lifecycle: Lifecycle,
    /// Incremented whenever a tick loop is spawned; stale loops exit
    ticker_epoch: u64,
    clock: VirtualClock,
    entities: BTreeMap<EntityId, EntityState>,
    baselines: BaselineRegistry,
    model: SimulationModel,
    rng: StdRng,
}

/// Per-entity result of one tick
#[derive(Debug, Default)]
pub(crate) struct TickOutcome {
    pub scenario_ended: Option<ActiveScenario>,
    /// `Some(new_flag)` when the anomaly flag changed this tick
    pub anomaly_edge: Option<bool>,
}

/// Simulation aggregate and tick orchestrator
pub struct Simulator {
    state: Mutex<SimState>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    output: Arc<dyn SimulationOutput>,
    tick_interval: Duration,
}

impl Simulator {
    pub fn new(output: Arc<dyn SimulationOutput>, options: SimulatorOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            state: Mutex::new(SimState {
                lifecycle: Lifecycle::Idle,
                ticker_epoch: 0,
                clock: VirtualClock::new(options.wall_clock, options.speed),
                entities: BTreeMap::new(),
                baselines: options.baselines,
                model: options.model,
                rng,
            }),
            ticker: Mutex::new(None),
            output,
            tick_interval: options.tick_interval,
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Roster ──────────────────────────────────────────────────────────────

    /// Start tracking an entity. Returns false if it is already tracked.
    pub fn add_entity(&self, id: EntityId, name: &str) -> bool {
        let mut guard = self.state();
        let state = &mut *guard;
        if state.entities.contains_key(&id) {
            return false;
        }
        let baseline = state.baselines.get(id);
        let entity = EntityState::new(id, name, baseline, state.model.seed_spread, &mut state.rng);
        state.entities.insert(id, entity);
        info!(entity_id = id, name = %name, "Entity added to simulation");
        true
    }

    /// Stop tracking an entity, discarding its state immediately
    pub fn remove_entity(&self, id: EntityId) -> bool {
        let removed = self.state().entities.remove(&id);
        if let Some(entity) = &removed {
            info!(entity_id = id, name = %entity.name, "Entity removed from simulation");
        }
        removed.is_some()
    }

    /// Mirror an external roster: add missing ids, drop ids no longer listed
    pub fn sync_roster(&self, roster: &[RosterEntry]) -> RosterChange {
        let wanted: HashSet<EntityId> = roster.iter().map(|e| e.id).collect();
        let mut change = RosterChange::default();

        for entry in roster {
            if self.add_entity(entry.id, &entry.name) {
                change.added.push(entry.id);
            }
        }
        for id in self.entity_ids() {
            if !wanted.contains(&id) && self.remove_entity(id) {
                change.removed.push(id);
            }
        }

        info!(
            added = change.added.len(),
            removed = change.removed.len(),
            "Roster synchronized"
        );
        change
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.state().entities.keys().copied().collect()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.state().entities.contains_key(&id)
    }

    // ── Tick ────────────────────────────────────────────────────────────────

    /// Run one tick for every tracked entity, regardless of lifecycle
    pub fn tick(&self) {
        let mut guard = self.state();
        self.tick_locked(&mut guard);
    }

    /// Tick only if the loop identified by `epoch` is still the live one
    fn tick_from_loop(&self, epoch: u64) -> bool {
        let mut guard = self.state();
        if guard.lifecycle != Lifecycle::Running || guard.ticker_epoch != epoch {
            return false;
        }
        self.tick_locked(&mut guard);
        true
    }

    fn tick_locked(&self, state: &mut SimState) {
        let SimState {
            clock,
            entities,
            model,
            rng,
            ..
        } = state;

        let virtual_now = clock.now();
        let hour = clock::hour_of_day(virtual_now);
        let recorded_at = clock.wall_now();

        for entity in entities.values_mut() {
            let outcome = advance_entity(entity, model, rng, virtual_now, hour);

            if let Some(ended) = outcome.scenario_ended {
                self.output.emit_event(&event(
                    EventKind::ScenarioEnded,
                    entity,
                    format!("{} scenario ended for {}", ended.name, entity.name),
                    recorded_at,
                ));
            }

            match outcome.anomaly_edge {
                Some(true) => self.output.emit_event(&event(
                    EventKind::AnomalyStarted,
                    entity,
                    format!("Anomalous vital signs detected for {}", entity.name),
                    recorded_at,
                )),
                Some(false) => self.output.emit_event(&event(
                    EventKind::AnomalyResolved,
                    entity,
                    format!("Vital signs returned to normal for {}", entity.name),
                    recorded_at,
                )),
                None => {}
            }

            let reading = Reading::new(entity.id, &entity.values, entity.is_anomaly, recorded_at);
            if let Err(e) = self.output.emit_reading(&reading) {
                error!(entity_id = entity.id, error = %e, "Failed to emit reading");
            }
        }

        debug!(entities = entities.len(), virtual_time = %virtual_now, "Tick complete");
    }

    // ── Control surface ─────────────────────────────────────────────────────

    /// Apply a catalog scenario; expiry is virtual now + scenario duration
    pub fn apply_scenario(
        &self,
        entity_id: EntityId,
        scenario_id: ScenarioId,
    ) -> Result<ScenarioStatus, ControlError> {
        let definition = scenario::definition(scenario_id);
        let mut guard = self.state();
        let state = &mut *guard;
        let virtual_now = state.clock.now();
        let recorded_at = state.clock.wall_now();
        let entity = state
            .entities
            .get_mut(&entity_id)
            .ok_or(ControlError::UnknownEntity(entity_id))?;

        entity.apply_scenario(&definition, virtual_now);
        info!(
            entity_id = entity_id,
            scenario = %scenario_id,
            duration_ms = definition.duration_ms,
            "Scenario applied"
        );

        self.output.emit_event(&event(
            EventKind::ScenarioStarted,
            entity,
            format!("{} scenario started for {}", definition.name, entity.name),
            recorded_at,
        ));

        Ok(ScenarioStatus {
            id: scenario_id,
            name: definition.name,
            remaining_ms: definition.duration_ms,
        })
    }

    /// Reset one entity to its baseline means, clearing scenario and anomaly
    pub fn reset_entity(&self, entity_id: EntityId) -> Result<(), ControlError> {
        let mut guard = self.state();
        let state = &mut *guard;
        let recorded_at = state.clock.wall_now();
        let entity = state
            .entities
            .get_mut(&entity_id)
            .ok_or(ControlError::UnknownEntity(entity_id))?;
        self.reset_one(entity, recorded_at);
        info!(entity_id = entity_id, "Entity reset to baseline");
        Ok(())
    }

    pub fn reset_all(&self) {
        let mut guard = self.state();
        let state = &mut *guard;
        let recorded_at = state.clock.wall_now();
        for entity in state.entities.values_mut() {
            self.reset_one(entity, recorded_at);
        }
        info!(entities = state.entities.len(), "All entities reset to baseline");
    }

    /// A reset that clears an active anomaly closes it for subscribers too
    fn reset_one(&self, entity: &mut EntityState, recorded_at: DateTime<Utc>) {
        let was_anomalous = entity.is_anomaly;
        entity.reset_to_baseline();
        if was_anomalous {
            self.output.emit_event(&event(
                EventKind::AnomalyResolved,
                entity,
                format!("Vital signs returned to normal for {}", entity.name),
                recorded_at,
            ));
        }
    }

    /// Change the speed multiplier without a virtual-time jump
    pub fn set_speed(&self, speed: f64) -> Result<f64, ControlError> {
        if !speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return Err(ControlError::InvalidSpeed {
                value: speed,
                min: MIN_SPEED,
                max: MAX_SPEED,
            });
        }
        self.state().clock.set_speed(speed);
        info!(speed = speed, "Simulation speed changed");
        Ok(speed)
    }

    pub fn speed(&self) -> f64 {
        self.state().clock.speed()
    }

    pub fn virtual_time(&self) -> DateTime<Utc> {
        self.state().clock.now()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state().lifecycle
    }

    #[cfg(test)]
    pub(crate) fn with_entity_mut<R>(
        &self,
        entity_id: EntityId,
        f: impl FnOnce(&mut EntityState) -> R,
    ) -> Option<R> {
        self.state().entities.get_mut(&entity_id).map(f)
    }

    pub fn entity_status(&self, entity_id: EntityId) -> Option<EntityStatus> {
        let state = self.state();
        let virtual_now = state.clock.now();
        state.entities.get(&entity_id).map(|e| e.status(virtual_now))
    }

    pub fn status(&self) -> SimulatorStatus {
        let state = self.state();
        let virtual_now = state.clock.now();
        SimulatorStatus {
            state: state.lifecycle,
            running: state.lifecycle == Lifecycle::Running,
            speed: state.clock.speed(),
            simulated_time: virtual_now,
            entity_count: state.entities.len(),
            entities: state
                .entities
                .values()
                .map(|e| e.status(virtual_now))
                .collect(),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Start (or restart after stop) the tick loop. Starting while paused resumes.
    pub fn start(self: &Arc<Self>) {
        let previous = {
            let mut state = self.state();
            if state.lifecycle == Lifecycle::Running {
                return;
            }
            let previous = state.lifecycle;
            state.lifecycle = Lifecycle::Running;
            state.ticker_epoch += 1;
            self.spawn_ticker(state.ticker_epoch);
            previous
        };
        info!(
            from = ?previous,
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            entities = self.entity_ids().len(),
            "Simulator started"
        );
    }

    /// Stop ticking, preserving all entity state
    pub fn pause(&self) -> Result<(), ControlError> {
        {
            let mut state = self.state();
            match state.lifecycle {
                Lifecycle::Running => state.lifecycle = Lifecycle::Paused,
                Lifecycle::Paused => return Ok(()),
                Lifecycle::Idle | Lifecycle::Stopped => {
                    return Err(ControlError::NotReady(
                        "simulator has not been started".to_string(),
                    ))
                }
            }
        }
        self.abort_ticker();
        info!("Simulator paused");
        Ok(())
    }

    /// Restart the tick loop after a pause; missed ticks are not replayed
    pub fn resume(self: &Arc<Self>) -> Result<(), ControlError> {
        {
            let mut state = self.state();
            match state.lifecycle {
                Lifecycle::Paused => {
                    state.lifecycle = Lifecycle::Running;
                    state.ticker_epoch += 1;
                    self.spawn_ticker(state.ticker_epoch);
                }
                Lifecycle::Running => return Ok(()),
                Lifecycle::Idle | Lifecycle::Stopped => {
                    return Err(ControlError::NotReady(
                        "simulator has not been started".to_string(),
                    ))
                }
            }
        }
        info!("Simulator resumed");
        Ok(())
    }

    /// Stop the tick loop. Once this returns no further tick fires.
    pub fn stop(&self) {
        {
            let mut state = self.state();
            if state.lifecycle == Lifecycle::Stopped {
                return;
            }
            state.lifecycle = Lifecycle::Stopped;
        }
        self.abort_ticker();
        info!("Simulator stopped");
    }

    fn spawn_ticker(self: &Arc<Self>, epoch: u64) {
        let simulator = Arc::clone(self);
        let period = self.tick_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            // Missed ticks are dropped, never replayed
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !simulator.tick_from_loop(epoch) {
                    break;
                }
            }
        });

        let mut slot = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    fn abort_ticker(&self) {
        let mut slot = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
        }
    }
}

/// Steps (a)-(e) of a tick for one entity; the caller emits events and the reading.
pub(crate) fn advance_entity(
    entity: &mut EntityState,
    model: &SimulationModel,
    rng: &mut StdRng,
    virtual_now: DateTime<Utc>,
    hour: f64,
) -> TickOutcome {
    let mut outcome = TickOutcome {
        scenario_ended: entity.take_expired_scenario(virtual_now),
        ..TickOutcome::default()
    };

    let raw = ChannelValues::from_fn(|channel| {
        let base = model.base_params(channel, entity.baseline.stat(channel), hour);
        let params = entity.effective_params(channel, base);
        generator::step(entity.values.get(channel), &params, &mut *rng)
    });

    let correlated = correlation::apply(&model.correlations, &raw, &entity.baseline);
    entity.values = ChannelValues::from_fn(|channel: Channel| channel.clamp(correlated.get(channel)));

    let was_anomaly = entity.is_anomaly;
    entity.is_anomaly = entity.evaluate_anomaly(model.anomaly_threshold);
    if entity.is_anomaly != was_anomaly {
        outcome.anomaly_edge = Some(entity.is_anomaly);
    }

    outcome
}

fn event(kind: EventKind, entity: &EntityState, message: String, at: DateTime<Utc>) -> SimEvent {
    SimEvent {
        kind,
        entity_id: entity.id,
        entity_name: entity.name.clone(),
        message,
        timestamp: at,
    }
}
