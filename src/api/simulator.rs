use crate::api::auth_middleware::{require_access, require_privileged, AuthContext};
use crate::api::ApiError;
use crate::distribution::Distributor;
use crate::error::ControlError;
use crate::simulator::{
    scenario, EntityStatus, RosterChange, RosterEntry, ScenarioDefinition, ScenarioId,
    ScenarioStatus, Simulator, SimulatorStatus, MAX_SPEED, MIN_SPEED,
};
use crate::vitals::EntityId;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Shared state for the control surface
pub struct SimulatorAppState {
    /// `None` until the orchestrator exists; every operation is then 503
    pub simulator: Option<Arc<Simulator>>,
    pub distributor: Arc<Distributor>,
    pub auth: AuthContext,
}

impl SimulatorAppState {
    fn simulator(&self) -> Result<&Arc<Simulator>, ControlError> {
        self.simulator
            .as_ref()
            .ok_or_else(|| ControlError::NotReady("simulator is not initialized".to_string()))
    }
}

#[derive(Deserialize)]
pub struct SpeedRequest {
    /// Untyped so non-numeric input is reported as an invalid speed
    pub speed: Value,
}

#[derive(Deserialize)]
pub struct ScenarioRequest {
    pub entity_id: EntityId,
    pub scenario: String,
}

#[derive(Serialize)]
pub struct LifecycleResponse {
    pub state: crate::simulator::Lifecycle,
    pub running: bool,
}

#[derive(Serialize)]
pub struct SpeedResponse {
    pub speed: f64,
}

#[derive(Serialize)]
pub struct ScenarioResponse {
    pub entity_id: EntityId,
    pub scenario: ScenarioStatus,
}

#[derive(Serialize)]
pub struct ResetResponse {
    pub reset: Vec<EntityId>,
}

/// Create control surface router
pub fn create_simulator_router(state: Arc<SimulatorAppState>) -> Router {
    Router::new()
        .route("/api/simulator/status", get(get_status))
        .route("/api/simulator/start", post(start))
        .route("/api/simulator/stop", post(stop))
        .route("/api/simulator/pause", post(pause))
        .route("/api/simulator/resume", post(resume))
        .route("/api/simulator/speed", put(set_speed))
        .route("/api/simulator/scenario", post(apply_scenario))
        .route("/api/simulator/scenarios", get(list_scenarios))
        .route("/api/simulator/reset-all", post(reset_all))
        .route("/api/simulator/reset/:entity_id", post(reset_entity))
        .route("/api/simulator/entities/:entity_id", get(get_entity))
        .route("/api/simulator/roster", put(sync_roster))
        .with_state(state)
}

/// GET /api/simulator/status
///
/// Restricted identities only see their own entity.
async fn get_status(
    State(state): State<Arc<SimulatorAppState>>,
    headers: HeaderMap,
) -> Result<Json<SimulatorStatus>, ApiError> {
    let identity = state.auth.authenticate(&headers)?;
    let mut status = state.simulator()?.status();
    if !identity.is_privileged() {
        status.entities.retain(|e| identity.can_access(e.entity_id));
        status.entity_count = status.entities.len();
    }
    Ok(Json(status))
}

/// GET /api/simulator/entities/:entity_id
async fn get_entity(
    State(state): State<Arc<SimulatorAppState>>,
    headers: HeaderMap,
    Path(entity_id): Path<EntityId>,
) -> Result<Json<EntityStatus>, ApiError> {
    let identity = state.auth.authenticate(&headers)?;
    require_access(&identity, entity_id)?;
    let status = state
        .simulator()?
        .entity_status(entity_id)
        .ok_or(ControlError::UnknownEntity(entity_id))?;
    Ok(Json(status))
}

/// POST /api/simulator/start
async fn start(
    State(state): State<Arc<SimulatorAppState>>,
    headers: HeaderMap,
) -> Result<Json<LifecycleResponse>, ApiError> {
    require_privileged(&state.auth.authenticate(&headers)?)?;
    let simulator = state.simulator()?;
    simulator.start();
    Ok(Json(lifecycle(simulator)))
}

/// POST /api/simulator/stop
async fn stop(
    State(state): State<Arc<SimulatorAppState>>,
    headers: HeaderMap,
) -> Result<Json<LifecycleResponse>, ApiError> {
    require_privileged(&state.auth.authenticate(&headers)?)?;
    let simulator = state.simulator()?;
    simulator.stop();
    Ok(Json(lifecycle(simulator)))
}

/// POST /api/simulator/pause
async fn pause(
    State(state): State<Arc<SimulatorAppState>>,
    headers: HeaderMap,
) -> Result<Json<LifecycleResponse>, ApiError> {
    require_privileged(&state.auth.authenticate(&headers)?)?;
    let simulator = state.simulator()?;
    simulator.pause()?;
    Ok(Json(lifecycle(simulator)))
}

/// POST /api/simulator/resume
async fn resume(
    State(state): State<Arc<SimulatorAppState>>,
    headers: HeaderMap,
) -> Result<Json<LifecycleResponse>, ApiError> {
    require_privileged(&state.auth.authenticate(&headers)?)?;
    let simulator = state.simulator()?;
    simulator.resume()?;
    Ok(Json(lifecycle(simulator)))
}

fn lifecycle(simulator: &Simulator) -> LifecycleResponse {
    let state = simulator.lifecycle();
    LifecycleResponse {
        state,
        running: state == crate::simulator::Lifecycle::Running,
    }
}

/// PUT /api/simulator/speed {"speed": 10}
async fn set_speed(
    State(state): State<Arc<SimulatorAppState>>,
    headers: HeaderMap,
    Json(request): Json<SpeedRequest>,
) -> Result<Json<SpeedResponse>, ApiError> {
    require_privileged(&state.auth.authenticate(&headers)?)?;
    let simulator = state.simulator()?;
    let requested = request.speed.as_f64().ok_or(ControlError::InvalidSpeed {
        value: f64::NAN,
        min: MIN_SPEED,
        max: MAX_SPEED,
    })?;
    let speed = simulator.set_speed(requested)?;
    Ok(Json(SpeedResponse { speed }))
}

/// POST /api/simulator/scenario {"entity_id": 2, "scenario": "feverSpike"}
async fn apply_scenario(
    State(state): State<Arc<SimulatorAppState>>,
    headers: HeaderMap,
    Json(request): Json<ScenarioRequest>,
) -> Result<Json<ScenarioResponse>, ApiError> {
    let identity = state.auth.authenticate(&headers)?;
    require_access(&identity, request.entity_id)?;
    let simulator = state.simulator()?;
    let scenario_id: ScenarioId = request.scenario.parse()?;
    let status = simulator.apply_scenario(request.entity_id, scenario_id)?;
    Ok(Json(ScenarioResponse {
        entity_id: request.entity_id,
        scenario: status,
    }))
}

/// GET /api/simulator/scenarios
async fn list_scenarios(
    State(state): State<Arc<SimulatorAppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ScenarioDefinition>>, ApiError> {
    state.auth.authenticate(&headers)?;
    Ok(Json(scenario::catalog()))
}

/// POST /api/simulator/reset/:entity_id
async fn reset_entity(
    State(state): State<Arc<SimulatorAppState>>,
    headers: HeaderMap,
    Path(entity_id): Path<EntityId>,
) -> Result<Json<ResetResponse>, ApiError> {
    let identity = state.auth.authenticate(&headers)?;
    require_access(&identity, entity_id)?;
    state.simulator()?.reset_entity(entity_id)?;
    Ok(Json(ResetResponse {
        reset: vec![entity_id],
    }))
}

/// POST /api/simulator/reset-all
async fn reset_all(
    State(state): State<Arc<SimulatorAppState>>,
    headers: HeaderMap,
) -> Result<Json<ResetResponse>, ApiError> {
    require_privileged(&state.auth.authenticate(&headers)?)?;
    let simulator = state.simulator()?;
    simulator.reset_all();
    Ok(Json(ResetResponse {
        reset: simulator.entity_ids(),
    }))
}

/// PUT /api/simulator/roster [{"id": 1, "name": "..."}]
///
/// Mirrors the external roster and moves privileged subscribers accordingly.
async fn sync_roster(
    State(state): State<Arc<SimulatorAppState>>,
    headers: HeaderMap,
    Json(roster): Json<Vec<RosterEntry>>,
) -> Result<Json<RosterChange>, ApiError> {
    require_privileged(&state.auth.authenticate(&headers)?)?;
    let change = state.simulator()?.sync_roster(&roster);
    state
        .distributor
        .apply_roster_change(&change.added, &change.removed);
    info!(
        added = ?change.added,
        removed = ?change.removed,
        "Roster updated via API"
    );
    Ok(Json(change))
}
