// HTTP and WebSocket APIs

pub mod auth_middleware;
pub mod history;
pub mod simulator;
pub mod websocket;

pub use auth_middleware::AuthContext;
pub use history::{create_history_router, HistoryAppState};
pub use simulator::{create_simulator_router, SimulatorAppState};
pub use websocket::{create_ws_router, ws_handler, WsAppState};

use crate::auth::TokenError;
use crate::distribution::Distributor;
use crate::error::ControlError;
use crate::simulator::Simulator;
use crate::storage::ReadingStore;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::error;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Handler error: a control-surface failure or an authentication failure
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(TokenError),
    NotFound(String),
    Control(ControlError),
}

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        ApiError::Control(e)
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        ApiError::Unauthorized(e)
    }
}

/// HTTP status for a control error
pub fn status_for(error: &ControlError) -> StatusCode {
    match error {
        ControlError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
        ControlError::UnknownEntity(_) => StatusCode::NOT_FOUND,
        ControlError::UnknownScenario(_)
        | ControlError::InvalidSpeed { .. }
        | ControlError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        ControlError::Forbidden(_) => StatusCode::FORBIDDEN,
        ControlError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Control(e) => {
                let status = status_for(&e);
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(error = %e, "Request failed");
                }
                (status, e.to_string())
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Everything the HTTP surface needs
#[derive(Clone)]
pub struct AppParts {
    /// `None` until the orchestrator has been constructed
    pub simulator: Option<Arc<Simulator>>,
    pub distributor: Arc<Distributor>,
    pub store: Arc<ReadingStore>,
    pub auth: AuthContext,
    pub default_history_window_hours: i64,
}

/// Combined router: control surface, history, WebSocket and health, with CORS
pub fn create_app(parts: AppParts) -> Router {
    let simulator_state = Arc::new(SimulatorAppState {
        simulator: parts.simulator,
        distributor: Arc::clone(&parts.distributor),
        auth: parts.auth.clone(),
    });
    let history_state = Arc::new(HistoryAppState {
        store: Arc::clone(&parts.store),
        auth: parts.auth.clone(),
        default_window_hours: parts.default_history_window_hours,
    });
    let ws_state = Arc::new(WsAppState {
        distributor: parts.distributor,
        auth: parts.auth,
    });

    Router::new()
        .route("/api/health", get(health))
        .merge(create_simulator_router(simulator_state))
        .merge(create_history_router(history_state))
        .merge(create_ws_router(ws_state))
        .layer(CorsLayer::permissive())
}

/// GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
