use crate::api::auth_middleware::AuthContext;
use crate::auth::Identity;
use crate::distribution::{ConnectionHandler, Distributor};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Query, Request, State,
    },
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Query parameters for WebSocket upgrade
#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// Shared application state for WebSocket handler
pub struct WsAppState {
    pub distributor: Arc<Distributor>,
    pub auth: AuthContext,
}

/// Auth middleware: resolves ?token= to an identity before upgrade.
///
/// Runs as a tower layer BEFORE WebSocket upgrade extraction so 401 can be
/// returned cleanly without requiring a valid upgrade request in tests.
async fn ws_auth(
    State(state): State<Arc<WsAppState>>,
    Query(params): Query<WsQuery>,
    mut req: Request,
    next: Next,
) -> Response {
    match state.auth.authenticate_token(params.token.as_deref()) {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => {
            warn!(error = %e, "Rejected WebSocket upgrade");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

/// GET /api/ws - WebSocket upgrade handler (auth handled by ws_auth middleware)
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsAppState>>,
    Extension(identity): Extension<Identity>,
) -> Response {
    info!(role = ?identity.role, "WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Create WebSocket router with auth middleware applied
pub fn create_ws_router(state: Arc<WsAppState>) -> Router {
    Router::new()
        .route("/api/ws", get(ws_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), ws_auth))
        .with_state(state)
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<WsAppState>, identity: Identity) {
    ConnectionHandler::new(Arc::clone(&state.distributor), identity)
        .handle(socket)
        .await;
}
