use crate::auth::Identity;
use crate::distribution::distributor::Distributor;
use crate::distribution::hub::ConnectionId;
use crate::distribution::protocol::{ClientMessage, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{error, info, warn};

/// Drives one WebSocket connection: client join/leave requests in, queued
/// server messages out.
pub struct ConnectionHandler {
    distributor: Arc<Distributor>,
    identity: Identity,
}

impl ConnectionHandler {
    pub fn new(distributor: Arc<Distributor>, identity: Identity) -> Self {
        Self {
            distributor,
            identity,
        }
    }

    /// Handle WebSocket connection lifecycle
    pub async fn handle(self, mut socket: WebSocket) {
        let (tx, mut rx) = unbounded_channel();
        let connection_id = self.distributor.connect(self.identity, tx);
        info!(connection_id, role = ?self.identity.role, "WebSocket connection established");

        loop {
            tokio::select! {
                Some(msg) = socket.recv() => {
                    match msg {
                        Ok(Message::Text(text)) => {
                            if let Some(reply) = self.handle_client_message(connection_id, &text) {
                                if let Err(e) = send(&mut socket, &reply).await {
                                    error!(error = %e, "Failed to send reply");
                                    break;
                                }
                            }
                        }
                        Ok(Message::Close(_)) => {
                            info!(connection_id, "WebSocket client disconnected");
                            break;
                        }
                        Ok(Message::Ping(data)) => {
                            if let Err(e) = socket.send(Message::Pong(data)).await {
                                error!(error = %e, "Failed to send pong");
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "WebSocket error");
                            break;
                        }
                    }
                }

                Some(outbound) = rx.recv() => {
                    if let Err(e) = send(&mut socket, &outbound).await {
                        error!(error = %e, "Failed to send update");
                        break;
                    }
                }

                else => {
                    break;
                }
            }
        }

        self.distributor.disconnect(connection_id);
        drain(&mut rx);
        info!(connection_id, "WebSocket connection closed");
    }

    /// Apply a client request; returns an error reply for malformed input.
    /// Disallowed joins are dropped without a reply.
    fn handle_client_message(&self, connection_id: ConnectionId, text: &str) -> Option<ServerMessage> {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "Malformed client message");
                return Some(ServerMessage::error(format!("invalid message: {}", e)));
            }
        };

        match msg {
            ClientMessage::Subscribe { entity_id } => {
                if self.distributor.subscribe(connection_id, entity_id) {
                    info!(connection_id, entity_id, "Client joined entity group");
                }
            }
            ClientMessage::Unsubscribe { entity_id } => {
                if self.distributor.unsubscribe(connection_id, entity_id) {
                    info!(connection_id, entity_id, "Client left entity group");
                }
            }
        }
        None
    }
}

async fn send(socket: &mut WebSocket, message: &ServerMessage) -> anyhow::Result<()> {
    let json = serde_json::to_string(message)?;
    socket.send(Message::Text(json)).await?;
    Ok(())
}

fn drain(rx: &mut UnboundedReceiver<ServerMessage>) {
    rx.close();
    while rx.try_recv().is_ok() {}
}
