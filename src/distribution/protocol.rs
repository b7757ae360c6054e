use crate::vitals::{EntityId, Reading, SimEvent};
use serde::{Deserialize, Serialize};

/// Client → Server message types
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "subscribe")]
    Subscribe { entity_id: EntityId },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { entity_id: EntityId },
}

/// Server → Client message types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Latest reading for one entity, sent once per flush
    VitalsUpdate(Reading),
    /// Anomaly or scenario transition, broadcast to every connection
    SimulatorEvent(SimEvent),
    Error { error: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: message.into(),
        }
    }
}
