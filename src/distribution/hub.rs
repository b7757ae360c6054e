use crate::auth::{Identity, Role};
use crate::distribution::protocol::ServerMessage;
use crate::vitals::{EntityId, Reading};
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

pub type ConnectionId = u64;

struct Connection {
    identity: Identity,
    sender: UnboundedSender<ServerMessage>,
    groups: HashSet<EntityId>,
}

/// Connection registry and per-entity subscriber groups.
///
/// Restricted connections are pinned to their own entity's group at connect
/// time; any later join or leave they request is ignored. The tracked entity
/// set lives here so a connect and a roster change never interleave.
#[derive(Default)]
pub struct SubscriptionHub {
    next_id: ConnectionId,
    connections: HashMap<ConnectionId, Connection>,
    groups: HashMap<EntityId, HashSet<ConnectionId>>,
    tracked: BTreeSet<EntityId>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Privileged identities join every tracked
    /// entity; restricted identities join only their own entity.
    pub fn connect(
        &mut self,
        identity: Identity,
        sender: UnboundedSender<ServerMessage>,
    ) -> ConnectionId {
        self.next_id += 1;
        let id = self.next_id;
        self.connections.insert(
            id,
            Connection {
                identity,
                sender,
                groups: HashSet::new(),
            },
        );

        match (identity.role, identity.entity_id) {
            (Role::Privileged, _) => {
                let tracked: Vec<EntityId> = self.tracked.iter().copied().collect();
                for entity_id in tracked {
                    self.join(id, entity_id);
                }
            }
            (Role::Restricted, Some(entity_id)) => self.join(id, entity_id),
            (Role::Restricted, None) => {}
        }

        info!(
            connection_id = id,
            role = ?identity.role,
            groups = self.connections.get(&id).map_or(0, |c| c.groups.len()),
            "Connection registered"
        );
        id
    }

    /// Join `entity_id`'s group. Returns false when the request was ignored.
    pub fn subscribe(&mut self, connection_id: ConnectionId, entity_id: EntityId) -> bool {
        let Some(connection) = self.connections.get(&connection_id) else {
            return false;
        };
        if !connection.identity.is_privileged() {
            debug!(connection_id, entity_id, "Ignoring join from restricted connection");
            return false;
        }
        self.join(connection_id, entity_id);
        true
    }

    /// Leave `entity_id`'s group. Returns false when the request was ignored.
    pub fn unsubscribe(&mut self, connection_id: ConnectionId, entity_id: EntityId) -> bool {
        let Some(connection) = self.connections.get_mut(&connection_id) else {
            return false;
        };
        if !connection.identity.is_privileged() {
            return false;
        }
        connection.groups.remove(&entity_id);
        if let Some(members) = self.groups.get_mut(&entity_id) {
            members.remove(&connection_id);
            if members.is_empty() {
                self.groups.remove(&entity_id);
            }
        }
        true
    }

    pub fn disconnect(&mut self, connection_id: ConnectionId) {
        let Some(connection) = self.connections.remove(&connection_id) else {
            return;
        };
        for entity_id in connection.groups {
            if let Some(members) = self.groups.get_mut(&entity_id) {
                members.remove(&connection_id);
                if members.is_empty() {
                    self.groups.remove(&entity_id);
                }
            }
        }
        info!(connection_id, "Connection removed");
    }

    /// Track an entity and join every privileged connection to it
    pub fn entity_added(&mut self, entity_id: EntityId) {
        self.tracked.insert(entity_id);
        let privileged: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|(_, c)| c.identity.is_privileged())
            .map(|(&id, _)| id)
            .collect();
        for id in privileged {
            self.join(id, entity_id);
        }
    }

    /// Drop a group whose entity is no longer tracked. Restricted members
    /// keep their pinned membership so they resume if the entity returns.
    pub fn entity_removed(&mut self, entity_id: EntityId) {
        self.tracked.remove(&entity_id);
        let Some(members) = self.groups.get_mut(&entity_id) else {
            return;
        };
        let connections = &mut self.connections;
        members.retain(|id| match connections.get_mut(id) {
            Some(c) if c.identity.is_privileged() => {
                c.groups.remove(&entity_id);
                false
            }
            Some(_) => true,
            None => false,
        });
        if members.is_empty() {
            self.groups.remove(&entity_id);
        }
    }

    /// Send a reading to its entity's group. Returns the number of recipients.
    pub fn deliver(&self, reading: &Reading) -> usize {
        let Some(members) = self.groups.get(&reading.entity_id) else {
            return 0;
        };
        let mut delivered = 0;
        for id in members {
            if let Some(connection) = self.connections.get(id) {
                // A closed receiver means the socket task is shutting down
                if connection
                    .sender
                    .send(ServerMessage::VitalsUpdate(reading.clone()))
                    .is_ok()
                {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Send to every connection regardless of group
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        self.connections
            .values()
            .filter(|c| c.sender.send(message.clone()).is_ok())
            .count()
    }

    pub fn tracked(&self) -> Vec<EntityId> {
        self.tracked.iter().copied().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn group_size(&self, entity_id: EntityId) -> usize {
        self.groups.get(&entity_id).map_or(0, HashSet::len)
    }

    pub fn groups_of(&self, connection_id: ConnectionId) -> Vec<EntityId> {
        let mut groups: Vec<EntityId> = self
            .connections
            .get(&connection_id)
            .map(|c| c.groups.iter().copied().collect())
            .unwrap_or_default();
        groups.sort_unstable();
        groups
    }

    fn join(&mut self, connection_id: ConnectionId, entity_id: EntityId) {
        if let Some(connection) = self.connections.get_mut(&connection_id) {
            connection.groups.insert(entity_id);
            self.groups.entry(entity_id).or_default().insert(connection_id);
        }
    }
}
