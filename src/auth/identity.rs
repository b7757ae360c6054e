use crate::vitals::EntityId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Consumer role on the real-time channel and control surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Staff: sees every tracked entity, may use the whole control surface
    Privileged,
    /// Scoped to a single entity
    Restricted,
}

/// Opaque connection identity, resolved once from a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub role: Role,
    /// Scoped entity for restricted identities
    pub entity_id: Option<EntityId>,
}

impl Identity {
    pub fn privileged() -> Self {
        Self {
            role: Role::Privileged,
            entity_id: None,
        }
    }

    pub fn restricted(entity_id: EntityId) -> Self {
        Self {
            role: Role::Restricted,
            entity_id: Some(entity_id),
        }
    }

    pub fn is_privileged(&self) -> bool {
        self.role == Role::Privileged
    }

    /// Whether this identity may see or act on `entity_id`
    pub fn can_access(&self, entity_id: EntityId) -> bool {
        match self.role {
            Role::Privileged => true,
            Role::Restricted => self.entity_id == Some(entity_id),
        }
    }
}

/// Token → identity lookup, populated by the external auth layer or config
pub struct IdentityRegistry {
    tokens: DashMap<String, Identity>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self {
            tokens: DashMap::new(),
        }
    }

    /// Register a caller-chosen token, replacing any previous binding
    pub fn register(&self, token: impl Into<String>, identity: Identity) {
        self.tokens.insert(token.into(), identity);
    }

    /// Issue a fresh random token for `identity`
    pub fn issue(&self, identity: Identity) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(token.clone(), identity);
        token
    }

    pub fn resolve(&self, token: &str) -> Option<Identity> {
        self.tokens.get(token).map(|entry| *entry.value())
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_resolve() {
        let registry = IdentityRegistry::new();
        let token = registry.issue(Identity::restricted(4));

        assert!(Uuid::parse_str(&token).is_ok());
        assert_eq!(registry.resolve(&token), Some(Identity::restricted(4)));
        assert_eq!(registry.resolve("nope"), None);
    }

    #[test]
    fn test_register_replaces_and_revoke_removes() {
        let registry = IdentityRegistry::new();
        registry.register("staff-token", Identity::restricted(1));
        registry.register("staff-token", Identity::privileged());
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve("staff-token").unwrap().is_privileged());

        assert!(registry.revoke("staff-token"));
        assert!(registry.is_empty());
        assert!(!registry.revoke("staff-token"));
    }

    #[test]
    fn test_restricted_access_is_scoped() {
        let family = Identity::restricted(3);
        assert!(family.can_access(3));
        assert!(!family.can_access(4));
        assert!(Identity::privileged().can_access(4));
    }
}
