use crate::auth::{extract_bearer_token, normalize_query_token, Identity, IdentityRegistry, TokenError};
use crate::error::ControlError;
use crate::vitals::EntityId;
use axum::http::HeaderMap;
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// Resolves callers to identities
///
/// If auth is disabled, every caller is privileged.
#[derive(Clone)]
pub struct AuthContext {
    pub registry: Arc<IdentityRegistry>,
    pub enabled: bool,
}

impl AuthContext {
    pub fn new(registry: Arc<IdentityRegistry>, enabled: bool) -> Self {
        Self { registry, enabled }
    }

    /// No token checks; everyone is privileged
    pub fn disabled() -> Self {
        Self::new(Arc::new(IdentityRegistry::new()), false)
    }

    /// Resolve the bearer token in `Authorization`
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, TokenError> {
        if !self.enabled {
            return Ok(Identity::privileged());
        }
        let token = extract_bearer_token(headers)?;
        self.resolve(&token)
    }

    /// Resolve a `?token=` query parameter
    pub fn authenticate_token(&self, token: Option<&str>) -> Result<Identity, TokenError> {
        if !self.enabled {
            return Ok(Identity::privileged());
        }
        let token = normalize_query_token(token)?;
        self.resolve(&token)
    }

    fn resolve(&self, token: &str) -> Result<Identity, TokenError> {
        self.registry.resolve(token).ok_or(TokenError::Unknown)
    }
}

/// Global operations are privileged-only
pub fn require_privileged(identity: &Identity) -> Result<(), ControlError> {
    if identity.is_privileged() {
        Ok(())
    } else {
        Err(ControlError::Forbidden(
            "operation requires a privileged identity".to_string(),
        ))
    }
}

/// Per-entity operations are limited to the identity's scope
pub fn require_access(identity: &Identity, entity_id: EntityId) -> Result<(), ControlError> {
    if identity.can_access(entity_id) {
        Ok(())
    } else {
        Err(ControlError::Forbidden(format!(
            "identity is not permitted to access entity {}",
            entity_id
        )))
    }
}
