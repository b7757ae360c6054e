use super::*;
use axum::http::{HeaderMap, HeaderValue};

fn create_auth_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

fn enabled_context() -> AuthContext {
    let registry = Arc::new(IdentityRegistry::new());
    registry.register("staff-token", Identity::privileged());
    registry.register("family-2", Identity::restricted(2));
    AuthContext::new(registry, true)
}

#[test]
fn test_auth_disabled_allows_all() {
    let auth = AuthContext::disabled();
    let headers = HeaderMap::new(); // No auth header

    let identity = auth.authenticate(&headers).unwrap();
    assert!(identity.is_privileged());
    assert!(auth.authenticate_token(None).unwrap().is_privileged());
}

#[test]
fn test_auth_enabled_missing_token() {
    let auth = enabled_context();

    assert_eq!(auth.authenticate(&HeaderMap::new()), Err(TokenError::Missing));
    assert_eq!(auth.authenticate_token(None), Err(TokenError::Missing));
}

#[test]
fn test_auth_enabled_unknown_token() {
    let auth = enabled_context();
    let headers = create_auth_headers("forged");

    assert_eq!(auth.authenticate(&headers), Err(TokenError::Unknown));
    assert_eq!(auth.authenticate_token(Some("forged")), Err(TokenError::Unknown));
}

#[test]
fn test_auth_enabled_resolves_roles() {
    let auth = enabled_context();

    let staff = auth.authenticate(&create_auth_headers("staff-token")).unwrap();
    assert!(staff.is_privileged());

    let family = auth.authenticate_token(Some("family-2")).unwrap();
    assert_eq!(family, Identity::restricted(2));
}

#[test]
fn test_require_privileged() {
    assert!(require_privileged(&Identity::privileged()).is_ok());
    assert!(matches!(
        require_privileged(&Identity::restricted(1)),
        Err(ControlError::Forbidden(_))
    ));
}

#[test]
fn test_require_access_is_scoped() {
    let family = Identity::restricted(2);
    assert!(require_access(&family, 2).is_ok());
    assert!(matches!(
        require_access(&family, 3),
        Err(ControlError::Forbidden(_))
    ));
    assert!(require_access(&Identity::privileged(), 3).is_ok());
}
