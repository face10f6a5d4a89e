//! Authorization gate: compares the caller's rights with the rights fixed on the matched route.
//! Routes are matched by name, so the gate reads exactly the bitmask the route was synthesized with.

use super::{Caller, Rights, TokenVerifier};
use crate::error::{AppError, AuthError};
use crate::routes::RouteRegistry;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Decide one request.
///
/// `Ok(None)` is a public route (no token read), `Ok(Some(caller))` a verified caller.
pub fn authorize(
    required: Rights,
    header: Option<&HeaderValue>,
    verifier: &dyn TokenVerifier,
) -> Result<Option<Caller>, AuthError> {
    if required.is_none() {
        return Ok(None);
    }
    let header = match header {
        Some(h) if !h.is_empty() => h.to_str().map_err(|_| AuthError::MalformedToken)?,
        _ => return Err(AuthError::MissingToken),
    };
    // Expected form: `Bearer <token>`.
    let parts: Vec<&str> = header.split(' ').collect();
    if parts.len() != 2 {
        return Err(AuthError::MalformedToken);
    }
    let caller = verifier.verify(parts[1])?;
    if !caller.rights.contains(required) {
        return Err(AuthError::InsufficientRights);
    }
    Ok(Some(caller))
}

/// Per-route gate state: the route's name plus the frozen registry it was registered in.
#[derive(Clone)]
pub struct GateState {
    pub route_name: Arc<str>,
    pub registry: Arc<RouteRegistry>,
    pub verifier: Arc<dyn TokenVerifier>,
}

/// Middleware run in front of every registered route.
pub async fn gate(State(gate): State<GateState>, mut request: Request, next: Next) -> Response {
    let Some(required) = gate.registry.rights_of(&gate.route_name) else {
        tracing::error!(route = %gate.route_name, "route missing from registry");
        return AppError::Forbidden.into_response();
    };
    let header = request.headers().get(AUTHORIZATION);
    match authorize(required, header, gate.verifier.as_ref()) {
        Ok(caller) => {
            tracing::debug!(
                route = %gate.route_name,
                path = %request.uri().path(),
                user_id = ?caller.map(|c| c.user_id),
                "request allowed"
            );
            if let Some(caller) = caller {
                request.extensions_mut().insert(caller);
            }
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(
                route = %gate.route_name,
                path = %request.uri().path(),
                reason = %e,
                "request denied"
            );
            AppError::Auth(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtVerifier;

    fn bearer(v: &JwtVerifier, rights: u32) -> HeaderValue {
        header(&format!("Bearer {}", v.issue(1, Rights(rights)).unwrap()))
    }

    fn header(raw: &str) -> HeaderValue {
        HeaderValue::from_str(raw).unwrap()
    }

    #[test]
    fn public_route_needs_no_token() {
        let v = JwtVerifier::new("s");
        assert_eq!(authorize(Rights::NONE, None, &v), Ok(None));
        assert_eq!(authorize(Rights::NONE, Some(&header("garbage")), &v), Ok(None));
    }

    #[test]
    fn denial_states() {
        let v = JwtVerifier::new("s");
        assert_eq!(authorize(Rights(1), None, &v), Err(AuthError::MissingToken));
        assert_eq!(authorize(Rights(1), Some(&header("")), &v), Err(AuthError::MissingToken));
        assert_eq!(authorize(Rights(1), Some(&header("Bearer")), &v), Err(AuthError::MalformedToken));
        assert_eq!(authorize(Rights(1), Some(&header("Bearer a b")), &v), Err(AuthError::MalformedToken));
        assert_eq!(authorize(Rights(1), Some(&header("Bearer abc")), &v), Err(AuthError::InvalidToken));
        let unreadable = HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap();
        assert_eq!(authorize(Rights(1), Some(&unreadable), &v), Err(AuthError::MalformedToken));
        assert_eq!(
            authorize(Rights(2), Some(&bearer(&v, 1)), &v),
            Err(AuthError::InsufficientRights)
        );
    }

    #[test]
    fn contained_rights_are_allowed() {
        let v = JwtVerifier::new("s");
        let caller = authorize(Rights(1), Some(&bearer(&v, 3)), &v).unwrap().unwrap();
        assert_eq!(caller.user_id, 1);
        assert_eq!(caller.rights, Rights(3));
    }
}
