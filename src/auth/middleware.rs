//! Auth Gate
//! Mission: Resolve a verified identity before any protected handler runs

use crate::auth::{
    jwt::{TokenCodec, TokenKind},
    service::AuthError,
};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

/// Request-scoped identity resolved from a verified access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub Uuid);

/// Pull the token value out of the Authorization header.
///
/// Both `Bearer` and `JWT` scheme prefixes are accepted, matched
/// case-insensitively; clients of the original wire protocol use the two
/// interchangeably. A header with no scheme or with nothing after the
/// scheme yields `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, rest) = value.trim().split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") && !scheme.eq_ignore_ascii_case("jwt") {
        return None;
    }

    let token = rest.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Verify the caller's access token and return its subject.
///
/// This is the collaborator contract for code that is not behind the
/// middleware layer. Access tokens are self-verifying; the store is never
/// consulted here.
pub fn resolve_identity(headers: &HeaderMap, codec: &TokenCodec) -> Result<Uuid, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::Unauthorized)?;
    let claims = codec
        .verify(token, TokenKind::Access)
        .map_err(|_| AuthError::Unauthorized)?;
    Uuid::parse_str(&claims.sub).map_err(|_| AuthError::Unauthorized)
}

/// Middleware guarding protected routes. On success the resolved
/// `Identity` is inserted into request extensions for handlers; every
/// failure short-circuits with 401 before the handler runs.
pub async fn require_auth(
    State(codec): State<Arc<TokenCodec>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user_id = resolve_identity(req.headers(), &codec)?;
    req.extensions_mut().insert(Identity(user_id));
    Ok(next.run(req).await)
}
