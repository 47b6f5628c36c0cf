//! Authentication API Endpoints
//! Mission: Expose the session lifecycle over HTTP

use crate::auth::{
    middleware::bearer_token,
    models::{LoginRequest, RegisterRequest, SessionResponse, TokenPair, UserResponse},
    service::{AuthError, SessionService},
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub service: Arc<SessionService>,
}

/// Register endpoint - POST /auth/register
pub async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AuthError> {
    let session = state.service.register(payload)?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user: UserResponse::from_user(&session.user),
            tokens: session.tokens,
        }),
    ))
}

/// Login endpoint - POST /auth/login
pub async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AuthError> {
    let session = state.service.login(payload)?;

    Ok(Json(SessionResponse {
        user: UserResponse::from_user(&session.user),
        tokens: session.tokens,
    }))
}

/// Logout endpoint - GET /auth/logout
///
/// The refresh token to consume rides in the Authorization header, same
/// framing as the access-token gate.
pub async fn logout(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<StatusCode, AuthError> {
    let token = bearer_token(&headers).ok_or(AuthError::Unauthorized)?;
    state.service.logout(token)?;
    Ok(StatusCode::OK)
}

/// Refresh endpoint - GET /auth/refresh
pub async fn refresh(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<Json<TokenPair>, AuthError> {
    let token = bearer_token(&headers).ok_or(AuthError::Unauthorized)?;
    let pair = state.service.refresh(token)?;
    Ok(Json(pair))
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, *msg),
            AuthError::Conflict => (StatusCode::NOT_ACCEPTABLE, "email already registered"),
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid credentials"),
            AuthError::Internal(err) => {
                error!("Internal auth error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
