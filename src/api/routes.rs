//! Router Assembly
//! Mission: Wire the auth endpoints, the bearer gate, and the profile collaborator

use crate::auth::{
    api as auth_api,
    middleware::{require_auth, Identity},
    models::{UpdateProfileRequest, UserResponse},
    service::AuthError,
    user_store::{StoreError, UserStore},
    AuthState, SessionService, TokenCodec,
};
use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// State for the protected collaborator routes
#[derive(Clone)]
pub struct ProfileState {
    pub store: Arc<UserStore>,
    pub default_picture_path: String,
}

/// Create the full application router.
///
/// Three surfaces, merged: public (health), auth (register/login/logout/
/// refresh), and protected routes behind the access-token gate.
pub fn build_router(
    service: Arc<SessionService>,
    codec: Arc<TokenCodec>,
    store: Arc<UserStore>,
    default_picture_path: String,
) -> Router {
    let auth_routes = Router::new()
        .route("/auth/register", post(auth_api::register))
        .route("/auth/login", post(auth_api::login))
        .route("/auth/logout", get(auth_api::logout))
        .route("/auth/refresh", get(auth_api::refresh))
        .with_state(AuthState { service });

    let protected_routes = Router::new()
        .route("/user/profile", get(get_profile).put(update_profile))
        .route_layer(middleware::from_fn_with_state(codec, require_auth))
        .with_state(ProfileState {
            store,
            default_picture_path,
        });

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Get the caller's own profile - GET /user/profile
///
/// Identity comes from the gate; a subject that no longer exists in the
/// store is treated as an invalid credential, not a 404.
async fn get_profile(
    State(state): State<ProfileState>,
    Extension(Identity(user_id)): Extension<Identity>,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state
        .store
        .find_by_id(&user_id)
        .map_err(store_to_auth)?
        .ok_or(AuthError::Unauthorized)?;

    let mut response = UserResponse::from_user(&user);
    if response.image.as_deref().unwrap_or("").is_empty() {
        response.image = Some(state.default_picture_path.clone());
    }

    Ok(Json(response))
}

/// Update the caller's own profile - PUT /user/profile
async fn update_profile(
    State(state): State<ProfileState>,
    Extension(Identity(user_id)): Extension<Identity>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state
        .store
        .update_profile(&user_id, payload.name.as_deref(), payload.image.as_deref())
        .map_err(store_to_auth)?;

    Ok(Json(UserResponse::from_user(&user)))
}

/// Collaborator-side mapping: a vanished identity is an auth failure.
fn store_to_auth(err: StoreError) -> AuthError {
    match err {
        StoreError::NotFound => AuthError::Unauthorized,
        other => other.into(),
    }
}
