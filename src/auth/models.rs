//! Authentication Models
//! Mission: Define the user identity record and auth wire types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User identity record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String, // stored lowercase-normalized
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub name: String,
    pub image: Option<String>,
    pub created_at: String,
}

/// JWT Claims payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user id)
    pub iat: usize,
    pub exp: usize, // expiration timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>, // refresh-token nonce
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    pub image: Option<String>,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Profile update request body (both fields optional)
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub image: Option<String>,
}

/// User response (sanitized - never carries the password hash)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub image: Option<String>,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            image: user.image.clone(),
            created_at: user.created_at.clone(),
        }
    }
}

/// A freshly minted access/refresh pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Register/login response: user fields plus the token pair
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenPair,
}
