//! Token Codec
//! Mission: Mint and verify the access/refresh token pair

use crate::auth::models::Claims;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Which half of the token pair a string claims to be.
///
/// Access and refresh tokens are signed with distinct secrets, so a token
/// of one kind can never verify as the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Codec configuration, supplied once at startup. Core logic never reads
/// ambient process state.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 3600,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
}

/// Signs and verifies self-contained tokens. Stateless; verification is a
/// pure computation with no store lookup.
pub struct TokenCodec {
    config: TokenConfig,
}

impl TokenCodec {
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.config.access_secret.as_bytes(),
            TokenKind::Refresh => self.config.refresh_secret.as_bytes(),
        }
    }

    fn ttl(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.config.access_ttl_secs,
            TokenKind::Refresh => self.config.refresh_ttl_secs,
        }
    }

    /// Issue a signed token for `subject` with the kind's TTL. Refresh
    /// tokens carry a fresh `jti` nonce so a consumed token string is
    /// never minted twice.
    pub fn issue(&self, subject: Uuid, kind: TokenKind) -> Result<String, TokenError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.ttl(kind));

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
            jti: match kind {
                TokenKind::Access => None,
                TokenKind::Refresh => Some(Uuid::new_v4().to_string()),
            },
        };

        debug!("Issuing {:?} token for subject {}", kind, subject);

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret(kind)),
        )
        .map_err(|_| TokenError::Malformed)
    }

    /// Verify a token as the given kind and return its claims.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0; // exact expiry

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind)),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        })?;

        Ok(decoded.claims)
    }
}
