//! Session Service
//! Mission: Orchestrate registration, login, logout, and token rotation

use crate::auth::{
    jwt::{TokenCodec, TokenError, TokenKind},
    models::{LoginRequest, RegisterRequest, TokenPair, User},
    user_store::{StoreError, UserStore},
};
use bcrypt::{hash, verify, DEFAULT_COST};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

// Well-formed bcrypt hash used to equalize the cost of the unknown-email
// login path with the wrong-password path.
const DUMMY_PASSWORD_HASH: &str = "$2a$12$R9h/cIPz0gi.URNNX3kh2OPST9/PgBkqquzi.Ss7KIUgO2t0jWMUW";

/// Error taxonomy for every auth operation. Token- and credential-
/// validation failures are deliberately undifferentiated (`Unauthorized`)
/// so callers cannot probe which check failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("email already registered")]
    Conflict,
    #[error("invalid credentials")]
    Unauthorized,
    #[error("internal server error")]
    Internal(anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => AuthError::Conflict,
            other => AuthError::Internal(other.into()),
        }
    }
}

/// A registered or logged-in session: the user plus a fresh token pair.
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

/// Orchestrates the token lifecycle against the codec and the store.
pub struct SessionService {
    store: Arc<UserStore>,
    codec: Arc<TokenCodec>,
}

impl SessionService {
    pub fn new(store: Arc<UserStore>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    /// Create a user and open their first session.
    pub fn register(&self, req: RegisterRequest) -> Result<Session, AuthError> {
        let email = req.email.trim().to_lowercase();
        let name = req.name.trim().to_string();

        if email.is_empty() {
            return Err(AuthError::InvalidInput("email is required"));
        }
        if req.password.is_empty() {
            return Err(AuthError::InvalidInput("password is required"));
        }

        let password_hash = hash(&req.password, DEFAULT_COST)
            .map_err(|e| AuthError::Internal(e.into()))?;

        let user = self
            .store
            .create_user(&email, &password_hash, &name, req.image.as_deref())?;

        let tokens = self.issue_pair(user.id)?;

        info!("Registered user {}", user.id);
        Ok(Session { user, tokens })
    }

    /// Verify credentials and open a new session. Concurrent sessions are
    /// allowed; earlier refresh tokens stay valid.
    pub fn login(&self, req: LoginRequest) -> Result<Session, AuthError> {
        let email = req.email.trim().to_lowercase();

        if email.is_empty() {
            return Err(AuthError::InvalidInput("email is required"));
        }
        if req.password.is_empty() {
            return Err(AuthError::InvalidInput("password is required"));
        }

        let Some(user) = self.store.find_by_email(&email)? else {
            // Burn a hash verification anyway so this path is not
            // observably faster than a wrong password.
            let _ = verify(&req.password, DUMMY_PASSWORD_HASH);
            warn!("Failed login attempt for unknown email");
            return Err(AuthError::Unauthorized);
        };

        let valid = verify(&req.password, &user.password_hash)
            .map_err(|e| AuthError::Internal(e.into()))?;
        if !valid {
            warn!("Failed login attempt for user {}", user.id);
            return Err(AuthError::Unauthorized);
        }

        let tokens = self.issue_pair(user.id)?;

        info!("Login successful for user {}", user.id);
        Ok(Session { user, tokens })
    }

    /// Consume one refresh token. Other sessions for the same user are
    /// unaffected; a token that is already consumed fails `Unauthorized`.
    pub fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let user_id = self.verify_refresh_subject(refresh_token)?;

        let removed = self.store.remove_refresh_token(&user_id, refresh_token)?;
        if !removed {
            return Err(AuthError::Unauthorized);
        }

        info!("Logged out one session for user {}", user_id);
        Ok(())
    }

    /// Rotate a refresh token: mint a new pair, then atomically swap the
    /// old token for the new one. If the swap reports the old token was
    /// no longer a member (replayed, already rotated, or logged out), the
    /// minted tokens are discarded and the call fails `Unauthorized`.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let user_id = self.verify_refresh_subject(refresh_token)?;

        let access_token = self
            .codec
            .issue(user_id, TokenKind::Access)
            .map_err(|e| AuthError::Internal(e.into()))?;
        let new_refresh = self
            .codec
            .issue(user_id, TokenKind::Refresh)
            .map_err(|e| AuthError::Internal(e.into()))?;

        let swapped =
            self.store
                .replace_refresh_token(&user_id, refresh_token, &new_refresh)?;
        if !swapped {
            warn!("Rejected replayed or revoked refresh token for user {}", user_id);
            return Err(AuthError::Unauthorized);
        }

        Ok(TokenPair {
            access_token,
            refresh_token: new_refresh,
        })
    }

    /// Mint and persist a token pair for an existing user. This is the
    /// entry point for sign-in flows that verified an identity elsewhere
    /// (e.g. a federated email claim) and only need tokens.
    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, AuthError> {
        let access_token = self
            .codec
            .issue(user_id, TokenKind::Access)
            .map_err(|e| AuthError::Internal(e.into()))?;
        let refresh_token = self
            .codec
            .issue(user_id, TokenKind::Refresh)
            .map_err(|e| AuthError::Internal(e.into()))?;

        self.store.add_refresh_token(&user_id, &refresh_token)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Cryptographic check plus subject extraction; membership is checked
    /// by the mutation that follows.
    fn verify_refresh_subject(&self, refresh_token: &str) -> Result<Uuid, AuthError> {
        let claims = self
            .codec
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|_: TokenError| AuthError::Unauthorized)?;

        Uuid::parse_str(&claims.sub).map_err(|_| AuthError::Unauthorized)
    }
}
