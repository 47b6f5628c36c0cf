//! Authentication Module
//! Mission: Session & token lifecycle - registration, login, rotation, and the bearer gate

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod service;
pub mod user_store;

pub use api::AuthState;
pub use jwt::{TokenCodec, TokenConfig, TokenKind};
pub use middleware::{require_auth, resolve_identity, Identity};
pub use service::{AuthError, SessionService};
pub use user_store::UserStore;
