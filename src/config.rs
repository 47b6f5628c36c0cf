//! Configuration
//! Mission: Resolve all runtime settings once at startup

use crate::auth::TokenConfig;
use std::env;
use tracing::warn;

const DEV_ACCESS_SECRET: &str = "dev-access-secret-change-in-production-32ch";
const DEV_REFRESH_SECRET: &str = "dev-refresh-secret-change-in-production-32c";

/// Process configuration, loaded from the environment in `main` and
/// passed into constructors by value. Core logic never reads env vars.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub auth_db_path: String,
    pub default_picture_path: String,
    pub tokens: TokenConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let access_secret = env::var("ACCESS_TOKEN_SECRET").unwrap_or_else(|_| {
            warn!("ACCESS_TOKEN_SECRET not set - using dev secret");
            DEV_ACCESS_SECRET.to_string()
        });
        let refresh_secret = env::var("REFRESH_TOKEN_SECRET").unwrap_or_else(|_| {
            warn!("REFRESH_TOKEN_SECRET not set - using dev secret");
            DEV_REFRESH_SECRET.to_string()
        });

        let access_ttl_secs = env::var("ACCESS_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(15 * 60);
        let refresh_ttl_secs = env::var("REFRESH_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(7 * 24 * 3600);

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            auth_db_path: env::var("AUTH_DB_PATH")
                .unwrap_or_else(|_| "chatline_auth.db".to_string()),
            default_picture_path: env::var("DEFAULT_PICTURE_PATH")
                .unwrap_or_else(|_| "/images/default_avatar.png".to_string()),
            tokens: TokenConfig {
                access_secret,
                refresh_secret,
                access_ttl_secs,
                refresh_ttl_secs,
            },
        }
    }
}
