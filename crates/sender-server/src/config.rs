use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

use sender_api::bootstrap::AdminSeed;

/// Fallback secret for local development only.
const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Secrets that must never sign production tokens.
const PLACEHOLDER_SECRETS: &[&str] = &[
    DEV_JWT_SECRET,
    "your-super-secret-jwt-key-change-in-production",
    "change-me-to-a-random-string",
];

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub admin: AdminSeed,
}

impl Config {
    /// Read configuration from the environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("SENDER_JWT_SECRET").unwrap_or_default();
        let jwt_secret = if jwt_secret.is_empty() {
            warn!("SENDER_JWT_SECRET is unset; falling back to the development secret");
            DEV_JWT_SECRET.to_string()
        } else {
            if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
                warn!("SENDER_JWT_SECRET is still a placeholder; set a random value in production");
            }
            jwt_secret
        };

        let db_path = std::env::var("SENDER_DB_PATH").unwrap_or_else(|_| "sender.db".into());
        let host = std::env::var("SENDER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("SENDER_PORT")
            .unwrap_or_else(|_| "8001".into())
            .parse()
            .context("SENDER_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let defaults = AdminSeed::default();
        let admin = AdminSeed {
            email: std::env::var("SENDER_ADMIN_EMAIL").unwrap_or(defaults.email),
            username: std::env::var("SENDER_ADMIN_USERNAME").unwrap_or(defaults.username),
            password: std::env::var("SENDER_ADMIN_PASSWORD").unwrap_or(defaults.password),
        };

        Ok(Self {
            jwt_secret,
            db_path: db_path.into(),
            addr,
            admin,
        })
    }
}
