//! Configuration management

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::defaults::DEFAULT_IMPORT_MAX_BYTES;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// PostgreSQL connection string
    pub database_url: String,

    /// JSON file with extra role entries layered over the built-in roles
    pub guest_roles_file: Option<PathBuf>,

    /// Uploads larger than this are rejected before parsing
    pub import_max_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let nats_user = std::env::var("NATS_USER").ok().filter(|u| !u.is_empty());
        let nats_password = std::env::var("NATS_PASSWORD").ok();

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let guest_roles_file = std::env::var("GUEST_ROLES_FILE")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let import_max_bytes = match std::env::var("IMPORT_MAX_BYTES") {
            Ok(value) => value
                .trim()
                .parse::<usize>()
                .with_context(|| format!("IMPORT_MAX_BYTES must be a byte count, got '{}'", value))?,
            Err(_) => DEFAULT_IMPORT_MAX_BYTES,
        };

        Ok(Self {
            nats_url,
            nats_user,
            nats_password,
            database_url,
            guest_roles_file,
            import_max_bytes,
        })
    }
}
