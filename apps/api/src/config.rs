use std::time::Duration;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    /// Enables the LLM category fallback when present.
    pub anthropic_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub sync_max_attempts: u32,
    pub sync_base_delay: Duration,
    pub live_channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store_backend = match optional_env("STORE").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("STORE must be 'postgres' or 'memory', got '{other}'"),
        };

        let database_url = match store_backend {
            StoreBackend::Postgres => Some(require_env("DATABASE_URL")?),
            StoreBackend::Memory => optional_env("DATABASE_URL"),
        };

        let sync_max_attempts: u32 = parse_env("SYNC_MAX_ATTEMPTS", 5)?;
        if sync_max_attempts == 0 {
            bail!("SYNC_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Config {
            store_backend,
            database_url,
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            sync_max_attempts,
            sync_base_delay: Duration::from_millis(parse_env("SYNC_BASE_DELAY_MS", 100)?),
            live_channel_capacity: parse_env("LIVE_CHANNEL_CAPACITY", 32)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match optional_env(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{key} has an invalid value: '{raw}'")),
    }
}
