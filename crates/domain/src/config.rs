//! Environment-driven configuration structures shared by all binaries.

use std::{env, time::Duration};

use thiserror::Error;

pub const DEFAULT_SOLANA_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_EXPLORER_BASE_URL: &str = "https://solscan.io";

/// API-specific configuration (HTTP bind + shared database).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    database_url: String,
    api_bind_address: String,
    internal_bind_address: Option<String>,
}

impl ApiConfig {
    /// Loads only the environment variables required by the API listeners.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        Ok(Self {
            database_url: get_required_var("DATABASE_URL")?,
            api_bind_address: get_required_var("API_BIND_ADDRESS")?,
            internal_bind_address: get_optional_var("API_INTERNAL_BIND_ADDRESS"),
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn api_bind_address(&self) -> &str {
        &self.api_bind_address
    }

    pub fn internal_bind_address(&self) -> Option<&str> {
        self.internal_bind_address.as_deref()
    }

    pub fn has_internal_listener(&self) -> bool {
        self.internal_bind_address.is_some()
    }
}

/// Knobs for the watch cycle: where to read the ledger, how often, and how
/// hard to lean on downstream rate limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    database_url: String,
    solana_rpc_url: String,
    explorer_base_url: String,
    watch_interval: Duration,
    window_size: usize,
    notify_pacing: Duration,
    rate_limit_backoff: Duration,
    rpc_timeout: Duration,
}

impl MonitorConfig {
    /// Loads configuration by hydrating `.env` (if present) and reading the
    /// process variables. Only `DATABASE_URL` is required; everything else
    /// falls back to the production defaults.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let window_size = get_u64_or("WATCH_WINDOW_SIZE", 10)?;
        if window_size == 0 {
            return Err(ConfigError::OutOfRange {
                key: "WATCH_WINDOW_SIZE",
                value: window_size,
            });
        }

        Ok(Self {
            database_url: get_required_var("DATABASE_URL")?,
            solana_rpc_url: get_optional_var("SOLANA_RPC_URL")
                .unwrap_or_else(|| DEFAULT_SOLANA_RPC_URL.to_string()),
            explorer_base_url: get_optional_var("EXPLORER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_EXPLORER_BASE_URL.to_string()),
            watch_interval: Duration::from_secs(get_u64_or("WATCH_INTERVAL_SECS", 30)?.max(1)),
            window_size: window_size as usize,
            notify_pacing: Duration::from_millis(get_u64_or("NOTIFY_PACING_MS", 500)?),
            rate_limit_backoff: Duration::from_secs(get_u64_or("RATE_LIMIT_BACKOFF_SECS", 5)?),
            rpc_timeout: Duration::from_secs(get_u64_or("RPC_TIMEOUT_SECS", 15)?.max(1)),
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn solana_rpc_url(&self) -> &str {
        &self.solana_rpc_url
    }

    pub fn explorer_base_url(&self) -> &str {
        &self.explorer_base_url
    }

    pub fn watch_interval(&self) -> Duration {
        self.watch_interval
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn notify_pacing(&self) -> Duration {
        self.notify_pacing
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        self.rate_limit_backoff
    }

    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    get_optional_var(key).ok_or(ConfigError::MissingVar { key })
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_u64_or(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match get_optional_var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|source| ConfigError::InvalidNumber { key, source }),
        None => Ok(default),
    }
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("WALLETWATCH_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("value {value} is out of range for `{key}`")]
    OutOfRange { key: &'static str, value: u64 },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}
