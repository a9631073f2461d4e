//! Configuration loader for the `herdwatch` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Routes and background tasks receive a [`Config`]
//! snapshot instead of reading `env::var` themselves.
//!
use std::{env, fmt};

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Default number of readings returned by `GET /sensor-data`.
pub const DEFAULT_READINGS_LIMIT: u32 = 10;

/// Default width of one weight histogram bucket, in kilograms.
pub const DEFAULT_WEIGHT_BUCKET_KG: u32 = 50;

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string (the store URL).
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Privileged credential required on write endpoints, when set.
    pub service_role_key: Option<String>,

    /// Readings returned by `GET /sensor-data` when no `limit` is given.
    pub readings_default_limit: u32,

    /// Width of one weight histogram bucket, in kilograms.
    pub weight_bucket_kg: u32,

    /// Periodic dashboard recompute interval in seconds (0 = change events only).
    pub summary_refresh_secs: u32,

    /// TCP port the HTTP server binds to.
    pub bind_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_url: String::new(),
            db_pool_max: 5,
            service_role_key: None,
            readings_default_limit: DEFAULT_READINGS_LIMIT,
            weight_bucket_kg: DEFAULT_WEIGHT_BUCKET_KG,
            summary_refresh_secs: 0,
            bind_port: 8080,
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `SERVICE_ROLE_KEY` – credential required on write endpoints (default: unset)
/// - `READINGS_DEFAULT_LIMIT` – default `limit` for reading queries (default: 10)
/// - `WEIGHT_BUCKET_KG` – weight histogram bucket width (default: 50)
/// - `SUMMARY_REFRESH_SECS` – periodic dashboard refresh (default: 0, disabled)
/// - `BIND_PORT` – HTTP port (default: 8080)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let readings_default_limit = parse_env_u32!("READINGS_DEFAULT_LIMIT", DEFAULT_READINGS_LIMIT);
    let weight_bucket_kg = parse_env_u32!("WEIGHT_BUCKET_KG", DEFAULT_WEIGHT_BUCKET_KG);
    let summary_refresh_secs = parse_env_u32!("SUMMARY_REFRESH_SECS", 0);
    let bind_port = u16::try_from(parse_env_u32!("BIND_PORT", 8080))
        .map_err(|e| anyhow!("Invalid BIND_PORT: {}", e))?;

    if weight_bucket_kg == 0 {
        return Err(anyhow!("Invalid WEIGHT_BUCKET_KG: must be greater than zero"));
    }

    let service_role_key = env::var("SERVICE_ROLE_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty());

    Ok(Config {
        db_url,
        db_pool_max,
        service_role_key,
        readings_default_limit,
        weight_bucket_kg,
        summary_refresh_secs,
        bind_port,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords and the service
    /// credential while showing all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        let service_key = match self.service_role_key {
            Some(_) => "****",
            None => "(unset, write endpoints are open)",
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL           : {}", self.masked_db_url());
        tracing::info!("  DB_POOL_MAX            : {}", self.db_pool_max);
        tracing::info!("  SERVICE_ROLE_KEY       : {}", service_key);
        tracing::info!("  READINGS_DEFAULT_LIMIT : {}", self.readings_default_limit);
        tracing::info!("  WEIGHT_BUCKET_KG       : {}", self.weight_bucket_kg);
        tracing::info!("  SUMMARY_REFRESH_SECS   : {}", self.summary_refresh_secs);
        tracing::info!("  BIND_PORT              : {}", self.bind_port);
    }

    /// The database URL with its password replaced by `****`.
    pub fn masked_db_url(&self) -> String {
        // ---
        // Credentials live between the scheme separator and the last '@'
        let userinfo_start = self.db_url.find("://").map_or(0, |pos| pos + 3);
        if let Some(at_pos) = self.db_url.rfind('@') {
            if at_pos > userinfo_start {
                if let Some(colon_pos) = self.db_url[userinfo_start..at_pos].rfind(':') {
                    let colon_pos = userinfo_start + colon_pos;
                    return format!(
                        "{}:****{}",
                        &self.db_url[..colon_pos],
                        &self.db_url[at_pos..]
                    );
                }
            }
        }
        self.db_url.clone()
    }
}

// Secrets are masked the same way `log_config` masks them
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("db_url", &self.masked_db_url())
            .field("db_pool_max", &self.db_pool_max)
            .field("service_role_key", &self.service_role_key.as_ref().map(|_| "****"))
            .field("readings_default_limit", &self.readings_default_limit)
            .field("weight_bucket_kg", &self.weight_bucket_kg)
            .field("summary_refresh_secs", &self.summary_refresh_secs)
            .field("bind_port", &self.bind_port)
            .finish()
    }
}
