//! Configuration loader for the sensorflow services.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Both binaries read their settings here so that
//! `env::var` calls do not spread through the codebase.
//!
use std::env;

use anyhow::{anyhow, Result};

use crate::auth::{parse_accounts, Account};
use crate::frequency::{DEFAULT_FREQUENCY_MS, MIN_FREQUENCY_MS};

/// Parse an optional numeric environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
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

/// Read an optional string environment variable with a default value.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

const DEV_JWT_SECRET: &str = "your-secret-key";
const DEFAULT_ACCOUNTS: &str = "admin:admin123:admin,user:user123:user";

// ---

/// Where the ingest service keeps readings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres {
        /// PostgreSQL connection string.
        db_url: String,
        /// Maximum number of database connections in the pool.
        db_pool_max: u32,
        /// Connection attempts, one second apart, before giving up.
        connect_attempts: u32,
    },
    Memory,
}

/// Ingest service configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    // ---
    pub storage: StorageBackend,

    /// HTTP port for the query API and the stream endpoint.
    pub http_port: u16,

    /// HS256 signing secret for issued tokens.
    pub jwt_secret: String,

    /// Lifetime of issued tokens.
    pub jwt_ttl_hours: u32,

    /// Credentials that may log in.
    pub accounts: Vec<Account>,
}

/// Generator service configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    // ---
    /// WebSocket URL of the ingest stream endpoint.
    pub ingest_url: String,

    /// Sensor type stamped on every generated reading.
    pub sensor_type: String,

    /// Initial pace in milliseconds.
    pub frequency_ms: u64,

    /// HTTP port for the frequency configuration API.
    pub config_port: u16,

    /// Delay before reopening a stream that failed to open.
    pub reconnect_backoff_secs: u64,
}

/// Load the ingest service configuration.
///
/// Optional:
/// - `STORAGE_BACKEND` – `postgres` (default) or `memory`
/// - `DATABASE_URL` – PostgreSQL connection string (**required** for postgres)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `DB_CONNECT_ATTEMPTS` – startup connection attempts (default: 30)
/// - `HTTP_PORT` – listen port (default: 8080)
/// - `JWT_SECRET` – token signing secret (default: development secret)
/// - `JWT_TTL_HOURS` – token lifetime (default: 24)
/// - `AUTH_USERS` – `name:password:role,...` (default: `admin` and `user` demo accounts)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_ingest_from_env() -> Result<IngestConfig> {
    // ---
    let storage = match env_or!("STORAGE_BACKEND", "postgres").as_str() {
        "postgres" => StorageBackend::Postgres {
            db_url: require_env!("DATABASE_URL"),
            db_pool_max: parse_env!("DB_POOL_MAX", u32, 5),
            connect_attempts: parse_env!("DB_CONNECT_ATTEMPTS", u32, 30).max(1),
        },
        "memory" => StorageBackend::Memory,
        other => return Err(anyhow!("Invalid STORAGE_BACKEND: {}", other)),
    };

    let http_port = parse_env!("HTTP_PORT", u16, 8080);
    let jwt_secret = env_or!("JWT_SECRET", DEV_JWT_SECRET);
    let jwt_ttl_hours = parse_env!("JWT_TTL_HOURS", u32, 24);
    let accounts = parse_accounts(&env_or!("AUTH_USERS", DEFAULT_ACCOUNTS))
        .map_err(|e| anyhow!("Invalid AUTH_USERS: {}", e))?;

    Ok(IngestConfig {
        storage,
        http_port,
        jwt_secret,
        jwt_ttl_hours,
        accounts,
    })
}

/// Load the generator service configuration.
///
/// Optional:
/// - `INGEST_URL` – stream endpoint (default: `ws://localhost:8080/ingest/stream`)
/// - `SENSOR_TYPE` – sensor type tag (default: `temperature`)
/// - `FREQUENCY_MS` – initial pace, at least 100 (default: 1000)
/// - `CONFIG_PORT` – listen port (default: 8081)
/// - `RECONNECT_BACKOFF_SECS` – reopen delay (default: 5)
pub fn load_generator_from_env() -> Result<GeneratorConfig> {
    // ---
    Ok(GeneratorConfig {
        ingest_url: env_or!("INGEST_URL", "ws://localhost:8080/ingest/stream"),
        sensor_type: env_or!("SENSOR_TYPE", "temperature"),
        frequency_ms: check_frequency_ms(parse_env!("FREQUENCY_MS", u64, DEFAULT_FREQUENCY_MS))?,
        config_port: parse_env!("CONFIG_PORT", u16, 8081),
        reconnect_backoff_secs: parse_env!("RECONNECT_BACKOFF_SECS", u64, 5),
    })
}

/// Reject an initial pace below the minimum the configuration API accepts.
fn check_frequency_ms(frequency_ms: u64) -> Result<u64> {
    // ---
    if frequency_ms < MIN_FREQUENCY_MS {
        return Err(anyhow!(
            "FREQUENCY_MS must be at least {}, got {}",
            MIN_FREQUENCY_MS,
            frequency_ms
        ));
    }
    Ok(frequency_ms)
}

/// Hide the password component of a connection string.
fn mask_db_url(db_url: &str) -> String {
    // ---
    if let Some(at_pos) = db_url.rfind('@') {
        if let Some(colon_pos) = db_url[..at_pos].rfind(':') {
            return format!("{}:****{}", &db_url[..colon_pos], &db_url[at_pos..]);
        }
    }
    db_url.to_string()
}

impl IngestConfig {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords and never prints
    /// the token secret or account passwords.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        match &self.storage {
            StorageBackend::Postgres {
                db_url,
                db_pool_max,
                connect_attempts,
            } => {
                tracing::info!("  STORAGE_BACKEND     : postgres");
                tracing::info!("  DATABASE_URL        : {}", mask_db_url(db_url));
                tracing::info!("  DB_POOL_MAX         : {}", db_pool_max);
                tracing::info!("  DB_CONNECT_ATTEMPTS : {}", connect_attempts);
            }
            StorageBackend::Memory => {
                tracing::info!("  STORAGE_BACKEND     : memory");
            }
        }
        tracing::info!("  HTTP_PORT           : {}", self.http_port);
        tracing::info!("  JWT_TTL_HOURS       : {}", self.jwt_ttl_hours);
        tracing::info!("  AUTH_USERS          : {} accounts", self.accounts.len());

        if self.jwt_secret == DEV_JWT_SECRET {
            tracing::warn!("JWT_SECRET not set, using the development secret");
        }
    }
}

impl GeneratorConfig {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  INGEST_URL             : {}", self.ingest_url);
        tracing::info!("  SENSOR_TYPE            : {}", self.sensor_type);
        tracing::info!("  FREQUENCY_MS           : {}", self.frequency_ms);
        tracing::info!("  CONFIG_PORT            : {}", self.config_port);
        tracing::info!("  RECONNECT_BACKOFF_SECS : {}", self.reconnect_backoff_secs);
    }
}
