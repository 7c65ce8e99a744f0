//! Configuration loader for the `codemetal-roomsentry` controller.
//!
//! This module centralizes all runtime configuration values and their
//! defaults, loading from environment variables (with optional `.env` file
//! support provided by the caller). By consolidating configuration logic
//! here, we avoid scattering `env::var` calls throughout the codebase.
//! Every variable is optional; the defaults assume a local broker and a
//! SQLite file next to the binary.

use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional typed environment variable with a default value.
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

/// Read an optional string environment variable with a default value.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent
/// configuration snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// MQTT broker host.
    pub mqtt_host: String,

    /// MQTT broker port.
    pub mqtt_port: u16,

    /// MQTT username; credentials are not sent when empty.
    pub mqtt_username: String,

    /// MQTT password.
    pub mqtt_password: String,

    /// MQTT keep-alive interval in seconds.
    pub mqtt_keepalive: u64,

    /// MQTT client identifier.
    pub mqtt_client_id: String,

    /// Root of the MQTT topic layout.
    pub topic_prefix: String,

    /// Alarm threshold in degrees Celsius; the alarm turns on strictly
    /// above this value.
    pub temp_threshold: f64,

    /// SQLite database file path.
    pub db_path: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Listen port for the reporting API.
    pub http_port: u16,
}

/// Load configuration from environment variables with defaults.
///
/// All optional:
/// - `MQTT_BROKER` – broker host (default: `localhost`)
/// - `MQTT_PORT` – broker port (default: 1883)
/// - `MQTT_USERNAME` / `MQTT_PASSWORD` – credentials (default: empty)
/// - `MQTT_KEEPALIVE` – keep-alive seconds (default: 60)
/// - `MQTT_CLIENT_ID` – client identifier (default: `roomsentry-controller`)
/// - `TOPIC_PREFIX` – topic layout root (default: `server_room`)
/// - `TEMP_THRESHOLD` – alarm threshold in °C (default: 24.0)
/// - `DB_PATH` – SQLite file path (default: `sensors.db`)
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `HTTP_PORT` – reporting API port (default: 8080)
///
/// Returns an error if a variable is present but fails to parse.
pub fn load_from_env() -> Result<Config> {
    // ---
    Ok(Config {
        mqtt_host: env_or!("MQTT_BROKER", "localhost"),
        mqtt_port: parse_env!("MQTT_PORT", u16, 1883),
        mqtt_username: env_or!("MQTT_USERNAME", ""),
        mqtt_password: env_or!("MQTT_PASSWORD", ""),
        mqtt_keepalive: parse_env!("MQTT_KEEPALIVE", u64, 60),
        mqtt_client_id: env_or!("MQTT_CLIENT_ID", "roomsentry-controller"),
        topic_prefix: env_or!("TOPIC_PREFIX", "server_room"),
        temp_threshold: parse_env!("TEMP_THRESHOLD", f64, 24.0),
        db_path: env_or!("DB_PATH", "sensors.db"),
        db_pool_max: parse_env!("DB_POOL_MAX", u32, 5),
        http_port: parse_env!("HTTP_PORT", u16, 8080),
    })
}

impl Config {
    /// Connection URL for the SQLite pool; creates the file if missing.
    pub fn db_url(&self) -> String {
        // ---
        format!("sqlite:{}?mode=rwc", self.db_path)
    }

    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks the MQTT password while showing all configuration values that
    /// were loaded.
    pub fn log_config(&self) {
        // ---
        let masked_username = if self.mqtt_username.is_empty() {
            "(none)"
        } else {
            self.mqtt_username.as_str()
        };
        let masked_password = if self.mqtt_password.is_empty() {
            "(none)"
        } else {
            "****"
        };

        tracing::info!("Configuration loaded:");
        tracing::info!("  MQTT_BROKER    : {}", self.mqtt_host);
        tracing::info!("  MQTT_PORT      : {}", self.mqtt_port);
        tracing::info!("  MQTT_USERNAME  : {}", masked_username);
        tracing::info!("  MQTT_PASSWORD  : {}", masked_password);
        tracing::info!("  MQTT_KEEPALIVE : {}", self.mqtt_keepalive);
        tracing::info!("  MQTT_CLIENT_ID : {}", self.mqtt_client_id);
        tracing::info!("  TOPIC_PREFIX   : {}", self.topic_prefix);
        tracing::info!("  TEMP_THRESHOLD : {}", self.temp_threshold);
        tracing::info!("  DB_PATH        : {}", self.db_path);
        tracing::info!("  DB_POOL_MAX    : {}", self.db_pool_max);
        tracing::info!("  HTTP_PORT      : {}", self.http_port);
    }
}
