//! Application configuration loaded from environment variables.

use std::time::Duration;

use axum::http::StatusCode;
use serde::Deserialize;
use strum::{Display, EnumString};

use crate::error::RouterError;

/// Which Mapping Store implementation backs the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store seeded from a JSON file.
    #[default]
    #[strum(serialize = "memory")]
    Memory,
    /// ArangoDB HTTP cursor API.
    #[strum(serialize = "arango")]
    Arango,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Routing ===
    /// Mapping Store collection holding the routing rules.
    #[serde(default = "default_maps_collection")]
    pub maps_collection: String,

    /// Name of the inbound JSON field carrying the target identifier.
    #[serde(default = "default_target_field")]
    pub target_field: String,

    /// Identifier used by `GET /query` when the request carries none.
    #[serde(default)]
    pub get_query_default_target: Option<String>,

    /// Path appended to the redirect URL for the outbound call.
    #[serde(default = "default_forward_path")]
    pub forward_path: String,

    /// HTTP status returned when a target cannot be resolved.
    #[serde(default = "default_resolution_failure_status")]
    pub resolution_failure_status: u16,

    // === Mapping Store ===
    /// Store implementation.
    #[serde(default)]
    pub store_backend: StoreBackend,

    /// JSON seed file for the memory store.
    #[serde(default)]
    pub mappings_file: Option<String>,

    /// Reject duplicate targets in the memory store.
    #[serde(default = "default_true")]
    pub mappings_unique: bool,

    /// ArangoDB endpoint.
    #[serde(default = "default_arango_url")]
    pub arango_url: String,

    /// ArangoDB database name.
    #[serde(default = "default_arango_database")]
    pub arango_database: String,

    /// ArangoDB user.
    #[serde(default)]
    pub arango_username: Option<String>,

    /// ArangoDB password.
    #[serde(default)]
    pub arango_password: Option<String>,

    // === Timeouts ===
    /// Store query timeout in milliseconds.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,

    /// Outbound request timeout in milliseconds.
    #[serde(default = "default_forward_timeout")]
    pub forward_timeout_ms: u64,

    /// Outbound connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    // === Server Configuration ===
    /// HTTP listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_maps_collection() -> String {
    "maps".to_string()
}

fn default_target_field() -> String {
    "EQUIPMENTNO".to_string()
}

fn default_forward_path() -> String {
    "/query".to_string()
}

fn default_resolution_failure_status() -> u16 {
    404
}

fn default_true() -> bool {
    true
}

fn default_arango_url() -> String {
    "http://127.0.0.1:8529".to_string()
}

fn default_arango_database() -> String {
    "_system".to_string()
}

fn default_store_timeout() -> u64 {
    2000
}

fn default_forward_timeout() -> u64 {
    10_000
}

fn default_connect_timeout() -> u64 {
    1000
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            maps_collection: default_maps_collection(),
            target_field: default_target_field(),
            get_query_default_target: None,
            forward_path: default_forward_path(),
            resolution_failure_status: default_resolution_failure_status(),
            store_backend: StoreBackend::default(),
            mappings_file: None,
            mappings_unique: true,
            arango_url: default_arango_url(),
            arango_database: default_arango_database(),
            arango_username: None,
            arango_password: None,
            store_timeout_ms: default_store_timeout(),
            forward_timeout_ms: default_forward_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            port: default_port(),
            metrics_enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Load and validate in one step.
    pub fn from_env() -> crate::Result<Self> {
        let config = Self::load()?;
        config.validate().map_err(RouterError::InvalidConfig)?;
        Ok(config)
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.maps_collection.trim().is_empty() {
            return Err("MAPS_COLLECTION must not be empty".to_string());
        }

        if self.target_field.trim().is_empty() {
            return Err("TARGET_FIELD must not be empty".to_string());
        }

        if !self.forward_path.starts_with('/') {
            return Err("FORWARD_PATH must start with /".to_string());
        }

        if self.resolution_failure_status().is_err() {
            return Err(format!(
                "RESOLUTION_FAILURE_STATUS {} is not a 4xx or 5xx status",
                self.resolution_failure_status
            ));
        }

        if self.store_timeout_ms == 0 || self.forward_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err("timeouts must be greater than zero".to_string());
        }

        if self.store_backend == StoreBackend::Arango {
            url::Url::parse(&self.arango_url)
                .map_err(|e| format!("ARANGO_URL is not a valid URL: {}", e))?;
        }

        Ok(())
    }

    /// Status code for unresolved targets, restricted to error classes.
    pub fn resolution_failure_status(&self) -> Result<StatusCode, String> {
        StatusCode::from_u16(self.resolution_failure_status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .ok_or_else(|| format!("unusable status {}", self.resolution_failure_status))
    }

    /// Store query timeout.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Outbound request timeout.
    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }

    /// Outbound connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
